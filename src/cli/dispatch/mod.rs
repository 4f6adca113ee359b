use crate::{
    agenda::visitors::DEFAULT_SESSION_TTL,
    cli::{
        actions::{server::Args, Action},
        commands::{self, auth},
    },
};
use anyhow::{Context, Result};
use chrono::Locale;
use secrecy::SecretString;
use std::time::Duration;

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(8080);
    let base_path = matches
        .get_one::<String>(commands::ARG_BASE_PATH)
        .cloned()
        .unwrap_or_default();
    let locale = matches
        .get_one::<Locale>(commands::ARG_LOCALE)
        .copied()
        .unwrap_or(Locale::it_IT);

    let auth_url = matches
        .get_one::<String>(auth::ARG_AUTH_URL)
        .cloned()
        .context("missing required argument: --auth-url")?;
    let auth_anon_key = matches
        .get_one::<String>(auth::ARG_AUTH_ANON_KEY)
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --auth-anon-key")?;
    let request_timeout = matches
        .get_one::<u64>(auth::ARG_REQUEST_TIMEOUT)
        .copied()
        .map_or(crate::auth::config::DEFAULT_REQUEST_TIMEOUT, Duration::from_secs);
    let session_ttl = matches
        .get_one::<u64>(auth::ARG_SESSION_TTL)
        .copied()
        .map_or(DEFAULT_SESSION_TTL, Duration::from_secs);
    let cookie_secure = matches.get_flag(auth::ARG_COOKIE_SECURE);

    Ok(Action::Server(Args {
        port,
        base_path,
        locale,
        auth_url,
        auth_anon_key,
        request_timeout,
        session_ttl,
        cookie_secure,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn handler_builds_server_args() {
        temp_env::with_vars(
            [
                ("AGENDA_BASE_PATH", None::<&str>),
                ("AGENDA_LOCALE", None),
                ("AGENDA_PORT", None),
                ("AGENDA_REQUEST_TIMEOUT_SECONDS", None),
                ("AGENDA_SESSION_TTL_SECONDS", None),
                ("AGENDA_COOKIE_SECURE", None),
            ],
            || {
                let matches = commands::new().get_matches_from(vec![
                    "agenda",
                    "--auth-url",
                    "https://project.supabase.co",
                    "--auth-anon-key",
                    "anon-key",
                    "--base-path",
                    "/planner/",
                    "--request-timeout-seconds",
                    "4",
                    "--cookie-secure",
                ]);

                let Ok(Action::Server(args)) = handler(&matches) else {
                    panic!("expected a server action");
                };
                assert_eq!(args.port, 8080);
                assert_eq!(args.base_path, "/planner/");
                assert_eq!(args.locale, Locale::it_IT);
                assert_eq!(args.auth_url, "https://project.supabase.co");
                assert_eq!(args.auth_anon_key.expose_secret(), "anon-key");
                assert_eq!(args.request_timeout, Duration::from_secs(4));
                assert_eq!(args.session_ttl, DEFAULT_SESSION_TTL);
                assert!(args.cookie_secure);
            },
        );
    }
}
