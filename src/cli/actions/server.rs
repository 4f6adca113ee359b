use crate::{
    agenda::{
        self,
        visitors::{CookieSettings, VisitorSessions},
        AppState,
    },
    auth::{AuthConfig, SupabaseClient},
    cli::telemetry,
    guards::BasePath,
};
use anyhow::{Context, Result};
use chrono::Locale;
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub base_path: String,
    pub locale: Locale,
    pub auth_url: String,
    pub auth_anon_key: SecretString,
    pub request_timeout: Duration,
    pub session_ttl: Duration,
    pub cookie_secure: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the auth configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let config = AuthConfig::new(&args.auth_url, args.auth_anon_key)
        .context("Invalid auth provider configuration")?
        .with_request_timeout(args.request_timeout);

    // Template client; every visitor signs in on its own detached copy.
    let provider = SupabaseClient::new(config).context("Could not build auth client")?;

    let base = BasePath::new(&args.base_path);
    let sessions = VisitorSessions::new(
        &provider,
        CookieSettings {
            path: base.scope().to_string(),
            ttl: args.session_ttl,
            secure: args.cookie_secure,
        },
    );

    let state = Arc::new(AppState::new(sessions, base, args.locale));

    let result = agenda::serve(args.port, Arc::clone(&state)).await;

    state.sessions.clear().await;
    telemetry::shutdown_tracer();

    result
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("base_path", BasePath::new(&args.base_path).scope().to_string()),
        ("locale", format!("{:?}", args.locale)),
        ("auth_url", args.auth_url.clone()),
        (
            "request_timeout",
            format!("{}s", args.request_timeout.as_secs()),
        ),
        ("session_ttl", format!("{}s", args.session_ttl.as_secs())),
        ("cookie_secure", args.cookie_secure.to_string()),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
