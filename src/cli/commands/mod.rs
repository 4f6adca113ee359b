pub mod auth;

use chrono::Locale;
use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgAction, ColorChoice, Command,
};

pub const ARG_PORT: &str = "port";
pub const ARG_BASE_PATH: &str = "base-path";
pub const ARG_LOCALE: &str = "locale";
pub const ARG_VERBOSITY: &str = "verbosity";

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Accepts POSIX locale names such as `it_IT` or `en_US`.
///
/// # Errors
/// Returns a message naming the value when the locale is unknown.
pub fn parse_locale(value: &str) -> Result<Locale, String> {
    Locale::try_from(value).map_err(|_| format!("unknown locale: {value}"))
}

/// `AGENDA_LOG_LEVEL` as a verbosity count: a level name or its index.
///
/// # Errors
/// Returns a message naming the value when it is neither.
pub fn parse_log_level(value: &str) -> Result<u8, String> {
    let lower = value.trim().to_ascii_lowercase();
    LOG_LEVELS
        .iter()
        .position(|level| *level == lower)
        .or_else(|| lower.parse::<usize>().ok().filter(|index| *index < LOG_LEVELS.len()))
        .and_then(|index| u8::try_from(index).ok())
        .ok_or_else(|| format!("unknown log level: {value}"))
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("agenda")
        .about("Weekly agenda behind an email allowlist")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("AGENDA_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_BASE_PATH)
                .long(ARG_BASE_PATH)
                .help("Path prefix the site is mounted under, example: /planner")
                .env("AGENDA_BASE_PATH")
                .default_value(""),
        )
        .arg(
            Arg::new(ARG_LOCALE)
                .long(ARG_LOCALE)
                .help("Locale for weekday and month labels")
                .env("AGENDA_LOCALE")
                .default_value("it_IT")
                .value_parser(parse_locale),
        )
        .arg(
            Arg::new(ARG_VERBOSITY)
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("AGENDA_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(parse_log_level),
        );

    auth::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 5] = [
        "agenda",
        "--auth-url",
        "https://project.supabase.co",
        "--auth-anon-key",
        "anon-key",
    ];

    fn with_cleared_env<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        temp_env::with_vars(
            [
                ("AGENDA_AUTH_URL", None::<&str>),
                ("AGENDA_AUTH_ANON_KEY", None),
                ("AGENDA_PORT", None),
                ("AGENDA_BASE_PATH", None),
                ("AGENDA_LOCALE", None),
                ("AGENDA_REQUEST_TIMEOUT_SECONDS", None),
                ("AGENDA_SESSION_TTL_SECONDS", None),
                ("AGENDA_COOKIE_SECURE", None),
                ("AGENDA_LOG_LEVEL", None),
            ],
            f,
        )
    }

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "agenda");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Weekly agenda behind an email allowlist".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_defaults() {
        with_cleared_env(|| {
            let matches = new().get_matches_from(REQUIRED);

            assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(8080));
            assert_eq!(
                matches.get_one::<String>(ARG_BASE_PATH).cloned(),
                Some(String::new())
            );
            assert_eq!(
                matches.get_one::<Locale>(ARG_LOCALE).copied(),
                Some(Locale::it_IT)
            );
            assert_eq!(
                matches.get_one::<u64>(auth::ARG_REQUEST_TIMEOUT).copied(),
                Some(10)
            );
            assert_eq!(
                matches.get_one::<u64>(auth::ARG_SESSION_TTL).copied(),
                Some(604_800)
            );
            assert!(!matches.get_flag(auth::ARG_COOKIE_SECURE));
            assert_eq!(
                matches.get_one::<u8>(ARG_VERBOSITY).copied(),
                Some(0)
            );
        });
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("AGENDA_AUTH_URL", Some("https://project.supabase.co")),
                ("AGENDA_AUTH_ANON_KEY", Some("anon-key")),
                ("AGENDA_PORT", Some("443")),
                ("AGENDA_BASE_PATH", Some("/planner")),
                ("AGENDA_LOCALE", Some("en_US")),
                ("AGENDA_REQUEST_TIMEOUT_SECONDS", Some("3")),
                ("AGENDA_SESSION_TTL_SECONDS", Some("3600")),
                ("AGENDA_COOKIE_SECURE", Some("true")),
                ("AGENDA_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches = new().get_matches_from(vec!["agenda"]);
                assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(443));
                assert_eq!(
                    matches.get_one::<String>(auth::ARG_AUTH_URL).cloned(),
                    Some("https://project.supabase.co".to_string())
                );
                assert_eq!(
                    matches.get_one::<String>(ARG_BASE_PATH).cloned(),
                    Some("/planner".to_string())
                );
                assert_eq!(
                    matches.get_one::<Locale>(ARG_LOCALE).copied(),
                    Some(Locale::en_US)
                );
                assert_eq!(
                    matches.get_one::<u64>(auth::ARG_REQUEST_TIMEOUT).copied(),
                    Some(3)
                );
                assert_eq!(
                    matches.get_one::<u64>(auth::ARG_SESSION_TTL).copied(),
                    Some(3600)
                );
                assert!(matches.get_flag(auth::ARG_COOKIE_SECURE));
                assert_eq!(
                    matches.get_one::<u8>(ARG_VERBOSITY).copied(),
                    Some(2)
                );
            },
        );
    }

    #[test]
    fn test_missing_anon_key_fails() {
        with_cleared_env(|| {
            let result = new().try_get_matches_from(vec![
                "agenda",
                "--auth-url",
                "https://project.supabase.co",
            ]);
            assert_eq!(
                result.map_err(|e| e.kind()).err(),
                Some(clap::error::ErrorKind::MissingRequiredArgument)
            );
        });
    }

    #[test]
    fn test_empty_anon_key_fails() {
        with_cleared_env(|| {
            let result = new().try_get_matches_from(vec![
                "agenda",
                "--auth-url",
                "https://project.supabase.co",
                "--auth-anon-key",
                "",
            ]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn log_level_accepts_names_and_indexes() {
        assert_eq!(parse_log_level("DEBUG"), Ok(3));
        assert_eq!(parse_log_level("4"), Ok(4));
        assert!(parse_log_level("5").is_err());
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_unknown_locale_fails() {
        with_cleared_env(|| {
            let mut args = REQUIRED.to_vec();
            args.extend(["--locale", "xx_YY"]);
            let result = new().try_get_matches_from(args);
            assert_eq!(
                result.map_err(|e| e.kind()).err(),
                Some(clap::error::ErrorKind::ValueValidation)
            );
        });
    }

    #[test]
    fn test_check_log_level_env() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars(
                [
                    ("AGENDA_LOG_LEVEL", Some(level)),
                    ("AGENDA_AUTH_URL", Some("https://project.supabase.co")),
                    ("AGENDA_AUTH_ANON_KEY", Some("anon-key")),
                ],
                || {
                    let matches = new().get_matches_from(vec!["agenda"]);
                    assert_eq!(
                        matches.get_one::<u8>(ARG_VERBOSITY).copied(),
                        u8::try_from(index).ok()
                    );
                },
            );
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        for index in 0..5_usize {
            with_cleared_env(|| {
                let mut args: Vec<String> = REQUIRED.iter().map(ToString::to_string).collect();

                // Add the appropriate number of "-v" flags based on the index
                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }

                let matches = new().get_matches_from(args);
                assert_eq!(
                    matches.get_one::<u8>(ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }
}
