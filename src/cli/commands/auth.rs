use clap::{builder::NonEmptyStringValueParser, Arg, ArgAction, Command};

pub const ARG_AUTH_URL: &str = "auth-url";
pub const ARG_AUTH_ANON_KEY: &str = "auth-anon-key";
pub const ARG_REQUEST_TIMEOUT: &str = "request-timeout-seconds";
pub const ARG_SESSION_TTL: &str = "session-ttl-seconds";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_AUTH_URL)
                .long(ARG_AUTH_URL)
                .help("Base URL of the auth provider, example: https://project.supabase.co")
                .env("AGENDA_AUTH_URL")
                .required(true)
                .value_parser(NonEmptyStringValueParser::new()),
        )
        .arg(
            Arg::new(ARG_AUTH_ANON_KEY)
                .long(ARG_AUTH_ANON_KEY)
                .help("Public (anon) API key of the auth provider")
                .env("AGENDA_AUTH_ANON_KEY")
                .hide_env_values(true)
                .required(true)
                .value_parser(NonEmptyStringValueParser::new()),
        )
        .arg(
            Arg::new(ARG_REQUEST_TIMEOUT)
                .long(ARG_REQUEST_TIMEOUT)
                .help("Timeout for every call to the auth provider, in seconds")
                .env("AGENDA_REQUEST_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..=300)),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL)
                .long(ARG_SESSION_TTL)
                .help("Session cookie TTL in seconds")
                .env("AGENDA_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark the session cookie Secure (serve over HTTPS)")
                .env("AGENDA_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
}
