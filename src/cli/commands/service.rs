use clap::{Arg, Command};

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("site-url")
                .long("site-url")
                .help("Public base URL of this site; email links point back here")
                .default_value("http://localhost:8080")
                .env("PROJECTDESK_SITE_URL"),
        )
        .arg(
            Arg::new("auth-url")
                .long("auth-url")
                .help("Base URL of the hosted auth and data service, example: https://<project>.supabase.co")
                .env("PROJECTDESK_AUTH_URL")
                .required(true),
        )
        .arg(
            Arg::new("anon-key")
                .long("anon-key")
                .help("Public (anon) API key for the auth service")
                .env("PROJECTDESK_ANON_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("service-key")
                .long("service-key")
                .help("Service API key for the data service")
                .env("PROJECTDESK_SERVICE_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("cookie-secure")
                .long("cookie-secure")
                .help("Mark session cookies Secure (default: true when --site-url is https)")
                .env("PROJECTDESK_COOKIE_SECURE")
                .num_args(0..=1)
                .default_missing_value("true")
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new("password-update-redirect-ms")
                .long("password-update-redirect-ms")
                .help("Delay before leaving the reset-password page after an update, in milliseconds")
                .default_value("1500")
                .env("PROJECTDESK_PASSWORD_UPDATE_REDIRECT_MS")
                .value_parser(clap::value_parser!(u64)),
        )
}
