mod logging;
mod service;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

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

    let command = Command::new("projectdesk")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("PROJECTDESK_PORT")
                .value_parser(clap::value_parser!(u16)),
        );

    let command = service::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENV: [&str; 8] = [
        "PROJECTDESK_PORT",
        "PROJECTDESK_SITE_URL",
        "PROJECTDESK_AUTH_URL",
        "PROJECTDESK_ANON_KEY",
        "PROJECTDESK_SERVICE_KEY",
        "PROJECTDESK_COOKIE_SECURE",
        "PROJECTDESK_PASSWORD_UPDATE_REDIRECT_MS",
        "PROJECTDESK_LOG_LEVEL",
    ];

    fn without_env<F: FnOnce()>(f: F) {
        temp_env::with_vars(ENV.map(|key| (key, None::<&str>)), f);
    }

    fn required_args() -> Vec<String> {
        [
            "projectdesk",
            "--auth-url",
            "https://abc.supabase.co",
            "--anon-key",
            "anon",
            "--service-key",
            "service",
        ]
        .iter()
        .map(ToString::to_string)
        .collect()
    }

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "projectdesk");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some(env!("CARGO_PKG_DESCRIPTION").to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_defaults() {
        without_env(|| {
            let matches = new().get_matches_from(required_args());
            assert_eq!(matches.get_one::<u16>("port").copied(), Some(8080));
            assert_eq!(
                matches.get_one::<String>("site-url").cloned(),
                Some("http://localhost:8080".to_string())
            );
            assert_eq!(matches.get_one::<bool>("cookie-secure"), None);
            assert_eq!(
                matches
                    .get_one::<u64>("password-update-redirect-ms")
                    .copied(),
                Some(1500)
            );
            assert_eq!(matches.get_one::<u8>("verbosity").copied(), Some(0));
        });
    }

    #[test]
    fn test_missing_auth_url() {
        without_env(|| {
            let result = new().try_get_matches_from(vec![
                "projectdesk",
                "--anon-key",
                "anon",
                "--service-key",
                "service",
            ]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_cookie_secure_flag() {
        without_env(|| {
            let mut args = required_args();
            args.push("--cookie-secure".to_string());
            let matches = new().get_matches_from(args);
            assert_eq!(matches.get_one::<bool>("cookie-secure").copied(), Some(true));

            let mut args = required_args();
            args.push("--cookie-secure=false".to_string());
            let matches = new().get_matches_from(args);
            assert_eq!(
                matches.get_one::<bool>("cookie-secure").copied(),
                Some(false)
            );
        });
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("PROJECTDESK_PORT", Some("443")),
                ("PROJECTDESK_SITE_URL", Some("https://desk.example.com")),
                ("PROJECTDESK_AUTH_URL", Some("https://abc.supabase.co")),
                ("PROJECTDESK_ANON_KEY", Some("anon")),
                ("PROJECTDESK_SERVICE_KEY", Some("service")),
                ("PROJECTDESK_COOKIE_SECURE", Some("false")),
                ("PROJECTDESK_PASSWORD_UPDATE_REDIRECT_MS", Some("250")),
                ("PROJECTDESK_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches = new().get_matches_from(vec!["projectdesk"]);
                assert_eq!(matches.get_one::<u16>("port").copied(), Some(443));
                assert_eq!(
                    matches.get_one::<String>("site-url").cloned(),
                    Some("https://desk.example.com".to_string())
                );
                assert_eq!(
                    matches.get_one::<String>("auth-url").cloned(),
                    Some("https://abc.supabase.co".to_string())
                );
                assert_eq!(
                    matches.get_one::<bool>("cookie-secure").copied(),
                    Some(false)
                );
                assert_eq!(
                    matches
                        .get_one::<u64>("password-update-redirect-ms")
                        .copied(),
                    Some(250)
                );
                assert_eq!(matches.get_one::<u8>("verbosity").copied(), Some(2));
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, level) in levels.iter().enumerate() {
            without_env(|| {
                temp_env::with_var("PROJECTDESK_LOG_LEVEL", Some(level), || {
                    let matches = new().get_matches_from(required_args());
                    assert_eq!(
                        matches.get_one::<u8>("verbosity").copied(),
                        u8::try_from(index).ok()
                    );
                });
            });
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        for index in 0..5_usize {
            without_env(|| {
                let mut args = required_args();
                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }
                let matches = new().get_matches_from(args);
                assert_eq!(
                    matches.get_one::<u8>("verbosity").copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }
}
