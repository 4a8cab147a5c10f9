use crate::cli::actions::{server::Args, Action};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::time::Duration;
use url::Url;

/// # Errors
/// Returns an error if required arguments are missing or malformed.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    let site_url = matches
        .get_one::<String>("site-url")
        .context("missing required argument: --site-url")?;
    let site_url = Url::parse(site_url).context("invalid PROJECTDESK_SITE_URL")?;

    let auth_url = matches
        .get_one::<String>("auth-url")
        .cloned()
        .context("missing required argument: --auth-url")?;
    Url::parse(&auth_url).context("invalid PROJECTDESK_AUTH_URL")?;

    let anon_key = matches
        .get_one::<String>("anon-key")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --anon-key")?;
    let service_key = matches
        .get_one::<String>("service-key")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --service-key")?;

    let cookie_secure = matches
        .get_one::<bool>("cookie-secure")
        .copied()
        .unwrap_or_else(|| site_url.scheme() == "https");

    let update_redirect_delay = Duration::from_millis(
        matches
            .get_one::<u64>("password-update-redirect-ms")
            .copied()
            .unwrap_or(1500),
    );

    Ok(Action::Server(Args {
        port,
        site_url,
        auth_url,
        anon_key,
        service_key,
        cookie_secure,
        update_redirect_delay,
    }))
}
