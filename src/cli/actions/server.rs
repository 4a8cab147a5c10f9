use crate::{
    cli::telemetry,
    identity::SupabaseAuth,
    projects::PostgrestProjectStore,
    web::{self, AppState, WebConfig},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub site_url: Url,
    pub auth_url: String,
    pub anon_key: SecretString,
    pub service_key: SecretString,
    pub cookie_secure: bool,
    pub update_redirect_delay: Duration,
}

/// Execute the server action.
/// # Errors
/// Returns an error if a client cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let identity = SupabaseAuth::new(&args.auth_url, args.anon_key)
        .context("Could not build identity provider")?;
    let projects = PostgrestProjectStore::new(&args.auth_url, args.service_key)
        .context("Could not build project store")?;

    let state = AppState::new(
        Arc::new(identity),
        Arc::new(projects),
        WebConfig {
            site_url: args.site_url,
            cookie_secure: args.cookie_secure,
            update_redirect_delay: args.update_redirect_delay,
        },
    )?;
    info!("Auth callback: {}", state.callback_url());

    let result = web::new(args.port, state).await;
    telemetry::shutdown_tracer();
    result
}

fn log_startup_args(args: &Args) {
    debug!(
        port = args.port,
        site_url = %args.site_url,
        auth_url = %args.auth_url,
        cookie_secure = args.cookie_secure,
        update_redirect_delay_ms = u64::try_from(args.update_redirect_delay.as_millis()).unwrap_or(u64::MAX),
        "Startup arguments"
    );
}
