//! HTTP surface: router, middleware stack and server loop.

use crate::{
    guard::{relay_cookies, route_guard, CookieRelay, GuardPolicy, GuardState},
    identity::IdentityProvider,
    projects::ProjectStore,
    session::SessionResolver,
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Router,
};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;
use url::Url;

mod handlers;
mod pages;

pub use handlers::health;

const REQUEST_ID: &str = "x-request-id";

/// Settings the pages need at request time.
#[derive(Clone, Debug)]
pub struct WebConfig {
    /// Public base URL, used to build links the identity provider sends back.
    pub site_url: Url,
    pub cookie_secure: bool,
    pub update_redirect_delay: Duration,
}

impl WebConfig {
    /// # Errors
    /// Returns an error if the site URL cannot carry a path.
    pub fn callback_url(&self) -> Result<Url> {
        self.site_url
            .join(crate::client::Route::AuthCallback.path())
            .with_context(|| format!("Invalid site URL: {}", self.site_url))
    }
}

/// Capabilities and settings shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityProvider>,
    pub projects: Arc<dyn ProjectStore>,
    pub policy: GuardPolicy,
    pub config: WebConfig,
    callback_url: Url,
}

impl AppState {
    /// # Errors
    /// Returns an error if the callback URL cannot be derived from the site URL.
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        projects: Arc<dyn ProjectStore>,
        config: WebConfig,
    ) -> Result<Self> {
        let callback_url = config.callback_url()?;
        Ok(Self {
            identity,
            projects,
            policy: GuardPolicy::default(),
            config,
            callback_url,
        })
    }

    #[must_use]
    pub fn with_policy(mut self, policy: GuardPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn callback_url(&self) -> &Url {
        &self.callback_url
    }
}

/// Build the application router.
///
/// Layer order, outermost first: request id, trace span, cookie relay, route
/// guard. The guard reuses the relay's per-request jar.
pub fn router(state: AppState) -> Router {
    let guard = GuardState::new(
        state.policy.clone(),
        SessionResolver::new(state.identity.clone()),
        state.config.cookie_secure,
    );
    let relay = CookieRelay::new(state.config.cookie_secure);

    Router::new()
        .route(
            "/login",
            get(handlers::login::show).post(handlers::login::submit),
        )
        .route(
            "/auth/callback",
            get(handlers::callback::landing).post(handlers::callback::reconcile),
        )
        .route(
            "/reset-password",
            get(handlers::reset_password::show).post(handlers::reset_password::submit),
        )
        .route(
            "/projects",
            get(handlers::projects::list).post(handlers::projects::create),
        )
        .route("/projects/{id}/delete", post(handlers::projects::delete))
        .route("/logout", post(handlers::logout::logout))
        .layer(from_fn_with_state(guard, route_guard))
        .layer(from_fn_with_state(relay, relay_cookies))
        .layer(Extension(Arc::new(state)))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span)),
        )
        .route("/health", get(health).options(health))
}

/// Serve `state` on `port` until interrupted.
///
/// # Errors
/// Returns an error if the listener cannot bind or the server fails.
pub async fn new(port: u16, state: AppState) -> Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Gracefully shutdown");
            }
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let method = request.method();
    let path = request.uri().path();
    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", %method, path, request_id)
}
