//! axum middleware for the route guard and the cookie relay.

use super::policy::{GuardPolicy, RouteDecision};
use crate::{identity::CookieJar, session::SessionResolver};
use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct GuardState {
    policy: Arc<GuardPolicy>,
    resolver: SessionResolver,
    cookie_secure: bool,
}

impl GuardState {
    #[must_use]
    pub fn new(policy: GuardPolicy, resolver: SessionResolver, cookie_secure: bool) -> Self {
        Self {
            policy: Arc::new(policy),
            resolver,
            cookie_secure,
        }
    }
}

/// `307` keeps GET navigations as they are; anything else becomes a `303` so a
/// form body is never replayed against the redirect target.
pub fn guard_redirect(method: &Method, target: &str) -> Response {
    if method == Method::GET || method == Method::HEAD {
        Redirect::temporary(target).into_response()
    } else {
        Redirect::to(target).into_response()
    }
}

/// Gate requests inside the perimeter; pass everything else straight through.
///
/// On `Allow` with a session, the [`crate::identity::Identity`] is added to the
/// request extensions. Cookie writes from session resolution go onto the
/// response either way, redirects included.
pub async fn route_guard(
    State(state): State<GuardState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !state.policy.in_perimeter(&path) {
        return next.run(request).await;
    }

    // Share the relay's jar when present so handlers see refreshed tokens.
    let (cookies, relay_here) = match request.extensions().get::<Arc<CookieJar>>() {
        Some(jar) => (jar.clone(), false),
        None => (Arc::new(CookieJar::from_headers(request.headers())), true),
    };

    let identity = state.resolver.resolve(&cookies).await;
    let decision = state.policy.decide(&path, identity.is_some());
    debug!(
        path = %path,
        authenticated = identity.is_some(),
        decision = %decision,
        "Route guard decision"
    );

    let mut response = match decision {
        RouteDecision::Allow => {
            if let Some(identity) = identity {
                request.extensions_mut().insert(identity);
            }
            next.run(request).await
        }
        RouteDecision::RedirectTo(target) => guard_redirect(request.method(), &target),
    };

    if relay_here {
        cookies.apply(response.headers_mut(), state.cookie_secure);
    }
    response
}

/// Per-request cookie jar shared by the guard and handlers.
#[derive(Clone, Copy, Debug)]
pub struct CookieRelay {
    secure: bool,
}

impl CookieRelay {
    #[must_use]
    pub const fn new(secure: bool) -> Self {
        Self { secure }
    }
}

/// Install an `Arc<CookieJar>` extension and relay its writes onto every response.
pub async fn relay_cookies(
    State(relay): State<CookieRelay>,
    mut request: Request,
    next: Next,
) -> Response {
    let cookies = Arc::new(CookieJar::from_headers(request.headers()));
    request.extensions_mut().insert(cookies.clone());

    let mut response = next.run(request).await;
    cookies.apply(response.headers_mut(), relay.secure);
    response
}
