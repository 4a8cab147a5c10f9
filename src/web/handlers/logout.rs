use super::{dispatcher, navigate};
use crate::{
    client::{DispatchOutcome, Route},
    identity::CookieJar,
    web::AppState,
};
use axum::{response::Response, Extension};
use std::sync::Arc;

/// Sign out; the visitor always ends up on the login page.
pub async fn logout(
    Extension(state): Extension<Arc<AppState>>,
    Extension(cookies): Extension<Arc<CookieJar>>,
) -> Response {
    let dispatcher = dispatcher(&state);
    match dispatcher.sign_out(&cookies).await {
        DispatchOutcome::Navigated(route) => navigate(route),
        _ => navigate(Route::Login),
    }
}
