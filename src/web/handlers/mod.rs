//! Page handlers.
//!
//! Each request mounts the page's flow with a [`RecordingNavigator`] and turns
//! the recorded navigation into a `303 See Other`.

pub mod callback;
pub mod health;
pub mod login;
pub mod logout;
pub mod projects;
pub mod reset_password;

pub use self::health::health;

use super::AppState;
use crate::client::{AuthDispatcher, RecordingNavigator, Route};
use axum::response::{IntoResponse, Redirect, Response};
use std::sync::Arc;

fn dispatcher(state: &AppState) -> AuthDispatcher {
    AuthDispatcher::new(
        state.identity.clone(),
        Arc::new(RecordingNavigator::new()),
        state.callback_url().clone(),
    )
    .with_update_redirect_delay(state.config.update_redirect_delay)
}

fn navigate(route: Route) -> Response {
    Redirect::to(route.path()).into_response()
}
