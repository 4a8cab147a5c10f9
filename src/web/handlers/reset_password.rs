use super::{dispatcher, navigate};
use crate::{
    client::{AuthIntent, DispatchOutcome},
    identity::CookieJar,
    web::{pages, AppState},
};
use axum::{
    response::{IntoResponse, Response},
    Extension, Form,
};
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct PasswordUpdateForm {
    #[serde(default)]
    new_password: String,
}

pub async fn show() -> impl IntoResponse {
    pages::reset_password(None, None)
}

/// Update the password on the session the recovery link established.
///
/// The follow-up navigation is handed to the browser as a meta refresh with
/// the dispatcher's delay.
pub async fn submit(
    Extension(state): Extension<Arc<AppState>>,
    Extension(cookies): Extension<Arc<CookieJar>>,
    Form(form): Form<PasswordUpdateForm>,
) -> Response {
    let dispatcher = dispatcher(&state);
    let intent = AuthIntent::PasswordUpdate {
        new_password: SecretString::from(form.new_password),
    };

    match dispatcher.dispatch(intent, &cookies).await {
        DispatchOutcome::Displayed(status) => {
            pages::reset_password(Some(&status), dispatcher.pending_navigation()).into_response()
        }
        DispatchOutcome::Navigated(route) => navigate(route),
        DispatchOutcome::Busy | DispatchOutcome::Abandoned => {
            pages::reset_password(None, None).into_response()
        }
    }
}
