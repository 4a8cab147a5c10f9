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

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoginAction {
    #[default]
    SignIn,
    SignUp,
    Reset,
}

/// Login form. Enter submits the first button, which is sign in.
#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    action: LoginAction,
}

impl LoginForm {
    fn into_intent(self) -> (String, AuthIntent) {
        let email = self.email;
        let intent = match self.action {
            LoginAction::SignIn => AuthIntent::SignIn {
                email: email.clone(),
                password: SecretString::from(self.password),
            },
            LoginAction::SignUp => AuthIntent::SignUp {
                email: email.clone(),
                password: SecretString::from(self.password),
            },
            LoginAction::Reset => AuthIntent::PasswordResetRequest {
                email: email.clone(),
            },
        };
        (email, intent)
    }
}

pub async fn show() -> impl IntoResponse {
    pages::login(None, "")
}

pub async fn submit(
    Extension(state): Extension<Arc<AppState>>,
    Extension(cookies): Extension<Arc<CookieJar>>,
    Form(form): Form<LoginForm>,
) -> Response {
    let (email, intent) = form.into_intent();
    let dispatcher = dispatcher(&state);

    match dispatcher.dispatch(intent, &cookies).await {
        DispatchOutcome::Navigated(route) => navigate(route),
        DispatchOutcome::Displayed(status) => pages::login(Some(&status), &email).into_response(),
        DispatchOutcome::Busy | DispatchOutcome::Abandoned => {
            pages::login(None, &email).into_response()
        }
    }
}
