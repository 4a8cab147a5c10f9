use super::navigate;
use crate::{
    client::{CallbackFailure, CallbackReconciler, CallbackState, Mount, RecordingNavigator},
    identity::CookieJar,
    web::{pages, AppState},
};
use axum::{
    response::{IntoResponse, Response},
    Extension, Form,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use url::Url;

#[derive(Deserialize)]
pub struct LandingForm {
    #[serde(default)]
    landing: String,
}

/// The fragment never reaches the server, so the page posts its own URL back.
pub async fn landing() -> impl IntoResponse {
    pages::callback_landing()
}

/// Reconcile the posted landing URL into a session.
///
/// The mount lives as long as this request; if the client goes away the
/// future is dropped and with it any late result.
pub async fn reconcile(
    Extension(state): Extension<Arc<AppState>>,
    Extension(cookies): Extension<Arc<CookieJar>>,
    Form(form): Form<LandingForm>,
) -> Response {
    let Ok(landing) = Url::parse(&form.landing) else {
        debug!("Unparseable landing URL");
        return pages::callback_failure(&CallbackFailure::default()).into_response();
    };

    let mount = Mount::new();
    let reconciler = CallbackReconciler::new(
        state.identity.clone(),
        Arc::new(RecordingNavigator::new()),
        mount.handle(),
    );

    match reconciler.run(&landing, &cookies).await {
        CallbackState::Redirected(route) => navigate(route),
        CallbackState::Failed(failure) => pages::callback_failure(&failure).into_response(),
        CallbackState::Abandoned => {
            pages::callback_failure(&CallbackFailure::default()).into_response()
        }
    }
}
