use crate::{
    client::Route,
    guard::guard_redirect,
    identity::Identity,
    projects::{Project, StoreError},
    web::{pages, AppState},
};
use axum::{
    extract::Path,
    http::{Method, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct NewProject {
    #[serde(default)]
    name: String,
}

const fn status_for(err: &StoreError) -> StatusCode {
    match err {
        StoreError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        StoreError::NotFound => StatusCode::NOT_FOUND,
        StoreError::Backend(_) => StatusCode::BAD_GATEWAY,
    }
}

/// Render the list with an error banner, keeping whatever rows can be loaded.
async fn render_error(state: &AppState, identity: &Identity, err: &StoreError) -> Response {
    warn!("Project store error: {err}");
    let projects: Vec<Project> = state.projects.list(identity.id).await.unwrap_or_default();
    (
        status_for(err),
        pages::projects(identity, &projects, Some(&err.to_string())),
    )
        .into_response()
}

fn login(method: &Method) -> Response {
    guard_redirect(method, Route::Login.path())
}

pub async fn list(
    Extension(state): Extension<Arc<AppState>>,
    identity: Option<Extension<Identity>>,
) -> Response {
    let Some(Extension(identity)) = identity else {
        return login(&Method::GET);
    };

    match state.projects.list(identity.id).await {
        Ok(projects) => pages::projects(&identity, &projects, None).into_response(),
        Err(err) => {
            warn!("Failed to list projects: {err}");
            (
                status_for(&err),
                pages::projects(&identity, &[], Some(&err.to_string())),
            )
                .into_response()
        }
    }
}

pub async fn create(
    Extension(state): Extension<Arc<AppState>>,
    identity: Option<Extension<Identity>>,
    Form(form): Form<NewProject>,
) -> Response {
    let Some(Extension(identity)) = identity else {
        return login(&Method::POST);
    };

    match state.projects.insert(identity.id, &form.name).await {
        Ok(_) => Redirect::to(Route::Projects.path()).into_response(),
        Err(err) => render_error(&state, &identity, &err).await,
    }
}

pub async fn delete(
    Extension(state): Extension<Arc<AppState>>,
    identity: Option<Extension<Identity>>,
    Path(id): Path<String>,
) -> Response {
    let Some(Extension(identity)) = identity else {
        return login(&Method::POST);
    };

    match state.projects.delete(identity.id, &id).await {
        Ok(()) => Redirect::to(Route::Projects.path()).into_response(),
        Err(err) => render_error(&state, &identity, &err).await,
    }
}
