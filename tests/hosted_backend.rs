//! Hosted clients against a fake auth + data service served by axum.

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use projectdesk::{
    identity::{AuthError, CookieJar, CookieWrite, IdentityProvider, SignUpOutcome, SupabaseAuth},
    projects::{PostgrestProjectStore, ProjectStore, StoreError},
};
use secrecy::SecretString;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::net::TcpListener;
use uuid::Uuid;

const USER_ID: &str = "6f1c7a2e-2d7b-4f5e-9a51-0d3c1b9c2f10";
const ACCESS: &str = "projectdesk-access-token";
const REFRESH: &str = "projectdesk-refresh-token";
const VERIFIER: &str = "projectdesk-code-verifier";

#[derive(Default)]
struct Fake {
    challenge: Option<String>,
    redirect_to: Option<String>,
    logouts: usize,
    rows: Vec<(String, i64, String, String)>,
    next_id: i64,
}

type Shared = Arc<Mutex<Fake>>;

fn user() -> Value {
    json!({ "id": USER_ID, "email": "u@x.com" })
}

fn session() -> Value {
    json!({ "access_token": "good-access", "refresh_token": "next-refresh", "user": user() })
}

fn reject(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

fn has_key(headers: &HeaderMap, key: &str) -> bool {
    headers
        .get("apikey")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == key)
}

async fn get_user(headers: HeaderMap) -> Response {
    if !has_key(&headers, "anon") {
        return reject(
            StatusCode::UNAUTHORIZED,
            json!({ "message": "No API key found in request" }),
        );
    }
    if bearer(&headers) == Some("good-access") {
        Json(user()).into_response()
    } else {
        reject(
            StatusCode::UNAUTHORIZED,
            json!({ "msg": "invalid JWT: token is expired" }),
        )
    }
}

async fn update_user(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if bearer(&headers) != Some("good-access") {
        return reject(StatusCode::UNAUTHORIZED, json!({ "msg": "invalid JWT" }));
    }
    if body["password"] == "p2" {
        return reject(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "msg": "New password should be different from the old password." }),
        );
    }
    Json(user()).into_response()
}

async fn token(
    State(fake): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let granted = match query.get("grant_type").map(String::as_str) {
        Some("password") => body["email"] == "u@x.com" && body["password"] == "p2",
        Some("refresh_token") => body["refresh_token"] == "good-refresh",
        Some("pkce") => {
            let verifier = body["code_verifier"].as_str().unwrap_or_default();
            let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
            let expected = fake.lock().map(|fake| fake.challenge.clone()).ok().flatten();
            body["auth_code"] == "abc123" && expected.as_deref() == Some(challenge.as_str())
        }
        _ => false,
    };

    if granted {
        Json(session()).into_response()
    } else {
        let description = match query.get("grant_type").map(String::as_str) {
            Some("password") => "Invalid login credentials",
            Some("refresh_token") => "Invalid Refresh Token: Refresh Token Not Found",
            _ => "invalid flow state, no valid flow state found",
        };
        reject(
            StatusCode::BAD_REQUEST,
            json!({ "error": "invalid_grant", "error_description": description }),
        )
    }
}

async fn signup(
    State(fake): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    if body["email"] == "u@x.com" {
        return reject(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "code": 422, "msg": "User already registered" }),
        );
    }
    if let Ok(mut fake) = fake.lock() {
        fake.challenge = body["code_challenge"].as_str().map(ToString::to_string);
        fake.redirect_to = query.get("redirect_to").cloned();
    }
    Json(json!({ "id": Uuid::new_v4(), "email": body["email"] })).into_response()
}

async fn logout(State(fake): State<Shared>) -> StatusCode {
    if let Ok(mut fake) = fake.lock() {
        fake.logouts += 1;
    }
    StatusCode::NO_CONTENT
}

fn owner_filter(query: &HashMap<String, String>) -> Option<String> {
    query
        .get("user_id")
        .and_then(|filter| filter.strip_prefix("eq."))
        .map(ToString::to_string)
}

fn row_json(row: &(String, i64, String, String)) -> Value {
    json!({ "id": row.1, "name": row.2, "created_at": row.3 })
}

async fn list_projects(
    State(fake): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !has_key(&headers, "service") || bearer(&headers) != Some("service") {
        return reject(StatusCode::UNAUTHORIZED, json!({ "message": "JWT invalid" }));
    }
    let Some(owner) = owner_filter(&query) else {
        return reject(StatusCode::BAD_REQUEST, json!({ "message": "unfiltered" }));
    };
    let Ok(fake) = fake.lock() else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let mut rows: Vec<Value> = fake
        .rows
        .iter()
        .filter(|row| row.0 == owner)
        .map(row_json)
        .collect();
    if query.get("order").map(String::as_str) == Some("created_at.desc") {
        rows.reverse();
    }
    Json(rows).into_response()
}

async fn insert_project(State(fake): State<Shared>, Json(body): Json<Value>) -> Response {
    let Ok(mut fake) = fake.lock() else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    fake.next_id += 1;
    let row = (
        body["user_id"].as_str().unwrap_or_default().to_string(),
        fake.next_id,
        body["name"].as_str().unwrap_or_default().to_string(),
        format!("2024-05-0{}T10:00:00+00:00", fake.next_id),
    );
    let response = json!([row_json(&row)]);
    fake.rows.push(row);
    (StatusCode::CREATED, Json(response)).into_response()
}

async fn delete_project(
    State(fake): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let (Some(owner), Some(id)) = (
        owner_filter(&query),
        query.get("id").and_then(|id| id.strip_prefix("eq.")),
    ) else {
        return reject(StatusCode::BAD_REQUEST, json!({ "message": "unfiltered" }));
    };
    let Ok(mut fake) = fake.lock() else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let (deleted, kept): (Vec<_>, Vec<_>) = fake
        .rows
        .drain(..)
        .partition(|row| row.0 == owner && row.1.to_string() == id);
    fake.rows = kept;
    Json(
        deleted
            .iter()
            .map(|row| json!({ "id": row.1 }))
            .collect::<Vec<_>>(),
    )
    .into_response()
}

async fn serve() -> Result<(String, Shared)> {
    let fake: Shared = Arc::default();
    let app = Router::new()
        .route("/auth/v1/user", get(get_user).put(update_user))
        .route("/auth/v1/token", post(token))
        .route("/auth/v1/signup", post(signup))
        .route("/auth/v1/logout", post(logout))
        .route(
            "/rest/v1/projects",
            get(list_projects)
                .post(insert_project)
                .delete(delete_project),
        )
        .with_state(fake.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), fake))
}

fn auth(base: &str) -> Result<SupabaseAuth> {
    SupabaseAuth::new(base, SecretString::from("anon"))
}

fn written(cookies: &CookieJar, name: &str) -> Option<CookieWrite> {
    cookies
        .writes()
        .into_iter()
        .rev()
        .find(|write| write.name == name)
}

#[tokio::test]
async fn password_sign_in_sets_session_cookies() -> Result<()> {
    let (base, _) = serve().await?;
    let auth = auth(&base)?;

    let cookies = CookieJar::new();
    let err = auth
        .sign_in_with_password(&cookies, "u@x.com", &SecretString::from("p1"))
        .await
        .err()
        .context("wrong password accepted")?;
    assert_eq!(
        err,
        AuthError::Credential("Invalid login credentials".to_string())
    );
    assert!(cookies.writes().is_empty());

    let identity = auth
        .sign_in_with_password(&cookies, "u@x.com", &SecretString::from("p2"))
        .await?;
    assert_eq!(identity.id.to_string(), USER_ID);
    assert_eq!(identity.email, "u@x.com");
    assert_eq!(cookies.get(ACCESS).as_deref(), Some("good-access"));
    assert_eq!(cookies.get(REFRESH).as_deref(), Some("next-refresh"));
    Ok(())
}

#[tokio::test]
async fn expired_access_token_is_refreshed() -> Result<()> {
    let (base, _) = serve().await?;
    let auth = auth(&base)?;

    let cookies = CookieJar::from_pairs([(ACCESS, "stale"), (REFRESH, "good-refresh")]);
    let identity = auth.get_session(&cookies).await?.context("no session")?;
    assert_eq!(identity.email, "u@x.com");
    assert_eq!(
        written(&cookies, ACCESS).map(|write| write.value),
        Some("good-access".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn rejected_refresh_token_clears_cookies() -> Result<()> {
    let (base, _) = serve().await?;
    let auth = auth(&base)?;

    let cookies = CookieJar::from_pairs([(ACCESS, "stale"), (REFRESH, "revoked")]);
    assert_eq!(auth.get_session(&cookies).await?, None);
    assert!(written(&cookies, ACCESS).is_some_and(|write| write.is_removal()));
    assert!(written(&cookies, REFRESH).is_some_and(|write| write.is_removal()));

    let anonymous = CookieJar::new();
    assert_eq!(auth.get_session(&anonymous).await?, None);
    assert!(anonymous.writes().is_empty());
    Ok(())
}

#[tokio::test]
async fn sign_up_code_is_redeemed_with_stored_verifier() -> Result<()> {
    let (base, fake) = serve().await?;
    let auth = auth(&base)?;
    let redirect_to = "http://localhost:8080/auth/callback";

    let landing = CookieJar::new();
    let outcome = auth
        .sign_up(&landing, "new@x.com", &SecretString::from("secret"), redirect_to)
        .await?;
    assert_eq!(outcome, SignUpOutcome::ConfirmationSent);
    let verifier = written(&landing, VERIFIER).context("verifier not stored")?;
    assert_eq!(
        fake.lock().ok().and_then(|fake| fake.redirect_to.clone()),
        Some(redirect_to.to_string())
    );

    let without_verifier = CookieJar::new();
    assert!(matches!(
        auth.exchange_code_for_session(&without_verifier, "abc123")
            .await,
        Err(AuthError::TokenExchange(_))
    ));

    let cookies = CookieJar::from_pairs([(VERIFIER, verifier.value.as_str())]);
    let wrong = auth.exchange_code_for_session(&cookies, "nope").await;
    assert_eq!(
        wrong.err(),
        Some(AuthError::TokenExchange(
            "invalid flow state, no valid flow state found".to_string()
        ))
    );

    let identity = auth.exchange_code_for_session(&cookies, "abc123").await?;
    assert_eq!(identity.email, "u@x.com");
    assert_eq!(cookies.get(ACCESS).as_deref(), Some("good-access"));
    assert_eq!(cookies.get(VERIFIER), None);
    Ok(())
}

#[tokio::test]
async fn duplicate_sign_up_reports_provider_message() -> Result<()> {
    let (base, _) = serve().await?;
    let auth = auth(&base)?;

    let result = auth
        .sign_up(
            &CookieJar::new(),
            "u@x.com",
            &SecretString::from("secret"),
            "http://localhost:8080/auth/callback",
        )
        .await;
    assert_eq!(
        result.err(),
        Some(AuthError::Rejected("User already registered".to_string()))
    );
    Ok(())
}

#[tokio::test]
async fn recovery_tokens_establish_session_and_update_password() -> Result<()> {
    let (base, _) = serve().await?;
    let auth = auth(&base)?;

    let cookies = CookieJar::new();
    auth.establish_session(&cookies, "good-access", "good-refresh")
        .await?;
    assert_eq!(cookies.get(REFRESH).as_deref(), Some("good-refresh"));

    let same = auth
        .update_password(&cookies, &SecretString::from("p2"))
        .await;
    assert_eq!(
        same.err(),
        Some(AuthError::Rejected(
            "New password should be different from the old password.".to_string()
        ))
    );
    auth.update_password(&cookies, &SecretString::from("n3w"))
        .await?;

    let bad = auth
        .establish_session(&CookieJar::new(), "stale", "revoked")
        .await;
    assert!(matches!(bad, Err(AuthError::TokenExchange(_))));
    Ok(())
}

#[tokio::test]
async fn sign_out_is_idempotent() -> Result<()> {
    let (base, fake) = serve().await?;
    let auth = auth(&base)?;

    let cookies = CookieJar::from_pairs([(ACCESS, "good-access"), (REFRESH, "good-refresh")]);
    auth.sign_out(&cookies).await?;
    assert_eq!(cookies.get(ACCESS), None);
    assert_eq!(cookies.get(REFRESH), None);

    auth.sign_out(&CookieJar::new()).await?;
    assert_eq!(fake.lock().map(|fake| fake.logouts).ok(), Some(1));
    Ok(())
}

#[tokio::test]
async fn unreachable_service_is_a_network_error() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let auth = auth(&format!("http://{addr}"))?;
    let cookies = CookieJar::from_pairs([(ACCESS, "good-access")]);
    assert!(matches!(
        auth.get_session(&cookies).await,
        Err(AuthError::Network(_))
    ));
    Ok(())
}

#[tokio::test]
async fn project_rows_are_scoped_by_owner() -> Result<()> {
    let (base, _) = serve().await?;
    let store = PostgrestProjectStore::new(&base, SecretString::from("service"))?;
    let owner = Uuid::parse_str(USER_ID)?;
    let stranger = Uuid::new_v4();

    let first = store.insert(owner, " alpha ").await?;
    assert_eq!(first.name, "alpha");
    assert_eq!(first.id, "1");
    store.insert(owner, "beta").await?;
    store.insert(stranger, "gamma").await?;

    let names: Vec<String> = store
        .list(owner)
        .await?
        .into_iter()
        .map(|project| project.name)
        .collect();
    assert_eq!(names, vec!["beta", "alpha"]);

    assert_eq!(store.delete(stranger, &first.id).await, Err(StoreError::NotFound));
    store.delete(owner, &first.id).await?;
    assert_eq!(store.list(owner).await?.len(), 1);

    let unauthorized = PostgrestProjectStore::new(&base, SecretString::from("anon"))?;
    assert_eq!(
        unauthorized.list(owner).await,
        Err(StoreError::Backend("JWT invalid".to_string()))
    );
    Ok(())
}
