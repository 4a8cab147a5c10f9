//! Hosted identity provider speaking the GoTrue (`/auth/v1`) REST API.
//!
//! Sessions live in two `HttpOnly` cookies (access and refresh token). Email
//! links use PKCE: the verifier is parked in a third cookie until the visitor
//! comes back with `?code=`.

use super::{
    pkce, AuthError, CookieJar, CookieWrite, Identity, IdentityProvider, SignUpOutcome,
    SESSION_COOKIE_MAX_AGE,
};
use crate::APP_USER_AGENT;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

const ACCESS_TOKEN_COOKIE: &str = "projectdesk-access-token";
const REFRESH_TOKEN_COOKIE: &str = "projectdesk-refresh-token";
const CODE_VERIFIER_COOKIE: &str = "projectdesk-code-verifier";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

impl UserPayload {
    fn into_identity(self) -> Identity {
        Identity::new(self.id, self.email.unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
struct SessionPayload {
    access_token: String,
    refresh_token: String,
    user: UserPayload,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorPayload {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl ErrorPayload {
    fn into_message(self, status: StatusCode) -> String {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
            .unwrap_or_else(|| status.to_string())
    }
}

/// GoTrue-compatible identity provider.
#[derive(Clone, Debug)]
pub struct SupabaseAuth {
    client: Client,
    base_url: Url,
    anon_key: SecretString,
}

impl SupabaseAuth {
    /// Build a client for the service at `base_url` (without `/auth/v1`).
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str, anon_key: SecretString) -> Result<Self> {
        let mut base_url =
            Url::parse(base_url).with_context(|| format!("Invalid auth URL: {base_url}"))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build auth HTTP client")?;

        Ok(Self {
            client,
            base_url,
            anon_key,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.base_url
            .join(path)
            .map_err(|err| AuthError::Network(format!("invalid auth endpoint {path}: {err}")))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", self.anon_key.expose_secret())
    }

    async fn send(builder: RequestBuilder) -> Result<Response, AuthError> {
        builder
            .send()
            .await
            .map_err(|err| AuthError::Network(err.to_string()))
    }

    async fn error_message(response: Response) -> String {
        let status = response.status();
        response
            .json::<ErrorPayload>()
            .await
            .unwrap_or_default()
            .into_message(status)
    }

    /// `Ok(None)` when the access token is no longer accepted.
    async fn fetch_user(&self, access_token: &str) -> Result<Option<UserPayload>, AuthError> {
        let url = self.endpoint("auth/v1/user")?;
        let response = Self::send(self.request(Method::GET, url).bearer_auth(access_token)).await?;

        match response.status() {
            status if status.is_success() => response
                .json::<UserPayload>()
                .await
                .map(Some)
                .map_err(|err| AuthError::Network(format!("invalid user payload: {err}"))),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            _ => Err(AuthError::Rejected(Self::error_message(response).await)),
        }
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: Value,
        on_reject: fn(String) -> AuthError,
    ) -> Result<SessionPayload, AuthError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let response = Self::send(self.request(Method::POST, url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(on_reject(Self::error_message(response).await));
        }

        response
            .json::<SessionPayload>()
            .await
            .map_err(|err| AuthError::Network(format!("invalid session payload: {err}")))
    }

    fn store_session(cookies: &CookieJar, session: &SessionPayload) {
        cookies.set(CookieWrite::set(
            ACCESS_TOKEN_COOKIE,
            session.access_token.as_str(),
            SESSION_COOKIE_MAX_AGE,
        ));
        cookies.set(CookieWrite::set(
            REFRESH_TOKEN_COOKIE,
            session.refresh_token.as_str(),
            SESSION_COOKIE_MAX_AGE,
        ));
    }

    fn clear_session(cookies: &CookieJar) {
        cookies.remove(ACCESS_TOKEN_COOKIE);
        cookies.remove(REFRESH_TOKEN_COOKIE);
    }

    fn redirect_url(&self, path: &str, redirect_to: &str) -> Result<Url, AuthError> {
        let mut url = self.endpoint(path)?;
        url.query_pairs_mut().append_pair("redirect_to", redirect_to);
        Ok(url)
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuth {
    #[instrument(skip_all)]
    async fn get_session(&self, cookies: &CookieJar) -> Result<Option<Identity>, AuthError> {
        let access_token = cookies.get(ACCESS_TOKEN_COOKIE);
        let refresh_token = cookies.get(REFRESH_TOKEN_COOKIE);

        if let Some(access_token) = access_token {
            if let Some(user) = self.fetch_user(&access_token).await? {
                return Ok(Some(user.into_identity()));
            }
        }

        let Some(refresh_token) = refresh_token else {
            Self::clear_session(cookies);
            return Ok(None);
        };

        match self
            .token_grant(
                "refresh_token",
                json!({ "refresh_token": refresh_token }),
                AuthError::TokenExchange,
            )
            .await
        {
            Ok(session) => {
                debug!("Refreshed session tokens");
                Self::store_session(cookies, &session);
                Ok(Some(session.user.into_identity()))
            }
            Err(err @ AuthError::Network(_)) => Err(err),
            Err(err) => {
                debug!("Refresh token rejected: {err}");
                Self::clear_session(cookies);
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, cookies, password))]
    async fn sign_in_with_password(
        &self,
        cookies: &CookieJar,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, AuthError> {
        let session = self
            .token_grant(
                "password",
                json!({ "email": email, "password": password.expose_secret() }),
                AuthError::Credential,
            )
            .await?;
        Self::store_session(cookies, &session);
        Ok(session.user.into_identity())
    }

    #[instrument(skip(self, cookies, password))]
    async fn sign_up(
        &self,
        cookies: &CookieJar,
        email: &str,
        password: &SecretString,
        redirect_to: &str,
    ) -> Result<SignUpOutcome, AuthError> {
        let pkce = pkce::generate();
        let url = self.redirect_url("auth/v1/signup", redirect_to)?;
        let body = json!({
            "email": email,
            "password": password.expose_secret(),
            "code_challenge": pkce.challenge,
            "code_challenge_method": pkce::CHALLENGE_METHOD,
        });

        let response = Self::send(self.request(Method::POST, url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(AuthError::Rejected(Self::error_message(response).await));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|err| AuthError::Network(format!("invalid sign-up payload: {err}")))?;

        // Auto-confirmed projects answer with a full session instead of a user.
        if payload.get("access_token").is_some() {
            let session: SessionPayload = serde_json::from_value(payload)
                .map_err(|err| AuthError::Network(format!("invalid session payload: {err}")))?;
            Self::store_session(cookies, &session);
            return Ok(SignUpOutcome::SignedIn(session.user.into_identity()));
        }

        cookies.set(CookieWrite::set(
            CODE_VERIFIER_COOKIE,
            pkce.verifier,
            SESSION_COOKIE_MAX_AGE,
        ));
        Ok(SignUpOutcome::ConfirmationSent)
    }

    #[instrument(skip(self, cookies))]
    async fn request_password_reset(
        &self,
        cookies: &CookieJar,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), AuthError> {
        let pkce = pkce::generate();
        let url = self.redirect_url("auth/v1/recover", redirect_to)?;
        let body = json!({
            "email": email,
            "code_challenge": pkce.challenge,
            "code_challenge_method": pkce::CHALLENGE_METHOD,
        });

        let response = Self::send(self.request(Method::POST, url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(AuthError::Rejected(Self::error_message(response).await));
        }

        cookies.set(CookieWrite::set(
            CODE_VERIFIER_COOKIE,
            pkce.verifier,
            SESSION_COOKIE_MAX_AGE,
        ));
        Ok(())
    }

    #[instrument(skip_all)]
    async fn update_password(
        &self,
        cookies: &CookieJar,
        new_password: &SecretString,
    ) -> Result<(), AuthError> {
        // Resolve first so an expired access token gets refreshed.
        if self.get_session(cookies).await?.is_none() {
            return Err(AuthError::Credential("Auth session missing!".to_string()));
        }
        let access_token = cookies
            .get(ACCESS_TOKEN_COOKIE)
            .ok_or_else(|| AuthError::Credential("Auth session missing!".to_string()))?;

        let url = self.endpoint("auth/v1/user")?;
        let body = json!({ "password": new_password.expose_secret() });
        let response = Self::send(
            self.request(Method::PUT, url)
                .bearer_auth(access_token)
                .json(&body),
        )
        .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AuthError::Rejected(Self::error_message(response).await))
        }
    }

    #[instrument(skip_all)]
    async fn establish_session(
        &self,
        cookies: &CookieJar,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Identity, AuthError> {
        if let Some(user) = self.fetch_user(access_token).await? {
            cookies.set(CookieWrite::set(
                ACCESS_TOKEN_COOKIE,
                access_token,
                SESSION_COOKIE_MAX_AGE,
            ));
            cookies.set(CookieWrite::set(
                REFRESH_TOKEN_COOKIE,
                refresh_token,
                SESSION_COOKIE_MAX_AGE,
            ));
            return Ok(user.into_identity());
        }

        // Expired access token: the refresh token may still be good.
        let session = self
            .token_grant(
                "refresh_token",
                json!({ "refresh_token": refresh_token }),
                AuthError::TokenExchange,
            )
            .await?;
        Self::store_session(cookies, &session);
        Ok(session.user.into_identity())
    }

    #[instrument(skip_all)]
    async fn exchange_code_for_session(
        &self,
        cookies: &CookieJar,
        code: &str,
    ) -> Result<Identity, AuthError> {
        let verifier = cookies.get(CODE_VERIFIER_COOKIE).ok_or_else(|| {
            AuthError::TokenExchange(
                "PKCE code verifier not found in storage. The link must be opened in the same browser that requested it."
                    .to_string(),
            )
        })?;

        let session = self
            .token_grant(
                "pkce",
                json!({ "auth_code": code, "code_verifier": verifier }),
                AuthError::TokenExchange,
            )
            .await?;
        Self::store_session(cookies, &session);
        cookies.remove(CODE_VERIFIER_COOKIE);
        Ok(session.user.into_identity())
    }

    #[instrument(skip_all)]
    async fn sign_out(&self, cookies: &CookieJar) -> Result<(), AuthError> {
        if let Some(access_token) = cookies.get(ACCESS_TOKEN_COOKIE) {
            let url = self.endpoint("auth/v1/logout")?;
            match Self::send(self.request(Method::POST, url).bearer_auth(access_token)).await {
                Ok(response) if !response.status().is_success() => {
                    debug!("Logout returned {}", response.status());
                }
                Ok(_) => {}
                Err(err) => debug!("Logout request failed: {err}"),
            }
        }

        Self::clear_session(cookies);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes_base_path() {
        let auth = SupabaseAuth::new("https://abc.supabase.co/base", SecretString::from("anon"));
        let endpoint = auth.ok().and_then(|auth| auth.endpoint("auth/v1/user").ok());
        assert_eq!(
            endpoint.map(|url| url.to_string()),
            Some("https://abc.supabase.co/base/auth/v1/user".to_string())
        );
    }

    #[test]
    fn new_rejects_invalid_url() {
        assert!(SupabaseAuth::new("not a url", SecretString::from("anon")).is_err());
    }

    #[test]
    fn error_payload_prefers_description() {
        let payload = ErrorPayload {
            error_description: Some("Invalid login credentials".to_string()),
            msg: Some("other".to_string()),
            message: None,
            error: Some("invalid_grant".to_string()),
        };
        assert_eq!(
            payload.into_message(StatusCode::BAD_REQUEST),
            "Invalid login credentials"
        );
    }

    #[test]
    fn error_payload_falls_back_to_status() {
        assert_eq!(
            ErrorPayload::default().into_message(StatusCode::BAD_GATEWAY),
            "502 Bad Gateway"
        );
    }
}
