//! Identity provider capability.
//!
//! The identity provider owns credentials, token issuance and the session
//! cookies. The rest of the crate only talks to it through
//! [`IdentityProvider`], passing the request's [`CookieJar`] so the provider can
//! read its cookies and queue the writes it wants relayed on the response
//! (token refresh, sign-in, sign-out).
//!
//! Two implementations ship with the crate:
//!
//! - [`SupabaseAuth`]: the hosted GoTrue-compatible auth API.
//! - [`MemoryIdentityProvider`]: an in-process provider for tests and local runs.

mod cookies;
mod memory;
mod pkce;
mod supabase;

pub use cookies::{CookieJar, CookieWrite, SESSION_COOKIE_MAX_AGE};
pub use memory::{MemoryIdentityProvider, OutboundEmail};
pub use supabase::SupabaseAuth;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Authenticated user as seen by the core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub issued_at: DateTime<Utc>,
}

impl Identity {
    #[must_use]
    pub fn new(id: Uuid, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            issued_at: Utc::now(),
        }
    }
}

/// Failures reported by the identity provider.
///
/// The message is the provider's own text and is shown to the user as-is.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Bad email/password combination.
    #[error("{0}")]
    Credential(String),
    /// Expired or invalid exchange code, access token or refresh token.
    #[error("{0}")]
    TokenExchange(String),
    /// The provider could not be reached.
    #[error("{0}")]
    Network(String),
    /// A required field is missing or malformed; raised before any provider call.
    #[error("{0}")]
    Validation(String),
    /// Any other refusal (duplicate account, weak password, rate limit).
    #[error("{0}")]
    Rejected(String),
}

impl AuthError {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Credential(_) => "credential",
            Self::TokenExchange(_) => "token_exchange",
            Self::Network(_) => "network",
            Self::Validation(_) => "validation",
            Self::Rejected(_) => "rejected",
        }
    }
}

/// Result of a sign-up call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The account needs email confirmation before a session exists.
    ConfirmationSent,
    /// The provider auto-confirmed the account and issued a session.
    SignedIn(Identity),
}

/// Capability interface to the external identity provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify the session carried by `cookies`, refreshing it if needed.
    async fn get_session(&self, cookies: &CookieJar) -> Result<Option<Identity>, AuthError>;

    async fn sign_in_with_password(
        &self,
        cookies: &CookieJar,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, AuthError>;

    /// Create an account; confirmation links point at `redirect_to`.
    async fn sign_up(
        &self,
        cookies: &CookieJar,
        email: &str,
        password: &SecretString,
        redirect_to: &str,
    ) -> Result<SignUpOutcome, AuthError>;

    async fn request_password_reset(
        &self,
        cookies: &CookieJar,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), AuthError>;

    /// Change the password of the session already held in `cookies`.
    async fn update_password(
        &self,
        cookies: &CookieJar,
        new_password: &SecretString,
    ) -> Result<(), AuthError>;

    async fn establish_session(
        &self,
        cookies: &CookieJar,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Identity, AuthError>;

    async fn exchange_code_for_session(
        &self,
        cookies: &CookieJar,
        code: &str,
    ) -> Result<Identity, AuthError>;

    /// Drop the session. Signing out without a session is not an error.
    async fn sign_out(&self, cookies: &CookieJar) -> Result<(), AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_displays_provider_text_verbatim() {
        let err = AuthError::Credential("Invalid login credentials".to_string());
        assert_eq!(err.to_string(), "Invalid login credentials");
        assert_eq!(err.kind(), "credential");
    }

    #[test]
    fn identity_new_stamps_issue_time() {
        let before = Utc::now();
        let identity = Identity::new(Uuid::nil(), "u@x.com");
        assert_eq!(identity.email, "u@x.com");
        assert!(identity.issued_at >= before);
    }
}
