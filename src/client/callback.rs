//! Auth-completion flow for `/auth/callback` landings.
//!
//! The identity provider links back here in one of two shapes:
//!
//! - tokens in the URL fragment (`#access_token=…&refresh_token=…&type=recovery`)
//! - a one-time code in the query (`?code=…`) to exchange for a session
//!
//! Fragment tokens win: providers sometimes leave a stale `code` next to valid
//! tokens. A rejected channel falls through to the next one; when every
//! channel fails the visit ends in a visible failure instead of a redirect.

use super::navigation::{MountHandle, Navigator, Route};
use crate::identity::{AuthError, CookieJar, IdentityProvider};
use secrecy::{ExposeSecret, SecretString};
use std::{fmt, sync::Arc};
use tracing::{debug, info, instrument, warn};
use url::{form_urlencoded, Url};

const RECOVERY_TYPE: &str = "recovery";

/// Tokens delivered in the URL fragment.
#[derive(Clone, Debug)]
pub struct HashTokens {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    /// The fragment's `type` parameter (`recovery`, `signup`, `magiclink`, ...).
    pub kind: Option<String>,
}

impl HashTokens {
    #[must_use]
    pub fn is_recovery(&self) -> bool {
        self.kind.as_deref() == Some(RECOVERY_TYPE)
    }
}

#[derive(Clone, Debug)]
pub enum CallbackEvidence {
    HashTokens(HashTokens),
    ExchangeCode { code: String },
}

impl CallbackEvidence {
    #[must_use]
    pub const fn kind(&self) -> EvidenceKind {
        match self {
            Self::HashTokens(_) => EvidenceKind::HashTokens,
            Self::ExchangeCode { .. } => EvidenceKind::ExchangeCode,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvidenceKind {
    HashTokens,
    ExchangeCode,
}

impl fmt::Display for EvidenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HashTokens => f.write_str("link tokens"),
            Self::ExchangeCode => f.write_str("confirmation code"),
        }
    }
}

/// Everything a landing URL offers.
#[derive(Clone, Debug, Default)]
pub struct LandingEvidence {
    hash_tokens: Option<HashTokens>,
    code: Option<String>,
}

impl LandingEvidence {
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        let hash_tokens = url.fragment().and_then(|fragment| {
            let mut access_token = None;
            let mut refresh_token = None;
            let mut kind = None;
            for (key, value) in form_urlencoded::parse(fragment.as_bytes()) {
                match key.as_ref() {
                    "access_token" => access_token = non_empty(value.into_owned()),
                    "refresh_token" => refresh_token = non_empty(value.into_owned()),
                    "type" => kind = non_empty(value.into_owned()),
                    _ => {}
                }
            }
            Some(HashTokens {
                access_token: SecretString::from(access_token?),
                refresh_token: SecretString::from(refresh_token?),
                kind,
            })
        });

        let code = url
            .query_pairs()
            .find(|(key, _)| key == "code")
            .and_then(|(_, value)| non_empty(value.into_owned()));

        Self { hash_tokens, code }
    }

    /// Evidence to try, in precedence order.
    #[must_use]
    pub fn candidates(&self) -> Vec<CallbackEvidence> {
        let mut candidates = Vec::with_capacity(2);
        if let Some(tokens) = &self.hash_tokens {
            candidates.push(CallbackEvidence::HashTokens(tokens.clone()));
        }
        if let Some(code) = &self.code {
            candidates.push(CallbackEvidence::ExchangeCode { code: code.clone() });
        }
        candidates
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// One rejected channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackAttempt {
    pub evidence: EvidenceKind,
    pub error: AuthError,
}

/// Why a landing could not produce a session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallbackFailure {
    pub attempts: Vec<CallbackAttempt>,
}

impl CallbackFailure {
    /// True when the URL carried neither tokens nor a code.
    #[must_use]
    pub fn no_evidence(&self) -> bool {
        self.attempts.is_empty()
    }
}

impl fmt::Display for CallbackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.no_evidence() {
            return f.write_str("The link did not contain any sign-in information.");
        }
        for (index, attempt) in self.attempts.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", attempt.evidence, attempt.error)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackState {
    Redirected(Route),
    /// Terminal for this visit; shown to the visitor, never redirected.
    Failed(CallbackFailure),
    /// The page went away before the provider answered; nothing was applied.
    Abandoned,
}

pub struct CallbackReconciler {
    provider: Arc<dyn IdentityProvider>,
    navigator: Arc<dyn Navigator>,
    mount: MountHandle,
}

impl CallbackReconciler {
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        navigator: Arc<dyn Navigator>,
        mount: MountHandle,
    ) -> Self {
        Self {
            provider,
            navigator,
            mount,
        }
    }

    /// Reconcile one landing. Consumes the reconciler: it runs once per mount.
    #[instrument(skip_all)]
    pub async fn run(self, landing: &Url, cookies: &CookieJar) -> CallbackState {
        let evidence = LandingEvidence::from_url(landing);
        let mut failure = CallbackFailure::default();

        for candidate in evidence.candidates() {
            let kind = candidate.kind();
            let result = match &candidate {
                CallbackEvidence::HashTokens(tokens) => {
                    let route = if tokens.is_recovery() {
                        Route::ResetPassword
                    } else {
                        Route::DEFAULT_LANDING
                    };
                    self.provider
                        .establish_session(
                            cookies,
                            tokens.access_token.expose_secret(),
                            tokens.refresh_token.expose_secret(),
                        )
                        .await
                        .map(|_| route)
                }
                CallbackEvidence::ExchangeCode { code } => self
                    .provider
                    .exchange_code_for_session(cookies, code)
                    .await
                    .map(|_| Route::DEFAULT_LANDING),
            };

            if !self.mount.is_mounted() {
                debug!("Callback page unmounted, discarding {kind} result");
                return CallbackState::Abandoned;
            }

            match result {
                Ok(route) => {
                    info!("Session established from {kind}, navigating to {route}");
                    self.navigator.navigate(route);
                    return CallbackState::Redirected(route);
                }
                Err(error) => {
                    warn!(error_kind = error.kind(), "Callback {kind} rejected: {error}");
                    failure.attempts.push(CallbackAttempt {
                        evidence: kind,
                        error,
                    });
                }
            }
        }

        if failure.no_evidence() {
            warn!("Callback landing carried no tokens and no code");
        }
        CallbackState::Failed(failure)
    }
}
