//! Session resolution for incoming requests.
//!
//! Flow Overview: hand the request's cookies to the identity provider, which
//! verifies (and possibly refreshes) the session. Any cookie writes it asks for
//! stay queued in the jar so the caller can relay them on the response. Nothing
//! is cached; every request is verified again.

use crate::identity::{CookieJar, Identity, IdentityProvider};
use std::sync::Arc;
use tracing::{instrument, warn};

#[derive(Clone)]
pub struct SessionResolver {
    provider: Arc<dyn IdentityProvider>,
}

impl SessionResolver {
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Resolve the session carried by `cookies`.
    ///
    /// Provider failures are treated as "no session".
    #[instrument(skip_all)]
    pub async fn resolve(&self, cookies: &CookieJar) -> Option<Identity> {
        match self.provider.get_session(cookies).await {
            Ok(identity) => identity,
            Err(err) => {
                warn!(kind = err.kind(), "Session resolution failed: {err}");
                None
            }
        }
    }
}
