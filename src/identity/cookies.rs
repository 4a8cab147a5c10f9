//! Request cookies plus the writes the identity provider asked for.

use axum::http::{
    header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};
use tracing::error;

/// Lifetime of session cookies (400 days, the browser cap).
pub const SESSION_COOKIE_MAX_AGE: i64 = 400 * 24 * 60 * 60;

/// A cookie the provider wants set or removed on the outgoing response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CookieWrite {
    pub name: String,
    pub value: String,
    pub max_age: i64,
}

impl CookieWrite {
    #[must_use]
    pub fn set(name: impl Into<String>, value: impl Into<String>, max_age: i64) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age,
        }
    }

    #[must_use]
    pub fn remove(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: String::new(),
            max_age: 0,
        }
    }

    #[must_use]
    pub const fn is_removal(&self) -> bool {
        self.max_age <= 0
    }

    /// Render as a `Set-Cookie` header value.
    ///
    /// # Errors
    /// Returns an error if the name or value contain bytes not allowed in a header.
    pub fn header_value(&self, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.name,
            self.value,
            self.max_age.max(0)
        );
        if secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}

/// Cookies of one request, shared by every component handling it.
///
/// Reads see pending writes first, so a session established earlier in the
/// same request is visible to later provider calls.
#[derive(Debug, Default)]
pub struct CookieJar {
    incoming: HashMap<String, String>,
    writes: Mutex<Vec<CookieWrite>>,
}

impl CookieJar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect cookies from every `Cookie` header of a request.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut incoming = HashMap::new();
        for header in headers.get_all(COOKIE) {
            let Ok(value) = header.to_str() else {
                continue;
            };
            for pair in value.split(';') {
                let mut parts = pair.trim().splitn(2, '=');
                let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                    continue;
                };
                let key = key.trim();
                if !key.is_empty() {
                    incoming.insert(key.to_string(), val.trim().to_string());
                }
            }
        }
        Self {
            incoming,
            writes: Mutex::default(),
        }
    }

    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            incoming: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
            writes: Mutex::default(),
        }
    }

    /// Current value of a cookie, taking pending writes into account.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        if let Some(write) = self.lock().iter().rev().find(|write| write.name == name) {
            return (!write.is_removal()).then(|| write.value.clone());
        }
        self.incoming
            .get(name)
            .filter(|value| !value.is_empty())
            .cloned()
    }

    pub fn set(&self, write: CookieWrite) {
        self.lock().push(write);
    }

    /// Queue a removal, but only for cookies the browser may actually hold.
    pub fn remove(&self, name: &str) {
        if self.incoming.contains_key(name) || self.lock().iter().any(|write| write.name == name) {
            self.set(CookieWrite::remove(name));
        }
    }

    #[must_use]
    pub fn writes(&self) -> Vec<CookieWrite> {
        self.lock().clone()
    }

    /// Move pending writes onto `headers` as `Set-Cookie` values.
    pub fn apply(&self, headers: &mut HeaderMap, secure: bool) {
        let writes = std::mem::take(&mut *self.lock());
        for write in writes {
            match write.header_value(secure) {
                Ok(value) => {
                    headers.append(SET_COOKIE, value);
                }
                Err(err) => error!("Failed to encode cookie {}: {err}", write.name),
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CookieWrite>> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
