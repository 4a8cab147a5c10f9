//! In-process identity provider.
//!
//! Keeps accounts, sessions and one-time codes in memory and "sends" emails to
//! an outbox that tests can read. Error texts mirror the hosted service.

use super::{
    AuthError, CookieJar, CookieWrite, Identity, IdentityProvider, SignUpOutcome,
    SESSION_COOKIE_MAX_AGE,
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};
use tracing::debug;
use ulid::Ulid;
use url::Url;
use uuid::Uuid;

const ACCESS_TOKEN_COOKIE: &str = "memory-access-token";
const REFRESH_TOKEN_COOKIE: &str = "memory-refresh-token";

/// Email the provider would have delivered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub link: String,
}

#[derive(Debug)]
struct Account {
    id: Uuid,
    password: String,
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<String, Account>,
    access_tokens: HashMap<String, String>,
    refresh_tokens: HashMap<String, String>,
    codes: HashMap<String, String>,
    outbox: Vec<OutboundEmail>,
    calls: Vec<&'static str>,
    unreachable: bool,
}

impl State {
    fn identity(&self, email: &str) -> Option<Identity> {
        self.accounts
            .get(email)
            .map(|account| Identity::new(account.id, email))
    }

    fn issue_tokens(&mut self, email: &str) -> (String, String) {
        let access = Ulid::new().to_string();
        let refresh = Ulid::new().to_string();
        self.access_tokens.insert(access.clone(), email.to_string());
        self.refresh_tokens.insert(refresh.clone(), email.to_string());
        (access, refresh)
    }
}

#[derive(Debug, Default)]
pub struct MemoryIdentityProvider {
    state: Mutex<State>,
}

impl MemoryIdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a confirmed account.
    #[must_use]
    pub fn with_account(self, email: &str, password: &str) -> Self {
        self.lock().accounts.insert(
            email.to_string(),
            Account {
                id: Uuid::new_v4(),
                password: password.to_string(),
            },
        );
        self
    }

    /// Make every call fail as if the service were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    /// Issue a one-time exchange code for `email`, as a confirmation link would carry.
    #[must_use]
    pub fn issue_code(&self, email: &str) -> String {
        let code = Ulid::new().to_string();
        self.lock().codes.insert(code.clone(), email.to_string());
        code
    }

    /// Issue an access/refresh token pair for `email`, as a recovery link would carry.
    #[must_use]
    pub fn issue_tokens(&self, email: &str) -> (String, String) {
        self.lock().issue_tokens(email)
    }

    #[must_use]
    pub fn outbox(&self) -> Vec<OutboundEmail> {
        self.lock().outbox.clone()
    }

    /// Names of the capability calls made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    #[must_use]
    pub fn password_matches(&self, email: &str, password: &str) -> bool {
        self.lock()
            .accounts
            .get(email)
            .is_some_and(|account| account.password == password)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self, call: &'static str) -> Result<MutexGuard<'_, State>, AuthError> {
        let mut state = self.lock();
        state.calls.push(call);
        if state.unreachable {
            return Err(AuthError::Network("identity provider unreachable".to_string()));
        }
        Ok(state)
    }

    fn store(cookies: &CookieJar, access: &str, refresh: &str) {
        cookies.set(CookieWrite::set(
            ACCESS_TOKEN_COOKIE,
            access,
            SESSION_COOKIE_MAX_AGE,
        ));
        cookies.set(CookieWrite::set(
            REFRESH_TOKEN_COOKIE,
            refresh,
            SESSION_COOKIE_MAX_AGE,
        ));
    }

    fn clear(cookies: &CookieJar) {
        cookies.remove(ACCESS_TOKEN_COOKIE);
        cookies.remove(REFRESH_TOKEN_COOKIE);
    }

    fn start_session(state: &mut State, cookies: &CookieJar, email: &str) -> Option<Identity> {
        let identity = state.identity(email)?;
        let (access, refresh) = state.issue_tokens(email);
        Self::store(cookies, &access, &refresh);
        Some(identity)
    }
}

fn link_with_query(redirect_to: &str, key: &str, value: &str) -> String {
    match Url::parse(redirect_to) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair(key, value);
            url.to_string()
        }
        Err(_) => format!("{redirect_to}?{key}={value}"),
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn get_session(&self, cookies: &CookieJar) -> Result<Option<Identity>, AuthError> {
        let mut state = self.enter("get_session")?;

        if let Some(email) = cookies
            .get(ACCESS_TOKEN_COOKIE)
            .and_then(|token| state.access_tokens.get(&token).cloned())
        {
            return Ok(state.identity(&email));
        }

        if let Some(email) = cookies
            .get(REFRESH_TOKEN_COOKIE)
            .and_then(|token| state.refresh_tokens.remove(&token))
        {
            debug!("Rotating memory refresh token");
            return Ok(Self::start_session(&mut state, cookies, &email));
        }

        Self::clear(cookies);
        Ok(None)
    }

    async fn sign_in_with_password(
        &self,
        cookies: &CookieJar,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, AuthError> {
        let mut state = self.enter("sign_in_with_password")?;
        let valid = state
            .accounts
            .get(email)
            .is_some_and(|account| account.password == password.expose_secret());
        if !valid {
            return Err(AuthError::Credential("Invalid login credentials".to_string()));
        }
        Self::start_session(&mut state, cookies, email)
            .ok_or_else(|| AuthError::Credential("Invalid login credentials".to_string()))
    }

    async fn sign_up(
        &self,
        _cookies: &CookieJar,
        email: &str,
        password: &SecretString,
        redirect_to: &str,
    ) -> Result<SignUpOutcome, AuthError> {
        let mut state = self.enter("sign_up")?;
        if state.accounts.contains_key(email) {
            return Err(AuthError::Rejected("User already registered".to_string()));
        }
        state.accounts.insert(
            email.to_string(),
            Account {
                id: Uuid::new_v4(),
                password: password.expose_secret().to_string(),
            },
        );
        let code = Ulid::new().to_string();
        state.codes.insert(code.clone(), email.to_string());
        state.outbox.push(OutboundEmail {
            to: email.to_string(),
            link: link_with_query(redirect_to, "code", &code),
        });
        Ok(SignUpOutcome::ConfirmationSent)
    }

    async fn request_password_reset(
        &self,
        _cookies: &CookieJar,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), AuthError> {
        let mut state = self.enter("request_password_reset")?;
        // Unknown addresses succeed silently so accounts cannot be probed.
        if state.accounts.contains_key(email) {
            let (access, refresh) = state.issue_tokens(email);
            state.outbox.push(OutboundEmail {
                to: email.to_string(),
                link: format!(
                    "{redirect_to}#access_token={access}&refresh_token={refresh}&type=recovery"
                ),
            });
        }
        Ok(())
    }

    async fn update_password(
        &self,
        cookies: &CookieJar,
        new_password: &SecretString,
    ) -> Result<(), AuthError> {
        let mut state = self.enter("update_password")?;
        let email = cookies
            .get(ACCESS_TOKEN_COOKIE)
            .and_then(|token| state.access_tokens.get(&token).cloned())
            .ok_or_else(|| AuthError::Credential("Auth session missing!".to_string()))?;
        let account = state
            .accounts
            .get_mut(&email)
            .ok_or_else(|| AuthError::Credential("User not found".to_string()))?;
        if account.password == new_password.expose_secret() {
            return Err(AuthError::Rejected(
                "New password should be different from the old password.".to_string(),
            ));
        }
        account.password = new_password.expose_secret().to_string();
        Ok(())
    }

    async fn establish_session(
        &self,
        cookies: &CookieJar,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Identity, AuthError> {
        let mut state = self.enter("establish_session")?;
        if let Some(email) = state.access_tokens.get(access_token).cloned() {
            Self::store(cookies, access_token, refresh_token);
            return state
                .identity(&email)
                .ok_or_else(|| AuthError::TokenExchange("User not found".to_string()));
        }
        let email = state.refresh_tokens.remove(refresh_token).ok_or_else(|| {
            AuthError::TokenExchange("Invalid Refresh Token: Refresh Token Not Found".to_string())
        })?;
        Self::start_session(&mut state, cookies, &email)
            .ok_or_else(|| AuthError::TokenExchange("User not found".to_string()))
    }

    async fn exchange_code_for_session(
        &self,
        cookies: &CookieJar,
        code: &str,
    ) -> Result<Identity, AuthError> {
        let mut state = self.enter("exchange_code_for_session")?;
        let email = state.codes.remove(code).ok_or_else(|| {
            AuthError::TokenExchange("invalid flow state, no valid flow state found".to_string())
        })?;
        Self::start_session(&mut state, cookies, &email)
            .ok_or_else(|| AuthError::TokenExchange("User not found".to_string()))
    }

    async fn sign_out(&self, cookies: &CookieJar) -> Result<(), AuthError> {
        let mut state = self.enter("sign_out")?;
        if let Some(token) = cookies.get(ACCESS_TOKEN_COOKIE) {
            state.access_tokens.remove(&token);
        }
        if let Some(token) = cookies.get(REFRESH_TOKEN_COOKIE) {
            state.refresh_tokens.remove(&token);
        }
        Self::clear(cookies);
        Ok(())
    }
}
