//! Auth actions behind the login and reset-password pages.
//!
//! Each intent is one round trip to the identity provider. A busy flag keeps a
//! second submission out while one is in flight; failures are shown and left
//! for the user to retry.

use super::navigation::{Mount, Navigator, Route, ScheduledNavigation};
use crate::identity::{AuthError, CookieJar, IdentityProvider, SignUpOutcome};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Pause between "password updated" and the move to the project list.
pub const DEFAULT_UPDATE_REDIRECT_DELAY: Duration = Duration::from_millis(1500);

const SIGN_UP_CONFIRMATION: &str =
    "Sign-up succeeded. A confirmation email may be on its way; follow its link to finish.";
const RESET_CONFIRMATION: &str = "Password reset email sent.";
const UPDATE_CONFIRMATION: &str = "Password updated.";

#[derive(Clone, Debug)]
pub enum AuthIntent {
    SignIn {
        email: String,
        password: SecretString,
    },
    SignUp {
        email: String,
        password: SecretString,
    },
    PasswordResetRequest {
        email: String,
    },
    PasswordUpdate {
        new_password: SecretString,
    },
}

impl AuthIntent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SignIn { .. } => "sign_in",
            Self::SignUp { .. } => "sign_up",
            Self::PasswordResetRequest { .. } => "password_reset_request",
            Self::PasswordUpdate { .. } => "password_update",
        }
    }

    fn validate(&self) -> Result<(), AuthError> {
        match self {
            Self::SignIn { email, password } | Self::SignUp { email, password } => {
                validate_email(email)?;
                require(password, "Password is required")
            }
            Self::PasswordResetRequest { email } => validate_email(email),
            Self::PasswordUpdate { new_password } => {
                require(new_password, "New password is required")
            }
        }
    }
}

fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() {
        return Err(AuthError::Validation("Email is required".to_string()));
    }
    if !valid_email(email.trim()) {
        return Err(AuthError::Validation(
            "Enter a valid email address".to_string(),
        ));
    }
    Ok(())
}

fn require(secret: &SecretString, message: &str) -> Result<(), AuthError> {
    if secret.expose_secret().is_empty() {
        Err(AuthError::Validation(message.to_string()))
    } else {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusKind {
    Success,
    Error,
}

/// Message shown under the form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

impl StatusMessage {
    #[must_use]
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Success,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            text: text.into(),
        }
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.kind, StatusKind::Error)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Another action from this dispatcher is still running; nothing was sent.
    Busy,
    Navigated(Route),
    Displayed(StatusMessage),
    /// The page was torn down before the provider answered.
    Abandoned,
}

enum Effect {
    Navigate(Route),
    Confirm(&'static str),
    ConfirmThenNavigate(&'static str, Route),
}

struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct AuthDispatcher {
    provider: Arc<dyn IdentityProvider>,
    navigator: Arc<dyn Navigator>,
    callback_url: Url,
    update_redirect_delay: Duration,
    busy: AtomicBool,
    status: Mutex<Option<StatusMessage>>,
    pending: Mutex<Option<ScheduledNavigation>>,
    mount: Mount,
}

impl AuthDispatcher {
    /// `callback_url` is where emailed links send the visitor back to.
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        navigator: Arc<dyn Navigator>,
        callback_url: Url,
    ) -> Self {
        Self {
            provider,
            navigator,
            callback_url,
            update_redirect_delay: DEFAULT_UPDATE_REDIRECT_DELAY,
            busy: AtomicBool::new(false),
            status: Mutex::new(None),
            pending: Mutex::new(None),
            mount: Mount::new(),
        }
    }

    #[must_use]
    pub fn with_update_redirect_delay(mut self, delay: Duration) -> Self {
        self.update_redirect_delay = delay;
        self
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn status(&self) -> Option<StatusMessage> {
        lock(&self.status).clone()
    }

    /// Route and delay of a navigation waiting to fire, if any.
    #[must_use]
    pub fn pending_navigation(&self) -> Option<(Route, Duration)> {
        lock(&self.pending)
            .as_ref()
            .filter(|scheduled| !scheduled.is_finished())
            .map(|scheduled| (scheduled.route(), scheduled.delay()))
    }

    /// Unmount: results still in flight are dropped and pending navigation is cancelled.
    pub fn teardown(&self) {
        self.mount.teardown();
        lock(&self.pending).take();
    }

    #[instrument(skip_all, fields(intent = intent.name()))]
    pub async fn dispatch(&self, intent: AuthIntent, cookies: &CookieJar) -> DispatchOutcome {
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            debug!("Ignoring submission while another action is running");
            return DispatchOutcome::Busy;
        };
        *lock(&self.status) = None;

        if let Err(err) = intent.validate() {
            return self.display(StatusMessage::error(err.to_string()));
        }

        let result = self.call_provider(intent, cookies).await;

        if !self.mount.is_mounted() {
            debug!("Page unmounted, discarding action result");
            return DispatchOutcome::Abandoned;
        }

        match result {
            Ok(Effect::Navigate(route)) => {
                self.navigator.navigate(route);
                DispatchOutcome::Navigated(route)
            }
            Ok(Effect::Confirm(text)) => self.display(StatusMessage::success(text)),
            Ok(Effect::ConfirmThenNavigate(text, route)) => {
                let scheduled = ScheduledNavigation::schedule(
                    self.navigator.clone(),
                    route,
                    self.update_redirect_delay,
                    self.mount.handle(),
                );
                *lock(&self.pending) = Some(scheduled);
                self.display(StatusMessage::success(text))
            }
            Err(err) => {
                info!(error_kind = err.kind(), "Auth action failed: {err}");
                self.display(StatusMessage::error(err.to_string()))
            }
        }
    }

    /// Sign out and return to the login page. The visitor leaves even if the
    /// provider call fails; their cookies are cleared either way.
    #[instrument(skip_all)]
    pub async fn sign_out(&self, cookies: &CookieJar) -> DispatchOutcome {
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            return DispatchOutcome::Busy;
        };

        if let Err(err) = self.provider.sign_out(cookies).await {
            warn!("Sign-out failed: {err}");
        }
        if !self.mount.is_mounted() {
            return DispatchOutcome::Abandoned;
        }

        self.navigator.navigate(Route::Login);
        DispatchOutcome::Navigated(Route::Login)
    }

    async fn call_provider(
        &self,
        intent: AuthIntent,
        cookies: &CookieJar,
    ) -> Result<Effect, AuthError> {
        let redirect_to = self.callback_url.as_str();
        match intent {
            AuthIntent::SignIn { email, password } => {
                self.provider
                    .sign_in_with_password(cookies, email.trim(), &password)
                    .await?;
                Ok(Effect::Navigate(Route::DEFAULT_LANDING))
            }
            AuthIntent::SignUp { email, password } => {
                let outcome = self
                    .provider
                    .sign_up(cookies, email.trim(), &password, redirect_to)
                    .await?;
                if matches!(outcome, SignUpOutcome::SignedIn(_)) {
                    debug!("Account was auto-confirmed");
                }
                Ok(Effect::Confirm(SIGN_UP_CONFIRMATION))
            }
            AuthIntent::PasswordResetRequest { email } => {
                self.provider
                    .request_password_reset(cookies, email.trim(), redirect_to)
                    .await?;
                Ok(Effect::Confirm(RESET_CONFIRMATION))
            }
            AuthIntent::PasswordUpdate { new_password } => {
                self.provider.update_password(cookies, &new_password).await?;
                Ok(Effect::ConfirmThenNavigate(
                    UPDATE_CONFIRMATION,
                    Route::DEFAULT_LANDING,
                ))
            }
        }
    }

    fn display(&self, message: StatusMessage) -> DispatchOutcome {
        *lock(&self.status) = Some(message.clone());
        DispatchOutcome::Displayed(message)
    }
}

impl Drop for AuthDispatcher {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
