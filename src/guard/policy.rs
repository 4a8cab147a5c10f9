//! Route policy: a pure function of (path, session present).

use std::fmt;

pub const AUTH_CALLBACK_PREFIX: &str = "/auth/callback";
pub const LOGIN_PATH: &str = "/login";
pub const PROJECTS_PREFIX: &str = "/projects";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    RedirectTo(String),
}

impl fmt::Display for RouteDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::RedirectTo(path) => write!(f, "redirect:{path}"),
        }
    }
}

/// True when `path` is `prefix` itself or below it (`/projects`, `/projects/x`).
#[must_use]
pub fn under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

#[derive(Clone, Debug)]
pub struct GuardPolicy {
    callback_prefix: String,
    login_path: String,
    protected_prefixes: Vec<String>,
    authenticated_landing: String,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            callback_prefix: AUTH_CALLBACK_PREFIX.to_string(),
            login_path: LOGIN_PATH.to_string(),
            protected_prefixes: vec![PROJECTS_PREFIX.to_string()],
            authenticated_landing: PROJECTS_PREFIX.to_string(),
        }
    }
}

impl GuardPolicy {
    #[must_use]
    pub fn with_protected_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.protected_prefixes.push(prefix.into());
        self
    }

    #[must_use]
    pub fn with_authenticated_landing(mut self, path: impl Into<String>) -> Self {
        self.authenticated_landing = path.into();
        self
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Whether the guard looks at this path at all.
    ///
    /// The perimeter is the callback prefix, every protected prefix, and the
    /// login path exactly. Everything else bypasses the guard.
    #[must_use]
    pub fn in_perimeter(&self, path: &str) -> bool {
        under(path, &self.callback_prefix)
            || path == self.login_path
            || self
                .protected_prefixes
                .iter()
                .any(|prefix| under(path, prefix))
    }

    /// Apply the rules in order; first match wins.
    #[must_use]
    pub fn decide(&self, path: &str, session_present: bool) -> RouteDecision {
        // The callback establishes the session, so it can never require one.
        if under(path, &self.callback_prefix) {
            return RouteDecision::Allow;
        }

        if under(path, &self.login_path) {
            return if session_present {
                RouteDecision::RedirectTo(self.authenticated_landing.clone())
            } else {
                RouteDecision::Allow
            };
        }

        if !session_present
            && self
                .protected_prefixes
                .iter()
                .any(|prefix| under(path, prefix))
        {
            return RouteDecision::RedirectTo(self.login_path.clone());
        }

        RouteDecision::Allow
    }

    /// Perimeter check followed by [`Self::decide`].
    #[must_use]
    pub fn evaluate(&self, path: &str, session_present: bool) -> RouteDecision {
        if self.in_perimeter(path) {
            self.decide(path, session_present)
        } else {
            RouteDecision::Allow
        }
    }
}
