//! Routes, navigation and component lifetimes for the page-level flows.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    AuthCallback,
    ResetPassword,
    Projects,
}

impl Route {
    /// Where authenticated visitors land by default.
    pub const DEFAULT_LANDING: Self = Self::Projects;

    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::AuthCallback => "/auth/callback",
            Self::ResetPassword => "/reset-password",
            Self::Projects => "/projects",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Navigator that only remembers where it was sent.
///
/// Server-rendered pages use it to turn a navigation into a redirect.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn last(&self) -> Option<Route> {
        self.visits().last().copied()
    }

    #[must_use]
    pub fn visits(&self) -> Vec<Route> {
        self.visits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        self.visits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(route);
    }
}

/// Lifetime of a mounted component. Dropping it tears the component down.
#[derive(Debug)]
pub struct Mount {
    alive: Arc<AtomicBool>,
}

impl Mount {
    #[must_use]
    pub fn new() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    #[must_use]
    pub fn handle(&self) -> MountHandle {
        MountHandle {
            alive: self.alive.clone(),
        }
    }

    pub fn teardown(&self) {
        self.alive.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

impl Default for Mount {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Mount {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Observer side of a [`Mount`], handed to async work that may outlive it.
#[derive(Clone, Debug)]
pub struct MountHandle {
    alive: Arc<AtomicBool>,
}

impl MountHandle {
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

/// A navigation that fires after a delay unless cancelled first.
///
/// Dropping the value cancels it; so does tearing down the mount it belongs to.
#[derive(Debug)]
pub struct ScheduledNavigation {
    route: Route,
    delay: Duration,
    task: JoinHandle<()>,
}

impl ScheduledNavigation {
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn schedule(
        navigator: Arc<dyn Navigator>,
        route: Route,
        delay: Duration,
        mount: MountHandle,
    ) -> Self {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if mount.is_mounted() {
                navigator.navigate(route);
            } else {
                debug!("Dropping scheduled navigation to {route}: component unmounted");
            }
        });
        Self { route, delay, task }
    }

    #[must_use]
    pub const fn route(&self) -> Route {
        self.route
    }

    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for ScheduledNavigation {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_map_to_paths() {
        assert_eq!(Route::Login.path(), "/login");
        assert_eq!(Route::AuthCallback.path(), "/auth/callback");
        assert_eq!(Route::ResetPassword.path(), "/reset-password");
        assert_eq!(Route::DEFAULT_LANDING.to_string(), "/projects");
    }

    #[test]
    fn dropping_mount_tears_down_handles() {
        let mount = Mount::new();
        let handle = mount.handle();
        assert!(handle.is_mounted());
        drop(mount);
        assert!(!handle.is_mounted());
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_navigation_fires_after_delay() {
        let navigator = Arc::new(RecordingNavigator::new());
        let mount = Mount::new();
        let scheduled = ScheduledNavigation::schedule(
            navigator.clone(),
            Route::Projects,
            Duration::from_millis(1500),
            mount.handle(),
        );

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(navigator.last(), None);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(navigator.last(), Some(Route::Projects));
        assert!(scheduled.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_navigation_never_fires() {
        let navigator = Arc::new(RecordingNavigator::new());
        let mount = Mount::new();
        let scheduled = ScheduledNavigation::schedule(
            navigator.clone(),
            Route::Projects,
            Duration::from_millis(1500),
            mount.handle(),
        );
        scheduled.cancel();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(navigator.visits().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_suppresses_pending_navigation() {
        let navigator = Arc::new(RecordingNavigator::new());
        let mount = Mount::new();
        let _scheduled = ScheduledNavigation::schedule(
            navigator.clone(),
            Route::Projects,
            Duration::from_millis(1500),
            mount.handle(),
        );
        mount.teardown();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(navigator.visits().is_empty());
    }
}
