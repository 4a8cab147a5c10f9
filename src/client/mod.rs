//! Page-level flows: the callback landing and the auth forms.
//!
//! These run per page mount and talk to the outside world through a
//! [`Navigator`]. The web layer drives them with a [`RecordingNavigator`] and
//! turns the recorded navigation into a redirect.

mod callback;
mod dispatcher;
mod navigation;

pub use callback::{
    CallbackAttempt, CallbackEvidence, CallbackFailure, CallbackReconciler, CallbackState,
    EvidenceKind, HashTokens, LandingEvidence,
};
pub use dispatcher::{
    AuthDispatcher, AuthIntent, DispatchOutcome, StatusKind, StatusMessage,
    DEFAULT_UPDATE_REDIRECT_DELAY,
};
pub use navigation::{Mount, MountHandle, Navigator, RecordingNavigator, Route, ScheduledNavigation};
