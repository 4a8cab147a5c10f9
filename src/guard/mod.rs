//! Route guard: the perimeter policy evaluated before any guarded handler runs.

mod middleware;
mod policy;

pub use middleware::{guard_redirect, relay_cookies, route_guard, CookieRelay, GuardState};
pub use policy::{
    under, GuardPolicy, RouteDecision, AUTH_CALLBACK_PREFIX, LOGIN_PATH, PROJECTS_PREFIX,
};
