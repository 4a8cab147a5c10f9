//! # Projectdesk
//!
//! `projectdesk` is a small authenticated project list that sits in front of a
//! hosted auth + database service. The interesting part is the session gate:
//!
//! - **Route Guard:** a perimeter middleware that resolves the visitor's
//!   session on every guarded request and decides between letting the request
//!   through and redirecting it (`/login` ⇄ `/projects`). The auth-completion
//!   route is never blocked.
//! - **Callback Reconciler:** runs once when a visitor lands on
//!   `/auth/callback` and turns either hash-fragment tokens or a `?code=`
//!   exchange code into a session, hash tokens first.
//! - **Auth Action Dispatcher:** sign in, sign up, password reset and password
//!   update, each a single round trip to the identity provider guarded by a
//!   busy flag.
//!
//! The identity provider and the project store are capabilities
//! ([`identity::IdentityProvider`], [`projects::ProjectStore`]) assembled once
//! at startup and passed down explicitly.

pub mod cli;
pub mod client;
pub mod guard;
pub mod identity;
pub mod projects;
pub mod session;
pub mod web;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
