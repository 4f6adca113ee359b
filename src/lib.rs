//! # Agenda
//!
//! `agenda` serves a weekly agenda behind an email allowlist. Identity is
//! delegated to a hosted auth service (GoTrue + PostgREST wire contract); this
//! crate only coordinates the provider's session with an allowlist lookup and
//! turns the outcome into route guards.
//!
//! ## Access flow
//!
//! 1. **Session:** each visitor signs in on its own provider client, found
//!    again through an `HttpOnly` cookie ([`agenda::visitors`]). The provider
//!    notifies that visitor's [`session::SessionCoordinator`] of every change.
//! 2. **Allowlist:** each change, and every protected page load, re-reads the
//!    `allowed_emails` row for the user's email. Anything but one row revokes
//!    the session.
//! 3. **Guards:** [`guards::app_guard`] and [`guards::admin_guard`] redirect
//!    (HTTP 307) to the login page or the app home when access is not proven.
//!
//! "Cannot prove authorization" is handled exactly like "not authorized".

pub mod agenda;
pub mod auth;
pub mod cli;
pub mod dates;
pub mod guards;
pub mod session;
pub mod theme;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
