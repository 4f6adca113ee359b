//! Boundary to the hosted auth/data backend. Session issuance, user records
//! and row storage all live in the external service; this module only holds a
//! configured client, the current session, and a change feed.
//!
//! Token material is wrapped in `SecretString` and must never be logged.

pub mod backend;
pub mod config;
pub mod error;
pub mod refresh;
pub mod supabase;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use backend::{AuthBackend, AuthNotifier, AuthSubscription};
pub use config::AuthConfig;
pub use error::AuthError;
pub use supabase::SupabaseClient;
pub use types::{AllowlistEntry, AuthChange, AuthEvent, Session, User};
