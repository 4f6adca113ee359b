//! The seam between the session coordinator and the hosted auth/data service.
//! `SupabaseClient` is the production implementation; tests plug in an
//! in-memory backend.

use super::{
    error::AuthError,
    types::{AllowlistEntry, AuthChange, Session, User},
};
use secrecy::SecretString;
use std::future::Future;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;
use uuid::Uuid;

/// Buffered auth changes per subscriber before the oldest are dropped.
const NOTIFY_CAPACITY: usize = 16;

pub trait AuthBackend: Send + Sync + 'static {
    /// The locally held session, refreshed first if it is about to expire.
    fn get_session(&self) -> impl Future<Output = Result<Option<Session>, AuthError>> + Send;

    /// The user the provider currently associates with the access token.
    fn get_user(&self) -> impl Future<Output = Result<Option<User>, AuthError>> + Send;

    /// Exchanges the refresh token for a new session.
    fn refresh_session(&self) -> impl Future<Output = Result<Session, AuthError>> + Send;

    fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> impl Future<Output = Result<Session, AuthError>> + Send;

    /// Revokes the session with the provider and forgets it locally.
    fn sign_out(&self) -> impl Future<Output = Result<(), AuthError>> + Send;

    fn subscribe(&self) -> AuthSubscription;

    /// A client for the same provider that holds no session and has its own
    /// subscribers. Each signed-in visitor gets one.
    #[must_use]
    fn detached(&self) -> Self
    where
        Self: Sized;

    /// Exact-match lookup in `allowed_emails`; `Ok(None)` when there is no row.
    fn find_allowlist_entry(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<AllowlistEntry>, AuthError>> + Send;

    /// The raw `theme` column of the user's profile, if any.
    fn find_profile_theme(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Option<String>, AuthError>> + Send;
}

/// Fan-out of auth changes to any number of subscribers.
#[derive(Clone, Debug)]
pub struct AuthNotifier {
    sender: broadcast::Sender<AuthChange>,
}

impl AuthNotifier {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self { sender }
    }

    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, change: AuthChange) {
        let _ = self.sender.send(change);
    }

    #[must_use]
    pub fn subscribe(&self) -> AuthSubscription {
        AuthSubscription {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for AuthNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of an auth change subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct AuthSubscription {
    receiver: broadcast::Receiver<AuthChange>,
}

impl AuthSubscription {
    /// Next change, or `None` once the backend is gone. Lagged receivers skip
    /// ahead to the newest buffered change.
    pub async fn recv(&mut self) -> Option<AuthChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "auth change subscriber lagged behind");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
