//! Session and allowlist coordination.
//!
//! The [`SessionCoordinator`] mirrors the backend session into observable
//! state and derives [`Authorization`] from the `allowed_emails` table. It is
//! an owned value shared through `Arc`; the server keeps one per signed-in
//! visitor (see [`crate::agenda::visitors`]).
//!
//! Every backend failure collapses to "not allowed"; nothing here returns an
//! error to a guard.

use crate::{
    auth::{AuthBackend, AuthChange, AuthError, AuthSubscription, Session, User},
    theme::{normalize_theme_preference, ThemePreference},
};
use secrecy::SecretString;
use serde::Serialize;
use std::sync::Arc;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, instrument, warn};

/// Allowed/admin flags derived from one allowlist lookup. The pair is always
/// replaced as a whole.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Authorization {
    allowed: bool,
    admin: bool,
}

impl Authorization {
    pub const DENIED: Self = Self {
        allowed: false,
        admin: false,
    };

    #[must_use]
    pub const fn granted(admin: bool) -> Self {
        Self {
            allowed: true,
            admin,
        }
    }

    #[must_use]
    pub const fn is_allowed(self) -> bool {
        self.allowed
    }

    /// Admin only counts for allowed users.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        self.allowed && self.admin
    }
}

/// Handle to the auth change listener started by [`SessionCoordinator::init_session`].
/// Dropping it leaves the listener running for the life of the process.
#[derive(Debug)]
pub struct SessionListener {
    task: JoinHandle<()>,
}

impl SessionListener {
    /// Stops reacting to auth changes.
    pub fn unsubscribe(self) {
        self.task.abort();
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

pub struct SessionCoordinator<B> {
    backend: Arc<B>,
    session: watch::Sender<Option<Session>>,
    user: watch::Sender<Option<User>>,
    authorization: watch::Sender<Authorization>,
}

impl<B: AuthBackend> SessionCoordinator<B> {
    #[must_use]
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            session: watch::Sender::new(None),
            user: watch::Sender::new(None),
            authorization: watch::Sender::new(Authorization::DENIED),
        }
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.session.borrow().clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.user.borrow().clone()
    }

    #[must_use]
    pub fn authorization(&self) -> Authorization {
        *self.authorization.borrow()
    }

    #[must_use]
    pub fn watch_authorization(&self) -> watch::Receiver<Authorization> {
        self.authorization.subscribe()
    }

    #[must_use]
    pub fn watch_session(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    /// Loads the current session, checks it against the allowlist, then keeps
    /// the state in sync with every later auth change. Each change is fully
    /// re-checked before the next one is handled.
    #[instrument(skip_all)]
    pub async fn init_session(self: &Arc<Self>) -> SessionListener {
        // Subscribe before reading so a change racing the read is not lost.
        let subscription = self.backend.subscribe();

        let session = match self.backend.get_session().await {
            Ok(session) => session,
            Err(err) => {
                warn!("Failed to load session: {err}");
                None
            }
        };
        let email = session_email(session.as_ref());
        self.apply_session(session);
        self.check_allowlist(email.as_deref()).await;

        let coordinator = Arc::clone(self);
        let task = tokio::spawn(async move { coordinator.listen(subscription).await });

        SessionListener { task }
    }

    async fn listen(&self, mut subscription: AuthSubscription) {
        while let Some(change) = subscription.recv().await {
            self.handle_change(change).await;
        }
        debug!("auth change feed closed");
    }

    async fn handle_change(&self, change: AuthChange) {
        debug!(event = ?change.event, "auth state changed");
        let email = session_email(change.session.as_ref());
        self.apply_session(change.session);
        self.check_allowlist(email.as_deref()).await;
    }

    fn apply_session(&self, session: Option<Session>) {
        self.user
            .send_replace(session.as_ref().map(|session| session.user.clone()));
        self.session.send_replace(session);
    }

    /// Recomputes the authorization from the allowlist without touching the session.
    async fn check_allowlist(&self, email: Option<&str>) -> Authorization {
        let authorization = match email {
            None => Authorization::DENIED,
            Some(email) => match self.backend.find_allowlist_entry(email).await {
                Ok(Some(entry)) => Authorization::granted(entry.is_admin),
                Ok(None) => Authorization::DENIED,
                Err(err) => {
                    warn!("Allowlist lookup failed: {err}");
                    Authorization::DENIED
                }
            },
        };
        self.authorization.send_replace(authorization);
        authorization
    }

    /// Fresh allowlist check for the current user. Unless exactly one entry
    /// comes back (no row, several rows, a failed lookup) the user is signed
    /// out. Without a resolvable email the stored state is left as is.
    #[instrument(skip_all)]
    pub async fn enforce_allowlist(&self) -> Authorization {
        let Some(email) = self
            .get_current_user()
            .await
            .and_then(|user| user.email)
            .filter(|email| !email.is_empty())
        else {
            return Authorization::DENIED;
        };

        let authorization = match self.backend.find_allowlist_entry(&email).await {
            Ok(Some(entry)) => Authorization::granted(entry.is_admin),
            Ok(None) => {
                info!("email is not on the allowlist, signing out");
                self.revoke().await;
                Authorization::DENIED
            }
            Err(err) => {
                warn!("Allowlist lookup failed, signing out: {err}");
                self.revoke().await;
                Authorization::DENIED
            }
        };

        self.authorization.send_replace(authorization);
        authorization
    }

    async fn revoke(&self) {
        if let Err(err) = self.backend.sign_out().await {
            warn!("Failed to sign out: {err}");
        }
        self.apply_session(None);
    }

    /// The current user, refreshing the session once if the direct lookup fails.
    pub async fn get_current_user(&self) -> Option<User> {
        match self.backend.get_user().await {
            Ok(Some(user)) => return Some(user),
            Ok(None) => debug!("no user for the current session, trying refresh"),
            Err(err) => debug!("user lookup failed, trying refresh: {err}"),
        }

        match self.backend.refresh_session().await {
            Ok(session) => Some(session.user),
            Err(err) => {
                debug!("session refresh failed: {err}");
                None
            }
        }
    }

    pub async fn has_active_session(&self) -> bool {
        match self.backend.get_session().await {
            Ok(session) => session.is_some(),
            Err(err) => {
                warn!("Failed to load session: {err}");
                false
            }
        }
    }

    /// # Errors
    /// Returns the backend error when the credentials are rejected or the call fails.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<User, AuthError> {
        let session = self.backend.sign_in_with_password(email, password).await?;
        Ok(session.user)
    }

    /// Signs out and resets local state even if the provider call fails.
    ///
    /// # Errors
    /// Returns the backend error from the revocation call.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let result = self.backend.sign_out().await;
        self.apply_session(None);
        self.authorization.send_replace(Authorization::DENIED);
        result
    }

    /// The user's stored theme, light when missing or unreadable.
    pub async fn load_theme(&self, user: &User) -> ThemePreference {
        match self.backend.find_profile_theme(user.id).await {
            Ok(theme) => normalize_theme_preference(theme.as_deref()),
            Err(err) => {
                warn!("Failed to load theme preference: {err}");
                ThemePreference::Light
            }
        }
    }
}

fn session_email(session: Option<&Session>) -> Option<String> {
    session
        .and_then(|session| session.user.email.clone())
        .filter(|email| !email.is_empty())
}
