//! In-memory backend for coordinator, guard and handler tests. Clients made
//! with [`AuthBackend::detached`] share one provider (allowlist, passwords,
//! themes, counters) but each holds its own session.

use super::{
    backend::{AuthBackend, AuthNotifier, AuthSubscription},
    error::AuthError,
    types::{AllowlistEntry, AuthChange, AuthEvent, Session, User},
};
use secrecy::SecretString;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use uuid::Uuid;

#[derive(Default)]
struct ProviderState {
    allowlist: HashMap<String, bool>,
    themes: HashMap<Uuid, String>,
    passwords: HashMap<String, String>,
    user_fails: bool,
    refresh_fails: bool,
    allowlist_fails: bool,
    sign_ins: usize,
    sign_outs: usize,
    refreshes: usize,
    allowlist_lookups: usize,
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    provider: Arc<Mutex<ProviderState>>,
    session: Mutex<Option<Session>>,
    notifier: AuthNotifier,
}

pub(crate) fn user_for(email: &str) -> User {
    // Stable id per email so profile lookups line up across sessions.
    User {
        id: Uuid::new_v5(&Uuid::NAMESPACE_OID, email.as_bytes()),
        email: Some(email.to_string()),
    }
}

pub(crate) fn session_for(email: &str, expires_at: Option<i64>) -> Session {
    Session {
        access_token: SecretString::from(format!("access-{email}")),
        refresh_token: SecretString::from(format!("refresh-{email}")),
        expires_at,
        user: user_for(email),
    }
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn provider(&self) -> MutexGuard<'_, ProviderState> {
        self.provider.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn allow(&self, email: &str, admin: bool) -> &Self {
        self.provider().allowlist.insert(email.to_string(), admin);
        self
    }

    pub(crate) fn revoke(&self, email: &str) {
        self.provider().allowlist.remove(email);
    }

    pub(crate) fn set_theme(&self, email: &str, theme: &str) {
        let id = user_for(email).id;
        self.provider().themes.insert(id, theme.to_string());
    }

    pub(crate) fn set_password(&self, email: &str, password: &str) -> &Self {
        self.provider()
            .passwords
            .insert(email.to_string(), password.to_string());
        self
    }

    /// Installs a session without notifying subscribers, like a restored login.
    pub(crate) fn with_session(&self, email: &str) -> &Self {
        *self.session() = Some(session_for(email, None));
        self
    }

    pub(crate) fn set_session_expiry(&self, email: &str, expires_at: i64) {
        *self.session() = Some(session_for(email, Some(expires_at)));
    }

    /// Simulates a sign-in happening elsewhere (another tab, a magic link).
    pub(crate) fn external_sign_in(&self, email: &str) {
        let session = session_for(email, None);
        *self.session() = Some(session.clone());
        self.notifier.publish(AuthChange {
            event: AuthEvent::SignedIn,
            session: Some(session),
        });
    }

    pub(crate) fn external_sign_out(&self) {
        *self.session() = None;
        self.notifier.publish(AuthChange {
            event: AuthEvent::SignedOut,
            session: None,
        });
    }

    pub(crate) fn fail_user_lookup(&self, fails: bool) {
        self.provider().user_fails = fails;
    }

    pub(crate) fn fail_refresh(&self, fails: bool) {
        self.provider().refresh_fails = fails;
    }

    pub(crate) fn fail_allowlist(&self, fails: bool) {
        self.provider().allowlist_fails = fails;
    }

    pub(crate) fn has_session(&self) -> bool {
        self.session().is_some()
    }

    pub(crate) fn sign_in_count(&self) -> usize {
        self.provider().sign_ins
    }

    pub(crate) fn sign_out_count(&self) -> usize {
        self.provider().sign_outs
    }

    pub(crate) fn refresh_count(&self) -> usize {
        self.provider().refreshes
    }

    pub(crate) fn allowlist_lookups(&self) -> usize {
        self.provider().allowlist_lookups
    }
}

impl AuthBackend for FakeBackend {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.session().clone())
    }

    async fn get_user(&self) -> Result<Option<User>, AuthError> {
        if self.provider().user_fails {
            return Err(AuthError::Network("user lookup failed".to_string()));
        }
        self.session()
            .as_ref()
            .map(|session| Some(session.user.clone()))
            .ok_or(AuthError::MissingSession)
    }

    async fn refresh_session(&self) -> Result<Session, AuthError> {
        let session = {
            let mut provider = self.provider();
            if provider.refresh_fails {
                return Err(AuthError::Http {
                    status: 400,
                    message: "invalid refresh token".to_string(),
                });
            }
            let mut held = self.session();
            let email = held
                .as_ref()
                .and_then(|session| session.user.email.clone())
                .ok_or(AuthError::MissingSession)?;
            let session = session_for(&email, None);
            *held = Some(session.clone());
            provider.refreshes += 1;
            session
        };

        self.notifier.publish(AuthChange {
            event: AuthEvent::TokenRefreshed,
            session: Some(session.clone()),
        });
        Ok(session)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, AuthError> {
        use secrecy::ExposeSecret;

        let session = {
            let mut provider = self.provider();
            if provider.passwords.get(email).map(String::as_str) != Some(password.expose_secret()) {
                return Err(AuthError::Http {
                    status: 400,
                    message: "invalid login credentials".to_string(),
                });
            }
            provider.sign_ins += 1;
            let session = session_for(email, None);
            *self.session() = Some(session.clone());
            session
        };

        self.notifier.publish(AuthChange {
            event: AuthEvent::SignedIn,
            session: Some(session.clone()),
        });
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.provider().sign_outs += 1;
        *self.session() = None;
        self.notifier.publish(AuthChange {
            event: AuthEvent::SignedOut,
            session: None,
        });
        Ok(())
    }

    fn subscribe(&self) -> AuthSubscription {
        self.notifier.subscribe()
    }

    fn detached(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            session: Mutex::new(None),
            notifier: AuthNotifier::new(),
        }
    }

    async fn find_allowlist_entry(&self, email: &str) -> Result<Option<AllowlistEntry>, AuthError> {
        let mut provider = self.provider();
        provider.allowlist_lookups += 1;
        if provider.allowlist_fails {
            return Err(AuthError::Timeout("allowlist lookup".to_string()));
        }
        Ok(provider.allowlist.get(email).map(|is_admin| AllowlistEntry {
            email: email.to_string(),
            is_admin: *is_admin,
        }))
    }

    async fn find_profile_theme(&self, user_id: Uuid) -> Result<Option<String>, AuthError> {
        Ok(self.provider().themes.get(&user_id).cloned())
    }
}
