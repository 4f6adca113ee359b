//! Per-visitor sessions keyed by an `HttpOnly` cookie.
//!
//! Each sign-in gets its own detached backend client, coordinator, auth change
//! listener and refresher. Requests without a known cookie resolve to a shared
//! coordinator that never holds a session, so the guards send them to login.

use crate::{
    auth::{refresh::spawn_auto_refresh, AuthBackend, User},
    session::{SessionCoordinator, SessionListener},
};
use anyhow::{Context, Result};
use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use secrecy::SecretString;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{sync::Mutex, task::JoinHandle, time::Instant};
use tracing::{debug, warn};

pub const SESSION_COOKIE_NAME: &str = "agenda_session";
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(604_800);

#[derive(Clone, Debug)]
pub struct CookieSettings {
    /// Path the cookie is scoped to, normally the base path.
    pub path: String,
    pub ttl: Duration,
    pub secure: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            ttl: DEFAULT_SESSION_TTL,
            secure: false,
        }
    }
}

struct Visitor<B> {
    coordinator: Arc<SessionCoordinator<B>>,
    listener: SessionListener,
    refresher: JoinHandle<()>,
    csrf_token: String,
    expires_at: Instant,
}

impl<B> Visitor<B> {
    fn stop(self) {
        self.listener.unsubscribe();
        self.refresher.abort();
    }
}

/// What a request carrying a live session cookie resolves to.
pub struct VisitorHandle<B> {
    pub token: String,
    pub coordinator: Arc<SessionCoordinator<B>>,
    pub csrf_token: String,
}

pub struct VisitorSessions<B> {
    anonymous: Arc<SessionCoordinator<B>>,
    visitors: Mutex<HashMap<String, Visitor<B>>>,
    cookie: CookieSettings,
}

impl<B: AuthBackend> VisitorSessions<B> {
    /// `template` is the provider client new visitors are detached from.
    #[must_use]
    pub fn new(template: &B, cookie: CookieSettings) -> Self {
        Self {
            anonymous: Arc::new(SessionCoordinator::new(Arc::new(template.detached()))),
            visitors: Mutex::new(HashMap::new()),
            cookie,
        }
    }

    #[must_use]
    pub fn cookie_settings(&self) -> &CookieSettings {
        &self.cookie
    }

    /// Coordinator for requests without a session.
    #[must_use]
    pub fn anonymous(&self) -> Arc<SessionCoordinator<B>> {
        Arc::clone(&self.anonymous)
    }

    /// Signs in on a fresh client and registers it under a new token.
    ///
    /// # Errors
    /// Returns an error if the provider rejects the credentials or no token
    /// can be generated.
    pub async fn sign_in(&self, email: &str, password: &SecretString) -> Result<(String, User)> {
        let token = generate_token().context("failed to generate session token")?;
        let csrf_token = generate_token().context("failed to generate csrf token")?;

        let backend = Arc::new(self.anonymous.backend().detached());
        let coordinator = Arc::new(SessionCoordinator::new(Arc::clone(&backend)));
        let user = coordinator.sign_in_with_password(email, password).await?;

        let listener = coordinator.init_session().await;
        let refresher = spawn_auto_refresh(backend);

        let visitor = Visitor {
            coordinator,
            listener,
            refresher,
            csrf_token,
            expires_at: Instant::now() + self.cookie.ttl,
        };

        let mut visitors = self.visitors.lock().await;
        prune(&mut visitors);
        visitors.insert(token.clone(), visitor);
        debug!(visitors = visitors.len(), "visitor session created");

        Ok((token, user))
    }

    /// Looks up the visitor behind the request's session cookie. Expired or
    /// signed-out entries are dropped.
    pub async fn resolve(&self, headers: &HeaderMap) -> Option<VisitorHandle<B>> {
        let token = session_token(headers)?;
        let mut visitors = self.visitors.lock().await;

        let live = visitors.get(&token).is_some_and(|visitor| {
            visitor.expires_at > Instant::now() && visitor.coordinator.session().is_some()
        });
        if !live {
            if let Some(visitor) = visitors.remove(&token) {
                debug!("dropping stale visitor session");
                visitor.stop();
            }
            return None;
        }

        visitors.get(&token).map(|visitor| VisitorHandle {
            token,
            coordinator: Arc::clone(&visitor.coordinator),
            csrf_token: visitor.csrf_token.clone(),
        })
    }

    /// The visitor's coordinator, or the anonymous one.
    pub async fn coordinator(&self, headers: &HeaderMap) -> Arc<SessionCoordinator<B>> {
        match self.resolve(headers).await {
            Some(visitor) => visitor.coordinator,
            None => self.anonymous(),
        }
    }

    /// Revokes one visitor's session. Other visitors are untouched.
    pub async fn sign_out(&self, token: &str) {
        let visitor = self.visitors.lock().await.remove(token);
        if let Some(visitor) = visitor {
            if let Err(err) = visitor.coordinator.sign_out().await {
                warn!("Sign out failed: {err}");
            }
            visitor.stop();
        }
    }

    pub async fn len(&self) -> usize {
        self.visitors.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Stops every listener and refresher, used on shutdown.
    pub async fn clear(&self) {
        let mut visitors = self.visitors.lock().await;
        for (_, visitor) in visitors.drain() {
            visitor.stop();
        }
    }

    /// # Errors
    /// Fails only if the token contains bytes not allowed in a header.
    pub fn session_cookie(&self, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={token}; Path={}; HttpOnly; SameSite=Lax; Max-Age={}",
            self.cookie.path,
            self.cookie.ttl.as_secs()
        );
        if self.cookie.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }

    /// # Errors
    /// Fails only if the configured path is not a valid header value.
    pub fn clear_cookie(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}=; Path={}; HttpOnly; SameSite=Lax; Max-Age=0",
            self.cookie.path
        );
        if self.cookie.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}

fn prune<B: AuthBackend>(visitors: &mut HashMap<String, Visitor<B>>) {
    let now = Instant::now();
    let stale: Vec<String> = visitors
        .iter()
        .filter(|(_, visitor)| visitor.expires_at <= now || visitor.coordinator.session().is_none())
        .map(|(token, _)| token.clone())
        .collect();
    for token in stale {
        if let Some(visitor) = visitors.remove(&token) {
            visitor.stop();
        }
    }
}

fn generate_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(COOKIE)?.to_str().ok()?;
    for pair in value.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME && !val.is_empty() {
            return Some(val.to_string());
        }
    }
    None
}
