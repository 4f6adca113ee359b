//! HTTP client for the hosted backend: GoTrue for sessions under `/auth/v1`
//! and PostgREST for the `allowed_emails` and `profiles` tables under
//! `/rest/v1`. The current session is kept in memory only; every change is
//! published through the notifier.

use super::{
    backend::{AuthBackend, AuthNotifier, AuthSubscription},
    config::AuthConfig,
    error::AuthError,
    types::{AllowlistEntry, AuthChange, AuthEvent, Session, User},
};
use crate::APP_USER_AGENT;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Sessions this close to expiry are refreshed before being handed out.
pub const EXPIRY_MARGIN_SECONDS: i64 = 30;
/// Maximum number of error body characters kept in `AuthError::Http`.
const MAX_ERROR_CHARS: usize = 200;
const ALLOWLIST_TABLE: &str = "allowed_emails";
const PROFILES_TABLE: &str = "profiles";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self, now: i64) -> Session {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|seconds| now.saturating_add(seconds)));
        Session {
            access_token: SecretString::from(self.access_token),
            refresh_token: SecretString::from(self.refresh_token),
            expires_at,
            user: self.user,
        }
    }
}

#[derive(Deserialize)]
struct ProfileRow {
    #[serde(default)]
    theme: Option<String>,
}

#[derive(Debug)]
pub struct SupabaseClient {
    config: AuthConfig,
    http: Client,
    session: RwLock<Option<Session>>,
    notifier: AuthNotifier,
}

impl SupabaseClient {
    /// # Errors
    /// Returns `AuthError::Config` if the HTTP client cannot be built.
    pub fn new(config: AuthConfig) -> Result<Self, AuthError> {
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| AuthError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            config,
            http,
            session: RwLock::new(None),
            notifier: AuthNotifier::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Snapshot of the held session without any refresh attempt.
    pub async fn current_session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    async fn store(&self, event: AuthEvent, session: Option<Session>) {
        *self.session.write().await = session.clone();
        self.notifier.publish(AuthChange { event, session });
    }

    /// Adds the public API key and a bearer token: the user's access token when
    /// signed in, the public key otherwise.
    fn authorize(&self, builder: RequestBuilder, session: Option<&Session>) -> RequestBuilder {
        let anon_key = self.config.anon_key().expose_secret();
        let bearer = session.map_or(anon_key, |session| session.access_token.expose_secret());
        builder.header("apikey", anon_key).bearer_auth(bearer)
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<Session, AuthError> {
        let url = self.config.auth_endpoint("token");
        let request = self
            .http
            .post(url)
            .query(&[("grant_type", grant_type)])
            .header("apikey", self.config.anon_key().expose_secret())
            .json(&body);

        let response = request.send().await?;
        let token: TokenResponse = handle_json_response(response).await?;
        Ok(token.into_session(Utc::now().timestamp()))
    }

    async fn select_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, AuthError> {
        let session = self.session.read().await.clone();
        let request = self
            .http
            .get(self.config.rest_endpoint(table))
            .query(query)
            .header("Accept", "application/json");
        let response = self.authorize(request, session.as_ref()).send().await?;
        handle_json_response(response).await
    }
}

impl AuthBackend for SupabaseClient {
    #[instrument(skip_all)]
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let Some(session) = self.current_session().await else {
            return Ok(None);
        };

        if session.expires_within(Utc::now().timestamp(), EXPIRY_MARGIN_SECONDS) {
            debug!("held session is about to expire, refreshing");
            return self.refresh_session().await.map(Some);
        }

        Ok(Some(session))
    }

    #[instrument(skip_all)]
    async fn get_user(&self) -> Result<Option<User>, AuthError> {
        let Some(session) = self.current_session().await else {
            return Err(AuthError::MissingSession);
        };

        let request = self.http.get(self.config.auth_endpoint("user"));
        let response = self.authorize(request, Some(&session)).send().await?;
        handle_json_response(response).await.map(Some)
    }

    #[instrument(skip_all)]
    async fn refresh_session(&self) -> Result<Session, AuthError> {
        let Some(current) = self.current_session().await else {
            return Err(AuthError::MissingSession);
        };

        let body = json!({ "refresh_token": current.refresh_token.expose_secret() });
        match self.token_grant("refresh_token", body).await {
            Ok(session) => {
                self.store(AuthEvent::TokenRefreshed, Some(session.clone()))
                    .await;
                Ok(session)
            }
            Err(err) => {
                // A rejected refresh token means the session is gone for good.
                if let AuthError::Http { status, .. } = &err {
                    if (400..500).contains(status) {
                        warn!(status, "refresh token rejected, dropping session");
                        self.store(AuthEvent::SignedOut, None).await;
                    }
                }
                Err(err)
            }
        }
    }

    #[instrument(skip_all)]
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, AuthError> {
        let body = json!({ "email": email, "password": password.expose_secret() });
        let session = self.token_grant("password", body).await?;
        self.store(AuthEvent::SignedIn, Some(session.clone())).await;
        Ok(session)
    }

    #[instrument(skip_all)]
    async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(session) = self.current_session().await else {
            return Ok(());
        };

        let request = self.http.post(self.config.auth_endpoint("logout"));
        let result = match self.authorize(request, Some(&session)).send().await {
            Ok(response) => handle_empty_response(response).await,
            Err(err) => Err(err.into()),
        };

        // The local session is dropped even if the provider call failed; an
        // already revoked token is not an error.
        self.store(AuthEvent::SignedOut, None).await;
        match result {
            Err(AuthError::Http { status, .. }) if status == 401 || status == 404 => Ok(()),
            other => other,
        }
    }

    fn subscribe(&self) -> AuthSubscription {
        self.notifier.subscribe()
    }

    /// Shares the connection pool; the session and the subscribers are new.
    fn detached(&self) -> Self {
        Self {
            config: self.config.clone(),
            http: self.http.clone(),
            session: RwLock::new(None),
            notifier: AuthNotifier::new(),
        }
    }

    #[instrument(skip_all)]
    async fn find_allowlist_entry(&self, email: &str) -> Result<Option<AllowlistEntry>, AuthError> {
        let query = [
            ("select", "email,is_admin".to_string()),
            ("email", format!("eq.{email}")),
        ];
        let mut rows: Vec<AllowlistEntry> = self.select_rows(ALLOWLIST_TABLE, &query).await?;
        if rows.len() > 1 {
            return Err(AuthError::MultipleRows(ALLOWLIST_TABLE));
        }
        Ok(rows.pop())
    }

    #[instrument(skip(self))]
    async fn find_profile_theme(&self, user_id: Uuid) -> Result<Option<String>, AuthError> {
        let query = [
            ("select", "theme".to_string()),
            ("id", format!("eq.{user_id}")),
        ];
        let mut rows: Vec<ProfileRow> = self.select_rows(PROFILES_TABLE, &query).await?;
        if rows.len() > 1 {
            return Err(AuthError::MultipleRows(PROFILES_TABLE));
        }
        Ok(rows.pop().and_then(|row| row.theme))
    }
}

/// Parses JSON responses and surfaces HTTP errors with sanitized bodies.
async fn handle_json_response<T: DeserializeOwned>(response: Response) -> Result<T, AuthError> {
    let status = response.status();
    if status.is_success() {
        response
            .json::<T>()
            .await
            .map_err(|err| AuthError::Parse(format!("failed to decode response: {err}")))
    } else {
        Err(http_error(status, response).await)
    }
}

async fn handle_empty_response(response: Response) -> Result<(), AuthError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(http_error(status, response).await)
    }
}

async fn http_error(status: StatusCode, response: Response) -> AuthError {
    let body = response.text().await.unwrap_or_default();
    AuthError::Http {
        status: status.as_u16(),
        message: sanitize_body(&body),
    }
}

fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "request failed".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_body_trims_and_truncates() {
        assert_eq!(sanitize_body("   "), "request failed");
        assert_eq!(sanitize_body("  invalid grant "), "invalid grant");
        assert_eq!(sanitize_body(&"x".repeat(500)).len(), MAX_ERROR_CHARS);
    }

    #[test]
    fn token_response_derives_expiry_from_expires_in() {
        let token: TokenResponse = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "user": { "id": Uuid::nil(), "email": "a@example.com" }
        }))
        .unwrap();

        let session = token.into_session(1_000);
        assert_eq!(session.expires_at, Some(4_600));
        assert_eq!(session.user.email.as_deref(), Some("a@example.com"));
    }

    #[test]
    fn token_response_prefers_reported_expiry() {
        let token: TokenResponse = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "expires_at": 42,
            "user": { "id": Uuid::nil() }
        }))
        .unwrap();

        assert_eq!(token.into_session(1_000).expires_at, Some(42));
    }
}
