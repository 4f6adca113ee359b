//! Connection settings for the hosted auth/data backend. Both values are
//! required; a missing or malformed value is a startup error.

use super::error::AuthError;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use url::Url;

/// Default request timeout applied to every backend call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct AuthConfig {
    base_url: String,
    anon_key: SecretString,
    request_timeout: Duration,
}

impl AuthConfig {
    /// Validates the backend URL and public API key.
    ///
    /// # Errors
    /// Returns `AuthError::Config` if either value is empty or the URL is not http(s).
    pub fn new(base_url: &str, anon_key: SecretString) -> Result<Self, AuthError> {
        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            return Err(AuthError::Config("auth URL is not configured".to_string()));
        }

        let parsed = Url::parse(trimmed)
            .map_err(|err| AuthError::Config(format!("invalid auth URL {trimmed}: {err}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AuthError::Config(format!(
                "auth URL must use http or https: {trimmed}"
            )));
        }

        if anon_key.expose_secret().trim().is_empty() {
            return Err(AuthError::Config("auth API key is not configured".to_string()));
        }

        Ok(Self {
            base_url: trimmed.trim_end_matches('/').to_string(),
            anon_key,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn anon_key(&self) -> &SecretString {
        &self.anon_key
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// `{base}/auth/v1/{path}`
    #[must_use]
    pub fn auth_endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `{base}/rest/v1/{table}`
    #[must_use]
    pub fn rest_endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.trim_start_matches('/'))
    }
}
