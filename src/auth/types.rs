//! Identity types mirrored from the auth provider. Token material is held in
//! `SecretString` so it never shows up in `Debug` output or logs.

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Session {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    /// Unix seconds; `None` when the provider did not report an expiry.
    pub expires_at: Option<i64>,
    pub user: User,
}

impl Session {
    /// True when the access token expires within `margin_seconds` of `now`.
    #[must_use]
    pub fn expires_within(&self, now: i64, margin_seconds: i64) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= now.saturating_add(margin_seconds))
    }
}

/// A row of the `allowed_emails` table.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AllowlistEntry {
    pub email: String,
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_admin: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    TokenRefreshed,
    SignedOut,
}

/// Notification published by the backend whenever its session changes.
#[derive(Clone, Debug)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<bool>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_at: Option<i64>) -> Session {
        Session {
            access_token: SecretString::from("access".to_string()),
            refresh_token: SecretString::from("refresh".to_string()),
            expires_at,
            user: User {
                id: Uuid::nil(),
                email: None,
            },
        }
    }

    #[test]
    fn expiry_margin() {
        assert!(session(Some(1_000)).expires_within(990, 30));
        assert!(!session(Some(1_000)).expires_within(900, 30));
        assert!(!session(None).expires_within(i64::MAX, 30));
    }

    #[test]
    fn allowlist_entry_treats_null_admin_as_false() {
        let entry: AllowlistEntry =
            serde_json::from_str(r#"{"email":"a@example.com","is_admin":null}"#).unwrap();
        assert!(!entry.is_admin);

        let entry: AllowlistEntry = serde_json::from_str(r#"{"email":"a@example.com"}"#).unwrap();
        assert!(!entry.is_admin);

        let entry: AllowlistEntry =
            serde_json::from_str(r#"{"email":"a@example.com","is_admin":true}"#).unwrap();
        assert!(entry.is_admin);
    }

    #[test]
    fn session_debug_redacts_tokens() {
        let rendered = format!("{:?}", session(None));
        assert!(!rendered.contains("access\""));
        assert!(!rendered.contains("refresh\""));
    }
}
