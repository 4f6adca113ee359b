//! Route handlers and shared request helpers.

pub mod app;
pub mod health;
pub mod login;
pub mod week;

use axum::http::StatusCode;
use regex::Regex;
use serde::Deserialize;

/// Furthest week (in either direction) the agenda navigates to.
pub const MAX_WEEK_OFFSET: i32 = 5_200;

#[derive(Debug, Default, Deserialize)]
pub struct WeekQuery {
    #[serde(default)]
    pub offset: i32,
}

impl WeekQuery {
    /// # Errors
    /// `400 Bad Request` when the offset is beyond [`MAX_WEEK_OFFSET`].
    pub fn checked_offset(&self) -> Result<i32, StatusCode> {
        if self.offset.unsigned_abs() > MAX_WEEK_OFFSET.unsigned_abs() {
            Err(StatusCode::BAD_REQUEST)
        } else {
            Ok(self.offset)
        }
    }
}

#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("a b@example.com"));
    }

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn week_offset_is_bounded() {
        assert_eq!(WeekQuery { offset: -3 }.checked_offset(), Ok(-3));
        assert_eq!(
            WeekQuery { offset: MAX_WEEK_OFFSET }.checked_offset(),
            Ok(MAX_WEEK_OFFSET)
        );
        assert_eq!(
            WeekQuery { offset: i32::MIN }.checked_offset(),
            Err(StatusCode::BAD_REQUEST)
        );
    }
}
