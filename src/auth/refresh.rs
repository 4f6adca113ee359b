//! Background renewal of the provider session shortly before it expires.

use super::{backend::AuthBackend, error::AuthError};
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, error, info, warn};

/// Refresh this long before the access token expires.
pub const REFRESH_AHEAD_SECONDS: i64 = 60;
/// Pause after giving up on a refresh before looking at the session again.
const FAILED_REFRESH_PAUSE: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 3;

/// Time to wait before refreshing a session expiring at `expires_at`.
/// `None` when the session carries no expiry.
#[must_use]
pub fn refresh_delay(expires_at: Option<i64>, now: i64) -> Option<Duration> {
    let expires_at = expires_at?;
    let seconds = expires_at
        .saturating_sub(now)
        .saturating_sub(REFRESH_AHEAD_SECONDS)
        .max(0);
    Some(Duration::from_secs(seconds.unsigned_abs()))
}

/// Keeps the backend session fresh until the backend goes away.
pub fn spawn_auto_refresh<B: AuthBackend>(backend: Arc<B>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut changes = backend.subscribe();

        loop {
            let expires_at = match backend.get_session().await {
                Ok(session) => session.and_then(|session| session.expires_at),
                Err(err) => {
                    debug!("no refreshable session: {err}");
                    None
                }
            };

            let Some(delay) = refresh_delay(expires_at, Utc::now().timestamp()) else {
                // Nothing to refresh until the session changes.
                if changes.recv().await.is_none() {
                    return;
                }
                continue;
            };

            let due = tokio::select! {
                () = sleep(delay) => true,
                change = changes.recv() => {
                    if change.is_none() {
                        return;
                    }
                    false
                }
            };

            if due && !refresh_with_retry(backend.as_ref()).await {
                let open = tokio::select! {
                    () = sleep(FAILED_REFRESH_PAUSE) => true,
                    change = changes.recv() => change.is_some(),
                };
                if !open {
                    return;
                }
            }
        }
    })
}

async fn refresh_with_retry<B: AuthBackend>(backend: &B) -> bool {
    for attempt in 1..=MAX_ATTEMPTS {
        if attempt > 1 {
            let backoff_time = 2u64.pow(attempt - 1);
            warn!("Backing off for {} seconds", backoff_time);
            sleep(Duration::from_secs(backoff_time)).await;
        }

        match backend.refresh_session().await {
            Ok(session) => {
                info!(expires_at = ?session.expires_at, "session refreshed");
                return true;
            }
            Err(err @ (AuthError::MissingSession | AuthError::Http { .. })) => {
                // Retrying will not bring a rejected or missing token back.
                error!("Error refreshing session: {err}");
                return false;
            }
            Err(err) => {
                error!("Error refreshing session: {err}");
            }
        }
    }

    error!("Failed to refresh session after {MAX_ATTEMPTS} attempts");
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::fake::FakeBackend;

    #[test]
    fn delay_leaves_refresh_margin() {
        assert_eq!(
            refresh_delay(Some(1_000), 100),
            Some(Duration::from_secs(840))
        );
    }

    #[test]
    fn delay_is_zero_when_already_due() {
        assert_eq!(refresh_delay(Some(1_000), 990), Some(Duration::ZERO));
        assert_eq!(refresh_delay(Some(1_000), 5_000), Some(Duration::ZERO));
    }

    #[test]
    fn no_delay_without_expiry() {
        assert_eq!(refresh_delay(None, 100), None);
    }

    #[tokio::test]
    async fn refreshes_session_that_is_due() {
        let backend = Arc::new(FakeBackend::new());
        backend.set_session_expiry("due@example.com", Utc::now().timestamp());

        let task = spawn_auto_refresh(backend.clone());

        let refreshed = tokio::time::timeout(Duration::from_secs(2), async {
            while backend.refresh_count() == 0 {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        task.abort();
        assert!(refreshed.is_ok());
    }
}
