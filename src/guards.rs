//! Route guards for the app area. A guard either lets the page load (with the
//! data it needs) or answers with a 307 redirect; redirects are the only
//! failure signal a visitor ever sees.

use crate::{
    auth::AuthBackend,
    session::SessionCoordinator,
    theme::ThemePreference,
};
use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;

pub const REDIRECT_STATUS: StatusCode = StatusCode::TEMPORARY_REDIRECT;

/// Path prefix the whole site is mounted under, without a trailing slash.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BasePath(String);

impl BasePath {
    #[must_use]
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            Self(String::new())
        } else {
            Self(format!("/{trimmed}"))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The prefix as a cookie or log path: `/` for the root mount.
    #[must_use]
    pub fn scope(&self) -> &str {
        if self.0.is_empty() {
            "/"
        } else {
            &self.0
        }
    }

    #[must_use]
    pub fn join(&self, path: &str) -> String {
        format!("{}/{}", self.0, path.trim_start_matches('/'))
    }

    #[must_use]
    pub fn login(&self) -> String {
        self.join("login")
    }

    #[must_use]
    pub fn app(&self) -> String {
        self.join("app")
    }
}

/// Whether a page is rendered for a person or speculatively (prefetch, prerender).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderContext {
    Interactive,
    Prerender,
}

impl RenderContext {
    /// Speculative loads announce themselves with `Sec-Purpose` or the older `Purpose` header.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let speculative = ["sec-purpose", "purpose"].iter().any(|name| {
            headers
                .get(*name)
                .and_then(|value| value.to_str().ok())
                .is_some_and(|value| {
                    let value = value.to_ascii_lowercase();
                    value.contains("prefetch") || value.contains("prerender")
                })
        });

        if speculative {
            Self::Prerender
        } else {
            Self::Interactive
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redirect {
    location: String,
}

impl Redirect {
    #[must_use]
    pub fn to(location: String) -> Self {
        Self { location }
    }

    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        REDIRECT_STATUS
    }
}

impl IntoResponse for Redirect {
    fn into_response(self) -> Response {
        axum::response::Redirect::temporary(&self.location).into_response()
    }
}

/// What an app page gets once the visitor is through the guard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppPageData {
    pub is_admin: bool,
    pub theme: ThemePreference,
    pub email: Option<String>,
}

/// Guard for everything under `/app`. `Ok(None)` means the context is not
/// interactive and nothing was checked.
///
/// # Errors
/// Redirects to the login page without a session or an allowlist entry.
pub async fn app_guard<B: AuthBackend>(
    context: RenderContext,
    coordinator: &SessionCoordinator<B>,
    base: &BasePath,
) -> Result<Option<AppPageData>, Redirect> {
    if context == RenderContext::Prerender {
        return Ok(None);
    }

    if !coordinator.has_active_session().await {
        return Err(Redirect::to(base.login()));
    }

    let authorization = coordinator.enforce_allowlist().await;
    if !authorization.is_allowed() {
        return Err(Redirect::to(base.login()));
    }

    let user = coordinator.get_current_user().await;
    let theme = match &user {
        Some(user) => coordinator.load_theme(user).await,
        None => ThemePreference::Light,
    };

    Ok(Some(AppPageData {
        is_admin: authorization.is_admin(),
        theme,
        email: user.and_then(|user| user.email),
    }))
}

/// Guard for `/app/admin`.
///
/// # Errors
/// Redirects to the app home when the visitor is not an admin.
pub async fn admin_guard<B: AuthBackend>(
    context: RenderContext,
    coordinator: &SessionCoordinator<B>,
    base: &BasePath,
) -> Result<(), Redirect> {
    if context == RenderContext::Prerender {
        return Ok(());
    }

    if coordinator.enforce_allowlist().await.is_admin() {
        Ok(())
    } else {
        Err(Redirect::to(base.app()))
    }
}
