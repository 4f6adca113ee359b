//! Password login and logout.

use super::{normalize_email, valid_email};
use crate::{
    agenda::{page, AppState},
    auth::AuthBackend,
};
use axum::{
    extract::{Extension, Form, Query},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutForm {
    #[serde(default)]
    pub csrf: String,
}

// axum handler for the login form
pub async fn page<B: AuthBackend>(
    Extension(state): Extension<Arc<AppState<B>>>,
    Query(query): Query<LoginQuery>,
) -> Response {
    let notice = match query.error.as_deref() {
        Some("credentials") => "<p class=\"error\">Invalid email or password.</p>",
        Some("email") => "<p class=\"error\">Enter a valid email address.</p>",
        Some(_) => "<p class=\"error\">Sign in failed, try again.</p>",
        None => "",
    };

    let body = format!(
        "<main data-page=\"login\"><h1>Sign in</h1>{notice}\
<form method=\"post\" action=\"{action}\">\
<label>Email <input type=\"email\" name=\"email\" autocomplete=\"email\" required></label>\
<label>Password <input type=\"password\" name=\"password\" autocomplete=\"current-password\" required></label>\
<button type=\"submit\">Sign in</button></form></main>",
        action = state.base.login()
    );

    page::document("Agenda - Sign in", None, &body).into_response()
}

// axum handler for the login submission
#[instrument(skip_all)]
pub async fn submit<B: AuthBackend>(
    Extension(state): Extension<Arc<AppState<B>>>,
    Form(form): Form<LoginForm>,
) -> Response {
    let email = normalize_email(&form.email);
    if !valid_email(&email) {
        return Redirect::to(&format!("{}?error=email", state.base.login())).into_response();
    }

    let password = SecretString::from(form.password);
    match state.sessions.sign_in(&email, &password).await {
        Ok((token, user)) => {
            info!(user_id = %user.id, "signed in");
            let mut headers = HeaderMap::new();
            match state.sessions.session_cookie(&token) {
                Ok(cookie) => {
                    headers.insert(SET_COOKIE, cookie);
                }
                Err(err) => {
                    error!("Failed to build session cookie: {err}");
                    state.sessions.sign_out(&token).await;
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            }
            (headers, Redirect::to(&state.base.app())).into_response()
        }
        Err(err) => {
            warn!("Sign in failed: {err}");
            Redirect::to(&format!("{}?error=credentials", state.base.login())).into_response()
        }
    }
}

// axum handler for logout; only the visitor presenting the cookie and its form token is signed out
pub async fn logout<B: AuthBackend>(
    Extension(state): Extension<Arc<AppState<B>>>,
    headers: HeaderMap,
    Form(form): Form<LogoutForm>,
) -> Response {
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = state.sessions.clear_cookie() {
        response_headers.insert(SET_COOKIE, cookie);
    }

    let Some(visitor) = state.sessions.resolve(&headers).await else {
        return (response_headers, Redirect::to(&state.base.login())).into_response();
    };

    if form.csrf != visitor.csrf_token {
        warn!("Logout rejected: csrf token mismatch");
        return StatusCode::FORBIDDEN.into_response();
    }

    state.sessions.sign_out(&visitor.token).await;
    (response_headers, Redirect::to(&state.base.login())).into_response()
}
