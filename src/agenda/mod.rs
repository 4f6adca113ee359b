//! Web front end: the login page, the guarded `/app` area and a small week API.
//!
//! Every protected handler resolves the visitor from the session cookie, then
//! runs the route guards from [`crate::guards`] before rendering; a guard
//! redirect short-circuits the handler.

pub mod handlers;
pub mod page;
pub mod visitors;

use crate::{auth::AuthBackend, guards::BasePath};
use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    response::Redirect,
    routing::{get, post},
    Extension, Router,
};
use chrono::Locale;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use visitors::VisitorSessions;

/// Shared state handed to every handler through an `Extension`.
pub struct AppState<B> {
    pub sessions: VisitorSessions<B>,
    pub base: BasePath,
    pub locale: Locale,
}

impl<B> AppState<B> {
    #[must_use]
    pub fn new(sessions: VisitorSessions<B>, base: BasePath, locale: Locale) -> Self {
        Self {
            sessions,
            base,
            locale,
        }
    }
}

/// Builds the router, mounted under the configured base path.
pub fn router<B: AuthBackend>(state: Arc<AppState<B>>) -> Router {
    let app_home = state.base.app();

    let routes = Router::new()
        .route(
            "/",
            get(move || {
                let target = app_home.clone();
                async move { Redirect::temporary(&target) }
            }),
        )
        .route(
            "/login",
            get(handlers::login::page::<B>).post(handlers::login::submit::<B>),
        )
        .route("/logout", post(handlers::login::logout::<B>))
        .route("/app", get(handlers::app::home::<B>))
        .route("/app/admin", get(handlers::app::admin::<B>))
        .route("/api/week", get(handlers::week::week::<B>))
        .route("/health", get(handlers::health::health));

    let routes = if state.base.as_str().is_empty() {
        routes
    } else {
        Router::new().nest(state.base.as_str(), routes)
    };

    routes.layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(Extension(state)),
    )
}

/// Start the server
/// # Errors
/// Return error if failed to bind or serve
pub async fn serve<B: AuthBackend>(port: u16, state: Arc<AppState<B>>) -> Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

#[cfg(test)]
pub(crate) fn test_state(
    provider: &crate::auth::fake::FakeBackend,
    base: &str,
) -> Arc<AppState<crate::auth::fake::FakeBackend>> {
    let base = BasePath::new(base);
    let cookie = visitors::CookieSettings {
        path: base.scope().to_string(),
        ..visitors::CookieSettings::default()
    };
    Arc::new(AppState::new(
        VisitorSessions::new(provider, cookie),
        base,
        Locale::en_US,
    ))
}

/// Signs `email` in through the visitor store and returns the `Cookie` header
/// value that identifies the visitor.
#[cfg(test)]
pub(crate) async fn test_visitor(
    state: &AppState<crate::auth::fake::FakeBackend>,
    provider: &crate::auth::fake::FakeBackend,
    email: &str,
) -> String {
    provider.set_password(email, "test-password");
    let password = secrecy::SecretString::from("test-password".to_string());
    let (token, _) = state.sessions.sign_in(email, &password).await.unwrap();
    format!("{}={token}", visitors::SESSION_COOKIE_NAME)
}
