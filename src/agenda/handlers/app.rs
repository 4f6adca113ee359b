//! Guarded pages of the app area.

use super::WeekQuery;
use crate::{
    agenda::{page, AppState},
    auth::AuthBackend,
    dates::{format_week_range, get_week_by_offset},
    guards::{admin_guard, app_guard, AppPageData, RenderContext},
};
use axum::{
    extract::{Extension, Query},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use chrono::Local;
use std::sync::Arc;

const APP_TITLE: &str = "Agenda";
const ADMIN_TITLE: &str = "Agenda - Admin";

// axum handler for the weekly agenda
pub async fn home<B: AuthBackend>(
    Extension(state): Extension<Arc<AppState<B>>>,
    headers: HeaderMap,
    Query(query): Query<WeekQuery>,
) -> Response {
    let offset = match query.checked_offset() {
        Ok(offset) => offset,
        Err(status) => return status.into_response(),
    };

    let context = RenderContext::from_headers(&headers);
    let visitor = state.sessions.resolve(&headers).await;
    let coordinator = visitor
        .as_ref()
        .map_or_else(|| state.sessions.anonymous(), |visitor| Arc::clone(&visitor.coordinator));

    match app_guard(context, &coordinator, &state.base).await {
        Err(redirect) => redirect.into_response(),
        Ok(None) => page::document(APP_TITLE, None, "").into_response(),
        Ok(Some(data)) => {
            let csrf = visitor.map(|visitor| visitor.csrf_token).unwrap_or_default();
            let body = home_body(&state, &data, offset, &csrf);
            page::document(APP_TITLE, Some(data.theme), &body).into_response()
        }
    }
}

// axum handler for the admin area; the app guard runs first, as for any page under /app
pub async fn admin<B: AuthBackend>(
    Extension(state): Extension<Arc<AppState<B>>>,
    headers: HeaderMap,
) -> Response {
    let context = RenderContext::from_headers(&headers);
    let coordinator = state.sessions.coordinator(&headers).await;

    let data = match app_guard(context, &coordinator, &state.base).await {
        Ok(data) => data,
        Err(redirect) => return redirect.into_response(),
    };

    if let Err(redirect) = admin_guard(context, &coordinator, &state.base).await {
        return redirect.into_response();
    }

    match data {
        None => page::document(ADMIN_TITLE, None, "").into_response(),
        Some(data) => {
            let body = format!(
                "<main data-page=\"admin\"><h1>Admin</h1><p>{}</p><a href=\"{}\">Back to the agenda</a></main>",
                page::escape_html(data.email.as_deref().unwrap_or("")),
                state.base.app()
            );
            page::document(ADMIN_TITLE, Some(data.theme), &body).into_response()
        }
    }
}

fn home_body<B>(state: &AppState<B>, data: &AppPageData, offset: i32, csrf: &str) -> String {
    let days = get_week_by_offset(offset, Local::now().naive_local(), state.locale);
    let range = format_week_range(&days, state.locale);
    let app = state.base.app();

    let admin_link = if data.is_admin {
        format!("<a href=\"{}\">Admin</a>", state.base.join("app/admin"))
    } else {
        String::new()
    };

    format!(
        "<main data-page=\"app\" data-admin=\"{is_admin}\">\
<header><span class=\"user\">{email}</span>{admin_link}\
<form method=\"post\" action=\"{logout}\"><input type=\"hidden\" name=\"csrf\" value=\"{csrf}\"><button type=\"submit\">Logout</button></form></header>\
<nav><a href=\"{app}?offset={previous}\">&larr;</a> <a href=\"{app}\">Today</a> <a href=\"{app}?offset={next}\">&rarr;</a></nav>\
{week}</main>",
        is_admin = data.is_admin,
        email = page::escape_html(data.email.as_deref().unwrap_or("")),
        logout = state.base.join("logout"),
        csrf = page::escape_html(csrf),
        previous = offset.saturating_sub(1),
        next = offset.saturating_add(1),
        week = page::week_section(&days, &range),
    )
}
