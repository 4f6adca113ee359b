use super::WeekQuery;
use crate::{
    agenda::AppState,
    auth::AuthBackend,
    dates::{format_week_range, get_week_by_offset, WeekDay},
    guards::{app_guard, RenderContext},
};
use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Local;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct WeekResponse {
    pub offset: i32,
    pub range: String,
    pub days: Vec<WeekDay>,
}

// axum handler for the week as JSON, behind the same guard as the pages
pub async fn week<B: AuthBackend>(
    Extension(state): Extension<Arc<AppState<B>>>,
    headers: HeaderMap,
    Query(query): Query<WeekQuery>,
) -> Response {
    let offset = match query.checked_offset() {
        Ok(offset) => offset,
        Err(status) => return status.into_response(),
    };

    let coordinator = state.sessions.coordinator(&headers).await;
    match app_guard(RenderContext::from_headers(&headers), &coordinator, &state.base).await {
        Err(redirect) => redirect.into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Ok(Some(_)) => {
            let days = get_week_by_offset(offset, Local::now().naive_local(), state.locale);
            let range = format_week_range(&days, state.locale);
            Json(WeekResponse {
                offset,
                range,
                days,
            })
            .into_response()
        }
    }
}
