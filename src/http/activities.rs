//! Read-only activity endpoints under `/gpx`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::http::response::{error_response, internal_error};
use crate::http::server::AppState;
use crate::store::{parse_timestamp, Activity, StoreError};

/// Query string of `/gpx/date-range`.
#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
}

pub async fn list_activities(State(state): State<AppState>) -> Response {
    list_response(state.store.all())
}

pub async fn latest_activity(State(state): State<AppState>) -> Response {
    match state.store.latest() {
        Ok(Some(activity)) => Json(activity).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "No activities found"),
        Err(e) => store_failure(e),
    }
}

pub async fn activity_by_id(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.store.by_id(&id) {
        Ok(Some(activity)) => Json(activity).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Activity not found"),
        Err(e) => store_failure(e),
    }
}

pub async fn activities_in_range(
    State(state): State<AppState>,
    Query(query): Query<DateRangeQuery>,
) -> Response {
    let (Some(start), Some(end)) = (query.start_date.as_deref(), query.end_date.as_deref()) else {
        return error_response(StatusCode::BAD_REQUEST, "startDate and endDate are required");
    };
    let Some(start) = parse_timestamp(start) else {
        return error_response(StatusCode::BAD_REQUEST, "startDate is not a valid date");
    };
    let Some(end) = parse_timestamp(end) else {
        return error_response(StatusCode::BAD_REQUEST, "endDate is not a valid date");
    };

    list_response(state.store.in_range(start, end))
}

pub async fn activities_by_type(
    State(state): State<AppState>,
    Path(track_type): Path<String>,
) -> Response {
    list_response(state.store.by_type(&track_type))
}

fn list_response(result: Result<Vec<Activity>, StoreError>) -> Response {
    match result {
        Ok(activities) => (StatusCode::OK, Json(activities)).into_response(),
        Err(e) => store_failure(e),
    }
}

fn store_failure(e: StoreError) -> Response {
    tracing::error!(error = %e, "Activity query failed");
    internal_error()
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
