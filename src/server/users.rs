use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::put,
    Json, Router,
};
use serde::Deserialize;

use super::{with_store, ApiError, AppState};
use crate::db::StoreError;
use crate::models::{AttendanceStatus, AttendanceSummary};
use crate::repo;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/users/{uid}/bookmarks/{event_id}",
            put(add_bookmark).delete(remove_bookmark),
        )
        .route("/api/users/{uid}/attendance/{event_id}", put(set_attendance))
}

async fn add_bookmark(
    State(state): State<AppState>,
    Path((uid, event_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let missing = event_id.clone();
    let found = with_store(Arc::clone(&state.store), move |store| {
        if store.get(repo::EVENTS, &event_id)?.is_none() {
            return Ok::<_, StoreError>(false);
        }
        repo::add_bookmark(store, &uid, &event_id)?;
        Ok(true)
    })
    .await?;
    if found {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("event not found: {missing}")))
    }
}

async fn remove_bookmark(
    State(state): State<AppState>,
    Path((uid, event_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let removed = with_store(Arc::clone(&state.store), move |store| {
        repo::remove_bookmark(store, &uid, &event_id)
    })
    .await?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("bookmark not found".to_string()))
    }
}

#[derive(Deserialize)]
pub struct AttendanceRequest {
    pub status: AttendanceStatus,
}

async fn set_attendance(
    State(state): State<AppState>,
    Path((uid, event_id)): Path<(String, String)>,
    Json(request): Json<AttendanceRequest>,
) -> Result<Json<AttendanceSummary>, ApiError> {
    let missing = event_id.clone();
    with_store(Arc::clone(&state.store), move |store| {
        repo::set_attendance(store, &uid, &event_id, request.status)
    })
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("event not found: {missing}")))
}
