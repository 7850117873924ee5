use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};

use super::{authorize, with_store, ApiError, AppState};
use crate::models::Event;
use crate::moderation;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/pending", get(list_pending))
        .route("/api/pending/{id}/approve", post(approve))
        .route("/api/pending/{id}/reject", post(reject))
}

async fn list_pending(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Event>>, ApiError> {
    authorize(&headers, state.config.cron_secret.as_deref())?;
    let events = with_store(Arc::clone(&state.store), moderation::list_pending).await?;
    Ok(Json(events))
}

async fn approve(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Event>, ApiError> {
    authorize(&headers, state.config.cron_secret.as_deref())?;
    let event = with_store(Arc::clone(&state.store), move |store| {
        moderation::approve(store, &id)
    })
    .await?;
    Ok(Json(event))
}

async fn reject(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Event>, ApiError> {
    authorize(&headers, state.config.cron_secret.as_deref())?;
    let event = with_store(Arc::clone(&state.store), move |store| {
        moderation::reject(store, &id)
    })
    .await?;
    Ok(Json(event))
}
