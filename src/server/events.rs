use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{with_store, ApiError, AppState};
use crate::config;
use crate::models::Event;
use crate::repo;
use crate::schedule::{self, Bucket};

pub const DEFAULT_TOP_EVENTS: usize = 8;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/events", get(list_events))
        .route("/api/events/{id}/click", post(record_click))
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Today,
    Tomorrow,
    #[default]
    Upcoming,
    Future,
    Past,
    /// Most-clicked among upcoming events.
    Top,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub view: View,
    pub limit: Option<usize>,
}

fn select(events: Vec<Event>, query: &EventsQuery) -> Vec<Event> {
    let now = config::local_now();
    let bucket = match query.view {
        View::Today => Bucket::Today,
        View::Tomorrow => Bucket::Tomorrow,
        View::Upcoming => Bucket::Upcoming,
        View::Future => Bucket::Future,
        View::Past => Bucket::Past,
        View::Top => {
            let upcoming = schedule::bucket_events(&events, Bucket::Upcoming, now);
            return schedule::sort_by_clicks_top_n(
                upcoming,
                query.limit.unwrap_or(DEFAULT_TOP_EVENTS),
            );
        }
    };
    let mut selected = schedule::bucket_events(&events, bucket, now);
    if let Some(limit) = query.limit {
        selected.truncate(limit);
    }
    selected
}

/// GET /api/events?view=..&limit=..
async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let events = with_store(Arc::clone(&state.store), |store| {
        repo::list_events(store, repo::EVENTS)
    })
    .await?;
    Ok(Json(select(events, &query)))
}

#[derive(Serialize)]
pub struct ClickResponse {
    pub clicks: u64,
}

/// POST /api/events/{id}/click
async fn record_click(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClickResponse>, ApiError> {
    let lookup = id.clone();
    let clicks = with_store(Arc::clone(&state.store), move |store| {
        repo::record_click(store, &lookup)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("event not found: {id}")))?;
    Ok(Json(ClickResponse { clicks }))
}
