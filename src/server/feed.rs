use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tracing::info;

use super::{with_store, ApiError, AppState};
use crate::calendar::{self, FeedOutcome};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/calendar", get(calendar_feed))
}

#[derive(Deserialize)]
pub struct FeedQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// GET /api/calendar?userId=.. - bookmarked events as an .ics download
async fn calendar_feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Response, ApiError> {
    let uid = query
        .user_id
        .map(|uid| uid.trim().to_string())
        .filter(|uid| !uid.is_empty())
        .ok_or_else(|| ApiError::BadRequest("userId is required".to_string()))?;

    let lookup = uid.clone();
    let outcome = with_store(Arc::clone(&state.store), move |store| {
        calendar::feed_for_user(store, &lookup)
    })
    .await?;

    match outcome {
        FeedOutcome::NoBookmarks => Err(ApiError::NotFound("No bookmarked events found".into())),
        FeedOutcome::NoValidEvents => Err(ApiError::NotFound("No valid events found".into())),
        FeedOutcome::Feed { body, events } => {
            info!(%uid, events, "serving calendar feed");
            let disposition = format!("attachment; filename=\"{}\"", calendar::FEED_FILENAME);
            Ok((
                [
                    (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                body,
            )
                .into_response())
        }
    }
}
