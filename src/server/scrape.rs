use axum::{extract::State, http::HeaderMap, routing::get, Json, Router};
use serde::Serialize;
use tracing::info;

use super::{authorize, ApiError, AppState};
use crate::config;
use crate::models::Event;
use crate::scraping::{ScrapeMode, ScrapeReport};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/scrape", get(scrape).post(scrape))
        .route("/api/scrape/top", get(scrape_top).post(scrape_top))
}

#[derive(Serialize)]
pub struct ScrapeResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<Event>>,
}

impl From<ScrapeReport> for ScrapeResponse {
    fn from(report: ScrapeReport) -> Self {
        let mut message = format!(
            "Added {} new events ({} already known, {} failed)",
            report.added.len(),
            report.skipped_existing,
            report.failed
        );
        if report.deadline_hit {
            message.push_str("; stopped at the run deadline");
        }
        Self {
            success: true,
            message,
            events: Some(report.added),
        }
    }
}

async fn run(state: &AppState, headers: &HeaderMap, mode: ScrapeMode) -> Result<Json<ScrapeResponse>, ApiError> {
    authorize(headers, state.config.cron_secret.as_deref())?;
    info!(?mode, "scrape triggered");
    let report = state.scraper.run(mode, config::local_now()).await?;
    Ok(Json(report.into()))
}

/// GET|POST /api/scrape - every listing item, persisted one by one
async fn scrape(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ScrapeResponse>, ApiError> {
    run(&state, &headers, ScrapeMode::Immediate).await
}

/// GET|POST /api/scrape/top - the configured number of top items, in one batch
async fn scrape_top(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ScrapeResponse>, ApiError> {
    let limit = state.config.top_events_limit;
    run(&state, &headers, ScrapeMode::TopEvents { limit }).await
}
