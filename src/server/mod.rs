//! HTTP surface of the service.

mod events;
mod feed;
mod pending;
mod scrape;
mod users;

use std::sync::Arc;

use axum::{
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::config::AppConfig;
use crate::db::{DocumentStore, StoreError};
use crate::moderation::ModerationError;
use crate::scraping::{ScrapeError, Scraper};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: Arc<AppConfig>,
    pub scraper: Arc<Scraper>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: AppConfig) -> Result<Self, ScrapeError> {
        let scraper = Scraper::new(Arc::clone(&store), &config)?;
        Ok(Self {
            store,
            config: Arc::new(config),
            scraper: Arc::new(scraper),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(scrape::router())
        .merge(events::router())
        .merge(feed::router())
        .merge(pending::router())
        .merge(users::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Failure body shared by every JSON endpoint.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.into())
    }
}

impl From<ScrapeError> for ApiError {
    fn from(err: ScrapeError) -> Self {
        Self::Internal(anyhow::Error::new(err).context("scrape run failed"))
    }
}

impl From<ModerationError> for ApiError {
    fn from(err: ModerationError) -> Self {
        match err {
            ModerationError::NotFound(_) => Self::NotFound(err.to_string()),
            ModerationError::AlreadyDecided { .. } => Self::Conflict(err.to_string()),
            ModerationError::Store(inner) => inner.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, detail) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string(), None),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message, None),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message, None),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message, None),
            ApiError::Internal(err) => {
                error!("request failed: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    Some(format!("{err:#}")),
                )
            }
        };
        let body = Json(ErrorResponse {
            success: false,
            message,
            error: detail,
        });
        (status, body).into_response()
    }
}

/// Checks `Authorization: Bearer <secret>`. With no secret configured every
/// request is refused.
pub fn authorize(headers: &HeaderMap, secret: Option<&str>) -> Result<(), ApiError> {
    let Some(secret) = secret else {
        warn!("protected endpoint called but no secret is configured");
        return Err(ApiError::Unauthorized);
    };
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    // Digests have a fixed length, so the comparison does not leak the
    // secret's length.
    if Sha256::digest(presented.trim().as_bytes()) == Sha256::digest(secret.as_bytes()) {
        Ok(())
    } else {
        warn!("rejected request with a mismatched bearer token");
        Err(ApiError::Unauthorized)
    }
}

/// Runs a store operation on the blocking pool.
pub(crate) async fn with_store<T, E, F>(store: Arc<dyn DocumentStore>, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&dyn DocumentStore) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || op(store.as_ref()).map_err(Into::<ApiError>::into))
        .await
        .map_err(|err| ApiError::Internal(err.into()))?
}
