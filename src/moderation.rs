use thiserror::Error;
use tracing::info;

use crate::db::{DocumentStore, StoreError};
use crate::models::{Event, EventStatus};
use crate::repo::{self, EVENTS, PENDING_EVENTS};

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("pending event not found: {0}")]
    NotFound(String),
    #[error("event {id} is already {status:?}")]
    AlreadyDecided { id: String, status: EventStatus },
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn load_pending(store: &dyn DocumentStore, id: &str) -> Result<Event, ModerationError> {
    let event = repo::get_event(store, PENDING_EVENTS, id)?
        .ok_or_else(|| ModerationError::NotFound(id.to_string()))?;
    match event.status {
        None | Some(EventStatus::Pending) => Ok(event),
        Some(status) => Err(ModerationError::AlreadyDecided {
            id: id.to_string(),
            status,
        }),
    }
}

/// Marks the queue entry approved and publishes it to `events` under the
/// same id, without a status. Both writes land together or not at all.
pub fn approve(store: &dyn DocumentStore, id: &str) -> Result<Event, ModerationError> {
    let mut event = load_pending(store, id)?;

    let mut published = event.clone();
    published.status = None;
    event.status = Some(EventStatus::Approved);

    let live = repo::event_to_value(&published)?;
    let queued = repo::event_to_value(&event)?;
    store.set_all(&[(EVENTS, id, &live), (PENDING_EVENTS, id, &queued)])?;

    info!(%id, link = %event.link, "approved pending event");
    Ok(published)
}

pub fn reject(store: &dyn DocumentStore, id: &str) -> Result<Event, ModerationError> {
    let mut event = load_pending(store, id)?;
    event.status = Some(EventStatus::Rejected);
    store.set(PENDING_EVENTS, id, &repo::event_to_value(&event)?)?;
    info!(%id, link = %event.link, "rejected pending event");
    Ok(event)
}

pub fn list_pending(store: &dyn DocumentStore) -> Result<Vec<Event>, StoreError> {
    Ok(repo::list_events(store, PENDING_EVENTS)?
        .into_iter()
        .filter(|event| matches!(event.status, None | Some(EventStatus::Pending)))
        .collect())
}
