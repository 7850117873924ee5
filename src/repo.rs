//! Typed access to the collections the app keeps in the document store.

use serde_json::{json, Value};
use tracing::warn;

use crate::db::{Document, DocumentStore, StoreError};
use crate::models::{AttendanceStatus, AttendanceSummary, Event, Notification};

pub const EVENTS: &str = "events";
pub const PENDING_EVENTS: &str = "pending-events";
pub const USERS: &str = "users";

pub fn bookmarks_collection(uid: &str) -> String {
    format!("users/{uid}/user-bookmarks")
}

pub fn attendance_collection(uid: &str) -> String {
    format!("users/{uid}/user-attendance")
}

pub fn notifications_collection(uid: &str) -> String {
    format!("users/{uid}/notifications")
}

fn event_attendees_collection(event_id: &str) -> String {
    format!("events/{event_id}/attendance")
}

pub fn event_from_doc(doc: Document) -> Result<Event, StoreError> {
    let mut event: Event = serde_json::from_value(doc.data)?;
    event.id = doc.id;
    Ok(event)
}

pub fn event_to_value(event: &Event) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(event)?)
}

/// True when `link` is already known in the production or the pending
/// collection. Exact string match only.
pub fn event_exists(store: &dyn DocumentStore, link: &str) -> Result<bool, StoreError> {
    for collection in [EVENTS, PENDING_EVENTS] {
        if !store.query_eq(collection, "link", link)?.is_empty() {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn insert_pending(store: &dyn DocumentStore, event: &Event) -> Result<String, StoreError> {
    store.create(PENDING_EVENTS, &event_to_value(event)?)
}

pub fn insert_pending_batch(
    store: &dyn DocumentStore,
    events: &[Event],
) -> Result<Vec<String>, StoreError> {
    let docs = events
        .iter()
        .map(event_to_value)
        .collect::<Result<Vec<_>, _>>()?;
    store.create_many(PENDING_EVENTS, &docs)
}

pub fn get_event(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
) -> Result<Option<Event>, StoreError> {
    store.get(collection, id)?.map(event_from_doc).transpose()
}

/// Every decodable event in `collection`; malformed documents are logged
/// and skipped.
pub fn list_events(store: &dyn DocumentStore, collection: &str) -> Result<Vec<Event>, StoreError> {
    let mut events = Vec::new();
    for doc in store.list(collection)? {
        let id = doc.id.clone();
        match event_from_doc(doc) {
            Ok(event) => events.push(event),
            Err(err) => warn!(collection, id = %id, "skipping malformed event document: {err}"),
        }
    }
    Ok(events)
}

/// Bumps the click counter, returning the new count (`None` if the event is
/// gone).
pub fn record_click(store: &dyn DocumentStore, id: &str) -> Result<Option<u64>, StoreError> {
    let updated = store.update(EVENTS, id, &mut |doc: &mut Value| {
        let clicks = doc.get("clicks").and_then(Value::as_u64).unwrap_or(0);
        doc["clicks"] = json!(clicks + 1);
    })?;
    Ok(updated.and_then(|doc| doc.get("clicks").and_then(Value::as_u64)))
}

pub fn add_bookmark(store: &dyn DocumentStore, uid: &str, event_id: &str) -> Result<(), StoreError> {
    store.set(
        &bookmarks_collection(uid),
        event_id,
        &json!({ "eventId": event_id }),
    )
}

pub fn remove_bookmark(
    store: &dyn DocumentStore,
    uid: &str,
    event_id: &str,
) -> Result<bool, StoreError> {
    store.delete(&bookmarks_collection(uid), event_id)
}

// Bookmarks written by older clients carry no `eventId`; their doc id is the
// event id.
fn referenced_event_id(doc: &Document) -> String {
    doc.data
        .get("eventId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| doc.id.clone())
}

pub fn bookmarked_event_ids(store: &dyn DocumentStore, uid: &str) -> Result<Vec<String>, StoreError> {
    Ok(store
        .list(&bookmarks_collection(uid))?
        .iter()
        .map(referenced_event_id)
        .collect())
}

pub fn attended_event_ids(
    store: &dyn DocumentStore,
    uid: &str,
    statuses: &[AttendanceStatus],
) -> Result<Vec<String>, StoreError> {
    let mut ids = Vec::new();
    for doc in store.list(&attendance_collection(uid))? {
        let status: Option<AttendanceStatus> = doc
            .data
            .get("status")
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok());
        if status.is_some_and(|status| statuses.contains(&status)) {
            ids.push(referenced_event_id(&doc));
        }
    }
    Ok(ids)
}

/// Records `uid`'s answer for an event and refreshes the event's
/// denormalized counts. Returns `None` without writing anything when the
/// event does not exist.
pub fn set_attendance(
    store: &dyn DocumentStore,
    uid: &str,
    event_id: &str,
    status: AttendanceStatus,
) -> Result<Option<AttendanceSummary>, StoreError> {
    if store.get(EVENTS, event_id)?.is_none() {
        return Ok(None);
    }

    let record = json!({ "eventId": event_id, "userId": uid, "status": status });
    store.set(&attendance_collection(uid), event_id, &record)?;
    store.set(&event_attendees_collection(event_id), uid, &record)?;

    let mut summary = AttendanceSummary::default();
    for doc in store.list(&event_attendees_collection(event_id))? {
        match doc.data.get("status").and_then(Value::as_str) {
            Some("yes") => summary.yes_count += 1,
            Some("maybe") => summary.maybe_count += 1,
            Some("no") => summary.no_count += 1,
            _ => {}
        }
    }

    let encoded = serde_json::to_value(&summary)?;
    store.update(EVENTS, event_id, &mut |doc: &mut Value| {
        doc["attendanceSummary"] = encoded.clone();
    })?;
    Ok(Some(summary))
}

pub fn list_user_ids(store: &dyn DocumentStore) -> Result<Vec<String>, StoreError> {
    Ok(store.list(USERS)?.into_iter().map(|doc| doc.id).collect())
}

/// Writes a notification under a fixed id unless one already exists, so
/// re-running a job never duplicates or resets it.
pub fn write_notification_once(
    store: &dyn DocumentStore,
    uid: &str,
    id: &str,
    notification: &Notification,
) -> Result<bool, StoreError> {
    let collection = notifications_collection(uid);
    if store.get(&collection, id)?.is_some() {
        return Ok(false);
    }
    store.set(&collection, id, &serde_json::to_value(notification)?)?;
    Ok(true)
}
