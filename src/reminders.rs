//! Daily "happening tomorrow" notifications.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config;
use crate::db::{DocumentStore, StoreError};
use crate::models::{AttendanceStatus, Notification};
use crate::repo;
use crate::schedule::{format_time_display, is_happening_tomorrow, times_for_day, INVALID_TIME};

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderFailure {
    pub user_id: String,
    pub error: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderReport {
    pub users: usize,
    pub notifications: usize,
    pub failures: Vec<ReminderFailure>,
}

fn reminder_message(event: &crate::models::Event, tomorrow: chrono::NaiveDate) -> String {
    let start = times_for_day(event, tomorrow)
        .map(|slot| format_time_display(&slot.start_time))
        .filter(|display| display != INVALID_TIME);
    match start {
        Some(time) => format!("{} is happening tomorrow at {time}", event.title()),
        None => format!("{} is happening tomorrow", event.title()),
    }
}

fn remind_user(store: &dyn DocumentStore, uid: &str, now: NaiveDateTime) -> Result<usize, StoreError> {
    let Some(tomorrow) = now.date().succ_opt() else {
        return Ok(0);
    };

    let mut seen = HashSet::new();
    let mut candidates = repo::bookmarked_event_ids(store, uid)?;
    candidates.extend(repo::attended_event_ids(
        store,
        uid,
        &[AttendanceStatus::Yes, AttendanceStatus::Maybe],
    )?);

    let mut written = 0;
    for event_id in candidates {
        if !seen.insert(event_id.clone()) {
            continue;
        }
        let Some(event) = repo::get_event(store, repo::EVENTS, &event_id)? else {
            continue;
        };
        if !is_happening_tomorrow(&event, now) {
            continue;
        }
        let notification = Notification {
            kind: "reminder".to_string(),
            event_id: event_id.clone(),
            event_name: event.title().to_string(),
            message: reminder_message(&event, tomorrow),
            created_at: Utc::now().to_rfc3339(),
            read: false,
        };
        let id = format!("reminder-{event_id}-{}", tomorrow.format("%Y-%m-%d"));
        if repo::write_notification_once(store, uid, &id, &notification)? {
            written += 1;
        }
    }
    Ok(written)
}

/// Runs every user's reminders concurrently and waits for all of them. One
/// user's failure is recorded in the report and does not stop the others.
pub async fn run_reminders(
    store: Arc<dyn DocumentStore>,
    now: NaiveDateTime,
) -> Result<ReminderReport, StoreError> {
    let users = repo::list_user_ids(store.as_ref())?;
    let mut report = ReminderReport {
        users: users.len(),
        ..Default::default()
    };

    let mut tasks = JoinSet::new();
    for uid in users {
        let store = Arc::clone(&store);
        tasks.spawn_blocking(move || {
            let outcome = remind_user(store.as_ref(), &uid, now);
            (uid, outcome)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(count))) => report.notifications += count,
            Ok((uid, Err(err))) => {
                warn!(%uid, "reminders failed for user: {err}");
                report.failures.push(ReminderFailure {
                    user_id: uid,
                    error: err.to_string(),
                });
            }
            Err(err) => {
                error!("reminder task panicked or was cancelled: {err}");
                report.failures.push(ReminderFailure {
                    user_id: String::new(),
                    error: err.to_string(),
                });
            }
        }
    }

    Ok(report)
}

/// Fires [`run_reminders`] on a fixed interval, starting immediately.
pub async fn run_scheduler(store: Arc<dyn DocumentStore>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        match run_reminders(Arc::clone(&store), config::local_now()).await {
            Ok(report) => info!(
                users = report.users,
                notifications = report.notifications,
                failures = report.failures.len(),
                "reminder job finished"
            ),
            Err(err) => error!("reminder job aborted: {err}"),
        }
    }
}
