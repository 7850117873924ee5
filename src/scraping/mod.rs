pub mod base;
pub mod dates;
pub mod detail;
pub mod listing;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::db::{DocumentStore, StoreError};
use crate::models::{Event, EventFormat, EventStatus};
use crate::pricing;
use crate::repo;

use base::Fetcher;
use detail::DetailFields;
use listing::ListingItem;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("http error: {0}")]
    Http(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeMode {
    /// Every listing item, each persisted as soon as it is built.
    Immediate,
    /// At most `limit` items (featured ones first), persisted in one batch.
    TopEvents { limit: usize },
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeReport {
    pub added: Vec<Event>,
    pub skipped_existing: usize,
    pub failed: usize,
    pub deadline_hit: bool,
}

pub struct Scraper {
    store: Arc<dyn DocumentStore>,
    // Held for a whole run so the existence check and the write of one run
    // never interleave with another's.
    run_lock: Mutex<()>,
    fetcher: Fetcher,
    listing_url: String,
    default_city: String,
    run_deadline: Duration,
}

impl Scraper {
    pub fn new(store: Arc<dyn DocumentStore>, config: &AppConfig) -> Result<Self, ScrapeError> {
        Ok(Self {
            store,
            run_lock: Mutex::new(()),
            fetcher: Fetcher::new(config.request_timeout())?,
            listing_url: config.listing_url.clone(),
            default_city: config.default_city.clone(),
            run_deadline: config.run_deadline(),
        })
    }

    async fn with_store<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&dyn DocumentStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|err| StoreError::Task(err.to_string()))?
    }

    /// One scrape pass. Only a failure to fetch the listing page itself (or
    /// to write a top-events batch) aborts the run; per-item problems are
    /// logged and counted. Runs on the same scraper are serialized.
    pub async fn run(
        &self,
        mode: ScrapeMode,
        now: NaiveDateTime,
    ) -> Result<ScrapeReport, ScrapeError> {
        let _running = self.run_lock.lock().await;
        let deadline = Instant::now() + self.run_deadline;
        info!(url = %self.listing_url, ?mode, "fetching listing page");
        let html = self.fetcher.fetch_html(&self.listing_url).await.map_err(|err| {
            error!(url = %self.listing_url, "listing fetch failed: {err}");
            err
        })?;

        let items = select_candidates(listing::parse_listing(&html, &self.listing_url), mode);
        info!(count = items.len(), "found listing candidates");

        let mut report = ScrapeReport::default();
        let mut seen = HashSet::new();
        let mut batch = Vec::new();

        for item in items {
            if Instant::now() >= deadline {
                warn!(link = %item.link, "run deadline reached, skipping remaining items");
                report.deadline_hit = true;
                break;
            }
            if !seen.insert(item.link.clone()) {
                debug!(link = %item.link, "duplicate link in listing");
                continue;
            }

            let link = item.link.clone();
            match self
                .with_store(move |store| repo::event_exists(store, &link))
                .await
            {
                Ok(true) => {
                    info!(link = %item.link, "skipping existing event");
                    report.skipped_existing += 1;
                    continue;
                }
                Ok(false) => {}
                Err(err) => {
                    error!(link = %item.link, "existence check failed: {err}");
                    report.failed += 1;
                    continue;
                }
            }

            let detail_html = match self.fetcher.fetch_html(&item.link).await {
                Ok(html) => html,
                Err(err) => {
                    warn!(link = %item.link, "detail fetch failed: {err}");
                    report.failed += 1;
                    continue;
                }
            };
            let fields = detail::parse_detail(&detail_html, &item.link);

            let Some(mut event) = build_event(&item, fields, now, &self.default_city) else {
                warn!(link = %item.link, "no event name found, skipping");
                report.failed += 1;
                continue;
            };

            match mode {
                ScrapeMode::Immediate => match self
                    .with_store({
                        let event = event.clone();
                        move |store| repo::insert_pending(store, &event)
                    })
                    .await
                {
                    Ok(id) => {
                        info!(link = %event.link, %id, name = %event.name, "added pending event");
                        event.id = id;
                        report.added.push(event);
                    }
                    Err(err) => {
                        error!(link = %event.link, "failed to persist pending event: {err}");
                        report.failed += 1;
                    }
                },
                ScrapeMode::TopEvents { .. } => batch.push(event),
            }
        }

        if !batch.is_empty() {
            let count = batch.len();
            let (batch, ids) = self
                .with_store(move |store| {
                    let ids = repo::insert_pending_batch(store, &batch)?;
                    Ok((batch, ids))
                })
                .await
                .map_err(|err| {
                    error!(count, "batch write of pending events failed: {err}");
                    err
                })?;
            for (mut event, id) in batch.into_iter().zip(ids) {
                info!(link = %event.link, %id, name = %event.name, "added pending event");
                event.id = id;
                report.added.push(event);
            }
        }

        info!(
            added = report.added.len(),
            skipped = report.skipped_existing,
            failed = report.failed,
            "scrape run finished"
        );
        Ok(report)
    }
}

fn select_candidates(items: Vec<ListingItem>, mode: ScrapeMode) -> Vec<ListingItem> {
    match mode {
        ScrapeMode::Immediate => items,
        ScrapeMode::TopEvents { limit } => {
            let (featured, rest): (Vec<_>, Vec<_>) =
                items.into_iter().partition(|item| item.featured);
            featured.into_iter().chain(rest).take(limit).collect()
        }
    }
}

fn build_event(
    item: &ListingItem,
    fields: DetailFields,
    now: NaiveDateTime,
    city: &str,
) -> Option<Event> {
    let name = fields.name.or_else(|| item.title.clone())?;
    let time_text = item.time_text.clone().or(fields.time_text);
    let schedule = dates::normalize_schedule(&item.date_text, time_text.as_deref(), now);
    let price_text = item
        .price_text
        .as_deref()
        .or(fields.price_text.as_deref())
        .unwrap_or("");

    Some(Event {
        id: String::new(),
        name,
        link: item.link.clone(),
        start_date: schedule.start_date,
        end_date: schedule.end_date,
        times: schedule.times,
        event_duration_type: schedule.duration,
        category: fields.categories,
        cost: pricing::parse_price_string(price_text),
        status: Some(EventStatus::Pending),
        clicks: 0,
        attendance_summary: Default::default(),
        location: fields.location.unwrap_or_default(),
        neighborhood: String::new(),
        city: city.to_string(),
        gmaps: fields.gmaps.unwrap_or_default(),
        image: fields.image.unwrap_or_default(),
        details: fields.description.unwrap_or_default(),
        format: Some(EventFormat::InPerson),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cost, DurationType, EventTime};
    use chrono::NaiveDate;

    fn item(link: &str, featured: bool) -> ListingItem {
        ListingItem {
            link: link.to_string(),
            title: Some("Listing Title".to_string()),
            date_text: "Monday Dec 1".to_string(),
            time_text: Some("7pm - 9pm".to_string()),
            price_text: Some("$15-$25".to_string()),
            featured,
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 11, 20)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn builds_pending_event_from_listing_and_detail() {
        let fields = DetailFields {
            name: Some("Detail Title".to_string()),
            location: Some("The Chapel".to_string()),
            categories: vec!["Music".to_string()],
            price_text: Some("FREE".to_string()),
            ..Default::default()
        };
        let event = build_event(&item("https://x.example/a", false), fields, now(), "San Francisco")
            .expect("event");
        assert_eq!(event.name, "Detail Title");
        assert_eq!(event.start_date, "2025-12-01");
        assert_eq!(event.end_date, "2025-12-01");
        assert_eq!(event.times, vec![EventTime::new("19:00", "21:00")]);
        assert_eq!(event.event_duration_type, DurationType::Single);
        assert_eq!(event.cost, Cost::Range(15.0, 25.0));
        assert_eq!(event.status, Some(EventStatus::Pending));
        assert_eq!(event.location, "The Chapel");
        assert_eq!(event.city, "San Francisco");
    }

    #[test]
    fn listing_title_backs_up_missing_detail_name() {
        let event = build_event(
            &item("https://x.example/a", false),
            DetailFields::default(),
            now(),
            "San Francisco",
        )
        .expect("event");
        assert_eq!(event.name, "Listing Title");

        let mut untitled = item("https://x.example/b", false);
        untitled.title = None;
        assert!(build_event(&untitled, DetailFields::default(), now(), "SF").is_none());
    }

    #[test]
    fn top_events_prefers_featured_items() {
        let items = vec![
            item("https://x.example/1", false),
            item("https://x.example/2", true),
            item("https://x.example/3", false),
            item("https://x.example/4", true),
        ];
        let picked: Vec<_> = select_candidates(items, ScrapeMode::TopEvents { limit: 3 })
            .into_iter()
            .map(|item| item.link)
            .collect();
        assert_eq!(
            picked,
            vec!["https://x.example/2", "https://x.example/4", "https://x.example/1"]
        );
    }
}
