use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use happns_lib::config::AppConfig;
use happns_lib::db::{Document, DocumentStore, SqliteStore, StoreError};
use happns_lib::models::{Cost, EventStatus, EventTime};
use happns_lib::repo;
use happns_lib::scraping::{ScrapeMode, Scraper};
use happns_lib::server::{router, AppState};

const LISTING: &str = r#"
<html><body><main>
  <div class="day-section">
    <h2 class="day-title">Monday Dec 1</h2>
    <div class="event-item">
      <h3><a href="/2025/12/01/jazz-night/">Jazz Night</a></h3>
      <span class="time">8pm - 11pm</span>
      <span class="cost">$15-$25</span>
    </div>
    <div class="event-item featured">
      <h3 class="title"><a class="event-link" href="/2025/12/01/lantern-walk/">Lantern Walk</a></h3>
      <span class="event-time">7:30 pm - 9:30 pm</span>
      <span class="event-price">FREE</span>
    </div>
    <div class="event-item">
      <h3><a href="/broken/">Broken Page</a></h3>
    </div>
  </div>
  <div class="day-section">
    <h2 class="day-title">Tuesday Dec 2</h2>
    <div class="event-item">
      <h3><a href="/2025/12/01/lantern-walk/">Lantern Walk (again)</a></h3>
    </div>
  </div>
</main></body></html>
"#;

const LANTERN_DETAIL: &str = r#"
<html><body>
  <h1 class="entry-title">Lantern Walk</h1>
  <div class="venue-name">Dolores Park</div>
  <div class="category"><a>Outdoors</a><a>Free</a></div>
  <div class="entry-content"><p>Bring a lantern.</p></div>
</body></html>
"#;

const JAZZ_DETAIL: &str = r#"
<html><body>
  <h1 class="entry-title">Jazz Night</h1>
  <div class="venue-name">The Chapel</div>
</body></html>
"#;

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 11, 20)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html")
}

async fn mount_site(server: &MockServer, lantern_fetches: u64) {
    Mock::given(method("GET"))
        .and(path("/events/"))
        .respond_with(html(LISTING))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2025/12/01/lantern-walk/"))
        .respond_with(html(LANTERN_DETAIL))
        .expect(lantern_fetches)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2025/12/01/jazz-night/"))
        .respond_with(html(JAZZ_DETAIL))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(server)
        .await;
}

fn config_for(server: &MockServer) -> AppConfig {
    AppConfig {
        listing_url: format!("{}/events/", server.uri()),
        cron_secret: Some("s3cret".to_string()),
        request_timeout_secs: 5,
        ..AppConfig::default()
    }
}

#[tokio::test]
async fn repeated_runs_never_duplicate_events() {
    let server = MockServer::start().await;
    mount_site(&server, 1).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let store: Arc<dyn DocumentStore> =
        Arc::new(SqliteStore::connect(&dir.path().join("happns.sqlite")).expect("store"));
    let scraper = Scraper::new(Arc::clone(&store), &config_for(&server)).expect("scraper");

    let first = scraper.run(ScrapeMode::Immediate, now()).await.expect("first run");
    assert_eq!(first.added.len(), 2);
    assert_eq!(first.failed, 1);
    assert!(!first.deadline_hit);

    let lantern = first
        .added
        .iter()
        .find(|event| event.name == "Lantern Walk")
        .expect("lantern walk added");
    assert_eq!(lantern.start_date, "2025-12-01");
    assert_eq!(lantern.times, vec![EventTime::new("19:30", "21:30")]);
    assert_eq!(lantern.cost, Cost::Single(0.0));
    assert_eq!(lantern.category, vec!["Outdoors", "Free"]);
    assert_eq!(lantern.status, Some(EventStatus::Pending));

    let jazz = first
        .added
        .iter()
        .find(|event| event.name == "Jazz Night")
        .expect("jazz night added");
    assert_eq!(jazz.cost, Cost::Range(15.0, 25.0));
    assert_eq!(jazz.location, "The Chapel");

    let second = scraper.run(ScrapeMode::Immediate, now()).await.expect("second run");
    assert!(second.added.is_empty());
    assert_eq!(second.skipped_existing, 2);
    assert_eq!(second.failed, 1);

    let pending = repo::list_events(store.as_ref(), repo::PENDING_EVENTS).unwrap();
    assert_eq!(pending.len(), 2);
}

#[tokio::test]
async fn top_events_mode_takes_featured_items_in_one_batch() {
    let server = MockServer::start().await;
    mount_site(&server, 1).await;

    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::connect_in_memory().expect("store"));
    let scraper = Scraper::new(Arc::clone(&store), &config_for(&server)).expect("scraper");

    let report = scraper
        .run(ScrapeMode::TopEvents { limit: 1 }, now())
        .await
        .expect("run");
    assert_eq!(report.added.len(), 1);
    assert_eq!(report.added[0].name, "Lantern Walk");
    assert!(!report.added[0].id.is_empty());

    let stored = repo::get_event(store.as_ref(), repo::PENDING_EVENTS, &report.added[0].id)
        .unwrap()
        .expect("persisted");
    assert_eq!(stored.link, format!("{}/2025/12/01/lantern-walk/", server.uri()));
}

async fn call_scrape(app: axum::Router, auth: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().method("POST").uri("/api/scrape");
    if let Some(auth) = auth {
        request = request.header("authorization", auth);
    }
    let response = app
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn scrape_endpoint_reports_new_events() {
    let server = MockServer::start().await;
    mount_site(&server, 1).await;

    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::connect_in_memory().expect("store"));
    let app = router(AppState::new(store, config_for(&server)).expect("state"));

    let (status, body) = call_scrape(app.clone(), Some("Bearer wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, body) = call_scrape(app, Some("Bearer s3cret")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["events"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn listing_failure_aborts_with_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::connect_in_memory().expect("store"));
    let app = router(AppState::new(Arc::clone(&store), config_for(&server)).expect("state"));

    let (status, body) = call_scrape(app, Some("Bearer s3cret")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("503"));
    assert!(store.list(repo::PENDING_EVENTS).unwrap().is_empty());
}

fn listing_of(items: &[(&str, &str)]) -> String {
    let rows: String = items
        .iter()
        .map(|(href, title)| {
            format!(r#"<div class="event-item"><h3><a href="{href}">{title}</a></h3><span class="time">7pm</span></div>"#)
        })
        .collect();
    format!(
        r#"<html><body><div class="day-section"><h2 class="day-title">Monday Dec 1</h2>{rows}</div></body></html>"#
    )
}

fn detail_page(name: &str) -> String {
    format!(r#"<html><body><h1 class="entry-title">{name}</h1></body></html>"#)
}

#[tokio::test]
async fn overlapping_runs_store_a_link_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events/"))
        .respond_with(html(&listing_of(&[("/a/", "Slow Show")])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a/"))
        .respond_with(html(&detail_page("Slow Show")).set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;

    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::connect_in_memory().expect("store"));
    let scraper = Scraper::new(Arc::clone(&store), &config_for(&server)).expect("scraper");

    let (immediate, top) = tokio::join!(
        scraper.run(ScrapeMode::Immediate, now()),
        scraper.run(ScrapeMode::TopEvents { limit: 10 }, now())
    );
    let immediate = immediate.expect("immediate run");
    let top = top.expect("top run");
    assert_eq!(immediate.added.len() + top.added.len(), 1);
    assert_eq!(immediate.skipped_existing + top.skipped_existing, 1);

    let link = format!("{}/a/", server.uri());
    let stored = store
        .query_eq(repo::PENDING_EVENTS, "link", &link)
        .expect("query");
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn run_deadline_stops_remaining_items_and_keeps_saved_ones() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events/"))
        .respond_with(html(&listing_of(&[("/slow/", "Slow Show"), ("/next/", "Next Show")])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow/"))
        .respond_with(html(&detail_page("Slow Show")).set_delay(Duration::from_millis(1500)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/next/"))
        .respond_with(html(&detail_page("Next Show")))
        .expect(0)
        .mount(&server)
        .await;

    let config = AppConfig {
        run_deadline_secs: 1,
        ..config_for(&server)
    };

    let direct: Arc<dyn DocumentStore> = Arc::new(SqliteStore::connect_in_memory().expect("store"));
    let scraper = Scraper::new(Arc::clone(&direct), &config).expect("scraper");
    let report = scraper.run(ScrapeMode::Immediate, now()).await.expect("run");
    assert!(report.deadline_hit);
    assert_eq!(report.added.len(), 1);
    assert_eq!(report.added[0].name, "Slow Show");
    assert_eq!(report.failed, 0);

    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::connect_in_memory().expect("store"));
    let app = router(AppState::new(Arc::clone(&store), config).expect("state"));

    let (status, body) = call_scrape(app, Some("Bearer s3cret")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("stopped at the run deadline"));
    assert_eq!(body["events"].as_array().map(Vec::len), Some(1));

    let pending = repo::list_events(store.as_ref(), repo::PENDING_EVENTS).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].name, "Slow Show");
}

/// Delegates to SQLite and records which thread each call ran on.
struct ThreadRecordingStore {
    inner: SqliteStore,
    threads: Mutex<Vec<ThreadId>>,
}

impl ThreadRecordingStore {
    fn record(&self) {
        self.threads.lock().unwrap().push(thread::current().id());
    }
}

impl DocumentStore for ThreadRecordingStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.record();
        self.inner.get(collection, id)
    }
    fn create(&self, collection: &str, data: &Value) -> Result<String, StoreError> {
        self.record();
        self.inner.create(collection, data)
    }
    fn create_many(&self, collection: &str, docs: &[Value]) -> Result<Vec<String>, StoreError> {
        self.record();
        self.inner.create_many(collection, docs)
    }
    fn set(&self, collection: &str, id: &str, data: &Value) -> Result<(), StoreError> {
        self.record();
        self.inner.set(collection, id, data)
    }
    fn set_all(&self, writes: &[(&str, &str, &Value)]) -> Result<(), StoreError> {
        self.record();
        self.inner.set_all(writes)
    }
    fn update(
        &self,
        collection: &str,
        id: &str,
        apply: &mut dyn FnMut(&mut Value),
    ) -> Result<Option<Value>, StoreError> {
        self.record();
        self.inner.update(collection, id, apply)
    }
    fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        self.record();
        self.inner.delete(collection, id)
    }
    fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.record();
        self.inner.list(collection)
    }
    fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Document>, StoreError> {
        self.record();
        self.inner.query_eq(collection, field, value)
    }
    fn dispose(&self) -> Result<(), StoreError> {
        self.inner.dispose()
    }
}

#[tokio::test]
async fn store_work_stays_off_the_async_thread() {
    let server = MockServer::start().await;
    mount_site(&server, 1).await;

    let recording = Arc::new(ThreadRecordingStore {
        inner: SqliteStore::connect_in_memory().expect("store"),
        threads: Mutex::new(Vec::new()),
    });
    let store: Arc<dyn DocumentStore> = recording.clone();
    let scraper = Scraper::new(store, &config_for(&server)).expect("scraper");

    scraper.run(ScrapeMode::Immediate, now()).await.expect("immediate");
    scraper
        .run(ScrapeMode::TopEvents { limit: 5 }, now())
        .await
        .expect("top");

    let runtime_thread = thread::current().id();
    let threads = recording.threads.lock().unwrap();
    assert!(!threads.is_empty());
    assert!(threads.iter().all(|id| *id != runtime_thread));
}
