use std::{fs, net::SocketAddr, path::Path, path::PathBuf, time::Duration};

use chrono::{NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::utils;

pub const DEFAULT_LISTING_URL: &str = "https://sf.funcheap.com/events/";
pub const TIMEZONE: Tz = chrono_tz::America::Los_Angeles;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub listen_addr: String,
    pub database_path: Option<PathBuf>,
    pub listing_url: String,
    /// Shared bearer secret for the scrape and moderation endpoints. Unset
    /// means every protected request is refused.
    pub cron_secret: Option<String>,
    pub request_timeout_secs: u64,
    pub run_deadline_secs: u64,
    pub reminder_interval_hours: u64,
    pub top_events_limit: usize,
    pub default_city: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3000".to_string(),
            database_path: None,
            listing_url: DEFAULT_LISTING_URL.to_string(),
            cron_secret: None,
            request_timeout_secs: 20,
            run_deadline_secs: 300,
            reminder_interval_hours: 24,
            top_events_limit: 10,
            default_city: "San Francisco".to_string(),
        }
    }
}

impl AppConfig {
    /// `config.json` from the data directory, then environment overrides.
    pub fn load() -> Self {
        let path = utils::config_path();
        let mut config = match read_config(&path) {
            Ok(config) => config,
            Err(err) => {
                warn!("ignoring unreadable config {:?}: {err}", path);
                AppConfig::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("HAPPNS_LISTEN_ADDR") {
            self.listen_addr = value;
        }
        if let Some(value) = lookup("HAPPNS_DATABASE_PATH") {
            self.database_path = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("HAPPNS_LISTING_URL") {
            self.listing_url = value;
        }
        if let Some(value) = lookup("CRON_SECRET").filter(|v| !v.trim().is_empty()) {
            self.cron_secret = Some(value);
        }
        if let Some(value) = lookup("HAPPNS_DEFAULT_CITY") {
            self.default_city = value;
        }
        parse_into(&lookup, "HAPPNS_REQUEST_TIMEOUT_SECS", &mut self.request_timeout_secs);
        parse_into(&lookup, "HAPPNS_RUN_DEADLINE_SECS", &mut self.run_deadline_secs);
        parse_into(
            &lookup,
            "HAPPNS_REMINDER_INTERVAL_HOURS",
            &mut self.reminder_interval_hours,
        );
        parse_into(&lookup, "HAPPNS_TOP_EVENTS_LIMIT", &mut self.top_events_limit);
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listen_addr
            .parse()
            .map_err(|err| anyhow::anyhow!("invalid listen address {}: {err}", self.listen_addr))
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(utils::database_path)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn run_deadline(&self) -> Duration {
        Duration::from_secs(self.run_deadline_secs.max(1))
    }

    pub fn reminder_interval(&self) -> Duration {
        Duration::from_secs(self.reminder_interval_hours.max(1) * 3600)
    }
}

fn parse_into<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => warn!("ignoring invalid {key}={raw}"),
        }
    }
}

/// Wall-clock "now" in the city's timezone; every date bucket is computed
/// against this.
pub fn local_now() -> NaiveDateTime {
    Utc::now().with_timezone(&TIMEZONE).naive_local()
}

fn read_config(path: &Path) -> Result<AppConfig, String> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path).map_err(|err| err.to_string())?;
    serde_json::from_str(&contents).map_err(|err| err.to_string())
}
