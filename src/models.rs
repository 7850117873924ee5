use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One day's time slot, both sides as 24-hour `HH:mm` strings. `end_time`
/// may be empty when the source never gave one.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
}

impl EventTime {
    pub fn new(start_time: impl Into<String>, end_time: impl Into<String>) -> Self {
        Self {
            start_time: start_time.into(),
            end_time: end_time.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DurationType {
    #[default]
    Single,
    Multi,
    Extended,
}

/// Tagged price: `{"type": "range", "value": [15, 25]}` and friends.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Cost {
    Single(f64),
    Range(f64, f64),
    Minimum(f64),
}

impl Default for Cost {
    fn default() -> Self {
        Cost::Single(0.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EventFormat {
    InPerson,
    Online,
    Hybrid,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    #[serde(default)]
    pub yes_count: u64,
    #[serde(default)]
    pub maybe_count: u64,
    #[serde(default)]
    pub no_count: u64,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Yes,
    Maybe,
    No,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    // Document id; never stored inside the payload itself.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub link: String,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub times: Vec<EventTime>,
    #[serde(default)]
    pub event_duration_type: DurationType,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub cost: Cost,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
    #[serde(default)]
    pub clicks: u64,
    #[serde(default)]
    pub attendance_summary: AttendanceSummary,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub neighborhood: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub gmaps: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<EventFormat>,
}

impl Event {
    pub fn title(&self) -> &str {
        if self.name.trim().is_empty() {
            "Untitled Event"
        } else {
            &self.name
        }
    }

    /// Parsed `[startDate, endDate]`; `None` when either side is not a valid
    /// ISO date or the window is inverted.
    pub fn window(&self) -> Option<(NaiveDate, NaiveDate)> {
        let start = NaiveDate::parse_from_str(self.start_date.trim(), "%Y-%m-%d").ok()?;
        let end = NaiveDate::parse_from_str(self.end_date.trim(), "%Y-%m-%d").ok()?;
        if start > end {
            return None;
        }
        Some((start, end))
    }

    /// Approved unless a moderation status says otherwise.
    pub fn effective_status(&self) -> EventStatus {
        self.status.unwrap_or(EventStatus::Approved)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: String,
    pub event_id: String,
    pub event_name: String,
    pub message: String,
    pub created_at: String,
    #[serde(default)]
    pub read: bool,
}
