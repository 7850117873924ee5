//! Calendar-window classification and display ordering for events.
//!
//! Every predicate compares calendar dates only: the time of day in `now`
//! never matters, and an event whose dates do not parse is never today,
//! tomorrow, upcoming, future or past.

use std::cmp::Ordering;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::warn;

use crate::models::{DurationType, Event, EventTime};

pub const INVALID_TIME: &str = "Invalid time";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Today,
    Tomorrow,
    Upcoming,
    Future,
    Past,
}

fn contains(event: &Event, day: NaiveDate) -> bool {
    event
        .window()
        .map(|(start, end)| start <= day && day <= end)
        .unwrap_or(false)
}

pub fn is_happening_today(event: &Event, now: NaiveDateTime) -> bool {
    contains(event, now.date())
}

pub fn is_happening_tomorrow(event: &Event, now: NaiveDateTime) -> bool {
    match now.date().succ_opt() {
        Some(tomorrow) => contains(event, tomorrow),
        None => false,
    }
}

pub fn is_upcoming(event: &Event, now: NaiveDateTime) -> bool {
    event
        .window()
        .map(|(_, end)| end >= now.date())
        .unwrap_or(false)
}

pub fn is_future(event: &Event, now: NaiveDateTime) -> bool {
    event
        .window()
        .map(|(start, _)| start > now.date())
        .unwrap_or(false)
}

pub fn is_past(event: &Event, now: NaiveDateTime) -> bool {
    event
        .window()
        .map(|(_, end)| end < now.date())
        .unwrap_or(false)
}

impl Bucket {
    pub fn matches(self, event: &Event, now: NaiveDateTime) -> bool {
        match self {
            Bucket::Today => is_happening_today(event, now),
            Bucket::Tomorrow => is_happening_tomorrow(event, now),
            Bucket::Upcoming => is_upcoming(event, now),
            Bucket::Future => is_future(event, now),
            Bucket::Past => is_past(event, now),
        }
    }
}

/// Events that fall in `bucket`, ordered by start date, duration type and
/// name. Events with unreadable dates are logged and left out.
pub fn bucket_events(events: &[Event], bucket: Bucket, now: NaiveDateTime) -> Vec<Event> {
    let mut selected: Vec<Event> = events
        .iter()
        .filter(|event| {
            if event.window().is_none() {
                warn!(
                    id = %event.id,
                    start = %event.start_date,
                    end = %event.end_date,
                    "skipping event with invalid date window"
                );
                return false;
            }
            bucket.matches(event, now)
        })
        .cloned()
        .collect();
    sort_by_start_then_duration(&mut selected);
    selected
}

pub fn classify_duration(start: NaiveDate, end: NaiveDate) -> DurationType {
    match (end - start).num_days() {
        d if d <= 0 => DurationType::Single,
        d if d < 7 => DurationType::Multi,
        _ => DurationType::Extended,
    }
}

/// Duration type derived from the date window, ignoring whatever the record
/// declares.
pub fn derived_duration_type(event: &Event) -> Option<DurationType> {
    event
        .window()
        .map(|(start, end)| classify_duration(start, end))
}

fn start_key(event: &Event) -> Option<NaiveDate> {
    event.window().map(|(start, _)| start)
}

// Valid dates first, unreadable ones at the end.
fn compare_start(a: &Event, b: &Event) -> Ordering {
    match (start_key(a), start_key(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_name(a: &Event, b: &Event) -> Ordering {
    a.name.to_lowercase().cmp(&b.name.to_lowercase())
}

pub fn sort_by_start_then_name(events: &mut [Event]) {
    events.sort_by(|a, b| compare_start(a, b).then_with(|| compare_name(a, b)));
}

pub fn sort_by_start_then_duration(events: &mut [Event]) {
    events.sort_by(|a, b| {
        compare_start(a, b)
            .then_with(|| {
                let left = derived_duration_type(a).unwrap_or(DurationType::Extended);
                let right = derived_duration_type(b).unwrap_or(DurationType::Extended);
                left.cmp(&right)
            })
            .then_with(|| compare_name(a, b))
    });
}

/// Most-clicked first. Ties keep their incoming order.
pub fn sort_by_clicks(events: &mut [Event]) {
    events.sort_by(|a, b| b.clicks.cmp(&a.clicks));
}

pub fn sort_by_clicks_top_n(mut events: Vec<Event>, n: usize) -> Vec<Event> {
    sort_by_clicks(&mut events);
    events.truncate(n);
    events
}

/// Time slot for `day`: the per-day entry when the event carries one, else
/// the first entry. `None` when `day` is outside the window or there are no
/// times at all.
pub fn times_for_day(event: &Event, day: NaiveDate) -> Option<&EventTime> {
    let (start, end) = event.window()?;
    if day < start || day > end {
        return None;
    }
    let index = usize::try_from((day - start).num_days()).ok()?;
    event.times.get(index).or_else(|| event.times.first())
}

/// `"19:05"` → `"7:05 PM"`. Out-of-range or malformed input yields
/// [`INVALID_TIME`].
pub fn format_time_display(value: &str) -> String {
    match parse_hh_mm(value) {
        Some((hour, minute)) => {
            let period = if hour < 12 { "AM" } else { "PM" };
            let display_hour = match hour % 12 {
                0 => 12,
                h => h,
            };
            format!("{display_hour}:{minute:02} {period}")
        }
        None => INVALID_TIME.to_string(),
    }
}

pub(crate) fn parse_hh_mm(value: &str) -> Option<(u32, u32)> {
    let (hour, minute) = value.trim().split_once(':')?;
    if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
        return None;
    }
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}
