//! iCalendar export of a user's bookmarked events.
//!
//! Every entry is pinned to `America/Los_Angeles`, whatever city the event
//! is in.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use icalendar::{Calendar, Component, EventLike, Property, ValueType};
use tracing::{debug, warn};

use crate::db::{DocumentStore, StoreError};
use crate::models::Event;
use crate::repo;
use crate::schedule::{parse_hh_mm, times_for_day};

pub const FEED_TIMEZONE: &str = "America/Los_Angeles";
pub const FEED_FILENAME: &str = "events.ics";

#[derive(Debug, Clone, PartialEq)]
enum Span {
    Timed(NaiveDateTime, NaiveDateTime),
    AllDay(NaiveDate, NaiveDate),
}

#[derive(Debug)]
pub enum FeedOutcome {
    NoBookmarks,
    NoValidEvents,
    Feed { body: String, events: usize },
}

fn clock(value: &str) -> Option<NaiveTime> {
    let (hour, minute) = parse_hh_mm(value)?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn span_for(event: &Event) -> Option<Span> {
    let (start_date, end_date) = event.window()?;
    let first = times_for_day(event, start_date);
    let Some(start_time) = first.and_then(|slot| clock(&slot.start_time)) else {
        return Some(Span::AllDay(start_date, end_date + Duration::days(1)));
    };
    let start = start_date.and_time(start_time);

    let last = times_for_day(event, end_date);
    let end = match last.and_then(|slot| clock(&slot.end_time)) {
        Some(end_time) => end_date.and_time(end_time),
        None => {
            let last_start = last
                .and_then(|slot| clock(&slot.start_time))
                .unwrap_or(start_time);
            end_date.and_time(last_start) + Duration::hours(1)
        }
    };
    // 21:00-01:00 style slots run past midnight.
    let end = if end <= start { end + Duration::days(1) } else { end };
    Some(Span::Timed(start, end))
}

fn add_span(ics_event: &mut icalendar::Event, span: &Span) {
    match span {
        Span::Timed(start, end) => {
            for (name, value) in [("DTSTART", start), ("DTEND", end)] {
                let mut prop = Property::new(name, value.format("%Y%m%dT%H%M%S").to_string());
                prop.add_parameter("TZID", FEED_TIMEZONE);
                ics_event.append_property(prop);
            }
        }
        Span::AllDay(start, end) => {
            for (name, value) in [("DTSTART", start), ("DTEND", end)] {
                let mut prop = Property::new(name, value.format("%Y%m%d").to_string());
                prop.append_parameter(ValueType::Date);
                ics_event.append_property(prop);
            }
        }
    }
}

fn to_component(event: &Event, dtstamp: &str) -> Option<icalendar::Event> {
    let Some(span) = span_for(event) else {
        warn!(id = %event.id, "event has no usable dates, leaving it out of the feed");
        return None;
    };

    let mut ics_event = icalendar::Event::new();
    ics_event.uid(&format!("{}@happns", event.id));
    ics_event.summary(event.title());
    ics_event.add_property("DTSTAMP", dtstamp);
    add_span(&mut ics_event, &span);

    if !event.details.is_empty() {
        ics_event.description(&event.details);
    }
    let location = [event.location.as_str(), event.city.as_str()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    if !location.is_empty() {
        ics_event.location(&location);
    }
    if !event.link.is_empty() {
        ics_event.add_property("URL", &event.link);
    }
    if !event.category.is_empty() {
        ics_event.add_property("CATEGORIES", event.category.join(","));
    }

    Some(ics_event.done())
}

/// Calendar body with one VEVENT per event that has usable dates, plus the
/// number of VEVENTs written.
pub fn build_feed(events: &[Event]) -> (String, usize) {
    let dtstamp = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    let mut cal = Calendar::new();
    cal.name("happns");
    cal.timezone(FEED_TIMEZONE);

    let mut written = 0;
    for event in events {
        if let Some(component) = to_component(event, &dtstamp) {
            cal.push(component);
            written += 1;
        }
    }
    (cal.done().to_string(), written)
}

/// Resolves `uid`'s bookmarks against the live `events` collection. Bookmarks
/// whose event is gone are ignored.
pub fn feed_for_user(store: &dyn DocumentStore, uid: &str) -> Result<FeedOutcome, StoreError> {
    let bookmarked = repo::bookmarked_event_ids(store, uid)?;
    if bookmarked.is_empty() {
        return Ok(FeedOutcome::NoBookmarks);
    }

    let mut events = Vec::new();
    for id in &bookmarked {
        match repo::get_event(store, repo::EVENTS, id)? {
            Some(event) => events.push(event),
            None => debug!(uid, event_id = %id, "bookmark points at a missing event"),
        }
    }

    let (body, written) = build_feed(&events);
    if written == 0 {
        return Ok(FeedOutcome::NoValidEvents);
    }
    Ok(FeedOutcome::Feed { body, events: written })
}
