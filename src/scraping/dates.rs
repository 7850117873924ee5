//! Scraped date and time strings → canonical `startDate`/`endDate`/`times`.
//!
//! Listing pages omit the year, so dates are stamped with the year of the
//! scrape. Nothing corrects for year rollover: a "Jan 3" scraped in late
//! December lands in the current year.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use super::base::clean_text;
use crate::models::{DurationType, EventTime};

static CLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d{1,2})(?::(\d{2}))?\s*(a\.?\s?m\.?|p\.?\s?m\.?)?").expect("valid clock regex")
});
static DAY_RE: Lazy<Regex> =
    Lazy::new(|| {
        Regex::new(r"^(\d{1,2})(?:st|nd|rd|th)?(?:-\d{1,2}(?:st|nd|rd|th)?)?$").expect("valid day regex")
    });

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

#[derive(Debug, Error, PartialEq)]
pub enum DateParseError {
    #[error("no recognizable date in {0:?}")]
    Date(String),
    #[error("no recognizable time in {0:?}")]
    Time(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedSchedule {
    pub start_date: String,
    pub end_date: String,
    pub times: Vec<EventTime>,
    pub duration: DurationType,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Meridiem {
    Am,
    Pm,
}

#[derive(Debug, Clone, Copy)]
struct Clock {
    hour: u32,
    minute: u32,
    meridiem: Option<Meridiem>,
}

fn month_number(token: &str) -> Option<u32> {
    let lowered = token.to_lowercase();
    if lowered.len() < 3 || !lowered.chars().all(|ch| ch.is_ascii_alphabetic()) {
        return None;
    }
    if lowered == "sept" {
        return Some(9);
    }
    MONTHS
        .iter()
        .position(|month| month.starts_with(lowered.as_str()))
        .map(|index| index as u32 + 1)
}

/// "Monday Dec 25", "Sat, June 1st", "12/25" or "Dec 25, 2026". A missing
/// year is taken from `now`. For a day range ("Dec 1-3") the first day is
/// used.
pub fn parse_scraped_date(text: &str, now: NaiveDateTime) -> Result<NaiveDate, DateParseError> {
    let cleaned = clean_text(&text.replace([',', '.'], " ").replace(['–', '—'], "-"));
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    let fail = || DateParseError::Date(text.to_string());

    for (index, token) in tokens.iter().enumerate() {
        if let Some(month) = month_number(token) {
            let Some(day_token) = tokens.get(index + 1) else {
                continue;
            };
            let Some(day) = DAY_RE
                .captures(day_token)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok())
            else {
                continue;
            };
            let year = tokens
                .get(index + 2)
                .filter(|t| t.len() == 4)
                .and_then(|t| t.parse::<i32>().ok())
                .unwrap_or_else(|| now.year());
            return NaiveDate::from_ymd_opt(year, month, day).ok_or_else(fail);
        }

        let parts: Vec<&str> = token.split('/').collect();
        if parts.len() == 2 || parts.len() == 3 {
            let month = parts[0].parse::<u32>().ok();
            let day = parts[1].parse::<u32>().ok();
            let year = match parts.get(2) {
                Some(raw) => raw.parse::<i32>().ok().map(|y| if y < 100 { 2000 + y } else { y }),
                None => Some(now.year()),
            };
            if let (Some(month), Some(day), Some(year)) = (month, day, year) {
                return NaiveDate::from_ymd_opt(year, month, day).ok_or_else(fail);
            }
        }
    }

    Err(fail())
}

fn parse_clock(text: &str) -> Option<Clock> {
    let lowered = text.to_lowercase();
    if lowered.contains("noon") {
        return Some(Clock { hour: 12, minute: 0, meridiem: Some(Meridiem::Pm) });
    }
    if lowered.contains("midnight") {
        return Some(Clock { hour: 12, minute: 0, meridiem: Some(Meridiem::Am) });
    }
    // "Dec 1, 7pm" holds two numbers; the one carrying am/pm wins, else the
    // last one.
    let caps = CLOCK_RE
        .captures_iter(&lowered)
        .find(|caps| caps.get(3).is_some())
        .or_else(|| CLOCK_RE.captures_iter(&lowered).last())?;
    let hour = caps.get(1)?.as_str().parse().ok()?;
    let minute = caps
        .get(2)
        .map(|m| m.as_str().parse().ok())
        .unwrap_or(Some(0))?;
    let meridiem = caps.get(3).map(|m| {
        if m.as_str().starts_with('a') {
            Meridiem::Am
        } else {
            Meridiem::Pm
        }
    });
    Some(Clock { hour, minute, meridiem })
}

fn to_24h(clock: Clock, fallback: Option<Meridiem>) -> Option<String> {
    if clock.minute > 59 {
        return None;
    }
    let hour = match clock.meridiem.or(fallback) {
        Some(meridiem) => {
            if !(1..=12).contains(&clock.hour) {
                return None;
            }
            match (meridiem, clock.hour) {
                (Meridiem::Am, 12) => 0,
                (Meridiem::Am, h) => h,
                (Meridiem::Pm, 12) => 12,
                (Meridiem::Pm, h) => h + 12,
            }
        }
        None if clock.hour <= 23 => clock.hour,
        None => return None,
    };
    Some(format!("{hour:02}:{:02}", clock.minute))
}

/// "7:30 pm" or "7:30 pm - 9:30 pm" → 24-hour start/end. A missing end time
/// stays empty; "7 - 9pm" borrows the end's meridiem for the start.
pub fn parse_time_range(text: &str) -> Result<EventTime, DateParseError> {
    let normalized = clean_text(&text.replace(['–', '—'], "-"));
    let fail = || DateParseError::Time(text.to_string());

    let (start_part, end_part) = match normalized.split_once('-') {
        Some((start, end)) => (start, Some(end)),
        None => (normalized.as_str(), None),
    };

    let start = parse_clock(start_part).ok_or_else(fail)?;
    let end = end_part.and_then(parse_clock);

    let start_time = to_24h(start, end.and_then(|clock| clock.meridiem)).ok_or_else(fail)?;
    let end_time = end
        .and_then(|clock| to_24h(clock, start.meridiem))
        .unwrap_or_default();

    Ok(EventTime::new(start_time, end_time))
}

fn try_normalize(
    date_text: &str,
    time_text: Option<&str>,
    now: NaiveDateTime,
) -> Result<ScrapedSchedule, DateParseError> {
    let date = parse_scraped_date(date_text, now)?;
    if date < now.date() {
        debug!(date_text, %date, "scraped date is already past in the current year");
    }
    let times = match time_text.map(str::trim).filter(|t| !t.is_empty()) {
        Some(text) => parse_time_range(text)?,
        None => EventTime::default(),
    };
    let iso = date.format("%Y-%m-%d").to_string();
    Ok(ScrapedSchedule {
        start_date: iso.clone(),
        end_date: iso,
        times: vec![times],
        duration: DurationType::Single,
    })
}

/// Scraped events are always single-day. Any parse failure falls back to
/// today's date with empty times.
pub fn normalize_schedule(
    date_text: &str,
    time_text: Option<&str>,
    now: NaiveDateTime,
) -> ScrapedSchedule {
    match try_normalize(date_text, time_text, now) {
        Ok(schedule) => schedule,
        Err(err) => {
            warn!(date_text, time_text = ?time_text, error = %err, "falling back to today for scraped schedule");
            let today = now.date().format("%Y-%m-%d").to_string();
            ScrapedSchedule {
                start_date: today.clone(),
                end_date: today,
                times: vec![EventTime::default()],
                duration: DurationType::Single,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_listing_dates_with_implicit_year() {
        assert_eq!(parse_scraped_date("Monday Dec 25", now()), Ok(date(2025, 12, 25)));
        assert_eq!(parse_scraped_date("Sat, June 7th", now()), Ok(date(2025, 6, 7)));
        assert_eq!(parse_scraped_date("Sept. 3", now()), Ok(date(2025, 9, 3)));
        assert_eq!(parse_scraped_date("6/14", now()), Ok(date(2025, 6, 14)));
        assert_eq!(parse_scraped_date("Jan 2, 2026", now()), Ok(date(2026, 1, 2)));
    }

    #[test]
    fn day_ranges_keep_their_first_day() {
        assert_eq!(parse_scraped_date("Dec 1-3", now()), Ok(date(2025, 12, 1)));
        assert_eq!(parse_scraped_date("Fri, Dec 5th–7th", now()), Ok(date(2025, 12, 5)));
        assert_eq!(parse_scraped_date("Dec 1 - 3", now()), Ok(date(2025, 12, 1)));

        let schedule = normalize_schedule("Dec 1-3", None, now());
        assert_eq!(schedule.start_date, "2025-12-01");
        assert_eq!(schedule.end_date, "2025-12-01");
        assert_eq!(schedule.duration, DurationType::Single);
    }

    #[test]
    fn no_year_rollover_correction() {
        let late_december = NaiveDate::from_ymd_opt(2025, 12, 30)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(
            parse_scraped_date("Friday Jan 2", late_december),
            Ok(date(2025, 1, 2))
        );
    }

    #[test]
    fn rejects_impossible_dates() {
        assert!(parse_scraped_date("Feb 30", now()).is_err());
        assert!(parse_scraped_date("Tonight!", now()).is_err());
    }

    #[test]
    fn parses_time_ranges() {
        assert_eq!(parse_time_range("7:30 pm"), Ok(EventTime::new("19:30", "")));
        assert_eq!(
            parse_time_range("7:30 pm - 9:30 pm"),
            Ok(EventTime::new("19:30", "21:30"))
        );
        assert_eq!(parse_time_range("7 - 10PM"), Ok(EventTime::new("19:00", "22:00")));
        assert_eq!(
            parse_time_range("11:00 a.m. – 2:00 p.m."),
            Ok(EventTime::new("11:00", "14:00"))
        );
        assert_eq!(parse_time_range("Noon-3pm"), Ok(EventTime::new("12:00", "15:00")));
        assert_eq!(parse_time_range("9pm - late"), Ok(EventTime::new("21:00", "")));
        assert!(parse_time_range("all day").is_err());
    }

    #[test]
    fn leading_date_numbers_are_not_clock_times() {
        assert_eq!(parse_time_range("Dec 1, 7pm"), Ok(EventTime::new("19:00", "")));
        assert_eq!(
            parse_time_range("Dec 1, 7 - 9pm"),
            Ok(EventTime::new("19:00", "21:00"))
        );
    }

    #[test]
    fn normalizes_single_day_schedule() {
        let schedule = normalize_schedule("Monday Dec 25", Some("7:30 pm - 9:30 pm"), now());
        assert_eq!(schedule.start_date, "2025-12-25");
        assert_eq!(schedule.end_date, "2025-12-25");
        assert_eq!(schedule.times, vec![EventTime::new("19:30", "21:30")]);
        assert_eq!(schedule.duration, DurationType::Single);

        let untimed = normalize_schedule("Dec 25", None, now());
        assert_eq!(untimed.times, vec![EventTime::default()]);
        assert_eq!(untimed.start_date, "2025-12-25");
    }

    #[test]
    fn falls_back_to_today() {
        for (date_text, time_text) in [("whenever", Some("7pm")), ("Dec 25", Some("TBA"))] {
            let schedule = normalize_schedule(date_text, time_text, now());
            assert_eq!(schedule.start_date, "2025-06-01");
            assert_eq!(schedule.end_date, "2025-06-01");
            assert_eq!(schedule.times, vec![EventTime::default()]);
        }
    }
}
