use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use regex::Regex;
use thiserror::Error;

static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{4})-([0-9]{2})-([0-9]{2})$").expect("date pattern is valid")
});

static TIME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([0-9]{1,2}):([0-9]{2})\s*(AM|PM)$").expect("time pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("invalid time '{0}', expected H:MM AM/PM")]
    InvalidTime(String),
    #[error("'{date} {time}' is not a valid calendar instant")]
    InvalidInstant { date: String, time: String },
}

/// Absolute point in time a reminder's date and time resolve to. Never stored;
/// always recomputed from the record's strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReminderInstant(DateTime<FixedOffset>);

impl ReminderInstant {
    pub fn local(&self) -> DateTime<FixedOffset> {
        self.0
    }

    pub fn to_utc(&self) -> DateTime<Utc> {
        self.0.with_timezone(&Utc)
    }

    pub fn is_after(&self, now: DateTime<Utc>) -> bool {
        self.to_utc() > now
    }

    pub fn format_date(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }

    // No leading zero on the hour.
    pub fn format_time(&self) -> String {
        let (is_pm, hour12) = self.0.hour12();
        let meridiem = if is_pm { "PM" } else { "AM" };
        format!("{hour12}:{:02} {meridiem}", self.0.minute())
    }
}

impl fmt::Display for ReminderInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.format_date(), self.format_time())
    }
}

pub fn parse_reminder_instant(
    date: &str,
    time: &str,
    offset: FixedOffset,
) -> Result<ReminderInstant, ParseError> {
    let (year, month, day) = parse_date_fields(date)?;
    let (hour, minute) = parse_time_fields(time)?;

    let invalid_instant = || ParseError::InvalidInstant {
        date: date.to_string(),
        time: time.to_string(),
    };
    let calendar_date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid_instant)?;
    let clock_time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid_instant)?;
    let resolved = offset
        .from_local_datetime(&calendar_date.and_time(clock_time))
        .single()
        .ok_or_else(invalid_instant)?;
    Ok(ReminderInstant(resolved))
}

pub fn to_24_hour(hour12: u32, is_pm: bool) -> u32 {
    match (hour12, is_pm) {
        (12, false) => 0,
        (12, true) => 12,
        (hour, true) => hour + 12,
        (hour, false) => hour,
    }
}

fn parse_date_fields(date: &str) -> Result<(i32, u32, u32), ParseError> {
    let invalid = || ParseError::InvalidDate(date.to_string());
    let caps = DATE_PATTERN.captures(date).ok_or_else(invalid)?;
    let year = caps[1].parse::<i32>().map_err(|_| invalid())?;
    let month = caps[2].parse::<u32>().map_err(|_| invalid())?;
    let day = caps[3].parse::<u32>().map_err(|_| invalid())?;
    Ok((year, month, day))
}

fn parse_time_fields(time: &str) -> Result<(u32, u32), ParseError> {
    let invalid = || ParseError::InvalidTime(time.to_string());
    let caps = TIME_PATTERN.captures(time).ok_or_else(invalid)?;
    let hour12 = caps[1].parse::<u32>().map_err(|_| invalid())?;
    let minute = caps[2].parse::<u32>().map_err(|_| invalid())?;
    if !(1..=12).contains(&hour12) || minute > 59 {
        return Err(invalid());
    }
    let is_pm = caps[3].eq_ignore_ascii_case("PM");
    Ok((to_24_hour(hour12, is_pm), minute))
}
