use std::collections::HashSet;
use std::fmt;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// +05:30
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;

const MAX_UTC_OFFSET_MINUTES: i32 = 18 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OffsetKind {
    OneHourBefore,
    ThirtyMinBefore,
    TenMinBefore,
    Exact,
    MinutesBefore(u32),
}

impl OffsetKind {
    pub fn lead_minutes(self) -> u32 {
        match self {
            OffsetKind::OneHourBefore => 60,
            OffsetKind::ThirtyMinBefore => 30,
            OffsetKind::TenMinBefore => 10,
            OffsetKind::Exact => 0,
            OffsetKind::MinutesBefore(minutes) => minutes,
        }
    }
}

impl fmt::Display for OffsetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OffsetKind::OneHourBefore => f.write_str("1 hour before"),
            OffsetKind::ThirtyMinBefore => f.write_str("30 minutes before"),
            OffsetKind::TenMinBefore => f.write_str("10 minutes before"),
            OffsetKind::Exact => f.write_str("at time"),
            OffsetKind::MinutesBefore(minutes) => write!(f, "{minutes} minutes before"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerHandle(String);

impl TriggerHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TriggerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub handle: TriggerHandle,
    pub offset_kind: OffsetKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub title: String,
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReminder {
    pub title: String,
    pub date: String,
    pub time: String,
    pub triggers: Vec<Trigger>,
}

impl NewReminder {
    pub fn with_id(self, id: String) -> Reminder {
        Reminder {
            id,
            title: self.title,
            date: self.date,
            time: self.time,
            triggers: self.triggers,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderPatch {
    pub title: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub triggers: Option<Vec<Trigger>>,
}

impl ReminderPatch {
    pub fn apply_to(self, reminder: &mut Reminder) {
        if let Some(title) = self.title {
            reminder.title = title;
        }
        if let Some(date) = self.date {
            reminder.date = date;
        }
        if let Some(time) = self.time {
            reminder.time = time;
        }
        if let Some(triggers) = self.triggers {
            reminder.triggers = triggers;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderDraft {
    pub id: Option<String>,
    pub title: String,
    pub date: String,
    pub time: String,
}

impl ReminderDraft {
    pub fn new(title: impl Into<String>, date: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            date: date.into(),
            time: time.into(),
        }
    }

    pub fn editing(reminder: &Reminder) -> Self {
        Self {
            id: Some(reminder.id.clone()),
            title: reminder.title.clone(),
            date: reminder.date.clone(),
            time: reminder.time.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceWarning {
    pub kind: OffsetKind,
    pub minutes: u32,
}

impl AdvanceWarning {
    pub const fn new(kind: OffsetKind, minutes: u32) -> Self {
        Self { kind, minutes }
    }
}

pub fn default_advance_warnings() -> Vec<AdvanceWarning> {
    vec![
        AdvanceWarning::new(OffsetKind::OneHourBefore, 60),
        AdvanceWarning::new(OffsetKind::ThirtyMinBefore, 30),
        AdvanceWarning::new(OffsetKind::TenMinBefore, 10),
        AdvanceWarning::new(OffsetKind::Exact, 0),
    ]
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("utc offset of {0} minutes is out of range; expected within -18:00..=+18:00")]
    OffsetOutOfRange(i32),
    #[error("invalid utc offset '{0}', expected +HH:MM or -HH:MM")]
    InvalidOffset(String),
    #[error("advance warning catalogue must contain at least one entry")]
    EmptyCatalogue,
    #[error("duplicate advance warning kind: {0}")]
    DuplicateKind(OffsetKind),
    #[error("advance warning '{kind}' cannot fire {minutes} minutes early")]
    LeadMismatch { kind: OffsetKind, minutes: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderSettings {
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_advance_warnings")]
    pub advance_warnings: Vec<AdvanceWarning>,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            advance_warnings: default_advance_warnings(),
        }
    }
}

impl ReminderSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.utc_offset()?;
        if self.advance_warnings.is_empty() {
            return Err(SettingsError::EmptyCatalogue);
        }
        let mut kinds = HashSet::new();
        for warning in &self.advance_warnings {
            if warning.minutes != warning.kind.lead_minutes() {
                return Err(SettingsError::LeadMismatch {
                    kind: warning.kind,
                    minutes: warning.minutes,
                });
            }
            if !kinds.insert(warning.kind) {
                return Err(SettingsError::DuplicateKind(warning.kind));
            }
        }
        Ok(())
    }

    pub fn utc_offset(&self) -> Result<FixedOffset, SettingsError> {
        if self.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(SettingsError::OffsetOutOfRange(self.utc_offset_minutes));
        }
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .ok_or(SettingsError::OffsetOutOfRange(self.utc_offset_minutes))
    }
}

pub fn parse_utc_offset(input: &str) -> Result<i32, SettingsError> {
    let invalid = || SettingsError::InvalidOffset(input.to_string());
    let (sign, rest) = match input.as_bytes().first() {
        Some(b'+') => (1, &input[1..]),
        Some(b'-') => (-1, &input[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
    if !two_digits(hours) || !two_digits(minutes) {
        return Err(invalid());
    }
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if minutes > 59 {
        return Err(invalid());
    }
    let total = sign * (hours * 60 + minutes);
    if total.abs() > MAX_UTC_OFFSET_MINUTES {
        return Err(SettingsError::OffsetOutOfRange(total));
    }
    Ok(total)
}

fn default_utc_offset_minutes() -> i32 {
    DEFAULT_UTC_OFFSET_MINUTES
}
