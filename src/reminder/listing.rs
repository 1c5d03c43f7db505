use std::fmt;

use chrono::{DateTime, Duration, FixedOffset, Utc};

use crate::reminder::model::Reminder;
use crate::reminder::time::parse_reminder_instant;

const UPCOMING_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderCategory {
    Vet,
    Food,
    Walk,
    Medicine,
    Grooming,
    General,
}

impl ReminderCategory {
    // First match wins.
    pub fn from_title(title: &str) -> Self {
        const KEYWORDS: [(ReminderCategory, &[&str]); 5] = [
            (ReminderCategory::Vet, &["vet", "doctor"]),
            (ReminderCategory::Food, &["food", "feed"]),
            (ReminderCategory::Walk, &["walk", "exercise"]),
            (ReminderCategory::Medicine, &["medicine", "medication"]),
            (ReminderCategory::Grooming, &["grooming", "bath"]),
        ];
        let lower = title.to_lowercase();
        KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|word| lower.contains(word)))
            .map(|(category, _)| *category)
            .unwrap_or(ReminderCategory::General)
    }
}

impl fmt::Display for ReminderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReminderCategory::Vet => "vet",
            ReminderCategory::Food => "food",
            ReminderCategory::Walk => "walk",
            ReminderCategory::Medicine => "medicine",
            ReminderCategory::Grooming => "grooming",
            ReminderCategory::General => "general",
        };
        f.write_str(label)
    }
}

pub fn matches_search(reminder: &Reminder, query: &str) -> bool {
    reminder
        .title
        .to_lowercase()
        .contains(&query.trim().to_lowercase())
}

pub fn is_upcoming(reminder: &Reminder, now: DateTime<Utc>, offset: FixedOffset) -> bool {
    let Ok(instant) = parse_reminder_instant(&reminder.date, &reminder.time, offset) else {
        return false;
    };
    let at = instant.to_utc();
    at > now && at <= now + Duration::hours(UPCOMING_WINDOW_HOURS)
}
