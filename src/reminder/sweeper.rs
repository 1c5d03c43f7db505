use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use log::{debug, info, warn};

use crate::clock::Clock;
use crate::reminder::gateway::{NotificationGateway, cancel_best_effort};
use crate::reminder::model::{Reminder, ReminderSettings, SettingsError};
use crate::reminder::store::{ReminderStore, StoreError};
use crate::reminder::time::{ParseError, parse_reminder_instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    Lapsed,
    Malformed(ParseError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub kept: usize,
    pub lapsed: usize,
    pub malformed: usize,
    pub cancel_failures: usize,
    pub delete_failures: usize,
}

impl SweepReport {
    pub fn removed(&self) -> usize {
        self.lapsed + self.malformed
    }
}

pub fn staleness(reminder: &Reminder, now: DateTime<Utc>, offset: FixedOffset) -> Option<Staleness> {
    match parse_reminder_instant(&reminder.date, &reminder.time, offset) {
        Ok(instant) if instant.is_after(now) => None,
        Ok(_) => Some(Staleness::Lapsed),
        Err(err) => Some(Staleness::Malformed(err)),
    }
}

pub struct ReminderSweeper {
    store: Arc<dyn ReminderStore>,
    gateway: Arc<dyn NotificationGateway>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl ReminderSweeper {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        gateway: Arc<dyn NotificationGateway>,
        clock: Arc<dyn Clock>,
        settings: &ReminderSettings,
    ) -> Result<Self, SettingsError> {
        Ok(Self {
            store,
            gateway,
            clock,
            offset: settings.utc_offset()?,
        })
    }

    pub async fn sweep(&self, reminders: Vec<Reminder>) -> Vec<Reminder> {
        self.sweep_with_report(reminders).await.0
    }

    pub async fn sweep_store(&self) -> Result<Vec<Reminder>, StoreError> {
        let reminders = self.store.get_all().await?;
        Ok(self.sweep(reminders).await)
    }

    pub async fn sweep_with_report(&self, reminders: Vec<Reminder>) -> (Vec<Reminder>, SweepReport) {
        let now = self.clock.now();
        let mut report = SweepReport::default();
        let mut valid = Vec::with_capacity(reminders.len());

        for reminder in reminders {
            let Some(reason) = staleness(&reminder, now, self.offset) else {
                report.kept += 1;
                valid.push(reminder);
                continue;
            };
            match &reason {
                Staleness::Lapsed => {
                    report.lapsed += 1;
                    debug!("reminder {} lapsed at {} {}", reminder.id, reminder.date, reminder.time);
                }
                Staleness::Malformed(err) => {
                    report.malformed += 1;
                    debug!("reminder {} is malformed: {err}", reminder.id);
                }
            }

            report.cancel_failures +=
                cancel_best_effort(self.gateway.as_ref(), &reminder.triggers).await;
            if let Err(err) = self.store.delete(&reminder.id).await {
                report.delete_failures += 1;
                warn!("failed to delete stale reminder {}: {err}", reminder.id);
            }
        }

        if report.removed() > 0 {
            info!(
                "sweep kept {} reminders, removed {} lapsed and {} malformed",
                report.kept, report.lapsed, report.malformed
            );
        }
        (valid, report)
    }
}
