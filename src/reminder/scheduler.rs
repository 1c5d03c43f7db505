use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use log::{info, warn};
use thiserror::Error;

use crate::clock::Clock;
use crate::reminder::gateway::{NotificationContent, NotificationGateway, cancel_best_effort};
use crate::reminder::model::{
    NewReminder, OffsetKind, Reminder, ReminderDraft, ReminderPatch, ReminderSettings,
    SettingsError, Trigger,
};
use crate::reminder::planner::{PlanError, TriggerPlanEntry, plan_triggers};
use crate::reminder::store::{ReminderStore, StoreError};
use crate::reminder::time::{ParseError, parse_reminder_instant};

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("reminder title must not be empty")]
    EmptyTitle,
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("invalid time '{0}', expected H:MM AM/PM")]
    InvalidTime(String),
    #[error("'{date} {time}' is not a valid calendar date and time")]
    InvalidInstant { date: String, time: String },
    #[error("reminder time {at} is in the past")]
    PastInstant { at: DateTime<FixedOffset> },
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error("failed to persist reminder")]
    Persistence(#[source] StoreError),
}

impl From<ParseError> for SaveError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::InvalidDate(date) => SaveError::InvalidDate(date),
            ParseError::InvalidTime(time) => SaveError::InvalidTime(time),
            ParseError::InvalidInstant { date, time } => SaveError::InvalidInstant { date, time },
        }
    }
}

#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("failed to delete reminder '{id}'")]
    Persistence {
        id: String,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Complete { scheduled: usize },
    Partial { scheduled: usize, failed: Vec<OffsetKind> },
    Absent { failed: Vec<OffsetKind> },
}

impl ScheduleOutcome {
    fn from_counts(scheduled: usize, failed: Vec<OffsetKind>) -> Self {
        match (scheduled, failed.is_empty()) {
            (_, true) => ScheduleOutcome::Complete { scheduled },
            (0, false) => ScheduleOutcome::Absent { failed },
            (_, false) => ScheduleOutcome::Partial { scheduled, failed },
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ScheduleOutcome::Complete { .. })
    }

    pub fn scheduled(&self) -> usize {
        match self {
            ScheduleOutcome::Complete { scheduled } | ScheduleOutcome::Partial { scheduled, .. } => {
                *scheduled
            }
            ScheduleOutcome::Absent { .. } => 0,
        }
    }

    pub fn failed(&self) -> &[OffsetKind] {
        match self {
            ScheduleOutcome::Complete { .. } => &[],
            ScheduleOutcome::Partial { failed, .. } | ScheduleOutcome::Absent { failed } => failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedReminder {
    pub reminder: Reminder,
    pub outcome: ScheduleOutcome,
}

// Callers must not run two saves for the same reminder concurrently.
pub struct ReminderScheduler {
    store: Arc<dyn ReminderStore>,
    gateway: Arc<dyn NotificationGateway>,
    clock: Arc<dyn Clock>,
    settings: ReminderSettings,
    offset: FixedOffset,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        gateway: Arc<dyn NotificationGateway>,
        clock: Arc<dyn Clock>,
        settings: ReminderSettings,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;
        let offset = settings.utc_offset()?;
        Ok(Self {
            store,
            gateway,
            clock,
            settings,
            offset,
        })
    }

    pub async fn save(
        &self,
        draft: &ReminderDraft,
        previous_triggers: Option<&[Trigger]>,
    ) -> Result<SavedReminder, SaveError> {
        let now = self.clock.now();

        let title = draft.title.trim();
        if title.is_empty() {
            return Err(SaveError::EmptyTitle);
        }
        let instant = parse_reminder_instant(&draft.date, &draft.time, self.offset)?;
        if !instant.is_after(now) {
            return Err(SaveError::PastInstant {
                at: instant.local(),
            });
        }
        let plan = plan_triggers(&instant, now, &self.settings.advance_warnings)?;

        let (triggers, failed) = self.schedule_plan(draft, title, &plan).await;
        let outcome = ScheduleOutcome::from_counts(triggers.len(), failed);

        let persisted = match &draft.id {
            None => {
                self.store
                    .create(NewReminder {
                        title: title.to_string(),
                        date: draft.date.clone(),
                        time: draft.time.clone(),
                        triggers: triggers.clone(),
                    })
                    .await
            }
            Some(id) => {
                self.store
                    .update(
                        id,
                        ReminderPatch {
                            title: Some(title.to_string()),
                            date: Some(draft.date.clone()),
                            time: Some(draft.time.clone()),
                            triggers: Some(triggers.clone()),
                        },
                    )
                    .await
            }
        };

        let reminder = match persisted {
            Ok(reminder) => reminder,
            Err(err) => {
                warn!(
                    "persisting reminder '{title}' failed, rolling back {} scheduled triggers: {err}",
                    triggers.len()
                );
                cancel_best_effort(self.gateway.as_ref(), &triggers).await;
                return Err(SaveError::Persistence(err));
            }
        };

        // Previous triggers stay live until the record stops pointing at them.
        if let Some(previous) = previous_triggers {
            cancel_best_effort(self.gateway.as_ref(), previous).await;
        }

        match &outcome {
            ScheduleOutcome::Complete { scheduled } => {
                info!("reminder {} saved with {scheduled} triggers", reminder.id)
            }
            ScheduleOutcome::Partial { scheduled, failed } => warn!(
                "reminder {} saved with {scheduled} of {} triggers",
                reminder.id,
                scheduled + failed.len()
            ),
            ScheduleOutcome::Absent { .. } => {
                warn!("reminder {} saved without any triggers", reminder.id)
            }
        }
        Ok(SavedReminder { reminder, outcome })
    }

    pub async fn delete(&self, reminder: &Reminder) -> Result<(), DeleteError> {
        cancel_best_effort(self.gateway.as_ref(), &reminder.triggers).await;
        self.store
            .delete(&reminder.id)
            .await
            .map_err(|source| DeleteError::Persistence {
                id: reminder.id.clone(),
                source,
            })?;
        info!("reminder {} deleted", reminder.id);
        Ok(())
    }

    async fn schedule_plan(
        &self,
        draft: &ReminderDraft,
        title: &str,
        plan: &[TriggerPlanEntry],
    ) -> (Vec<Trigger>, Vec<OffsetKind>) {
        let mut triggers = Vec::with_capacity(plan.len());
        let mut failed = Vec::new();
        for entry in plan {
            let content = NotificationContent::for_trigger(
                title,
                &draft.date,
                &draft.time,
                draft.id.as_deref(),
                entry.offset_kind,
            );
            match self.gateway.schedule(&content, entry.fire_at).await {
                Ok(handle) => triggers.push(Trigger {
                    handle,
                    offset_kind: entry.offset_kind,
                }),
                Err(err) => {
                    warn!(
                        "failed to schedule {} trigger for '{title}': {err}",
                        entry.offset_kind
                    );
                    failed.push(entry.offset_kind);
                }
            }
        }
        (triggers, failed)
    }
}
