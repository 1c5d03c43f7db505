use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::reminder::model::{AdvanceWarning, OffsetKind};
use crate::reminder::time::ReminderInstant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerPlanEntry {
    pub offset_kind: OffsetKind,
    pub fire_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("no trigger for this reminder lies in the future")]
    NoFutureTrigger,
}

pub fn plan_triggers(
    target: &ReminderInstant,
    now: DateTime<Utc>,
    catalogue: &[AdvanceWarning],
) -> Result<Vec<TriggerPlanEntry>, PlanError> {
    let target_utc = target.to_utc();
    let plan: Vec<TriggerPlanEntry> = catalogue
        .iter()
        .filter_map(|warning| {
            let lead = Duration::minutes(i64::from(warning.minutes));
            let fire_at = target_utc.checked_sub_signed(lead)?;
            (fire_at > now).then_some(TriggerPlanEntry {
                offset_kind: warning.kind,
                fire_at,
            })
        })
        .collect();

    if plan.is_empty() {
        return Err(PlanError::NoFutureTrigger);
    }
    Ok(plan)
}
