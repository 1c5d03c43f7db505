use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};

use crate::clock::FixedClock;
use crate::reminder::gateway::{GatewayError, NotificationContent, NotificationGateway};
use crate::reminder::model::{NewReminder, OffsetKind, Reminder, ReminderPatch, TriggerHandle};
use crate::reminder::store::{InMemoryReminderStore, ReminderStore, StoreError};

pub(crate) fn ist() -> FixedOffset {
    FixedOffset::east_opt(330 * 60).expect("valid offset")
}

pub(crate) fn ist_instant(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    ist()
        .with_ymd_and_hms(y, mo, d, h, mi, 0)
        .single()
        .expect("valid instant")
        .with_timezone(&Utc)
}

pub(crate) fn clock_at(at: DateTime<Utc>) -> Arc<FixedClock> {
    Arc::new(FixedClock::new(at))
}

#[derive(Debug, Clone)]
pub(crate) struct LiveNotification {
    pub content: NotificationContent,
    pub fire_at: DateTime<Utc>,
}

#[derive(Default)]
struct GatewayState {
    next_handle: u32,
    live: BTreeMap<TriggerHandle, LiveNotification>,
    schedule_calls: usize,
    cancel_calls: Vec<TriggerHandle>,
    failing_kinds: HashSet<String>,
    fail_cancels: bool,
}

#[derive(Default)]
pub(crate) struct RecordingGateway {
    state: Mutex<GatewayState>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_schedules_for(&self, kind: OffsetKind) {
        let token = serde_json::to_value(kind)
            .ok()
            .and_then(|value| value.as_str().map(str::to_string))
            .expect("offset kind token");
        self.state().failing_kinds.insert(token);
    }

    pub fn fail_cancels(&self) {
        self.state().fail_cancels = true;
    }

    pub fn live(&self) -> BTreeMap<TriggerHandle, LiveNotification> {
        self.state().live.clone()
    }

    pub fn live_fire_times(&self) -> Vec<DateTime<Utc>> {
        let mut times: Vec<_> = self.state().live.values().map(|n| n.fire_at).collect();
        times.sort();
        times
    }

    pub fn schedule_calls(&self) -> usize {
        self.state().schedule_calls
    }

    pub fn cancel_calls(&self) -> Vec<TriggerHandle> {
        self.state().cancel_calls.clone()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn schedule(
        &self,
        content: &NotificationContent,
        fire_at: DateTime<Utc>,
    ) -> Result<TriggerHandle, GatewayError> {
        let mut state = self.state();
        state.schedule_calls += 1;
        let kind = content.metadata.get("offsetKind").cloned().unwrap_or_default();
        if state.failing_kinds.contains(&kind) {
            return Err(GatewayError::Rejected(format!("{kind} refused")));
        }
        state.next_handle += 1;
        let handle = TriggerHandle::new(format!("h-{}", state.next_handle));
        state.live.insert(
            handle.clone(),
            LiveNotification {
                content: content.clone(),
                fire_at,
            },
        );
        Ok(handle)
    }

    async fn cancel(&self, handle: &TriggerHandle) -> Result<(), GatewayError> {
        let mut state = self.state();
        state.cancel_calls.push(handle.clone());
        if state.fail_cancels {
            return Err(GatewayError::Unavailable("cancel refused".to_string()));
        }
        state.live.remove(handle);
        Ok(())
    }

    async fn cancel_all(&self) -> Result<(), GatewayError> {
        self.state().live.clear();
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FlakyStore {
    inner: InMemoryReminderStore,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
}

impl FlakyStore {
    pub fn with_reminders(reminders: Vec<Reminder>) -> Self {
        Self {
            inner: InMemoryReminderStore::with_reminders(reminders),
            ..Self::default()
        }
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ReminderStore for FlakyStore {
    async fn create(&self, reminder: NewReminder) -> Result<Reminder, StoreError> {
        Self::check(&self.fail_writes)?;
        self.inner.create(reminder).await
    }

    async fn get_all(&self) -> Result<Vec<Reminder>, StoreError> {
        self.inner.get_all().await
    }

    async fn update(&self, id: &str, patch: ReminderPatch) -> Result<Reminder, StoreError> {
        Self::check(&self.fail_writes)?;
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        Self::check(&self.fail_deletes)?;
        self.inner.delete(id).await
    }
}
