use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::reminder::model::{OffsetKind, Trigger, TriggerHandle};
use crate::reminder::write_atomically;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("notification service rejected the request: {0}")]
    Rejected(String),
    #[error("notification service unavailable: {0}")]
    Unavailable(String),
    #[error("unable to access notification outbox {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("notification outbox {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl NotificationContent {
    pub fn for_trigger(
        title: &str,
        date: &str,
        time: &str,
        reminder_id: Option<&str>,
        offset_kind: OffsetKind,
    ) -> Self {
        let body = match offset_kind {
            OffsetKind::Exact => format!("{title} is due now ({time})"),
            lead => format!("{title} is coming up {lead} ({date} {time})"),
        };
        let mut metadata = BTreeMap::new();
        metadata.insert("date".to_string(), date.to_string());
        metadata.insert("time".to_string(), time.to_string());
        metadata.insert("offsetKind".to_string(), offset_kind_token(offset_kind));
        if let Some(id) = reminder_id {
            metadata.insert("reminderId".to_string(), id.to_string());
        }
        Self {
            title: title.to_string(),
            body,
            metadata,
        }
    }
}

#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn schedule(
        &self,
        content: &NotificationContent,
        fire_at: DateTime<Utc>,
    ) -> Result<TriggerHandle, GatewayError>;

    async fn cancel(&self, handle: &TriggerHandle) -> Result<(), GatewayError>;

    // Fallback only.
    async fn cancel_all(&self) -> Result<(), GatewayError>;
}

pub async fn cancel_best_effort(gateway: &dyn NotificationGateway, triggers: &[Trigger]) -> usize {
    let mut failures = 0;
    for trigger in triggers {
        match gateway.cancel(&trigger.handle).await {
            Ok(()) => debug!(
                "cancelled {} trigger {}",
                trigger.offset_kind, trigger.handle
            ),
            Err(err) => {
                failures += 1;
                warn!(
                    "failed to cancel {} trigger {}: {err}",
                    trigger.offset_kind, trigger.handle
                );
            }
        }
    }
    failures
}

fn offset_kind_token(kind: OffsetKind) -> String {
    match serde_json::to_value(kind) {
        Ok(serde_json::Value::String(token)) => token,
        _ => kind.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingNotification {
    pub handle: TriggerHandle,
    pub fire_at: DateTime<Utc>,
    pub content: NotificationContent,
}

#[derive(Debug, Serialize, Deserialize)]
struct OutboxFile {
    #[serde(default = "outbox_version")]
    version: u32,
    #[serde(default)]
    notifications: Vec<PendingNotification>,
}

fn outbox_version() -> u32 {
    1
}

pub struct OutboxGateway {
    path: PathBuf,
    lock: Mutex<()>,
}

impl OutboxGateway {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pending(&self) -> Result<Vec<PendingNotification>, GatewayError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(self.read()?.notifications)
    }

    fn read(&self) -> Result<OutboxFile, GatewayError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(OutboxFile {
                    version: outbox_version(),
                    notifications: Vec::new(),
                });
            }
            Err(source) => {
                return Err(GatewayError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_str(&content).map_err(|err| GatewayError::Corrupt {
            path: self.path.clone(),
            message: err.to_string(),
        })
    }

    fn write(&self, outbox: &OutboxFile) -> Result<(), GatewayError> {
        let text = serde_json::to_string_pretty(outbox).map_err(|err| GatewayError::Corrupt {
            path: self.path.clone(),
            message: err.to_string(),
        })?;
        write_atomically(&self.path, &format!("{text}\n")).map_err(|source| GatewayError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut OutboxFile) -> T) -> Result<T, GatewayError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut outbox = self.read()?;
        let result = f(&mut outbox);
        self.write(&outbox)?;
        Ok(result)
    }
}

#[async_trait]
impl NotificationGateway for OutboxGateway {
    async fn schedule(
        &self,
        content: &NotificationContent,
        fire_at: DateTime<Utc>,
    ) -> Result<TriggerHandle, GatewayError> {
        let handle = TriggerHandle::new(Uuid::new_v4().to_string());
        let pending = PendingNotification {
            handle: handle.clone(),
            fire_at,
            content: content.clone(),
        };
        self.mutate(|outbox| outbox.notifications.push(pending))?;
        Ok(handle)
    }

    async fn cancel(&self, handle: &TriggerHandle) -> Result<(), GatewayError> {
        let removed = self.mutate(|outbox| {
            let before = outbox.notifications.len();
            outbox.notifications.retain(|pending| &pending.handle != handle);
            before - outbox.notifications.len()
        })?;
        if removed == 0 {
            debug!("cancel of unknown handle {handle} ignored");
        }
        Ok(())
    }

    async fn cancel_all(&self) -> Result<(), GatewayError> {
        self.mutate(|outbox| outbox.notifications.clear())
    }
}
