use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::reminder::model::{NewReminder, Reminder, ReminderPatch, ReminderSettings, SettingsError};
use crate::reminder::write_atomically;

const STORE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("reminder '{0}' not found")]
    NotFound(String),
    #[error("reminder store unavailable: {0}")]
    Unavailable(String),
    #[error("unable to access reminder store {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Format(String),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

#[async_trait]
pub trait ReminderStore: Send + Sync {
    async fn create(&self, reminder: NewReminder) -> Result<Reminder, StoreError>;
    async fn get_all(&self) -> Result<Vec<Reminder>, StoreError>;
    async fn update(&self, id: &str, patch: ReminderPatch) -> Result<Reminder, StoreError>;
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

pub struct InMemoryReminderStore {
    reminders: Mutex<Vec<Reminder>>,
}

impl InMemoryReminderStore {
    pub fn new() -> Self {
        Self::with_reminders(Vec::new())
    }

    pub fn with_reminders(reminders: Vec<Reminder>) -> Self {
        Self {
            reminders: Mutex::new(reminders),
        }
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, Vec<Reminder>> {
        self.reminders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for InMemoryReminderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReminderStore for InMemoryReminderStore {
    async fn create(&self, reminder: NewReminder) -> Result<Reminder, StoreError> {
        let created = reminder.with_id(Uuid::new_v4().to_string());
        self.locked().push(created.clone());
        Ok(created)
    }

    async fn get_all(&self) -> Result<Vec<Reminder>, StoreError> {
        Ok(self.locked().clone())
    }

    async fn update(&self, id: &str, patch: ReminderPatch) -> Result<Reminder, StoreError> {
        let mut reminders = self.locked();
        let reminder = reminders
            .iter_mut()
            .find(|reminder| reminder.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        patch.apply_to(reminder);
        Ok(reminder.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut reminders = self.locked();
        let before = reminders.len();
        reminders.retain(|reminder| reminder.id != id);
        if reminders.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreFile {
    pub version: u32,
    #[serde(default)]
    pub settings: ReminderSettings,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
}

impl Default for StoreFile {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            settings: ReminderSettings::default(),
            reminders: Vec::new(),
        }
    }
}

pub fn load_store_file(path: &Path) -> Result<StoreFile, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(StoreFile::default()),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    parse_store_text(&content)
}

// Structure only: malformed dates and times are left for the sweep.
pub fn parse_store_text(content: &str) -> Result<StoreFile, StoreError> {
    let store = serde_json::from_str::<StoreFile>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        StoreError::Format(format!("invalid JSON at line {line}, column {column}: {err}"))
    })?;

    if store.version != STORE_VERSION {
        return Err(StoreError::Format(format!(
            "unsupported reminder store version {}; expected version {STORE_VERSION}",
            store.version
        )));
    }
    store.settings.validate()?;

    let mut ids = HashSet::new();
    for reminder in &store.reminders {
        if !ids.insert(reminder.id.as_str()) {
            return Err(StoreError::Format(format!(
                "duplicate reminder id found: {}",
                reminder.id
            )));
        }
    }
    Ok(store)
}

pub fn save_store_file(path: &Path, store: &StoreFile) -> Result<(), StoreError> {
    let text = serde_json::to_string_pretty(store)
        .map_err(|err| StoreError::Format(format!("unable to encode reminder store: {err}")))?;
    write_atomically(path, &format!("{text}\n")).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> Result<ReminderSettings, StoreError> {
        Ok(load_store_file(&self.path)?.settings)
    }

    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut StoreFile) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut store = load_store_file(&self.path)?;
        let result = f(&mut store)?;
        save_store_file(&self.path, &store)?;
        Ok(result)
    }
}

#[async_trait]
impl ReminderStore for JsonFileStore {
    async fn create(&self, reminder: NewReminder) -> Result<Reminder, StoreError> {
        self.mutate(|store| {
            let created = reminder.with_id(Uuid::new_v4().to_string());
            store.reminders.push(created.clone());
            Ok(created)
        })
    }

    async fn get_all(&self) -> Result<Vec<Reminder>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(load_store_file(&self.path)?.reminders)
    }

    async fn update(&self, id: &str, patch: ReminderPatch) -> Result<Reminder, StoreError> {
        self.mutate(|store| {
            let reminder = store
                .reminders
                .iter_mut()
                .find(|reminder| reminder.id == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            patch.apply_to(reminder);
            Ok(reminder.clone())
        })
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.mutate(|store| {
            let before = store.reminders.len();
            store.reminders.retain(|reminder| reminder.id != id);
            if store.reminders.len() == before {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Ok(())
        })
    }
}
