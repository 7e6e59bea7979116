//! JSON-file backed event store.
//!
//! Layout under the data directory, one pair of files per scope:
//!
//! ```text
//! global.calendar.json
//! global.settings.json
//! user-<id>.calendar.json
//! user-<id>.settings.json
//! ```
//!
//! Writes go to a temporary sibling and are renamed into place so readers
//! never see a half-written file.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::models::{CalendarEvents, SyncSettings};
use crate::traits::{EventStore, StoreError, StoreScope};

/// File-backed [`EventStore`].
#[derive(Debug, Clone)]
pub struct FileEventStore {
    dir: PathBuf,
}

impl FileEventStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the store files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn calendar_path(&self, scope: &StoreScope) -> PathBuf {
        self.dir.join(format!("{}.calendar.json", scope.key()))
    }

    fn settings_path(&self, scope: &StoreScope) -> PathBuf {
        self.dir.join(format!("{}.settings.json", scope.key()))
    }

    async fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => {
                return Err(StoreError::ReadFailed(format!("{}: {}", path.display(), e)))
            }
        };
        serde_json::from_slice(&raw)
            .map_err(|e| StoreError::Corrupt(format!("{}: {}", path.display(), e)))
    }

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let write_err = |e: std::io::Error| StoreError::WriteFailed(format!("{}: {}", path.display(), e));

        let json = serde_json::to_vec_pretty(value)
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        tokio::fs::create_dir_all(&self.dir).await.map_err(write_err)?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(write_err)
    }
}

#[async_trait]
impl EventStore for FileEventStore {
    async fn load_calendar(&self, scope: &StoreScope) -> Result<CalendarEvents, StoreError> {
        Self::read_json(&self.calendar_path(scope)).await
    }

    async fn save_calendar(
        &self,
        scope: &StoreScope,
        events: &CalendarEvents,
    ) -> Result<(), StoreError> {
        let path = self.calendar_path(scope);
        self.write_json(&path, events).await?;
        tracing::debug!(path = %path.display(), days = events.len(), "Calendar saved");
        Ok(())
    }

    async fn load_settings(&self, scope: &StoreScope) -> Result<SyncSettings, StoreError> {
        Self::read_json(&self.settings_path(scope)).await
    }

    async fn save_settings(
        &self,
        scope: &StoreScope,
        settings: &SyncSettings,
    ) -> Result<(), StoreError> {
        self.write_json(&self.settings_path(scope), settings).await
    }
}
