//! In-memory event store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::models::{CalendarEvents, SyncSettings};
use crate::traits::{EventStore, StoreError, StoreScope};

#[derive(Debug, Default)]
struct StoreData {
    calendars: HashMap<StoreScope, CalendarEvents>,
    settings: HashMap<StoreScope, SyncSettings>,
    calendar_writes: usize,
    read_should_fail: bool,
    write_should_fail: bool,
}

/// In-memory [`EventStore`]. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    data: Arc<Mutex<StoreData>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calendar(&self, scope: &StoreScope) -> CalendarEvents {
        self.data
            .lock()
            .unwrap()
            .calendars
            .get(scope)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_calendar(&self, scope: StoreScope, events: CalendarEvents) {
        self.data.lock().unwrap().calendars.insert(scope, events);
    }

    pub fn settings(&self, scope: &StoreScope) -> SyncSettings {
        self.data
            .lock()
            .unwrap()
            .settings
            .get(scope)
            .copied()
            .unwrap_or_default()
    }

    pub fn set_settings(&self, scope: StoreScope, settings: SyncSettings) {
        self.data.lock().unwrap().settings.insert(scope, settings);
    }

    /// Number of successful `save_calendar` calls.
    pub fn calendar_writes(&self) -> usize {
        self.data.lock().unwrap().calendar_writes
    }

    pub fn set_read_should_fail(&self, should_fail: bool) {
        self.data.lock().unwrap().read_should_fail = should_fail;
    }

    pub fn set_write_should_fail(&self, should_fail: bool) {
        self.data.lock().unwrap().write_should_fail = should_fail;
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn load_calendar(&self, scope: &StoreScope) -> Result<CalendarEvents, StoreError> {
        let data = self.data.lock().unwrap();
        if data.read_should_fail {
            return Err(StoreError::ReadFailed("Mock read failure".to_string()));
        }
        Ok(data.calendars.get(scope).cloned().unwrap_or_default())
    }

    async fn save_calendar(
        &self,
        scope: &StoreScope,
        events: &CalendarEvents,
    ) -> Result<(), StoreError> {
        let mut data = self.data.lock().unwrap();
        if data.write_should_fail {
            return Err(StoreError::WriteFailed("Mock write failure".to_string()));
        }
        data.calendars.insert(scope.clone(), events.clone());
        data.calendar_writes += 1;
        Ok(())
    }

    async fn load_settings(&self, scope: &StoreScope) -> Result<SyncSettings, StoreError> {
        let data = self.data.lock().unwrap();
        if data.read_should_fail {
            return Err(StoreError::ReadFailed("Mock read failure".to_string()));
        }
        Ok(data.settings.get(scope).copied().unwrap_or_default())
    }

    async fn save_settings(
        &self,
        scope: &StoreScope,
        settings: &SyncSettings,
    ) -> Result<(), StoreError> {
        let mut data = self.data.lock().unwrap();
        if data.write_should_fail {
            return Err(StoreError::WriteFailed("Mock write failure".to_string()));
        }
        data.settings.insert(scope.clone(), *settings);
        Ok(())
    }
}
