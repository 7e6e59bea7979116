//! Shared orchestrator state.
//!
//! One [`OrchestratorState`] lives behind a [`StateHandle`]. The lock is a
//! plain `std::sync::Mutex` that is only ever held for a field update, never
//! across an `.await`, so every transition between suspension points is
//! atomic. Outside the crate the state is read-only through snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// Snapshot of the orchestrator's state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorState {
    pub sync_enabled: bool,
    pub credential_valid: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub sync_in_progress: bool,
    pub error_count: u32,
}

/// Shared handle to the single state instance.
#[derive(Debug, Clone, Default)]
pub struct StateHandle {
    inner: Arc<Mutex<OrchestratorState>>,
}

impl StateHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, OrchestratorState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cloned snapshot of the current state.
    pub fn snapshot(&self) -> OrchestratorState {
        self.lock().clone()
    }

    pub fn sync_enabled(&self) -> bool {
        self.lock().sync_enabled
    }

    pub fn credential_valid(&self) -> bool {
        self.lock().credential_valid
    }

    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        self.lock().last_sync_time
    }

    pub fn sync_in_progress(&self) -> bool {
        self.lock().sync_in_progress
    }

    pub fn error_count(&self) -> u32 {
        self.lock().error_count
    }

    pub(crate) fn set_sync_enabled(&self, enabled: bool) {
        self.lock().sync_enabled = enabled;
    }

    pub(crate) fn set_credential_valid(&self, valid: bool) {
        self.lock().credential_valid = valid;
    }

    pub(crate) fn set_last_sync_time(&self, time: Option<DateTime<Utc>>) {
        self.lock().last_sync_time = time;
    }

    pub(crate) fn increment_errors(&self) -> u32 {
        let mut state = self.lock();
        state.error_count = state.error_count.saturating_add(1);
        state.error_count
    }

    pub(crate) fn reset_errors(&self) {
        self.lock().error_count = 0;
    }

    /// Record a finished sync: stamp the time and clear the error counter.
    pub(crate) fn record_success(&self, at: DateTime<Utc>) {
        let mut state = self.lock();
        state.last_sync_time = Some(at);
        state.error_count = 0;
    }

    /// Atomically claim the in-progress flag.
    ///
    /// Returns `None` if a sync is already running. The flag is released
    /// when the returned guard is dropped, on every exit path.
    pub(crate) fn begin_sync(&self) -> Option<SyncGuard> {
        let mut state = self.lock();
        if state.sync_in_progress {
            return None;
        }
        state.sync_in_progress = true;
        Some(SyncGuard {
            state: self.clone(),
        })
    }
}

/// Holds the in-progress flag for the duration of one sync attempt.
#[derive(Debug)]
pub(crate) struct SyncGuard {
    state: StateHandle,
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.state.lock().sync_in_progress = false;
    }
}
