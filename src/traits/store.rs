//! Local durable store abstraction.
//!
//! Holds the merged calendar and the sync flag, once per user and once
//! globally (the last signed-in user's view).

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{CalendarEvents, SyncSettings};

/// Which slice of the store an operation addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreScope {
    /// Shared across users
    Global,
    /// Keyed by user id
    User(String),
}

impl StoreScope {
    pub fn user(user_id: impl Into<String>) -> Self {
        StoreScope::User(user_id.into())
    }

    /// Stable key fragment used by file-backed stores.
    pub fn key(&self) -> String {
        match self {
            StoreScope::Global => "global".to_string(),
            StoreScope::User(id) => format!("user-{}", urlencoding::encode(id)),
        }
    }
}

/// Store operation errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("store read failed: {0}")]
    ReadFailed(String),
    #[error("store write failed: {0}")]
    WriteFailed(String),
    #[error("stored data is corrupt: {0}")]
    Corrupt(String),
}

/// Trait for the local event store.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Load the calendar for a scope; empty when nothing is stored.
    async fn load_calendar(&self, scope: &StoreScope) -> Result<CalendarEvents, StoreError>;

    /// Replace the calendar for a scope.
    async fn save_calendar(
        &self,
        scope: &StoreScope,
        events: &CalendarEvents,
    ) -> Result<(), StoreError>;

    /// Load sync settings; defaults when nothing is stored.
    async fn load_settings(&self, scope: &StoreScope) -> Result<SyncSettings, StoreError>;

    /// Replace sync settings for a scope.
    async fn save_settings(
        &self,
        scope: &StoreScope,
        settings: &SyncSettings,
    ) -> Result<(), StoreError>;
}
