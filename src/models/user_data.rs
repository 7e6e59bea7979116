//! Remote user-data document and locally persisted sync settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::calendar::CalendarEvents;
use super::deserialize_optional_timestamp;

/// The slice of the remote user-data document the orchestrator reads and writes.
///
/// Absent fields are left out of writes so a smart merge keeps the server's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strava_sync_enabled: Option<bool>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_strava_sync: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_events: Option<CalendarEvents>,
}

/// Body of `GET /api/user-data/{userId}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserDataResponse {
    #[serde(default)]
    pub data: UserData,
}

/// Server-side merge hint for partial writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    Smart,
}

/// Body of `POST /api/user-data/{userId}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDataUpdate<'a> {
    pub data: &'a UserData,
    pub merge_strategy: MergeStrategy,
}

impl<'a> UserDataUpdate<'a> {
    pub fn smart(data: &'a UserData) -> Self {
        Self {
            data,
            merge_strategy: MergeStrategy::Smart,
        }
    }
}

/// Sync flag kept in the local store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    #[serde(default)]
    pub strava_sync_enabled: bool,
}
