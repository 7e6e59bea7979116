//! Calendar events stored locally and mirrored to the user-data document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::activity::ActivityRecord;

/// Date bucket (`YYYY-MM-DD`) → events on that day.
pub type CalendarEvents = BTreeMap<String, Vec<ReconciledEvent>>;

/// Where a calendar event came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    /// Imported from the fitness service
    Remote,
    /// Entered by the user
    #[default]
    Local,
}

/// A calendar event, either imported or user-created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledEvent {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Display label, e.g. "跑步"
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Meters
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(default)]
    pub source: EventSource,
    /// Activity id on the fitness service, for remote events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
}

impl ReconciledEvent {
    /// Build the calendar event for an imported activity.
    pub fn from_activity(activity: &ActivityRecord, synced_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: activity.label().to_string(),
            name: activity.name.clone(),
            distance: activity.distance,
            duration_minutes: activity.duration_minutes(),
            source: EventSource::Remote,
            source_id: Some(activity.id.clone()),
            synced_at: Some(synced_at),
        }
    }

    pub fn is_remote(&self) -> bool {
        self.source == EventSource::Remote
    }
}
