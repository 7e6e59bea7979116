//! Merge fetched activities into the per-date calendar.
//!
//! Each activity lands in the bucket for its start date. An activity whose
//! id already appears as `source_id` in that bucket is a duplicate and is
//! skipped, which makes reconciling the same batch twice a no-op. Local
//! events are never touched.

use chrono::{DateTime, Utc};

use crate::models::{ActivityRecord, CalendarEvents, ReconciledEvent};

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Activities in the fetched batch.
    pub fetched: usize,
    /// Events appended to the calendar.
    pub added: usize,
    /// Activities already present in their bucket.
    pub duplicates: usize,
    /// Activities without a usable start date.
    pub skipped: usize,
}

/// Reconcile `activities` into `calendar`, stamping new events with `synced_at`.
pub fn reconcile(
    calendar: &mut CalendarEvents,
    activities: &[ActivityRecord],
    synced_at: DateTime<Utc>,
) -> ReconcileSummary {
    let mut summary = ReconcileSummary {
        fetched: activities.len(),
        ..Default::default()
    };

    for activity in activities {
        let Some(bucket) = activity.date_bucket() else {
            tracing::warn!(activity_id = %activity.id, start_date = %activity.start_date, "Skipping activity with unparsable date");
            summary.skipped += 1;
            continue;
        };

        let events = calendar.entry(bucket).or_default();
        if events
            .iter()
            .any(|e| e.source_id.as_deref() == Some(activity.id.as_str()))
        {
            summary.duplicates += 1;
            continue;
        }

        events.push(ReconciledEvent::from_activity(activity, synced_at));
        summary.added += 1;
    }

    tracing::debug!(
        fetched = summary.fetched,
        added = summary.added,
        duplicates = summary.duplicates,
        skipped = summary.skipped,
        "Reconciled activities"
    );
    summary
}
