//! Store change detection using the `notify` crate.
//!
//! Another process (or the user) editing the store directory shows up as
//! [`HostSignal::StorageChanged`]. The orchestrator re-reads the settings and
//! ignores signals that change nothing, including those caused by its own
//! writes.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tokio::sync::mpsc;

use crate::orchestrator::HostSignal;

/// Watch `dir` and forward settings-file changes as `StorageChanged`.
///
/// Returns the watcher handle. It must be kept alive; dropping it stops
/// watching.
pub fn spawn_store_watcher(
    dir: &Path,
    signals: mpsc::UnboundedSender<HostSignal>,
) -> notify::Result<RecommendedWatcher> {
    std::fs::create_dir_all(dir).map_err(notify::Error::io)?;

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) if is_settings_change(&event) => {
            if signals.send(HostSignal::StorageChanged).is_err() {
                tracing::debug!("Signal listener gone, dropping store change");
            }
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "Store watcher error"),
    })?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;

    tracing::info!(dir = %dir.display(), "Watching store directory");
    Ok(watcher)
}

fn is_settings_change(event: &Event) -> bool {
    let relevant_kind = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    relevant_kind
        && event.paths.iter().any(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".settings.json"))
        })
}
