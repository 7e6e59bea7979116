//! Host signals consumed by the orchestrator.

use std::sync::Weak;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::sync::SyncEngine;

/// Notifications from the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    /// The host came back to the foreground; re-check the credential.
    VisibilityResumed,
    /// The local store was changed from outside; re-read the sync flag.
    StorageChanged,
    /// Stop listening.
    Shutdown,
}

/// Spawn the task that applies host signals to the engine.
///
/// The task ends on [`HostSignal::Shutdown`], when every sender is gone, or
/// when the engine has been dropped.
pub(crate) fn spawn_signal_listener(
    engine: Weak<SyncEngine>,
    mut signals: mpsc::UnboundedReceiver<HostSignal>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(signal) = signals.recv().await {
            let Some(engine) = engine.upgrade() else {
                break;
            };
            tracing::debug!(?signal, "Host signal received");

            match signal {
                HostSignal::VisibilityResumed => {
                    engine.monitor().check_status().await;
                }
                HostSignal::StorageChanged => {
                    engine.reload_local_settings().await;
                }
                HostSignal::Shutdown => break,
            }
        }
        tracing::debug!("Signal listener stopped");
    })
}
