//! Orchestrator lifecycle events and the bus that fans them out.
//!
//! Observers are called synchronously, in subscription order, on the task
//! that publishes. A failing or panicking observer is logged and counted;
//! it never stops delivery to the others and never touches orchestrator
//! state.

use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::sync::OrchestratorState;

/// Why a sync cycle failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "FailurePayload", from = "FailurePayload")]
pub enum SyncFailure {
    /// The credential was rejected and could not be refreshed.
    CredentialExpired,
    /// Any other failure, with a human-readable message.
    Error(String),
}

impl SyncFailure {
    pub fn error(message: impl Into<String>) -> Self {
        SyncFailure::Error(message.into())
    }
}

/// Wire shape: `{reason: "credential_expired"}` or `{error: "..."}`.
#[derive(Serialize, Deserialize)]
struct FailurePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

const CREDENTIAL_EXPIRED: &str = "credential_expired";

impl From<SyncFailure> for FailurePayload {
    fn from(failure: SyncFailure) -> Self {
        match failure {
            SyncFailure::CredentialExpired => FailurePayload {
                reason: Some(CREDENTIAL_EXPIRED.to_string()),
                error: None,
            },
            SyncFailure::Error(message) => FailurePayload {
                reason: None,
                error: Some(message),
            },
        }
    }
}

impl From<FailurePayload> for SyncFailure {
    fn from(payload: FailurePayload) -> Self {
        match (payload.reason, payload.error) {
            (Some(reason), _) if reason == CREDENTIAL_EXPIRED => SyncFailure::CredentialExpired,
            (_, Some(error)) => SyncFailure::Error(error),
            (Some(other), None) => SyncFailure::Error(other),
            (None, None) => SyncFailure::Error(String::new()),
        }
    }
}

/// Events announced by the orchestrator.
///
/// Serializes as `{"event": "<name>", "payload": ...}`; events without data
/// carry no payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum OrchestratorEvent {
    StateLoaded(OrchestratorState),
    CredentialStatusChanged {
        valid: bool,
    },
    CredentialRefreshed,
    SyncStarted,
    #[serde(rename_all = "camelCase")]
    SyncCompleted {
        activity_count: usize,
        new_events: usize,
    },
    SyncFailed(SyncFailure),
    SyncEnabled,
    SyncDisabled,
}

impl OrchestratorEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            OrchestratorEvent::StateLoaded(_) => "stateLoaded",
            OrchestratorEvent::CredentialStatusChanged { .. } => "credentialStatusChanged",
            OrchestratorEvent::CredentialRefreshed => "credentialRefreshed",
            OrchestratorEvent::SyncStarted => "syncStarted",
            OrchestratorEvent::SyncCompleted { .. } => "syncCompleted",
            OrchestratorEvent::SyncFailed(_) => "syncFailed",
            OrchestratorEvent::SyncEnabled => "syncEnabled",
            OrchestratorEvent::SyncDisabled => "syncDisabled",
        }
    }
}

/// Error returned by an observer that could not handle an event.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ObserverError(pub String);

/// Receives orchestrator events.
///
/// Any `Fn(&OrchestratorEvent) -> Result<(), ObserverError>` closure is an
/// observer.
pub trait Observer: Send + Sync {
    fn on_event(&self, event: &OrchestratorEvent) -> Result<(), ObserverError>;

    /// Closed observers are dropped from the bus on the next publish.
    fn is_closed(&self) -> bool {
        false
    }
}

impl<F> Observer for F
where
    F: Fn(&OrchestratorEvent) -> Result<(), ObserverError> + Send + Sync,
{
    fn on_event(&self, event: &OrchestratorEvent) -> Result<(), ObserverError> {
        self(event)
    }
}

/// Forwards events into a tokio channel.
struct ChannelObserver {
    sender: mpsc::UnboundedSender<OrchestratorEvent>,
}

impl Observer for ChannelObserver {
    fn on_event(&self, event: &OrchestratorEvent) -> Result<(), ObserverError> {
        self.sender
            .send(event.clone())
            .map_err(|_| ObserverError("event receiver dropped".to_string()))
    }

    fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Handle for removing an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Outcome of one publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Typed fan-out of [`OrchestratorEvent`]s.
#[derive(Default)]
pub struct EventBus {
    observers: Mutex<Vec<(ObserverId, Arc<dyn Observer>)>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.observer_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(ObserverId, Arc<dyn Observer>)>> {
        self.observers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register an observer. Subscribing the same `Arc` again returns the
    /// existing id.
    pub fn subscribe(&self, observer: Arc<dyn Observer>) -> ObserverId {
        let mut observers = self.lock();
        let ptr = Arc::as_ptr(&observer) as *const ();
        if let Some((id, _)) = observers
            .iter()
            .find(|(_, existing)| Arc::as_ptr(existing) as *const () == ptr)
        {
            return *id;
        }

        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        observers.push((id, observer));
        id
    }

    /// Remove an observer. Returns false if the id was unknown.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut observers = self.lock();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Subscribe a channel and return its receiving end.
    ///
    /// The subscription ends when the receiver is dropped.
    pub fn subscribe_channel(&self) -> mpsc::UnboundedReceiver<OrchestratorEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribe(Arc::new(ChannelObserver { sender }));
        receiver
    }

    pub fn observer_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver `event` to every observer registered at the time of the call.
    pub fn publish(&self, event: OrchestratorEvent) -> DeliveryReport {
        let snapshot: Vec<_> = {
            let mut observers = self.lock();
            observers.retain(|(_, observer)| !observer.is_closed());
            observers.clone()
        };

        tracing::debug!(event = event.name(), observers = snapshot.len(), "Publishing event");

        let mut report = DeliveryReport::default();
        for (id, observer) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| observer.on_event(&event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::warn!(event = event.name(), observer = id.0, error = %e, "Observer failed");
                }
                Err(_) => {
                    report.failed += 1;
                    tracing::warn!(event = event.name(), observer = id.0, "Observer panicked");
                }
            }
        }
        report
    }
}
