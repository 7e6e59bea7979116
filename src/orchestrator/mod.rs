//! The orchestrator facade.
//!
//! Wires the coordinator, credential monitor, sync engine, timers and event
//! bus together and exposes the small control surface the host uses.
//!
//! # Example
//!
//! ```ignore
//! use fitsync::adapters::{FileCredentialsProvider, FileEventStore, ReqwestHttpClient};
//! use fitsync::config::SyncConfig;
//! use fitsync::orchestrator::Orchestrator;
//! use std::sync::Arc;
//!
//! let config = SyncConfig::from_env();
//! let orchestrator = Orchestrator::new(
//!     config.clone(),
//!     Arc::new(ReqwestHttpClient::new()),
//!     Arc::new(FileCredentialsProvider::new()?),
//!     Arc::new(FileEventStore::new(config.resolved_data_dir())),
//! );
//! orchestrator.init().await;
//! ```

mod signals;

pub use signals::HostSignal;

use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::BackendApi;
use crate::auth::CredentialMonitor;
use crate::config::SyncConfig;
use crate::coordinator::RequestCoordinator;
use crate::events::{EventBus, Observer, ObserverId, OrchestratorEvent};
use crate::sync::{EnableOutcome, OrchestratorState, StateHandle, SyncEngine, SyncOutcome};
use crate::timers::TimerRegistry;
use crate::traits::{CredentialsProvider, EventStore, HttpClient};

/// Diagnostic counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorStats {
    pub state: OrchestratorState,
    pub active_timers: usize,
    pub cached_entries: usize,
    pub in_flight_requests: usize,
}

/// Background sync orchestrator.
pub struct Orchestrator {
    state: StateHandle,
    bus: Arc<EventBus>,
    engine: Arc<SyncEngine>,
    coordinator: RequestCoordinator,
    timers: Arc<TimerRegistry>,
    signal_tx: mpsc::UnboundedSender<HostSignal>,
    signal_rx: Mutex<Option<mpsc::UnboundedReceiver<HostSignal>>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("state", &self.state.snapshot())
            .field("bus", &self.bus)
            .field("timers", &self.timers)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(
        config: SyncConfig,
        http: Arc<dyn HttpClient>,
        credentials: Arc<dyn CredentialsProvider>,
        store: Arc<dyn EventStore>,
    ) -> Self {
        let state = StateHandle::new();
        let bus = Arc::new(EventBus::new());
        let timers = Arc::new(TimerRegistry::new());
        let coordinator = RequestCoordinator::from_config(&config);
        let api = BackendApi::new(
            config.api_base_url.clone(),
            http,
            coordinator.clone(),
            config.activities_per_page,
        );
        let monitor = Arc::new(CredentialMonitor::new(
            api.clone(),
            credentials,
            state.clone(),
            Arc::clone(&bus),
        ));
        let engine = SyncEngine::new(
            config,
            api,
            monitor,
            store,
            state.clone(),
            Arc::clone(&bus),
            Arc::clone(&timers),
        );
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        Self {
            state,
            bus,
            engine,
            coordinator,
            timers,
            signal_tx,
            signal_rx: Mutex::new(Some(signal_rx)),
            listener: Mutex::new(None),
        }
    }

    /// Load state, check the credential, start timers when sync is enabled,
    /// and start listening for host signals.
    ///
    /// Timers start even if the credential check failed; each sync cycle
    /// re-checks an invalid credential before it fetches.
    ///
    /// Calling it again reloads state; the signal listener is started once.
    pub async fn init(&self) -> OrchestratorState {
        self.engine.load_state().await;

        if self.engine.monitor().signed_in().await.is_some() {
            self.engine.monitor().check_status().await;
        }

        if self.state.sync_enabled() {
            self.engine.start_timers();
        }

        let receiver = self
            .signal_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(receiver) = receiver {
            let handle = signals::spawn_signal_listener(Arc::downgrade(&self.engine), receiver);
            *self.listener.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        }

        let state = self.state.snapshot();
        tracing::info!(
            sync_enabled = state.sync_enabled,
            credential_valid = state.credential_valid,
            "Orchestrator initialized"
        );
        state
    }

    pub fn get_state(&self) -> OrchestratorState {
        self.state.snapshot()
    }

    pub async fn get_stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            state: self.state.snapshot(),
            active_timers: self.timers.active_count(),
            cached_entries: self.coordinator.cached_entry_count().await,
            in_flight_requests: self.coordinator.in_flight_count().await,
        }
    }

    pub async fn enable_sync(&self) -> EnableOutcome {
        self.engine.enable_sync().await
    }

    pub async fn disable_sync(&self) {
        self.engine.disable_sync().await
    }

    /// Run a sync now, even if sync is disabled. Still rejected while
    /// another sync is running.
    pub async fn force_sync(&self) -> SyncOutcome {
        self.engine.force_sync().await
    }

    pub async fn force_credential_refresh(&self) -> bool {
        self.engine.monitor().refresh().await
    }

    pub fn subscribe(&self, observer: Arc<dyn Observer>) -> ObserverId {
        self.bus.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn subscribe_channel(&self) -> mpsc::UnboundedReceiver<OrchestratorEvent> {
        self.bus.subscribe_channel()
    }

    /// Sender for [`HostSignal`]s. Signals are processed after [`init`](Self::init).
    pub fn signal_sender(&self) -> mpsc::UnboundedSender<HostSignal> {
        self.signal_tx.clone()
    }

    /// Stop all timers and the signal listener. Running requests finish on
    /// their own.
    pub fn shutdown(&self) {
        self.timers.stop_all();
        let _ = self.signal_tx.send(HostSignal::Shutdown);
        if let Some(handle) = self
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
        tracing::info!("Orchestrator shut down");
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.timers.stop_all();
        if let Some(handle) = self
            .listener
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
    }
}
