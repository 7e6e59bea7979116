//! Common test utilities for integration tests.
//!
//! # Example
//!
//! ```ignore
//! let fixture = TestOrchestratorBuilder::new()
//!     .signed_in()
//!     .locally_enabled()
//!     .build();
//! fixture.orchestrator.init().await;
//! ```

#![allow(dead_code)]

pub mod mocks;

pub use mocks::*;

use fitsync::auth::Credentials;
use fitsync::config::SyncConfig;
use fitsync::events::OrchestratorEvent;
use fitsync::models::SyncSettings;
use fitsync::orchestrator::Orchestrator;
use fitsync::traits::StoreScope;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Credentials for the test athlete.
pub fn test_credentials() -> Credentials {
    Credentials::for_user(USER_ID, TOKEN)
}

/// Config pointed at the mock backend, with retries disabled.
pub fn test_config() -> SyncConfig {
    SyncConfig::default()
        .with_api_base_url(BASE_URL)
        .with_max_retries(0)
        .with_retry_delay(Duration::from_millis(10))
}

pub fn user_scope() -> StoreScope {
    StoreScope::user(USER_ID)
}

/// Everything a scenario needs to drive and inspect an orchestrator.
pub struct TestOrchestrator {
    pub orchestrator: Orchestrator,
    pub http: MockHttpClient,
    pub credentials: InMemoryCredentials,
    pub store: InMemoryStore,
    pub events: mpsc::UnboundedReceiver<OrchestratorEvent>,
}

impl TestOrchestrator {
    /// Drain every event published so far.
    pub fn drain_events(&mut self) -> Vec<OrchestratorEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Names of the drained events, in order.
    pub fn drain_event_names(&mut self) -> Vec<&'static str> {
        self.drain_events().iter().map(|e| e.name()).collect()
    }
}

/// Builder for test orchestrators.
pub struct TestOrchestratorBuilder {
    config: SyncConfig,
    http: MockHttpClient,
    credentials: Option<Credentials>,
    locally_enabled: bool,
}

impl TestOrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            config: test_config(),
            http: MockBackend::new()
                .with_valid_credential()
                .with_activities(Vec::new())
                .accepting_user_data()
                .with_remote_user_data(serde_json::json!({}))
                .build(),
            credentials: None,
            locally_enabled: false,
        }
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_http(mut self, http: MockHttpClient) -> Self {
        self.http = http;
        self
    }

    pub fn signed_in(mut self) -> Self {
        self.credentials = Some(test_credentials());
        self
    }

    pub fn locally_enabled(mut self) -> Self {
        self.locally_enabled = true;
        self
    }

    pub fn build(self) -> TestOrchestrator {
        let credentials = match self.credentials {
            Some(creds) => InMemoryCredentials::with_credentials(creds),
            None => InMemoryCredentials::new(),
        };
        let store = InMemoryStore::new();
        if self.locally_enabled {
            store.set_settings(
                user_scope(),
                SyncSettings {
                    strava_sync_enabled: true,
                },
            );
        }

        let orchestrator = Orchestrator::new(
            self.config,
            Arc::new(self.http.clone()),
            Arc::new(credentials.clone()),
            Arc::new(store.clone()),
        );
        let events = orchestrator.subscribe_channel();

        TestOrchestrator {
            orchestrator,
            http: self.http,
            credentials,
            store,
            events,
        }
    }
}

impl Default for TestOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
