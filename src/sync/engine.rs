//! The sync state machine: enable, disable, run.
//!
//! A sync cycle is `fetch → reconcile → save locally → persist remotely`.
//! At most one cycle runs at a time; a second request while one is running
//! is rejected, not queued. A 401 on the fetch triggers one credential
//! refresh and, if that succeeds, exactly one delayed re-run.

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use std::sync::{Arc, Weak};

use super::reconcile::{reconcile, ReconcileSummary};
use super::state::StateHandle;
use crate::api::BackendApi;
use crate::auth::{CredentialMonitor, Credentials};
use crate::config::SyncConfig;
use crate::error::{AuthError, FitsyncResult};
use crate::events::{EventBus, OrchestratorEvent, SyncFailure};
use crate::models::{SyncSettings, UserData};
use crate::sync::OrchestratorState;
use crate::timers::{
    TimerCallback, TimerRegistry, CREDENTIAL_CHECK_TIMER, INITIAL_SYNC_TIMER, SYNC_RETRY_TIMER,
    SYNC_TIMER,
};
use crate::traits::{EventStore, StoreScope};

/// Why a sync request did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another cycle holds the in-progress flag.
    InProgress,
    /// Sync is disabled and the request was not forced.
    Disabled,
    /// No stored identity.
    NotSignedIn,
    /// The credential is invalid and re-checking did not help.
    CredentialInvalid,
}

/// Result of one sync request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(ReconcileSummary),
    Skipped(SkipReason),
    /// The credential was refreshed and a re-run is scheduled.
    RetryScheduled,
    /// The credential was rejected and could not be refreshed.
    CredentialExpired,
    Failed(String),
}

/// Result of [`SyncEngine::enable_sync`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnableOutcome {
    /// No stored identity; nothing changed.
    NotSignedIn,
    Enabled,
    /// The user must authorize the fitness service at `url` first.
    AuthorizationRequired { url: String },
    /// The authorization URL could not be obtained.
    Failed(String),
}

/// Drives sync cycles and owns the background timers.
pub struct SyncEngine {
    config: SyncConfig,
    api: BackendApi,
    monitor: Arc<CredentialMonitor>,
    store: Arc<dyn EventStore>,
    state: StateHandle,
    bus: Arc<EventBus>,
    timers: Arc<TimerRegistry>,
    this: Weak<SyncEngine>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("state", &self.state.snapshot())
            .field("timers", &self.timers)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    pub fn new(
        config: SyncConfig,
        api: BackendApi,
        monitor: Arc<CredentialMonitor>,
        store: Arc<dyn EventStore>,
        state: StateHandle,
        bus: Arc<EventBus>,
        timers: Arc<TimerRegistry>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            config,
            api,
            monitor,
            store,
            state,
            bus,
            timers,
            this: this.clone(),
        })
    }

    /// Run a sync cycle if sync is enabled.
    pub async fn run_sync(&self) -> SyncOutcome {
        self.run(false, true).await
    }

    /// Run a sync cycle regardless of the enabled flag.
    pub async fn force_sync(&self) -> SyncOutcome {
        self.run(true, true).await
    }

    async fn run(&self, forced: bool, allow_refresh_retry: bool) -> SyncOutcome {
        if self.state.sync_in_progress() {
            tracing::debug!("Sync already in progress, request ignored");
            return SyncOutcome::Skipped(SkipReason::InProgress);
        }

        if !forced && !self.state.sync_enabled() {
            tracing::debug!("Sync disabled, request ignored");
            return SyncOutcome::Skipped(SkipReason::Disabled);
        }

        let Some(creds) = self.monitor.signed_in().await else {
            return SyncOutcome::Skipped(SkipReason::NotSignedIn);
        };

        if !self.state.credential_valid() && !self.monitor.check_status().await {
            tracing::info!("Credential invalid, sync aborted");
            return SyncOutcome::Skipped(SkipReason::CredentialInvalid);
        }

        // Claimed here, after the awaits above, so the flag is only set
        // while a cycle that has announced itself is running.
        let Some(guard) = self.state.begin_sync() else {
            tracing::debug!("Sync already in progress, request ignored");
            return SyncOutcome::Skipped(SkipReason::InProgress);
        };

        tracing::info!(forced, "Sync started");
        self.bus.publish(OrchestratorEvent::SyncStarted);

        let outcome = match self.pipeline(&creds).await {
            Ok(summary) => {
                tracing::info!(
                    fetched = summary.fetched,
                    added = summary.added,
                    duplicates = summary.duplicates,
                    "Sync completed"
                );
                self.bus.publish(OrchestratorEvent::SyncCompleted {
                    activity_count: summary.fetched,
                    new_events: summary.added,
                });
                SyncOutcome::Completed(summary)
            }
            Err(e) if e.requires_reauth() => {
                // Released before refreshing: sync_in_progress reads false
                // during the refresh and the scheduled re-run can claim it.
                drop(guard);
                return self.recover_credential(forced, allow_refresh_retry).await;
            }
            Err(e) => {
                let errors = self.state.increment_errors();
                let category = e.category();
                tracing::warn!(
                    error = %e,
                    code = e.error_code(),
                    %category,
                    retryable = e.is_retryable(),
                    hint = category.recovery_hint(),
                    errors,
                    "Sync failed"
                );
                self.bus
                    .publish(OrchestratorEvent::SyncFailed(SyncFailure::error(e.to_string())));
                SyncOutcome::Failed(e.to_string())
            }
        };

        drop(guard);
        outcome
    }

    async fn pipeline(&self, creds: &Credentials) -> FitsyncResult<ReconcileSummary> {
        let identity = creds.identity().ok_or(AuthError::NotAuthenticated)?;

        let activities = self
            .api
            .fetch_activities(identity, self.state.last_sync_time())
            .await?;

        let user_scope = StoreScope::user(identity.user_id);
        let mut calendar = self.store.load_calendar(&user_scope).await?;
        let synced_at = Utc::now();
        let summary = reconcile(&mut calendar, &activities, synced_at);

        self.store.save_calendar(&user_scope, &calendar).await?;
        self.store
            .save_calendar(&StoreScope::Global, &calendar)
            .await?;

        let data = UserData {
            strava_sync_enabled: None,
            last_strava_sync: Some(synced_at),
            calendar_events: Some(calendar),
        };
        self.api.save_user_data(identity, &data).await?;

        self.state.record_success(synced_at);
        Ok(summary)
    }

    async fn recover_credential(&self, forced: bool, allow_refresh_retry: bool) -> SyncOutcome {
        tracing::info!("Activities request unauthorized, refreshing credential");

        if !self.monitor.refresh().await {
            self.bus
                .publish(OrchestratorEvent::SyncFailed(SyncFailure::CredentialExpired));
            return SyncOutcome::CredentialExpired;
        }

        if !allow_refresh_retry {
            tracing::warn!("Credential rejected again after refresh");
            self.state.increment_errors();
            self.bus
                .publish(OrchestratorEvent::SyncFailed(SyncFailure::CredentialExpired));
            return SyncOutcome::CredentialExpired;
        }

        self.schedule_refresh_retry(forced);
        SyncOutcome::RetryScheduled
    }

    fn schedule_refresh_retry(&self, forced: bool) {
        tracing::info!(
            delay_ms = self.config.refresh_retry_delay.as_millis() as u64,
            "Scheduling sync re-run after refresh"
        );
        let callback = self.callback(move |engine| {
            async move {
                engine.run(forced, false).await;
            }
            .boxed()
        });
        self.timers
            .schedule_once(SYNC_RETRY_TIMER, self.config.refresh_retry_delay, callback);
    }

    fn callback<F>(&self, work: F) -> TimerCallback
    where
        F: Fn(Arc<SyncEngine>) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let this = self.this.clone();
        Arc::new(move || match this.upgrade() {
            Some(engine) => work(engine),
            None => futures::future::ready(()).boxed(),
        })
    }

    /// Start (or restart) the periodic sync and credential-check timers.
    pub fn start_timers(&self) {
        self.timers.set_timer(
            SYNC_TIMER,
            self.config.sync_interval,
            self.callback(|engine| {
                async move {
                    engine.run_sync().await;
                }
                .boxed()
            }),
        );
        self.timers.set_timer(
            CREDENTIAL_CHECK_TIMER,
            self.config.credential_check_interval,
            self.callback(|engine| {
                async move {
                    engine.monitor.check_status().await;
                }
                .boxed()
            }),
        );
    }

    /// Stop every timer, including pending one-shot syncs.
    pub fn stop_timers(&self) {
        self.timers.stop_all();
    }

    /// Enable background sync for the signed-in user.
    pub async fn enable_sync(&self) -> EnableOutcome {
        let Some(creds) = self.monitor.signed_in().await else {
            tracing::debug!("Enable requested while signed out");
            return EnableOutcome::NotSignedIn;
        };
        let Some(identity) = creds.identity() else {
            return EnableOutcome::NotSignedIn;
        };

        if self.monitor.check_status().await {
            self.state.set_sync_enabled(true);
            self.persist_settings(&creds, true).await;
            self.start_timers();
            self.bus.publish(OrchestratorEvent::SyncEnabled);

            let callback = self.callback(|engine| {
                async move {
                    engine.run_sync().await;
                }
                .boxed()
            });
            self.timers
                .schedule_once(INITIAL_SYNC_TIMER, self.config.initial_sync_delay, callback);

            tracing::info!(user_id = identity.user_id, "Sync enabled");
            return EnableOutcome::Enabled;
        }

        match self.api.authorization_url(identity).await {
            Ok(url) => {
                tracing::info!(user_id = identity.user_id, "Authorization required");
                EnableOutcome::AuthorizationRequired { url }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot obtain authorization URL");
                self.bus
                    .publish(OrchestratorEvent::SyncFailed(SyncFailure::error(e.to_string())));
                EnableOutcome::Failed(e.to_string())
            }
        }
    }

    /// Disable background sync. A cycle already running finishes on its own.
    pub async fn disable_sync(&self) {
        self.state.set_sync_enabled(false);
        self.stop_timers();
        if let Some(creds) = self.monitor.signed_in().await {
            self.persist_settings(&creds, false).await;
        }
        self.bus.publish(OrchestratorEvent::SyncDisabled);
        tracing::info!("Sync disabled");
    }

    /// Write the enabled flag locally (user and global scope) and remotely.
    /// Failures are logged; the in-memory state stays authoritative.
    async fn persist_settings(&self, creds: &Credentials, enabled: bool) {
        let Some(identity) = creds.identity() else {
            return;
        };
        let settings = SyncSettings {
            strava_sync_enabled: enabled,
        };

        for scope in [StoreScope::user(identity.user_id), StoreScope::Global] {
            if let Err(e) = self.store.save_settings(&scope, &settings).await {
                tracing::warn!(scope = %scope.key(), error = %e, "Cannot save sync settings");
            }
        }

        let data = UserData {
            strava_sync_enabled: Some(enabled),
            ..Default::default()
        };
        if let Err(e) = self.api.save_user_data(identity, &data).await {
            tracing::warn!(error = %e, "Cannot persist sync settings remotely");
        }
    }

    /// Load the enabled flag and last sync time: local settings first, then
    /// the remote user-data document, which wins where it has a value.
    pub async fn load_state(&self) -> OrchestratorState {
        match self.monitor.signed_in().await {
            Some(creds) => self.load_signed_in(&creds).await,
            None => {
                self.state.set_sync_enabled(false);
                self.state.set_credential_valid(false);
            }
        }

        let snapshot = self.state.snapshot();
        self.bus
            .publish(OrchestratorEvent::StateLoaded(snapshot.clone()));
        snapshot
    }

    async fn load_signed_in(&self, creds: &Credentials) {
        let Some(identity) = creds.identity() else {
            return;
        };

        match self.store.load_settings(&StoreScope::user(identity.user_id)).await {
            Ok(settings) => self.state.set_sync_enabled(settings.strava_sync_enabled),
            Err(e) => tracing::warn!(error = %e, "Cannot read local sync settings"),
        }

        match self.api.fetch_user_data(identity).await {
            Ok(data) => {
                if let Some(enabled) = data.strava_sync_enabled {
                    self.state.set_sync_enabled(enabled);
                }
                if let Some(last) = data.last_strava_sync {
                    self.state.set_last_sync_time(Some(last));
                }
            }
            Err(e) => tracing::warn!(error = %e, "Remote user data unavailable, using local settings"),
        }
    }

    /// Re-read the local enabled flag after an external store change.
    ///
    /// Returns the new flag when it differed from the in-memory state.
    pub async fn reload_local_settings(&self) -> Option<bool> {
        let creds = self.monitor.signed_in().await?;
        let identity = creds.identity()?;

        let settings = match self.store.load_settings(&StoreScope::user(identity.user_id)).await {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot re-read sync settings");
                return None;
            }
        };

        let enabled = settings.strava_sync_enabled;
        if enabled == self.state.sync_enabled() {
            return None;
        }

        tracing::info!(enabled, "Sync flag changed in store");
        self.state.set_sync_enabled(enabled);
        if enabled {
            self.start_timers();
            self.bus.publish(OrchestratorEvent::SyncEnabled);
        } else {
            self.stop_timers();
            self.bus.publish(OrchestratorEvent::SyncDisabled);
        }
        Some(enabled)
    }

    pub fn monitor(&self) -> &Arc<CredentialMonitor> {
        &self.monitor
    }

    pub fn state(&self) -> &StateHandle {
        &self.state
    }

    pub fn timers(&self) -> &Arc<TimerRegistry> {
        &self.timers
    }

    pub fn api(&self) -> &BackendApi {
        &self.api
    }
}
