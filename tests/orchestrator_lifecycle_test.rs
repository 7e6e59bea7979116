//! Lifecycle tests: init, enable/disable, timers, host signals and observers.

mod common;

use common::*;
use fitsync::events::{ObserverError, OrchestratorEvent};
use fitsync::models::SyncSettings;
use fitsync::orchestrator::HostSignal;
use fitsync::sync::EnableOutcome;
use fitsync::traits::StoreScope;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SYNC_INTERVAL: Duration = Duration::from_secs(30 * 60);

#[tokio::test(start_paused = true)]
async fn test_init_signed_out() {
    let mut fixture = TestOrchestratorBuilder::new().build();

    let state = fixture.orchestrator.init().await;

    assert!(!state.sync_enabled);
    assert!(!state.credential_valid);
    assert!(fixture.http.get_requests().is_empty());
    assert_eq!(fixture.drain_event_names(), vec!["stateLoaded"]);
    assert_eq!(fixture.orchestrator.get_stats().await.active_timers, 0);
}

#[tokio::test(start_paused = true)]
async fn test_init_enabled_and_valid_starts_timers() {
    let mut fixture = TestOrchestratorBuilder::new()
        .signed_in()
        .locally_enabled()
        .build();

    let state = fixture.orchestrator.init().await;

    assert!(state.sync_enabled);
    assert!(state.credential_valid);
    assert_eq!(fixture.orchestrator.get_stats().await.active_timers, 2);
    assert_eq!(
        fixture.drain_events(),
        vec![
            OrchestratorEvent::StateLoaded(fitsync::sync::OrchestratorState {
                sync_enabled: true,
                ..Default::default()
            }),
            OrchestratorEvent::CredentialStatusChanged { valid: true },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_startup_check_keeps_background_sync() {
    let http = MockBackend::new()
        .with_activities(vec![activity_json(7, "Run", "2024-05-01T06:00:00Z", 1500)])
        .with_remote_user_data(json!({}))
        .accepting_user_data()
        .build();
    http.set_responses(
        &verify_url(),
        vec![
            server_error(503),
            MockResponse::json(200, json!({"valid": true})),
        ],
    );
    let fixture = TestOrchestratorBuilder::new()
        .with_http(http)
        .signed_in()
        .locally_enabled()
        .build();

    let state = fixture.orchestrator.init().await;

    assert!(state.sync_enabled);
    assert!(!state.credential_valid);
    assert_eq!(fixture.orchestrator.get_stats().await.active_timers, 2);

    fixture
        .orchestrator
        .signal_sender()
        .send(HostSignal::VisibilityResumed)
        .unwrap();
    tokio::time::sleep(Duration::from_secs(2 * 60 * 60)).await;

    let state = fixture.orchestrator.get_state();
    assert!(state.credential_valid);
    assert!(state.last_sync_time.is_some());
    assert!(fixture.http.request_count("GET", &activities_url()) >= 1);
    assert_eq!(fixture.orchestrator.get_stats().await.active_timers, 2);
}

#[tokio::test(start_paused = true)]
async fn test_sync_cycle_rechecks_invalid_credential() {
    let http = MockBackend::new()
        .with_activities(Vec::new())
        .with_remote_user_data(json!({}))
        .accepting_user_data()
        .build();
    http.set_responses(
        &verify_url(),
        vec![
            server_error(503),
            MockResponse::json(200, json!({"valid": true})),
        ],
    );
    let fixture = TestOrchestratorBuilder::new()
        .with_http(http)
        .signed_in()
        .locally_enabled()
        .build();
    fixture.orchestrator.init().await;
    assert!(!fixture.orchestrator.get_state().credential_valid);

    let outcome = fixture.orchestrator.force_sync().await;

    assert!(matches!(outcome, fitsync::sync::SyncOutcome::Completed(_)));
    assert_eq!(fixture.http.request_count("GET", &verify_url()), 2);
    assert!(fixture.orchestrator.get_state().credential_valid);
}

#[tokio::test(start_paused = true)]
async fn test_remote_user_data_overrides_local_settings() {
    let http = MockBackend::new()
        .with_valid_credential()
        .with_activities(Vec::new())
        .with_remote_user_data(json!({
            "stravaSyncEnabled": true,
            "lastStravaSync": "2024-01-01T00:00:00Z"
        }))
        .accepting_user_data()
        .build();
    let fixture = TestOrchestratorBuilder::new()
        .with_http(http)
        .signed_in()
        .build();

    let state = fixture.orchestrator.init().await;

    assert!(state.sync_enabled);
    assert_eq!(
        state.last_sync_time.map(|t| t.timestamp()),
        Some(1_704_067_200)
    );
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_remote_falls_back_to_local_settings() {
    let http = MockBackend::new()
        .with_valid_credential()
        .with_activities(Vec::new())
        .build();
    http.set_method_response("GET", &user_data_url(), MockResponse::status(404));
    let fixture = TestOrchestratorBuilder::new()
        .with_http(http)
        .signed_in()
        .locally_enabled()
        .build();

    let state = fixture.orchestrator.init().await;

    assert!(state.sync_enabled);
    assert!(state.last_sync_time.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_verification_404_counts_as_valid() {
    let http = MockBackend::new()
        .with_activities(Vec::new())
        .with_remote_user_data(json!({}))
        .build();
    http.set_response(&verify_url(), MockResponse::status(404));
    let fixture = TestOrchestratorBuilder::new()
        .with_http(http)
        .signed_in()
        .build();

    let state = fixture.orchestrator.init().await;

    assert!(state.credential_valid);
    assert_eq!(state.error_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_timer_runs_sync_each_interval() {
    let fixture = TestOrchestratorBuilder::new()
        .signed_in()
        .locally_enabled()
        .build();
    fixture.orchestrator.init().await;

    tokio::time::sleep(SYNC_INTERVAL - Duration::from_secs(1)).await;
    assert_eq!(fixture.http.request_count("GET", &activities_url()), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(fixture.http.request_count("GET", &activities_url()), 1);

    tokio::time::sleep(SYNC_INTERVAL).await;
    assert_eq!(fixture.http.request_count("GET", &activities_url()), 2);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_orchestrator_never_syncs_on_its_own() {
    let fixture = TestOrchestratorBuilder::new().signed_in().build();
    fixture.orchestrator.init().await;

    tokio::time::sleep(SYNC_INTERVAL * 3).await;

    assert_eq!(fixture.http.request_count("GET", &activities_url()), 0);
}

#[tokio::test(start_paused = true)]
async fn test_enable_signed_out_is_silent() {
    let mut fixture = TestOrchestratorBuilder::new().build();
    fixture.orchestrator.init().await;
    fixture.drain_events();

    let outcome = fixture.orchestrator.enable_sync().await;

    assert_eq!(outcome, EnableOutcome::NotSignedIn);
    assert!(fixture.drain_events().is_empty());
    assert!(fixture.http.get_requests().is_empty());
    assert!(!fixture.orchestrator.get_state().sync_enabled);
}

#[tokio::test(start_paused = true)]
async fn test_enable_persists_flag_and_schedules_first_sync() {
    let mut fixture = TestOrchestratorBuilder::new().signed_in().build();
    fixture.orchestrator.init().await;
    fixture.drain_events();

    let outcome = fixture.orchestrator.enable_sync().await;

    assert_eq!(outcome, EnableOutcome::Enabled);
    assert!(fixture.orchestrator.get_state().sync_enabled);
    let enabled = SyncSettings {
        strava_sync_enabled: true,
    };
    assert_eq!(fixture.store.settings(&user_scope()), enabled);
    assert_eq!(fixture.store.settings(&StoreScope::Global), enabled);

    let remote = fixture
        .http
        .requests_to("POST", &user_data_url())
        .iter()
        .filter_map(|r| r.json_body())
        .collect::<Vec<_>>();
    assert_eq!(remote.len(), 1);
    assert_eq!(remote[0]["data"], json!({"stravaSyncEnabled": true}));

    let names = fixture.drain_event_names();
    assert!(names.contains(&"syncEnabled"));
    assert!(fixture.orchestrator.get_stats().await.active_timers >= 2);

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(fixture.http.request_count("GET", &activities_url()), 1);
    assert!(fixture.drain_event_names().contains(&"syncCompleted"));
}

#[tokio::test(start_paused = true)]
async fn test_enable_without_authorization_returns_url() {
    let http = MockBackend::new()
        .with_invalid_credential()
        .with_remote_user_data(json!({}))
        .with_authorization_url("https://www.strava.com/oauth/authorize?client_id=1")
        .build();
    let fixture = TestOrchestratorBuilder::new()
        .with_http(http)
        .signed_in()
        .build();
    fixture.orchestrator.init().await;

    let outcome = fixture.orchestrator.enable_sync().await;

    assert_eq!(
        outcome,
        EnableOutcome::AuthorizationRequired {
            url: "https://www.strava.com/oauth/authorize?client_id=1".to_string()
        }
    );
    assert!(!fixture.orchestrator.get_state().sync_enabled);
    assert_eq!(fixture.orchestrator.get_stats().await.active_timers, 0);
    let auth = fixture.http.requests_to("GET", &auth_url());
    assert!(auth[0].url.ends_with("userId=athlete-1"));
}

#[tokio::test(start_paused = true)]
async fn test_disable_stops_timers_and_persists() {
    let mut fixture = TestOrchestratorBuilder::new()
        .signed_in()
        .locally_enabled()
        .build();
    fixture.orchestrator.init().await;
    fixture.drain_events();

    fixture.orchestrator.disable_sync().await;

    assert!(!fixture.orchestrator.get_state().sync_enabled);
    assert_eq!(fixture.orchestrator.get_stats().await.active_timers, 0);
    assert!(!fixture.store.settings(&user_scope()).strava_sync_enabled);
    assert_eq!(fixture.drain_event_names(), vec!["syncDisabled"]);

    tokio::time::sleep(SYNC_INTERVAL * 2).await;
    assert_eq!(fixture.http.request_count("GET", &activities_url()), 0);
}

#[tokio::test(start_paused = true)]
async fn test_disable_during_running_sync() {
    let mut fixture = TestOrchestratorBuilder::new()
        .signed_in()
        .locally_enabled()
        .build();
    fixture.orchestrator.init().await;
    fixture.drain_events();
    fixture.http.set_delay(Duration::from_secs(1));

    let (outcome, ()) = tokio::join!(fixture.orchestrator.force_sync(), async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(fixture.orchestrator.get_state().sync_in_progress);
        fixture.orchestrator.disable_sync().await;
        assert_eq!(fixture.orchestrator.get_stats().await.active_timers, 0);
    });

    assert!(matches!(outcome, fitsync::sync::SyncOutcome::Completed(_)));
    let state = fixture.orchestrator.get_state();
    assert!(!state.sync_enabled);
    assert!(!state.sync_in_progress);
    assert!(state.last_sync_time.is_some());
    let names = fixture.drain_event_names();
    assert!(names.contains(&"syncDisabled"));
    assert!(names.contains(&"syncCompleted"));

    tokio::time::sleep(SYNC_INTERVAL * 2).await;
    assert_eq!(fixture.http.request_count("GET", &activities_url()), 1);
    assert_eq!(fixture.orchestrator.get_stats().await.active_timers, 0);
}

#[tokio::test(start_paused = true)]
async fn test_force_sync_ignores_disabled_flag() {
    let fixture = TestOrchestratorBuilder::new().signed_in().build();
    fixture.orchestrator.init().await;

    let outcome = fixture.orchestrator.force_sync().await;

    assert!(matches!(outcome, fitsync::sync::SyncOutcome::Completed(_)));
}

#[tokio::test(start_paused = true)]
async fn test_force_credential_refresh() {
    let http = MockBackend::new()
        .with_valid_credential()
        .with_remote_user_data(json!({}))
        .build();
    http.set_response(
        &refresh_url(),
        MockResponse::json(200, json!({"access_token": "fresh", "expires_at": 4_102_444_800i64})),
    );
    let mut fixture = TestOrchestratorBuilder::new()
        .with_http(http)
        .signed_in()
        .build();
    fixture.orchestrator.init().await;
    fixture.drain_events();

    assert!(fixture.orchestrator.force_credential_refresh().await);

    let creds = fixture.credentials.get_credentials().unwrap();
    assert_eq!(creds.access_token.as_deref(), Some("fresh"));
    assert_eq!(creds.expires_at, Some(4_102_444_800));
    assert_eq!(creds.user_id.as_deref(), Some(USER_ID));
    assert_eq!(fixture.drain_event_names(), vec!["credentialRefreshed"]);
    let body = fixture.http.requests_to("POST", &refresh_url())[0]
        .json_body()
        .unwrap();
    assert_eq!(body, json!({"userId": USER_ID}));
}

#[tokio::test(start_paused = true)]
async fn test_storage_signal_toggles_sync() {
    let mut fixture = TestOrchestratorBuilder::new()
        .signed_in()
        .locally_enabled()
        .build();
    fixture.orchestrator.init().await;
    fixture.drain_events();
    let signals = fixture.orchestrator.signal_sender();

    fixture.store.set_settings(
        user_scope(),
        SyncSettings {
            strava_sync_enabled: false,
        },
    );
    signals.send(HostSignal::StorageChanged).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(!fixture.orchestrator.get_state().sync_enabled);
    assert_eq!(fixture.orchestrator.get_stats().await.active_timers, 0);
    assert_eq!(fixture.drain_event_names(), vec!["syncDisabled"]);

    fixture.store.set_settings(
        user_scope(),
        SyncSettings {
            strava_sync_enabled: true,
        },
    );
    signals.send(HostSignal::StorageChanged).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(fixture.orchestrator.get_state().sync_enabled);
    assert_eq!(fixture.orchestrator.get_stats().await.active_timers, 2);
    assert_eq!(fixture.drain_event_names(), vec!["syncEnabled"]);

    // Unchanged flag: nothing happens
    signals.send(HostSignal::StorageChanged).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(fixture.drain_events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_visibility_signal_rechecks_credential() {
    let mut fixture = TestOrchestratorBuilder::new().signed_in().build();
    fixture.orchestrator.init().await;
    fixture.drain_events();

    fixture
        .orchestrator
        .signal_sender()
        .send(HostSignal::VisibilityResumed)
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(
        fixture.drain_events(),
        vec![OrchestratorEvent::CredentialStatusChanged { valid: true }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_everything() {
    let fixture = TestOrchestratorBuilder::new()
        .signed_in()
        .locally_enabled()
        .build();
    fixture.orchestrator.init().await;

    fixture.orchestrator.shutdown();

    assert_eq!(fixture.orchestrator.get_stats().await.active_timers, 0);
    tokio::time::sleep(SYNC_INTERVAL * 2).await;
    assert_eq!(fixture.http.request_count("GET", &activities_url()), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failing_observers_do_not_block_others() {
    let mut fixture = TestOrchestratorBuilder::new().signed_in().build();
    fixture.orchestrator.init().await;
    fixture.drain_events();

    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    fixture.orchestrator.subscribe(Arc::new(
        |_: &OrchestratorEvent| -> Result<(), ObserverError> { panic!("observer bug") },
    ));
    fixture.orchestrator.subscribe(Arc::new(
        |_: &OrchestratorEvent| -> Result<(), ObserverError> {
            Err(ObserverError("rejected".to_string()))
        },
    ));
    let id = fixture.orchestrator.subscribe(Arc::new(
        move |_: &OrchestratorEvent| -> Result<(), ObserverError> {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
    ));

    let outcome = fixture.orchestrator.force_sync().await;

    assert!(matches!(outcome, fitsync::sync::SyncOutcome::Completed(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        fixture.drain_event_names(),
        vec!["syncStarted", "syncCompleted"]
    );

    assert!(fixture.orchestrator.unsubscribe(id));
    fixture.orchestrator.force_sync().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stats_serialize_camel_case() {
    let fixture = TestOrchestratorBuilder::new()
        .signed_in()
        .locally_enabled()
        .build();
    fixture.orchestrator.init().await;

    let stats = serde_json::to_value(fixture.orchestrator.get_stats().await).unwrap();

    assert_eq!(stats["activeTimers"], 2);
    assert_eq!(stats["state"]["syncEnabled"], true);
    assert_eq!(stats["state"]["credentialValid"], true);
    assert!(stats["cachedEntries"].as_u64().unwrap() >= 1);
    assert_eq!(stats["inFlightRequests"], 0);
}
