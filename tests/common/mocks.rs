//! Scripted backend responses for integration tests.
//!
//! Re-exports the crate's test doubles and adds helpers that speak the
//! backend's wire format so scenarios read as "backend says X".

pub use fitsync::adapters::mock::{
    InMemoryCredentials, InMemoryStore, MockHttpClient, MockResponse, RecordedRequest,
};
pub use fitsync::traits::{Headers, HttpClient, HttpError, Response};

use serde_json::{json, Value};

pub const BASE_URL: &str = "http://backend.test";
pub const USER_ID: &str = "athlete-1";
pub const TOKEN: &str = "test-access-token";

pub fn verify_url() -> String {
    format!("{}/api/strava/verify", BASE_URL)
}

pub fn refresh_url() -> String {
    format!("{}/api/strava/refresh", BASE_URL)
}

pub fn activities_url() -> String {
    format!("{}/api/strava/activities", BASE_URL)
}

pub fn auth_url() -> String {
    format!("{}/api/strava/auth", BASE_URL)
}

pub fn user_data_url() -> String {
    format!("{}/api/user-data/{}", BASE_URL, USER_ID)
}

/// One activity in the service's wire format.
pub fn activity_json(id: u64, kind: &str, start_date: &str, moving_time: u64) -> Value {
    json!({
        "id": id,
        "type": kind,
        "name": format!("{} #{}", kind, id),
        "distance": 5000.0,
        "moving_time": moving_time,
        "start_date": start_date,
    })
}

pub fn activities_body(activities: Vec<Value>) -> MockResponse {
    MockResponse::json(200, json!({ "activities": activities }))
}

pub fn server_error(status: u16) -> MockResponse {
    MockResponse::Error(HttpError::ServerError {
        status,
        message: format!("HTTP {}", status),
    })
}

/// Configuration for a backend that accepts the stored credential.
pub struct MockBackend {
    http: MockHttpClient,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            http: MockHttpClient::new(),
        }
    }

    pub fn with_valid_credential(self) -> Self {
        self.http
            .set_response(&verify_url(), MockResponse::json(200, json!({ "valid": true })));
        self
    }

    pub fn with_invalid_credential(self) -> Self {
        self.http
            .set_response(&verify_url(), MockResponse::json(200, json!({ "valid": false })));
        self
    }

    pub fn with_activities(self, activities: Vec<Value>) -> Self {
        self.http
            .set_response(&activities_url(), activities_body(activities));
        self
    }

    pub fn with_remote_user_data(self, data: Value) -> Self {
        self.http.set_method_response(
            "GET",
            &user_data_url(),
            MockResponse::json(200, json!({ "data": data })),
        );
        self
    }

    pub fn accepting_user_data(self) -> Self {
        self.http.set_method_response(
            "POST",
            &user_data_url(),
            MockResponse::json(200, json!({ "success": true })),
        );
        self
    }

    pub fn with_authorization_url(self, url: &str) -> Self {
        self.http
            .set_response(&auth_url(), MockResponse::json(200, json!({ "url": url })));
        self
    }

    pub fn build(self) -> MockHttpClient {
        self.http
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}
