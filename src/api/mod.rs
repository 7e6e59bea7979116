//! Typed client for the backend endpoints the orchestrator uses.
//!
//! Every method goes through the [`RequestCoordinator`]: reads are cached
//! and de-duplicated, writes and refreshes use
//! [`execute_fresh`](RequestCoordinator::execute_fresh). Non-2xx answers are
//! turned into [`HttpError::ServerError`] before they reach the coordinator,
//! so only successes are ever cached.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::auth::Identity;
use crate::coordinator::RequestCoordinator;
use crate::error::{FitsyncResult, NetworkError};
use crate::models::{ActivitiesResponse, ActivityRecord, UserData, UserDataResponse, UserDataUpdate};
use crate::traits::{Headers, HttpClient, HttpError, Response};

/// Body of the credential verification endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyResponse {
    /// Explicit verdict; absent means the 2xx status is the verdict.
    #[serde(default)]
    pub valid: Option<bool>,
}

impl VerifyResponse {
    pub fn is_valid(&self) -> bool {
        self.valid.unwrap_or(true)
    }
}

/// Body of the refresh endpoint. Both fields are optional; a backend that
/// refreshes server-side returns neither.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    #[serde(default, alias = "access_token")]
    pub access_token: Option<String>,
    #[serde(default, alias = "expires_at")]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct AuthUrlResponse {
    url: String,
}

/// Cache key of the verification call for a user.
pub fn credential_status_key(user_id: &str) -> String {
    format!("credential-status:{}", user_id)
}

/// Prefix shared by every activities call for a user.
pub fn activities_key_prefix(user_id: &str) -> String {
    format!("activities:{}:", user_id)
}

/// Cache key of the remote user-data document for a user.
pub fn user_data_key(user_id: &str) -> String {
    format!("user-data:{}", user_id)
}

fn refresh_key(user_id: &str) -> String {
    format!("credential-refresh:{}", user_id)
}

fn auth_url_key(user_id: &str) -> String {
    format!("auth-url:{}", user_id)
}

/// Persistence writes are keyed by content, so two identical concurrent
/// writes collapse into one request while different writes do not.
fn persist_key(user_id: &str, body: &str) -> String {
    let digest = Sha256::digest(body.as_bytes());
    format!("persist:{}:{}", user_id, &hex::encode(digest)[..16])
}

type Thunk = Arc<dyn Fn() -> BoxFuture<'static, Result<Response, HttpError>> + Send + Sync>;

/// Client for the backend that proxies the fitness service.
#[derive(Clone)]
pub struct BackendApi {
    base_url: String,
    http: Arc<dyn HttpClient>,
    coordinator: RequestCoordinator,
    per_page: u32,
}

impl std::fmt::Debug for BackendApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendApi")
            .field("base_url", &self.base_url)
            .field("per_page", &self.per_page)
            .finish_non_exhaustive()
    }
}

impl BackendApi {
    pub fn new(
        base_url: impl Into<String>,
        http: Arc<dyn HttpClient>,
        coordinator: RequestCoordinator,
        per_page: u32,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            coordinator,
            per_page,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn coordinator(&self) -> &RequestCoordinator {
        &self.coordinator
    }

    fn auth_headers(token: &str) -> Headers {
        let mut headers = Headers::new();
        headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        headers
    }

    fn get_thunk(&self, url: String, token: &str) -> Thunk {
        let http = Arc::clone(&self.http);
        let headers = Self::auth_headers(token);
        Arc::new(move || {
            let http = Arc::clone(&http);
            let url = url.clone();
            let headers = headers.clone();
            async move { http.get(&url, &headers).await?.error_for_status() }.boxed()
        })
    }

    fn post_thunk(&self, url: String, body: String, token: &str) -> Thunk {
        let http = Arc::clone(&self.http);
        let headers = Self::auth_headers(token);
        Arc::new(move || {
            let http = Arc::clone(&http);
            let url = url.clone();
            let body = body.clone();
            let headers = headers.clone();
            async move { http.post(&url, &body, &headers).await?.error_for_status() }.boxed()
        })
    }

    async fn cached(&self, key: &str, thunk: Thunk) -> Result<Response, HttpError> {
        self.coordinator.execute(key, move || thunk()).await
    }

    async fn fresh(&self, key: &str, thunk: Thunk) -> Result<Response, HttpError> {
        self.coordinator.execute_fresh(key, move || thunk()).await
    }

    /// `GET /api/strava/verify?userId=`
    pub async fn verify_credential(&self, identity: Identity<'_>) -> Result<VerifyResponse, HttpError> {
        let url = format!(
            "{}/api/strava/verify?userId={}",
            self.base_url,
            urlencoding::encode(identity.user_id)
        );
        let thunk = self.get_thunk(url, identity.access_token);
        let response = self
            .cached(&credential_status_key(identity.user_id), thunk)
            .await?;
        // An empty or non-JSON 2xx body still means "valid"
        Ok(response.json().unwrap_or_default())
    }

    /// `POST /api/strava/refresh` with `{userId}`.
    pub async fn refresh_credential(&self, identity: Identity<'_>) -> Result<RefreshResponse, HttpError> {
        let url = format!("{}/api/strava/refresh", self.base_url);
        let body = serde_json::json!({ "userId": identity.user_id }).to_string();
        let thunk = self.post_thunk(url, body, identity.access_token);
        let response = self.fresh(&refresh_key(identity.user_id), thunk).await?;
        Ok(response.json().unwrap_or_default())
    }

    /// `GET /api/strava/activities?userId=&per_page=&after=`
    ///
    /// `after` limits the fetch to activities started after that instant.
    pub async fn fetch_activities(
        &self,
        identity: Identity<'_>,
        after: Option<DateTime<Utc>>,
    ) -> FitsyncResult<Vec<ActivityRecord>> {
        let after_secs = after.map(|t| t.timestamp()).unwrap_or(0);
        let mut url = format!(
            "{}/api/strava/activities?userId={}&per_page={}",
            self.base_url,
            urlencoding::encode(identity.user_id),
            self.per_page
        );
        if after_secs > 0 {
            url.push_str(&format!("&after={}", after_secs));
        }

        let key = format!("{}{}", activities_key_prefix(identity.user_id), after_secs);
        let thunk = self.get_thunk(url, identity.access_token);
        let response = self.cached(&key, thunk).await?;

        if let Ok(body) = response.json::<ActivitiesResponse>() {
            return Ok(body.activities);
        }
        response
            .json::<Vec<ActivityRecord>>()
            .map_err(|e| NetworkError::from(e).into())
    }

    /// `GET /api/user-data/{userId}`
    pub async fn fetch_user_data(&self, identity: Identity<'_>) -> FitsyncResult<UserData> {
        let url = format!(
            "{}/api/user-data/{}",
            self.base_url,
            urlencoding::encode(identity.user_id)
        );
        let thunk = self.get_thunk(url, identity.access_token);
        let response = self.cached(&user_data_key(identity.user_id), thunk).await?;
        let body: UserDataResponse = response.json()?;
        Ok(body.data)
    }

    /// `POST /api/user-data/{userId}` with `mergeStrategy: "smart"`.
    ///
    /// Drops the cached user-data document on success.
    pub async fn save_user_data(&self, identity: Identity<'_>, data: &UserData) -> FitsyncResult<()> {
        let url = format!(
            "{}/api/user-data/{}",
            self.base_url,
            urlencoding::encode(identity.user_id)
        );
        let body = serde_json::to_string(&UserDataUpdate::smart(data))?;
        let key = persist_key(identity.user_id, &body);
        let thunk = self.post_thunk(url, body, identity.access_token);
        self.fresh(&key, thunk).await?;
        self.coordinator
            .invalidate(&user_data_key(identity.user_id))
            .await;
        Ok(())
    }

    /// `GET /api/strava/auth?userId=` → authorization URL.
    pub async fn authorization_url(&self, identity: Identity<'_>) -> FitsyncResult<String> {
        let url = format!(
            "{}/api/strava/auth?userId={}",
            self.base_url,
            urlencoding::encode(identity.user_id)
        );
        let thunk = self.get_thunk(url, identity.access_token);
        let response = self.fresh(&auth_url_key(identity.user_id), thunk).await?;
        let body: AuthUrlResponse = response.json()?;
        Ok(body.url)
    }

    /// Drop cached answers that a new credential makes stale.
    pub async fn invalidate_user(&self, user_id: &str) {
        self.coordinator
            .invalidate(&credential_status_key(user_id))
            .await;
        self.coordinator
            .invalidate_prefix(&activities_key_prefix(user_id))
            .await;
    }
}
