//! Orchestrator configuration.
//!
//! Defaults match the production timings. Use the builder methods or
//! [`SyncConfig::from_env`] to override them.
//!
//! # Example
//!
//! ```ignore
//! use fitsync::config::SyncConfig;
//! use std::time::Duration;
//!
//! let config = SyncConfig::default()
//!     .with_api_base_url("https://api.example.com")
//!     .with_sync_interval(Duration::from_secs(600));
//! ```

use std::path::PathBuf;
use std::time::Duration;

/// Default URL for the backend that proxies the fitness service.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";

/// Default number of activities requested per sync.
pub const DEFAULT_ACTIVITIES_PER_PAGE: u32 = 30;

/// Timing and endpoint configuration for the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Base URL of the backend API
    pub api_base_url: String,
    /// How long a successful coordinated response stays cached (default: 5 min)
    pub cache_timeout: Duration,
    /// Additional attempts after the first failure (default: 3)
    pub max_retries: u32,
    /// Fixed delay between attempts (default: 2s)
    pub retry_delay: Duration,
    /// Period of the background sync timer (default: 30 min)
    pub sync_interval: Duration,
    /// Period of the credential re-check timer (default: 10 min)
    pub credential_check_interval: Duration,
    /// Delay before the first sync after enabling (default: 1s)
    pub initial_sync_delay: Duration,
    /// Delay before the single re-run after a credential refresh (default: 2s)
    pub refresh_retry_delay: Duration,
    /// Page size for the activities request
    pub activities_per_page: u32,
    /// Directory for the file-backed store (binary only)
    pub data_dir: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            cache_timeout: Duration::from_millis(300_000),
            max_retries: 3,
            retry_delay: Duration::from_millis(2_000),
            sync_interval: Duration::from_secs(30 * 60),
            credential_check_interval: Duration::from_secs(10 * 60),
            initial_sync_delay: Duration::from_secs(1),
            refresh_retry_delay: Duration::from_secs(2),
            activities_per_page: DEFAULT_ACTIVITIES_PER_PAGE,
            data_dir: None,
        }
    }
}

impl SyncConfig {
    /// Create a new SyncConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend base URL. A trailing slash is dropped.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.api_base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_cache_timeout(mut self, timeout: Duration) -> Self {
        self.cache_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    pub fn with_credential_check_interval(mut self, interval: Duration) -> Self {
        self.credential_check_interval = interval;
        self
    }

    pub fn with_initial_sync_delay(mut self, delay: Duration) -> Self {
        self.initial_sync_delay = delay;
        self
    }

    pub fn with_refresh_retry_delay(mut self, delay: Duration) -> Self {
        self.refresh_retry_delay = delay;
        self
    }

    pub fn with_activities_per_page(mut self, per_page: u32) -> Self {
        self.activities_per_page = per_page;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Directory for the file-backed store: the configured one, else
    /// `<data dir>/fitsync`, else `./fitsync-data`.
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join("fitsync"))
                .unwrap_or_else(|| PathBuf::from("fitsync-data"))
        })
    }

    /// Build config from `FITSYNC_*` environment variables.
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("FITSYNC_API_URL") {
            config = config.with_api_base_url(url);
        }
        if let Some(secs) = env_u64("FITSYNC_SYNC_INTERVAL_SECS") {
            config.sync_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("FITSYNC_CREDENTIAL_CHECK_SECS") {
            config.credential_check_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("FITSYNC_CACHE_TIMEOUT_SECS") {
            config.cache_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = env_u64("FITSYNC_MAX_RETRIES") {
            config.max_retries = u32::try_from(retries).unwrap_or(u32::MAX);
        }
        if let Some(ms) = env_u64("FITSYNC_RETRY_DELAY_MS") {
            config.retry_delay = Duration::from_millis(ms);
        }
        if let Ok(dir) = std::env::var("FITSYNC_DATA_DIR") {
            config.data_dir = Some(PathBuf::from(dir));
        }

        config
    }
}

fn env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "Ignoring unparsable config value");
            None
        }
    }
}
