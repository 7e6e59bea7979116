//! Request coordinator: de-duplication, caching and retry for remote calls.
//!
//! Every remote call the orchestrator makes is a *coordinated call*: a key
//! plus a thunk that performs one attempt. For a given key the coordinator
//!
//! 1. answers from the cache while the last success is younger than
//!    `cache_timeout`,
//! 2. otherwise joins an attempt sequence already in flight,
//! 3. otherwise spawns a new attempt sequence with fixed-delay retry.
//!
//! The attempt sequence runs in its own task, so it finishes (and updates
//! the cache) even if every caller has gone away. Callers share its result
//! through a [`Shared`] future.

mod cache;
mod retry;

pub use cache::{CacheEntry, ResponseCache};
pub use retry::RetryPolicy;

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::SyncConfig;
use crate::traits::{HttpError, Response};

type SharedAttempt = Shared<BoxFuture<'static, Result<Response, HttpError>>>;

struct InFlightRequest {
    id: u64,
    result: SharedAttempt,
}

#[derive(Default)]
struct CoordinatorState {
    cache: ResponseCache,
    in_flight: HashMap<String, InFlightRequest>,
    next_id: u64,
}

/// De-duplicating, caching, retrying executor for coordinated calls.
#[derive(Clone)]
pub struct RequestCoordinator {
    cache_timeout: Duration,
    retry: RetryPolicy,
    state: Arc<Mutex<CoordinatorState>>,
}

impl std::fmt::Debug for RequestCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCoordinator")
            .field("cache_timeout", &self.cache_timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl RequestCoordinator {
    pub fn new(cache_timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            cache_timeout,
            retry,
            state: Arc::new(Mutex::new(CoordinatorState::default())),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.cache_timeout,
            RetryPolicy::new(config.max_retries, config.retry_delay),
        )
    }

    /// Execute a cacheable coordinated call.
    pub async fn execute<F, Fut>(&self, key: &str, operation: F) -> Result<Response, HttpError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, HttpError>> + Send + 'static,
    {
        self.run(key, operation, true).await
    }

    /// Execute a coordinated call that bypasses the cache.
    ///
    /// Concurrent calls with the same key are still joined and transient
    /// failures still retried. Used for state-changing requests.
    pub async fn execute_fresh<F, Fut>(
        &self,
        key: &str,
        operation: F,
    ) -> Result<Response, HttpError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, HttpError>> + Send + 'static,
    {
        self.run(key, operation, false).await
    }

    async fn run<F, Fut>(&self, key: &str, operation: F, cacheable: bool) -> Result<Response, HttpError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, HttpError>> + Send + 'static,
    {
        let shared = {
            let mut state = self.state.lock().await;

            if cacheable {
                if let Some(response) = state.cache.get(key, self.cache_timeout) {
                    tracing::debug!(key, "Cache hit");
                    return Ok(response);
                }
            }

            if let Some(in_flight) = state.in_flight.get(key) {
                tracing::debug!(key, "Joining in-flight request");
                in_flight.result.clone()
            } else {
                let id = state.next_id;
                state.next_id += 1;
                let shared = self.spawn_attempts(key, id, operation, cacheable);
                state.in_flight.insert(
                    key.to_string(),
                    InFlightRequest {
                        id,
                        result: shared.clone(),
                    },
                );
                shared
            }
        };

        shared.await
    }

    fn spawn_attempts<F, Fut>(&self, key: &str, id: u64, operation: F, cacheable: bool) -> SharedAttempt
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, HttpError>> + Send + 'static,
    {
        let retry = self.retry;
        let state = Arc::clone(&self.state);
        let task_key = key.to_string();

        let task = tokio::spawn(async move {
            let result = retry.execute(&task_key, &operation).await;

            let mut state = state.lock().await;
            if state.in_flight.get(&task_key).is_some_and(|f| f.id == id) {
                state.in_flight.remove(&task_key);
            }
            if cacheable {
                if let Ok(response) = &result {
                    state.cache.insert(&task_key, response.clone());
                }
            }
            result
        });

        async move {
            task.await
                .unwrap_or_else(|e| Err(HttpError::Other(format!("request task failed: {}", e))))
        }
        .boxed()
        .shared()
    }

    /// Drop the cached response for `key`.
    pub async fn invalidate(&self, key: &str) -> bool {
        self.state.lock().await.cache.remove(key)
    }

    /// Drop every cached response whose key starts with `prefix`.
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        let removed = self.state.lock().await.cache.remove_prefix(prefix);
        if removed > 0 {
            tracing::debug!(prefix, removed, "Cache entries invalidated");
        }
        removed
    }

    /// Drop every cached response. In-flight requests are unaffected.
    pub async fn clear(&self) {
        self.state.lock().await.cache.clear();
    }

    /// Entries currently held, including expired ones not yet evicted.
    pub async fn cached_entry_count(&self) -> usize {
        self.state.lock().await.cache.len()
    }

    pub async fn in_flight_count(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }
}
