//! Named timer registry.
//!
//! Every background activity of the orchestrator is a named tokio task held
//! here: the periodic sync, the periodic credential check and the one-shot
//! delayed syncs. Registering a name that is already taken aborts the old
//! task first, so there is never more than one active task per name.
//!
//! A firing runs its callback in a separate spawned task and awaits it. A
//! panicking callback is therefore reported as a join error and the timer
//! keeps ticking, and aborting a timer never cancels a callback that is
//! already running.

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Timer name for the periodic sync.
pub const SYNC_TIMER: &str = "sync";
/// Timer name for the periodic credential check.
pub const CREDENTIAL_CHECK_TIMER: &str = "credential-check";
/// One-shot sync shortly after enabling.
pub const INITIAL_SYNC_TIMER: &str = "initial-sync";
/// One-shot re-run after a credential refresh.
pub const SYNC_RETRY_TIMER: &str = "sync-retry";

/// Work run on each firing.
pub type TimerCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Registry of named recurring and one-shot timers.
#[derive(Default)]
pub struct TimerRegistry {
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl std::fmt::Debug for TimerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerRegistry")
            .field("active", &self.active_count())
            .finish()
    }
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.timers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `callback` every `interval`, first firing one interval from now.
    ///
    /// Replaces (aborts) any timer already registered under `name`. Does
    /// nothing outside a tokio runtime.
    pub fn set_timer(&self, name: &str, interval: Duration, callback: TimerCallback) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(timer = name, "No tokio runtime, timer not started");
            return;
        };

        let timer_name = name.to_string();
        let task = handle.spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tracing::debug!(timer = %timer_name, "Timer fired");
                run_isolated(&timer_name, callback()).await;
            }
        });

        self.replace(name, task);
        tracing::debug!(timer = name, interval_ms = interval.as_millis() as u64, "Timer started");
    }

    /// Run `callback` once after `delay`.
    ///
    /// Same replace-by-name rule as [`set_timer`](Self::set_timer). Stopping
    /// the name cancels it only while it is still waiting.
    pub fn schedule_once(&self, name: &str, delay: Duration, callback: TimerCallback) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(timer = name, "No tokio runtime, delayed task not scheduled");
            return;
        };

        let timer_name = name.to_string();
        let task = handle.spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::debug!(timer = %timer_name, "Delayed task fired");
            // Detached so that stopping or replacing this name after the
            // delay has elapsed does not cut the work short.
            tokio::spawn(callback());
        });

        self.replace(name, task);
    }

    fn replace(&self, name: &str, task: JoinHandle<()>) {
        if let Some(previous) = self.lock().insert(name.to_string(), task) {
            previous.abort();
            tracing::debug!(timer = name, "Replaced existing timer");
        }
    }

    /// Cancel the timer registered under `name`. Returns true if one existed.
    pub fn stop(&self, name: &str) -> bool {
        match self.lock().remove(name) {
            Some(task) => {
                task.abort();
                tracing::debug!(timer = name, "Timer stopped");
                true
            }
            None => false,
        }
    }

    /// Cancel every registered timer.
    pub fn stop_all(&self) {
        let mut timers = self.lock();
        let count = timers.len();
        for (_, task) in timers.drain() {
            task.abort();
        }
        if count > 0 {
            tracing::debug!(count, "All timers stopped");
        }
    }

    /// Number of timers still alive. Finished one-shots are pruned.
    pub fn active_count(&self) -> usize {
        let mut timers = self.lock();
        timers.retain(|_, task| !task.is_finished());
        timers.len()
    }

    /// Whether a live timer is registered under `name`.
    pub fn is_active(&self, name: &str) -> bool {
        self.lock()
            .get(name)
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for TimerRegistry {
    fn drop(&mut self) {
        self.stop_all();
    }
}

async fn run_isolated(name: &str, work: BoxFuture<'static, ()>) {
    if let Err(e) = tokio::spawn(work).await {
        if e.is_panic() {
            tracing::error!(timer = name, "Timer callback panicked");
        }
    }
}
