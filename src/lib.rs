//! fitsync - background sync orchestrator for fitness activity data
//!
//! Keeps a local calendar of completed workouts in step with the remote
//! fitness service. The [`orchestrator::Orchestrator`] owns the timers, the
//! credential monitor and the sync engine; hosts drive it through its
//! operations and observe it through [`events::OrchestratorEvent`]s.
//!
//! All I/O goes through the traits in [`traits`], so the library exposes
//! in-memory implementations under [`adapters`] for integration tests.

pub mod adapters;
pub mod api;
pub mod auth;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod models;
pub mod orchestrator;
pub mod sync;
pub mod timers;
pub mod traits;

pub use config::SyncConfig;
pub use error::{FitsyncError, FitsyncResult};
pub use events::OrchestratorEvent;
pub use orchestrator::{HostSignal, Orchestrator};
