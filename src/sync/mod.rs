//! Sync state, reconciliation and the engine that drives them.

pub mod engine;
pub mod reconcile;
pub mod state;

pub use engine::{EnableOutcome, SkipReason, SyncEngine, SyncOutcome};
pub use reconcile::{reconcile, ReconcileSummary};
pub use state::{OrchestratorState, StateHandle};
