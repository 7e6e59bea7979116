//! Result type alias for orchestrator operations.

use super::fitsync_error::FitsyncError;

/// Type alias for Results using FitsyncError.
pub type FitsyncResult<T> = Result<T, FitsyncError>;
