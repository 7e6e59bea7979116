//! Unified error type for the sync pipeline.
//!
//! `FitsyncError` is what each stage of a sync cycle returns internally. The
//! public control surface never exposes it; the engine turns it into a
//! [`SyncOutcome`](crate::sync::SyncOutcome) and a `syncFailed` event.

use std::fmt;

use super::auth::AuthError;
use super::category::ErrorCategory;
use super::network::NetworkError;
use crate::traits::{CredentialsError, HttpError, StoreError};

/// Unified error type for orchestrator operations.
#[derive(Debug, Clone, PartialEq)]
pub enum FitsyncError {
    /// Network-related errors (connections, HTTP, timeouts, bodies).
    Network(NetworkError),

    /// Credential errors.
    Auth(AuthError),

    /// Local store errors.
    Storage(StoreError),
}

impl FitsyncError {
    /// Get the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            FitsyncError::Network(NetworkError::HttpStatus { status, .. }) => {
                if *status == 401 {
                    ErrorCategory::Auth
                } else if *status >= 500 {
                    ErrorCategory::Server
                } else {
                    ErrorCategory::Rejected
                }
            }
            FitsyncError::Network(NetworkError::InvalidResponse { .. }) => ErrorCategory::Server,
            FitsyncError::Network(_) => ErrorCategory::Network,
            FitsyncError::Auth(_) => ErrorCategory::Auth,
            FitsyncError::Storage(_) => ErrorCategory::Storage,
        }
    }

    /// Check if this error is likely transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            FitsyncError::Network(err) => err.is_retryable(),
            FitsyncError::Auth(_) | FitsyncError::Storage(_) => false,
        }
    }

    /// Whether a credential refresh could resolve this error.
    ///
    /// True for a 401 from any endpoint and for auth errors that need it.
    pub fn requires_reauth(&self) -> bool {
        match self {
            FitsyncError::Network(err) => err.status() == Some(401),
            FitsyncError::Auth(err) => err.requires_reauth(),
            FitsyncError::Storage(_) => false,
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            FitsyncError::Network(err) => err.error_code(),
            FitsyncError::Auth(err) => err.error_code(),
            FitsyncError::Storage(StoreError::ReadFailed(_)) => "E_STORE_READ",
            FitsyncError::Storage(StoreError::WriteFailed(_)) => "E_STORE_WRITE",
            FitsyncError::Storage(StoreError::Corrupt(_)) => "E_STORE_CORRUPT",
        }
    }
}

impl fmt::Display for FitsyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitsyncError::Network(err) => write!(f, "{}", err),
            FitsyncError::Auth(err) => write!(f, "{}", err),
            FitsyncError::Storage(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for FitsyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FitsyncError::Network(err) => Some(err),
            FitsyncError::Auth(err) => Some(err),
            FitsyncError::Storage(err) => Some(err),
        }
    }
}

impl From<NetworkError> for FitsyncError {
    fn from(err: NetworkError) -> Self {
        FitsyncError::Network(err)
    }
}

impl From<AuthError> for FitsyncError {
    fn from(err: AuthError) -> Self {
        FitsyncError::Auth(err)
    }
}

impl From<StoreError> for FitsyncError {
    fn from(err: StoreError) -> Self {
        FitsyncError::Storage(err)
    }
}

impl From<HttpError> for FitsyncError {
    fn from(err: HttpError) -> Self {
        FitsyncError::Network(err.into())
    }
}

impl From<CredentialsError> for FitsyncError {
    fn from(err: CredentialsError) -> Self {
        FitsyncError::Auth(err.into())
    }
}

impl From<serde_json::Error> for FitsyncError {
    fn from(err: serde_json::Error) -> Self {
        FitsyncError::Network(err.into())
    }
}
