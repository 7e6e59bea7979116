//! Credentials provider trait abstraction.
//!
//! The orchestrator never reads the credential file directly; it asks a
//! [`CredentialsProvider`] so hosts and tests can supply their own storage.

use async_trait::async_trait;

use crate::auth::Credentials;

/// Credentials operation errors.
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialsError {
    /// Failed to load credentials
    LoadFailed(String),
    /// Failed to save credentials
    SaveFailed(String),
    /// Failed to clear credentials
    ClearFailed(String),
    /// Other error
    Other(String),
}

impl std::fmt::Display for CredentialsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialsError::LoadFailed(msg) => write!(f, "Failed to load credentials: {}", msg),
            CredentialsError::SaveFailed(msg) => write!(f, "Failed to save credentials: {}", msg),
            CredentialsError::ClearFailed(msg) => {
                write!(f, "Failed to clear credentials: {}", msg)
            }
            CredentialsError::Other(msg) => write!(f, "Credentials error: {}", msg),
        }
    }
}

impl std::error::Error for CredentialsError {}

/// Trait for credentials storage and retrieval.
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    /// Load credentials from storage.
    ///
    /// # Returns
    /// - `Ok(Some(credentials))` if credentials exist
    /// - `Ok(None)` if nothing is stored (not signed in)
    /// - `Err(error)` if loading failed
    async fn load(&self) -> Result<Option<Credentials>, CredentialsError>;

    /// Save credentials to storage.
    async fn save(&self, creds: &Credentials) -> Result<(), CredentialsError>;

    /// Clear all stored credentials.
    async fn clear(&self) -> Result<(), CredentialsError>;
}
