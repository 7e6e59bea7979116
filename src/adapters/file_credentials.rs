//! File-based credentials provider adapter.
//!
//! Wraps [`CredentialsManager`] behind the async [`CredentialsProvider`] trait.
//! Disk access runs on the blocking pool.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::auth::credentials::{Credentials, CredentialsManager};
use crate::traits::{CredentialsError, CredentialsProvider};

/// File-based credentials provider.
///
/// Credentials are stored in `~/.fitsync/credentials.json` unless an explicit
/// path is given.
#[derive(Debug, Clone)]
pub struct FileCredentialsProvider {
    manager: CredentialsManager,
}

impl FileCredentialsProvider {
    /// Create a provider for the default credentials file.
    ///
    /// Fails if the home directory cannot be determined.
    pub fn new() -> Result<Self, CredentialsError> {
        CredentialsManager::new()
            .map(|manager| Self { manager })
            .ok_or_else(|| {
                CredentialsError::Other("Failed to determine home directory".to_string())
            })
    }

    /// Create a provider for an explicit file path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            manager: CredentialsManager::with_path(path),
        }
    }

    /// Get the path to the credentials file.
    pub fn credentials_path(&self) -> &PathBuf {
        self.manager.credentials_path()
    }
}

#[async_trait]
impl CredentialsProvider for FileCredentialsProvider {
    async fn load(&self) -> Result<Option<Credentials>, CredentialsError> {
        let manager = self.manager.clone();
        let creds = tokio::task::spawn_blocking(move || manager.load())
            .await
            .map_err(|e| CredentialsError::LoadFailed(e.to_string()))?;

        if creds == Credentials::default() {
            Ok(None)
        } else {
            Ok(Some(creds))
        }
    }

    async fn save(&self, creds: &Credentials) -> Result<(), CredentialsError> {
        let manager = self.manager.clone();
        let creds = creds.clone();
        tokio::task::spawn_blocking(move || manager.save(&creds))
            .await
            .map_err(|e| CredentialsError::SaveFailed(e.to_string()))?
            .map_err(|e| CredentialsError::SaveFailed(e.to_string()))
    }

    async fn clear(&self) -> Result<(), CredentialsError> {
        let manager = self.manager.clone();
        tokio::task::spawn_blocking(move || manager.clear())
            .await
            .map_err(|e| CredentialsError::ClearFailed(e.to_string()))?
            .map_err(|e| CredentialsError::ClearFailed(e.to_string()))
    }
}
