//! In-memory credentials provider for testing.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::auth::credentials::Credentials;
use crate::traits::{CredentialsError, CredentialsProvider};

/// In-memory credentials provider for testing.
///
/// Clones share the same storage, so a test can keep one handle and hand
/// another to the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentials {
    credentials: Arc<Mutex<Option<Credentials>>>,
    save_should_fail: Arc<Mutex<bool>>,
    load_should_fail: Arc<Mutex<bool>>,
}

impl InMemoryCredentials {
    /// Create an empty provider (not signed in).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider with initial credentials.
    pub fn with_credentials(creds: Credentials) -> Self {
        let provider = Self::new();
        provider.set_credentials(Some(creds));
        provider
    }

    /// Configure whether save should fail.
    pub fn set_save_should_fail(&self, should_fail: bool) {
        *self.save_should_fail.lock().unwrap() = should_fail;
    }

    /// Configure whether load should fail.
    pub fn set_load_should_fail(&self, should_fail: bool) {
        *self.load_should_fail.lock().unwrap() = should_fail;
    }

    /// Get the current credentials synchronously.
    pub fn get_credentials(&self) -> Option<Credentials> {
        self.credentials.lock().unwrap().clone()
    }

    /// Set credentials synchronously.
    pub fn set_credentials(&self, creds: Option<Credentials>) {
        *self.credentials.lock().unwrap() = creds;
    }
}

#[async_trait]
impl CredentialsProvider for InMemoryCredentials {
    async fn load(&self) -> Result<Option<Credentials>, CredentialsError> {
        if *self.load_should_fail.lock().unwrap() {
            return Err(CredentialsError::LoadFailed("Mock load failure".to_string()));
        }
        Ok(self.credentials.lock().unwrap().clone())
    }

    async fn save(&self, creds: &Credentials) -> Result<(), CredentialsError> {
        if *self.save_should_fail.lock().unwrap() {
            return Err(CredentialsError::SaveFailed("Mock save failure".to_string()));
        }
        *self.credentials.lock().unwrap() = Some(creds.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), CredentialsError> {
        *self.credentials.lock().unwrap() = None;
        Ok(())
    }
}
