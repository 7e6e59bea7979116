//! Credential validity tracking.
//!
//! The monitor owns the `Unknown → Valid | Invalid` status of the stored
//! credential. It never returns errors: every failure is folded into the
//! status, the shared error counter and a log line.

use std::sync::{Arc, Mutex};

use super::credentials::Credentials;
use crate::api::BackendApi;
use crate::events::{EventBus, OrchestratorEvent};
use crate::sync::StateHandle;
use crate::traits::CredentialsProvider;

/// Validity of the stored credential as last observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CredentialStatus {
    #[default]
    Unknown,
    Valid,
    Invalid,
}

/// Checks and refreshes the stored credential.
pub struct CredentialMonitor {
    api: BackendApi,
    credentials: Arc<dyn CredentialsProvider>,
    state: StateHandle,
    bus: Arc<EventBus>,
    status: Mutex<CredentialStatus>,
}

impl std::fmt::Debug for CredentialMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialMonitor")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl CredentialMonitor {
    pub fn new(
        api: BackendApi,
        credentials: Arc<dyn CredentialsProvider>,
        state: StateHandle,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            api,
            credentials,
            state,
            bus,
            status: Mutex::new(CredentialStatus::Unknown),
        }
    }

    pub fn status(&self) -> CredentialStatus {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_status(&self, status: CredentialStatus) {
        *self.status.lock().unwrap_or_else(|e| e.into_inner()) = status;
        self.state
            .set_credential_valid(status == CredentialStatus::Valid);
    }

    /// Stored credentials with a complete identity, if signed in.
    ///
    /// A provider failure is logged and treated as "not signed in".
    pub async fn signed_in(&self) -> Option<Credentials> {
        match self.credentials.load().await {
            Ok(Some(creds)) if creds.identity().is_some() => Some(creds),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot load credentials");
                None
            }
        }
    }

    /// Verify the credential with the backend. Returns the resulting validity.
    ///
    /// Not signed in: marked invalid without counting an error or announcing
    /// anything. A 404 from the verification endpoint is treated as valid.
    pub async fn check_status(&self) -> bool {
        let Some(creds) = self.signed_in().await else {
            tracing::debug!("No stored identity, credential marked invalid");
            self.set_status(CredentialStatus::Invalid);
            return false;
        };
        let Some(identity) = creds.identity() else {
            self.set_status(CredentialStatus::Invalid);
            return false;
        };

        let valid = match self.api.verify_credential(identity).await {
            Ok(verdict) if verdict.is_valid() => {
                self.state.reset_errors();
                true
            }
            Ok(_) => {
                let errors = self.state.increment_errors();
                tracing::warn!(user_id = identity.user_id, errors, "Backend reports credential invalid");
                false
            }
            Err(e) if e.is_not_found() => {
                tracing::info!(user_id = identity.user_id, "Verification endpoint missing, assuming credential valid");
                self.state.reset_errors();
                true
            }
            Err(e) => {
                let errors = self.state.increment_errors();
                tracing::warn!(user_id = identity.user_id, errors, error = %e, "Credential check failed");
                false
            }
        };

        self.set_status(if valid {
            CredentialStatus::Valid
        } else {
            CredentialStatus::Invalid
        });
        self.bus
            .publish(OrchestratorEvent::CredentialStatusChanged { valid });
        valid
    }

    /// Ask the backend to refresh the credential. Returns true on success.
    ///
    /// A rotated token in the response is saved through the credentials
    /// provider. Cached verification and activity answers are dropped.
    pub async fn refresh(&self) -> bool {
        let Some(mut creds) = self.signed_in().await else {
            tracing::debug!("No stored identity, nothing to refresh");
            self.set_status(CredentialStatus::Invalid);
            return false;
        };
        let Some(identity) = creds.identity() else {
            self.set_status(CredentialStatus::Invalid);
            return false;
        };
        let user_id = identity.user_id.to_string();

        let refreshed = match self.api.refresh_credential(identity).await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                let errors = self.state.increment_errors();
                tracing::warn!(user_id = %user_id, errors, error = %e, "Credential refresh failed");
                self.set_status(CredentialStatus::Invalid);
                return false;
            }
        };

        if let Some(token) = refreshed.access_token {
            creds.rotate(token, refreshed.expires_at);
            if let Err(e) = self.credentials.save(&creds).await {
                tracing::warn!(user_id = %user_id, error = %e, "Refreshed token could not be saved");
            }
        }

        self.api.invalidate_user(&user_id).await;
        self.set_status(CredentialStatus::Valid);
        self.state.reset_errors();
        tracing::info!(user_id = %user_id, "Credential refreshed");
        self.bus.publish(OrchestratorEvent::CredentialRefreshed);
        true
    }
}
