//! Authentication-related error types.

use std::fmt;

/// Credential lifecycle errors.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    /// No stored identity (user not signed in).
    NotAuthenticated,

    /// The backend rejected the bearer token (401).
    TokenExpired,

    /// Verification endpoint reported the credential invalid.
    CredentialInvalid { message: String },

    /// Failed to refresh the credential.
    RefreshFailed { message: String },

    /// Credentials could not be loaded or saved.
    CredentialsStorage { message: String },
}

impl AuthError {
    /// Check if this error might be resolved by refreshing or re-authorizing.
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            AuthError::TokenExpired
                | AuthError::CredentialInvalid { .. }
                | AuthError::RefreshFailed { .. }
        )
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::NotAuthenticated => "E_AUTH_NOT_AUTH",
            AuthError::TokenExpired => "E_AUTH_TOKEN_EXP",
            AuthError::CredentialInvalid { .. } => "E_AUTH_INVALID",
            AuthError::RefreshFailed { .. } => "E_AUTH_REFRESH_FAIL",
            AuthError::CredentialsStorage { .. } => "E_AUTH_CRED_STORE",
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::NotAuthenticated => write!(f, "Not authenticated"),
            AuthError::TokenExpired => write!(f, "Credential expired"),
            AuthError::CredentialInvalid { message } => {
                write!(f, "Credential invalid: {}", message)
            }
            AuthError::RefreshFailed { message } => write!(f, "Refresh failed: {}", message),
            AuthError::CredentialsStorage { message } => {
                write!(f, "Credential storage error: {}", message)
            }
        }
    }
}

impl std::error::Error for AuthError {}

impl From<crate::traits::CredentialsError> for AuthError {
    fn from(err: crate::traits::CredentialsError) -> Self {
        AuthError::CredentialsStorage {
            message: err.to_string(),
        }
    }
}
