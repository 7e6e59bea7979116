//! Stored identity and credential lifecycle.
//!
//! - [`credentials`] - the persisted identity and bearer token
//! - [`monitor`] - validity checks and refresh against the backend

pub mod credentials;
pub mod monitor;

pub use credentials::{Credentials, CredentialsManager, Identity};
pub use monitor::{CredentialMonitor, CredentialStatus};
