//! Error types for the sync orchestrator.
//!
//! Transport and storage seams have their own error types
//! ([`HttpError`](crate::traits::HttpError),
//! [`CredentialsError`](crate::traits::CredentialsError),
//! [`StoreError`](crate::traits::StoreError)). Inside the sync pipeline they
//! are folded into [`FitsyncError`]. A 401 anywhere asks for a credential
//! refresh; other failures are logged with their category.
//!
//! | Category | Description |
//! |----------|-------------|
//! | Network | Connection, DNS, timeout |
//! | Auth | Missing or rejected credential |
//! | Server | 5xx or unusable body |
//! | Rejected | 4xx other than 401 |
//! | Storage | Local store failures |

mod auth;
mod category;
mod fitsync_error;
mod network;
mod result;

pub use auth::AuthError;
pub use category::ErrorCategory;
pub use fitsync_error::FitsyncError;
pub use network::NetworkError;
pub use result::FitsyncResult;
