//! Error category classification.
//!
//! The sync engine labels failed cycles with a category and its recovery
//! hint.

use std::fmt;

/// High-level categorization of errors for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection, DNS, timeout. Transient.
    Network,

    /// Credential missing, expired or rejected.
    Auth,

    /// Backend answered with 5xx or an unusable body.
    Server,

    /// Backend rejected the request (4xx other than 401).
    Rejected,

    /// Local store or credential file problems.
    Storage,
}

impl ErrorCategory {
    /// Returns a short label for the category suitable for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Server => "server",
            ErrorCategory::Rejected => "rejected",
            ErrorCategory::Storage => "storage",
        }
    }

    /// Returns suggested recovery actions for this category.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "Sync will retry on the next cycle",
            ErrorCategory::Auth => "Reconnect your fitness account",
            ErrorCategory::Server => "The backend may be experiencing issues",
            ErrorCategory::Rejected => "The backend refused the request",
            ErrorCategory::Storage => "Check file permissions and available disk space",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
