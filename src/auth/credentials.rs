//! Stored identity and bearer credential.
//!
//! Credentials live in `~/.fitsync/credentials.json` by default. A missing or
//! unreadable file means "not signed in", which is a normal state for the
//! orchestrator rather than an error.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

/// The credentials directory name.
const CREDENTIALS_DIR: &str = ".fitsync";

/// The credentials file name.
const CREDENTIALS_FILE: &str = "credentials.json";

/// Authentication credentials for the backend that proxies the fitness service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Credentials {
    /// Bearer token sent with every remote call.
    pub access_token: Option<String>,
    /// The signed-in user's ID.
    pub user_id: Option<String>,
    /// Token expiration time as Unix timestamp (seconds since epoch).
    pub expires_at: Option<i64>,
}

/// Borrowed view of a complete identity: both user id and token present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity<'a> {
    pub user_id: &'a str,
    pub access_token: &'a str,
}

impl Credentials {
    /// Create new empty credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credentials for a user with a token and no known expiry.
    pub fn for_user(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            user_id: Some(user_id.into()),
            expires_at: None,
        }
    }

    /// The identity, when both the user id and the token are stored.
    pub fn identity(&self) -> Option<Identity<'_>> {
        match (self.user_id.as_deref(), self.access_token.as_deref()) {
            (Some(user_id), Some(access_token))
                if !user_id.is_empty() && !access_token.is_empty() =>
            {
                Some(Identity {
                    user_id,
                    access_token,
                })
            }
            _ => None,
        }
    }

    /// Replace the token after a refresh, keeping the user id.
    pub fn rotate(&mut self, access_token: String, expires_at: Option<i64>) {
        self.expires_at = expires_at.or_else(|| jwt_expires_at(&access_token));
        self.access_token = Some(access_token);
    }
}

/// JWT claims for extracting expiration time.
#[derive(Deserialize)]
struct JwtClaims {
    exp: i64,
}

/// Read the `exp` claim of a JWT access token.
///
/// Returns None when the token is not a JWT or carries no expiry.
pub fn jwt_expires_at(access_token: &str) -> Option<i64> {
    let parts: Vec<&str> = access_token.split('.').collect();
    let payload = URL_SAFE_NO_PAD.decode(parts.get(1)?).ok()?;
    let claims: JwtClaims = serde_json::from_slice(&payload).ok()?;
    Some(claims.exp)
}

/// Manages credential storage and retrieval on disk.
#[derive(Debug, Clone)]
pub struct CredentialsManager {
    /// Path to the credentials file.
    credentials_path: PathBuf,
}

impl CredentialsManager {
    /// Create a manager for `~/.fitsync/credentials.json`.
    ///
    /// Returns `None` if the home directory cannot be determined.
    pub fn new() -> Option<Self> {
        let home = dirs::home_dir()?;
        let credentials_path = home.join(CREDENTIALS_DIR).join(CREDENTIALS_FILE);
        Some(Self { credentials_path })
    }

    /// Create a manager for an explicit file path.
    pub fn with_path(credentials_path: impl Into<PathBuf>) -> Self {
        Self {
            credentials_path: credentials_path.into(),
        }
    }

    /// Get the path to the credentials file.
    pub fn credentials_path(&self) -> &PathBuf {
        &self.credentials_path
    }

    /// Load credentials from the credentials file.
    ///
    /// Returns default credentials if the file doesn't exist or can't be read.
    pub fn load(&self) -> Credentials {
        if !self.credentials_path.exists() {
            return Credentials::default();
        }

        let file = match File::open(&self.credentials_path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(path = %self.credentials_path.display(), error = %e, "Cannot open credentials file");
                return Credentials::default();
            }
        };

        match serde_json::from_reader(BufReader::new(file)) {
            Ok(creds) => creds,
            Err(e) => {
                tracing::warn!(error = %e, "Credentials file is not valid JSON");
                Credentials::default()
            }
        }
    }

    /// Save credentials to the credentials file.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save(&self, credentials: &Credentials) -> std::io::Result<()> {
        if let Some(parent) = self.credentials_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(&self.credentials_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, credentials)?;
        writer.flush()
    }

    /// Remove the credentials file if it exists.
    pub fn clear(&self) -> std::io::Result<()> {
        if !self.credentials_path.exists() {
            return Ok(());
        }
        fs::remove_file(&self.credentials_path)
    }
}
