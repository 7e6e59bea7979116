//! HTTP client trait abstraction.
//!
//! Every remote call the orchestrator makes goes through [`HttpClient`], so
//! the transport can be swapped for a mock in tests.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;

/// HTTP headers represented as a key-value map.
pub type Headers = HashMap<String, String>;

/// HTTP response wrapper.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: Headers,
    /// Response body
    pub body: Bytes,
}

impl Response {
    /// Create a new response.
    pub fn new(status: u16, body: Bytes) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body,
        }
    }

    /// Create a new response with headers.
    pub fn with_headers(status: u16, headers: Headers, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Check if the response indicates success (2xx status).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get the response body as a string.
    pub fn text(&self) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.body.to_vec())
    }

    /// Parse the response body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Turn a non-2xx response into [`HttpError::ServerError`].
    ///
    /// Callers that hand a request to the coordinator use this so only
    /// successful responses are ever cached.
    pub fn error_for_status(self) -> Result<Self, HttpError> {
        if self.is_success() {
            return Ok(self);
        }
        let message = self
            .text()
            .unwrap_or_else(|_| "<non-utf8 body>".to_string());
        Err(HttpError::ServerError {
            status: self.status,
            message,
        })
    }
}

/// HTTP client errors.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpError {
    /// Connection failed
    ConnectionFailed(String),
    /// Request timeout
    Timeout(String),
    /// Server returned an error status
    ServerError { status: u16, message: String },
    /// Request was cancelled
    Cancelled,
    /// IO error
    Io(String),
    /// Invalid URL
    InvalidUrl(String),
    /// Other error
    Other(String),
}

impl HttpError {
    /// HTTP status carried by this error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::ServerError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether another attempt of the same request could succeed.
    ///
    /// Transport failures, 5xx, 408 and 429 are transient. Every other
    /// status is a definitive answer from the server.
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::ConnectionFailed(_) | HttpError::Timeout(_) | HttpError::Io(_) => true,
            HttpError::ServerError { status, .. } => {
                *status >= 500 || *status == 429 || *status == 408
            }
            HttpError::Cancelled | HttpError::InvalidUrl(_) | HttpError::Other(_) => false,
        }
    }

    /// True for a 404 answer.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            HttpError::Timeout(msg) => write!(f, "Request timeout: {}", msg),
            HttpError::ServerError { status, message } => {
                write!(f, "Server error ({}): {}", status, message)
            }
            HttpError::Cancelled => write!(f, "Request cancelled"),
            HttpError::Io(msg) => write!(f, "IO error: {}", msg),
            HttpError::InvalidUrl(msg) => write!(f, "Invalid URL: {}", msg),
            HttpError::Other(msg) => write!(f, "HTTP error: {}", msg),
        }
    }
}

impl std::error::Error for HttpError {}

/// Trait for HTTP client operations.
///
/// Implementations include the production reqwest-based client and the mock
/// client used by tests.
///
/// # Example
///
/// ```ignore
/// use fitsync::traits::{HttpClient, Headers, HttpError};
///
/// async fn fetch<C: HttpClient>(client: &C) -> Result<String, HttpError> {
///     let response = client.get("https://api.example.com/data", &Headers::new()).await?;
///     response.text().map_err(|e| HttpError::Other(e.to_string()))
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform a GET request.
    async fn get(&self, url: &str, headers: &Headers) -> Result<Response, HttpError>;

    /// Perform a POST request with a string body.
    async fn post(&self, url: &str, body: &str, headers: &Headers) -> Result<Response, HttpError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_is_success() {
        assert!(Response::new(200, Bytes::new()).is_success());
        assert!(Response::new(204, Bytes::new()).is_success());
        assert!(!Response::new(300, Bytes::new()).is_success());
        assert!(!Response::new(404, Bytes::new()).is_success());
    }

    #[test]
    fn test_response_json() {
        #[derive(Debug, serde::Deserialize, PartialEq)]
        struct Body {
            url: String,
        }

        let response = Response::new(200, Bytes::from(r#"{"url":"https://auth"}"#));
        let body: Body = response.json().unwrap();
        assert_eq!(body.url, "https://auth");
    }

    #[test]
    fn test_error_for_status() {
        let ok = Response::new(200, Bytes::from("fine"));
        assert!(ok.error_for_status().is_ok());

        let err = Response::new(401, Bytes::from("expired"))
            .error_for_status()
            .unwrap_err();
        assert_eq!(
            err,
            HttpError::ServerError {
                status: 401,
                message: "expired".to_string()
            }
        );
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(HttpError::ConnectionFailed("refused".into()).is_retryable());
        assert!(HttpError::Timeout("30s".into()).is_retryable());
        assert!(HttpError::ServerError {
            status: 503,
            message: String::new()
        }
        .is_retryable());
        assert!(HttpError::ServerError {
            status: 429,
            message: String::new()
        }
        .is_retryable());

        assert!(!HttpError::ServerError {
            status: 401,
            message: String::new()
        }
        .is_retryable());
        assert!(!HttpError::ServerError {
            status: 404,
            message: String::new()
        }
        .is_retryable());
        assert!(!HttpError::InvalidUrl("nope".into()).is_retryable());
    }

    #[test]
    fn test_http_error_display() {
        assert_eq!(
            HttpError::ServerError {
                status: 500,
                message: "Internal Error".to_string()
            }
            .to_string(),
            "Server error (500): Internal Error"
        );
        assert_eq!(HttpError::Cancelled.to_string(), "Request cancelled");
        assert_eq!(
            HttpError::ConnectionFailed("timeout".to_string()).to_string(),
            "Connection failed: timeout"
        );
    }
}
