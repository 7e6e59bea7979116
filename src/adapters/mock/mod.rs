//! Mock implementations for testing.
//!
//! - [`MockHttpClient`] - HTTP client with scripted responses
//! - [`InMemoryCredentials`] - In-memory credential storage
//! - [`InMemoryStore`] - In-memory event store

pub mod credentials;
pub mod http;
pub mod store;

pub use credentials::InMemoryCredentials;
pub use http::{MockHttpClient, MockResponse, RecordedRequest};
pub use store::InMemoryStore;
