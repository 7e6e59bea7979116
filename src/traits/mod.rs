//! Trait abstractions for dependency injection and testability.
//!
//! The orchestrator talks to the outside world only through these traits.
//!
//! # Traits
//!
//! - [`HttpClient`] - HTTP client operations (GET, POST)
//! - [`CredentialsProvider`] - Stored identity and bearer credential
//! - [`EventStore`] - Local durable calendar and settings store

pub mod credentials;
pub mod http;
pub mod store;

pub use credentials::{CredentialsError, CredentialsProvider};
pub use http::{Headers, HttpClient, HttpError, Response};
pub use store::{EventStore, StoreError, StoreScope};
