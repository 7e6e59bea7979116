//! Concrete implementations of trait abstractions.
//!
//! # Adapters
//!
//! - [`ReqwestHttpClient`] - HTTP client using reqwest
//! - [`FileCredentialsProvider`] - File-based credentials storage
//! - [`FileEventStore`] - JSON-file event store
//! - [`spawn_store_watcher`] - `notify` watcher feeding host signals
//!
//! The [`mock`] submodule provides test doubles for each trait.

pub mod file_credentials;
pub mod file_store;
pub mod mock;
pub mod reqwest_http;
pub mod store_watcher;

pub use file_credentials::FileCredentialsProvider;
pub use file_store::FileEventStore;
pub use mock::{InMemoryCredentials, InMemoryStore, MockHttpClient, MockResponse};
pub use reqwest_http::ReqwestHttpClient;
pub use store_watcher::spawn_store_watcher;
