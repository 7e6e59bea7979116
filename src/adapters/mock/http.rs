//! Mock HTTP client for testing.
//!
//! Routes are matched by URL prefix (longest prefix wins) and optionally by
//! method. A route can hold a queue of responses: each call consumes the
//! front one until only the last remains, which then repeats. That is enough
//! to script "fail twice, then succeed" sequences for retry tests.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::traits::{Headers, HttpClient, HttpError, Response};

/// A recorded HTTP request for verification in tests.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method (GET or POST)
    pub method: String,
    /// Request URL
    pub url: String,
    /// Request headers
    pub headers: Headers,
    /// Request body (for POST requests)
    pub body: Option<String>,
}

impl RecordedRequest {
    /// Parse the POST body as JSON.
    pub fn json_body(&self) -> Option<serde_json::Value> {
        self.body.as_deref().and_then(|b| serde_json::from_str(b).ok())
    }
}

/// Configuration for a mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return a response (any status)
    Success(Response),
    /// Return a transport error
    Error(HttpError),
}

impl MockResponse {
    /// A response with the given status and JSON body.
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        MockResponse::Success(Response::new(status, Bytes::from(body.to_string())))
    }

    /// A response with the given status and an empty body.
    pub fn status(status: u16) -> Self {
        MockResponse::Success(Response::new(status, Bytes::new()))
    }
}

#[derive(Debug)]
struct Route {
    method: Option<String>,
    prefix: String,
    responses: VecDeque<MockResponse>,
}

impl Route {
    fn next(&mut self) -> Option<MockResponse> {
        if self.responses.len() > 1 {
            self.responses.pop_front()
        } else {
            self.responses.front().cloned()
        }
    }
}

/// Mock HTTP client for testing.
///
/// # Example
///
/// ```ignore
/// use fitsync::adapters::mock::{MockHttpClient, MockResponse};
///
/// let client = MockHttpClient::new();
/// client.set_responses(
///     "https://api.example.com/data",
///     vec![MockResponse::status(503), MockResponse::json(200, json!({}))],
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockHttpClient {
    routes: Arc<Mutex<Vec<Route>>>,
    default_response: Arc<Mutex<Option<MockResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    delay: Arc<Mutex<Option<Duration>>>,
}

impl MockHttpClient {
    /// Create a new mock HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a response for any method on URLs starting with `url`.
    pub fn set_response(&self, url: &str, response: MockResponse) {
        self.add_route(None, url, vec![response]);
    }

    /// Set a response for one method on URLs starting with `url`.
    pub fn set_method_response(&self, method: &str, url: &str, response: MockResponse) {
        self.add_route(Some(method), url, vec![response]);
    }

    /// Queue responses for URLs starting with `url`; the last one repeats.
    pub fn set_responses(&self, url: &str, responses: Vec<MockResponse>) {
        self.add_route(None, url, responses);
    }

    /// Queue responses for one method; the last one repeats.
    pub fn set_method_responses(&self, method: &str, url: &str, responses: Vec<MockResponse>) {
        self.add_route(Some(method), url, responses);
    }

    /// Set a default response for URLs without specific matches.
    pub fn set_default_response(&self, response: MockResponse) {
        *self.default_response.lock().unwrap() = Some(response);
    }

    /// Delay every response by `delay` (tokio time, so paused clocks apply).
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Get all recorded requests.
    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Recorded requests with the given method whose URL starts with `url`.
    pub fn requests_to(&self, method: &str, url: &str) -> Vec<RecordedRequest> {
        self.get_requests()
            .into_iter()
            .filter(|r| r.method == method && r.url.starts_with(url))
            .collect()
    }

    /// Number of requests with the given method whose URL starts with `url`.
    pub fn request_count(&self, method: &str, url: &str) -> usize {
        self.requests_to(method, url).len()
    }

    /// Clear all recorded requests.
    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }

    /// Clear all configured responses.
    pub fn clear_responses(&self) {
        self.routes.lock().unwrap().clear();
    }

    fn add_route(&self, method: Option<&str>, url: &str, responses: Vec<MockResponse>) {
        let mut routes = self.routes.lock().unwrap();
        let method = method.map(str::to_string);
        routes.retain(|r| !(r.method == method && r.prefix == url));
        routes.push(Route {
            method,
            prefix: url.to_string(),
            responses: responses.into(),
        });
    }

    fn record_request(&self, method: &str, url: &str, headers: &Headers, body: Option<String>) {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: method.to_string(),
            url: url.to_string(),
            headers: headers.clone(),
            body,
        });
    }

    fn get_response(&self, method: &str, url: &str) -> Option<MockResponse> {
        let mut routes = self.routes.lock().unwrap();
        let best = routes
            .iter_mut()
            .filter(|r| url.starts_with(&r.prefix))
            .filter(|r| r.method.as_deref().map_or(true, |m| m == method))
            .max_by_key(|r| (r.prefix.len(), r.method.is_some()));

        match best {
            Some(route) => route.next(),
            None => self.default_response.lock().unwrap().clone(),
        }
    }

    async fn respond(&self, method: &str, url: &str) -> Result<Response, HttpError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.get_response(method, url) {
            Some(MockResponse::Success(response)) => Ok(response),
            Some(MockResponse::Error(err)) => Err(err),
            None => Err(HttpError::Other(format!("No mock response for URL: {}", url))),
        }
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.record_request("GET", url, headers, None);
        self.respond("GET", url).await
    }

    async fn post(&self, url: &str, body: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.record_request("POST", url, headers, Some(body.to_string()));
        self.respond("POST", url).await
    }
}
