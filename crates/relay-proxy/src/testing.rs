//! In-memory upstream for tests

use crate::client::UpstreamClient;
use crate::target::Target;
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::Full;
use parking_lot::Mutex;
use relay_core::{Body, ForwardError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A request as seen by a [`MockClient`]
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Handle that served the call
    pub client_id: usize,
    /// Address the handle pointed at when the call started
    pub target: Option<String>,
    /// Address the handle pointed at when the call finished
    pub target_after: Option<String>,
    /// Request method
    pub method: Method,
    /// Request URI
    pub uri: String,
    /// Request headers
    pub headers: HeaderMap,
}

#[derive(Debug, Default)]
struct MockState {
    failure: Mutex<Option<ForwardError>>,
    delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<RecordedCall>>,
    next_id: AtomicUsize,
}

/// Shared control and inspection side of a set of mock clients.
///
/// Successful calls answer `200 OK` with a `connection: keep-alive` header,
/// `x-upstream` set to the handle's address, and `x-upstream-uri` set to the
/// request URI.
#[derive(Debug, Clone, Default)]
pub struct MockUpstream {
    state: Arc<MockState>,
}

impl MockUpstream {
    /// Create a mock upstream that answers every call
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `error`
    pub fn fail_with(&self, error: ForwardError) {
        *self.state.failure.lock() = Some(error);
    }

    /// Hold every call for `delay` before answering
    pub fn delay(&self, delay: Duration) {
        *self.state.delay.lock() = Some(delay);
    }

    /// Factory for a [`ClientPool`](crate::pool::ClientPool)
    pub fn factory(&self) -> impl Fn() -> MockClient + Send + Sync + 'static {
        let state = Arc::clone(&self.state);
        move || MockClient {
            id: state.next_id.fetch_add(1, Ordering::Relaxed),
            address: None,
            state: Arc::clone(&state),
        }
    }

    /// Calls recorded so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().clone()
    }

    /// Number of calls recorded so far
    pub fn call_count(&self) -> usize {
        self.state.calls.lock().len()
    }
}

/// Client handle produced by [`MockUpstream::factory`]
#[derive(Debug)]
pub struct MockClient {
    id: usize,
    address: Option<Target>,
    state: Arc<MockState>,
}

impl MockClient {
    /// Identity of this handle
    pub fn id(&self) -> usize {
        self.id
    }
}

#[async_trait]
impl UpstreamClient for MockClient {
    fn set_address(&mut self, target: Target) {
        self.address = Some(target);
    }

    fn address(&self) -> Option<&Target> {
        self.address.as_ref()
    }

    fn clear_address(&mut self) {
        self.address = None;
    }

    async fn execute(&self, req: Request<Body>) -> Result<Response<Body>, ForwardError> {
        let target = self.address.as_ref().map(|t| t.to_string());

        let delay = *self.state.delay.lock();
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        self.state.calls.lock().push(RecordedCall {
            client_id: self.id,
            target: target.clone(),
            target_after: self.address.as_ref().map(|t| t.to_string()),
            method: req.method().clone(),
            uri: req.uri().to_string(),
            headers: req.headers().clone(),
        });

        if let Some(error) = self.state.failure.lock().clone() {
            return Err(error);
        }

        let mut response = Response::new(Full::new(Bytes::from_static(b"ok")));
        *response.status_mut() = StatusCode::OK;
        let headers = response.headers_mut();
        headers.insert(http::header::CONNECTION, HeaderValue::from_static("keep-alive"));
        if let Some(value) = target.and_then(|t| HeaderValue::from_str(&t).ok()) {
            headers.insert("x-upstream", value);
        }
        if let Ok(value) = HeaderValue::from_str(&req.uri().to_string()) {
            headers.insert("x-upstream-uri", value);
        }
        Ok(response)
    }
}
