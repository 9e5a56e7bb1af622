//! Upstream transport clients

use crate::target::Target;
use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use relay_core::{Body, ForwardError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A transport client that can be pointed at one backend at a time.
///
/// Instances live in a [`ClientPool`](crate::pool::ClientPool). While checked
/// out, a client's address is set to exactly one request's backend; the pool
/// clears it on release.
#[async_trait]
pub trait UpstreamClient: Send + Sync + fmt::Debug {
    /// Point the client at a backend
    fn set_address(&mut self, target: Target);

    /// Backend the client currently points at
    fn address(&self) -> Option<&Target>;

    /// Forget the backend address
    fn clear_address(&mut self);

    /// Send the request to the current backend and buffer the response
    async fn execute(&self, req: Request<Body>) -> Result<Response<Body>, ForwardError>;
}

/// Settings for the hyper-based transport
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// TCP connect timeout
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Whole round-trip timeout, headers and body
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// How long an idle keep-alive connection is kept
    #[serde(default = "default_pool_idle_timeout", with = "humantime_serde")]
    pub pool_idle_timeout: Duration,

    /// Idle keep-alive connections kept per backend
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_pool_idle_timeout() -> Duration {
    Duration::from_secs(90)
}

fn default_pool_max_idle_per_host() -> usize {
    32
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            pool_idle_timeout: default_pool_idle_timeout(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
        }
    }
}

/// HTTP/1.1 client for upstream requests.
///
/// Clones share the underlying hyper connection pool, so handing out clones of
/// one client from a [`ClientPool`](crate::pool::ClientPool) reuses TCP
/// connections across requests.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
    address: Option<Target>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Self {
        Self::with_config(&ClientConfig::default())
    }

    /// Create a new HTTP client from settings
    pub fn with_config(config: &ClientConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(config.connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build(connector);

        Self {
            client,
            timeout: config.request_timeout,
            address: None,
        }
    }

    /// Get the configured timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Absolute URI for the request on the given backend
    fn upstream_uri(req: &Request<Body>, target: &Target) -> Result<Uri, ForwardError> {
        let path_and_query = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        Uri::builder()
            .scheme("http")
            .authority(target.authority().clone())
            .path_and_query(path_and_query)
            .build()
            .map_err(|e| ForwardError::InvalidRequest(format!("invalid upstream URI: {e}")))
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UpstreamClient for HttpClient {
    fn set_address(&mut self, target: Target) {
        self.address = Some(target);
    }

    fn address(&self) -> Option<&Target> {
        self.address.as_ref()
    }

    fn clear_address(&mut self) {
        self.address = None;
    }

    async fn execute(&self, mut req: Request<Body>) -> Result<Response<Body>, ForwardError> {
        let target = self.address.as_ref().ok_or_else(|| {
            ForwardError::InvalidRequest("client has no upstream address".to_string())
        })?;

        *req.uri_mut() = Self::upstream_uri(&req, target)?;

        let round_trip = async {
            let response = self.client.request(req).await.map_err(|e| {
                if e.is_connect() {
                    ForwardError::connect(target.as_str(), e.to_string())
                } else {
                    ForwardError::Protocol(e.to_string())
                }
            })?;

            // Note: the body is buffered, not streamed
            let (parts, body) = response.into_parts();
            let body_bytes: Bytes = body
                .collect()
                .await
                .map_err(|e| ForwardError::Body(e.to_string()))?
                .to_bytes();

            Ok::<_, ForwardError>(Response::from_parts(parts, Full::new(body_bytes)))
        };

        match tokio::time::timeout(self.timeout, round_trip).await {
            Ok(result) => result,
            Err(_) => Err(ForwardError::Timeout(target.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_new() {
        let client = HttpClient::new();
        assert_eq!(client.timeout(), Duration::from_secs(30));
        assert!(client.address().is_none());
    }

    #[test]
    fn test_http_client_with_config() {
        let config = ClientConfig {
            request_timeout: Duration::from_secs(10),
            ..Default::default()
        };
        let client = HttpClient::with_config(&config);
        assert_eq!(client.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_address_lifecycle() {
        let mut client = HttpClient::new();
        client.set_address(Target::parse("localhost:8080").unwrap());
        assert_eq!(client.address().map(Target::as_str), Some("localhost:8080"));

        client.clear_address();
        assert!(client.address().is_none());
    }

    #[test]
    fn test_upstream_uri_keeps_path_and_query() {
        let req = Request::builder()
            .uri("/test?foo=bar")
            .body(Body::default())
            .unwrap();
        let target = Target::parse("localhost:8080").unwrap();

        let uri = HttpClient::upstream_uri(&req, &target).unwrap();
        assert_eq!(uri.to_string(), "http://localhost:8080/test?foo=bar");
    }

    #[tokio::test]
    async fn test_execute_without_address_fails() {
        let client = HttpClient::new();
        let req = Request::builder().uri("/").body(Body::default()).unwrap();

        let err = client.execute(req).await.unwrap_err();
        assert!(matches!(err, ForwardError::InvalidRequest(_)));
    }

    #[test]
    fn test_client_config_from_yaml() {
        let config: ClientConfig = serde_yaml::from_str(
            "connect_timeout: 2s\nrequest_timeout: 500ms\n",
        )
        .unwrap();
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.request_timeout, Duration::from_millis(500));
        assert_eq!(config.pool_max_idle_per_host, 32);
    }
}
