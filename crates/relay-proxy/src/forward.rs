//! Request forwarding over pooled clients

use crate::client::{ClientConfig, HttpClient, UpstreamClient};
use crate::pool::{ClientPool, PoolConfig};
use crate::target::Target;
use http::header::{CONNECTION, HOST};
use http::{HeaderMap, HeaderValue, Request, Response};
use relay_core::{Body, ForwardError};
use std::sync::Arc;
use tracing::{debug, warn};

/// Remove the hop-by-hop `Connection` header
pub fn strip_connection(headers: &mut HeaderMap) {
    headers.remove(CONNECTION);
}

/// Sends requests to a chosen backend with a pooled client.
///
/// Each call holds exactly one pooled handle and returns it before the call
/// completes, whatever the outcome.
#[derive(Debug)]
pub struct Forwarder<C: UpstreamClient = HttpClient> {
    pool: Arc<ClientPool<C>>,
    preserve_host: bool,
}

impl Forwarder<HttpClient> {
    /// Forwarder over hyper clients that share one connection pool
    pub fn http(client_config: &ClientConfig, pool_config: PoolConfig) -> Self {
        let prototype = HttpClient::with_config(client_config);
        let pool = ClientPool::new(pool_config, move || prototype.clone());
        Self::new(Arc::new(pool))
    }
}

impl Default for Forwarder<HttpClient> {
    fn default() -> Self {
        Self::http(&ClientConfig::default(), PoolConfig::default())
    }
}

impl<C: UpstreamClient> Forwarder<C> {
    /// Create a forwarder drawing clients from `pool`
    pub fn new(pool: Arc<ClientPool<C>>) -> Self {
        Self {
            pool,
            preserve_host: true,
        }
    }

    /// Relay the inbound `Host` header (default) or replace it with the
    /// backend address
    #[must_use]
    pub fn preserve_host(mut self, preserve: bool) -> Self {
        self.preserve_host = preserve;
        self
    }

    /// The client pool
    pub fn pool(&self) -> &Arc<ClientPool<C>> {
        &self.pool
    }

    /// Forward a request to `target` and return the backend's response
    pub async fn forward(
        &self,
        mut req: Request<Body>,
        target: &Target,
    ) -> Result<Response<Body>, ForwardError> {
        let mut client = self.pool.acquire();
        client.set_address(target.clone());

        strip_connection(req.headers_mut());
        if !self.preserve_host {
            let host = HeaderValue::from_str(target.as_str())
                .map_err(|e| ForwardError::InvalidRequest(format!("invalid host header: {e}")))?;
            req.headers_mut().insert(HOST, host);
        }

        let method = req.method().clone();
        let path = req.uri().path().to_string();
        debug!(upstream = %target, method = %method, path = %path, "Forwarding request");

        let mut response = client.execute(req).await.map_err(|e| {
            warn!(
                upstream = %target,
                method = %method,
                path = %path,
                error = %e,
                "Upstream request failed"
            );
            e
        })?;

        strip_connection(response.headers_mut());
        Ok(response)
    }
}
