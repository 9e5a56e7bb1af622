//! Single-target helpers
//!
//! For routes that always go to one backend and need no rewriting, these skip
//! the [`ReverseProxy`](crate::ReverseProxy) machinery and use a
//! [`Forwarder`] directly.

use http::{Request, Response};
use relay_core::{responses, Body, Error, HandlerFn, HandlerFuture, Result};
use relay_proxy::{Forwarder, HttpClient, Target, UpstreamClient};
use std::sync::Arc;
use tracing::debug;

/// Terminal handler that proxies every request to `target`.
///
/// Forwarding failures are answered with `503 Service Unavailable`.
pub fn handler(target: &str) -> Result<HandlerFn> {
    handler_with(Arc::new(Forwarder::<HttpClient>::default()), target)
}

/// Like [`handler`], over a caller-supplied forwarder
pub fn handler_with<C>(forwarder: Arc<Forwarder<C>>, target: &str) -> Result<HandlerFn>
where
    C: UpstreamClient + 'static,
{
    if target.trim().is_empty() {
        return Err(Error::config("handler requires a backend server <host>:<port>"));
    }
    let target = Arc::new(Target::parse(target)?);

    Ok(Box::new(move |req: Request<Body>| -> HandlerFuture {
        let forwarder = Arc::clone(&forwarder);
        let target = Arc::clone(&target);
        Box::pin(async move {
            match forwarder.forward(req, &target).await {
                Ok(response) => Ok(response),
                Err(e) => {
                    debug!(upstream = %target, error = %e, "Answering failed forward with 503");
                    Ok(responses::service_unavailable())
                }
            }
        })
    }))
}

/// Forward one request to `target`.
///
/// Failures are returned as [`Error::Forward`] for the caller to handle;
/// its [`Error::to_status_code`] is `503 Service Unavailable`.
///
/// # Panics
///
/// Panics if `target` is empty.
pub async fn forward<C: UpstreamClient>(
    forwarder: &Forwarder<C>,
    req: Request<Body>,
    target: &str,
) -> Result<Response<Body>> {
    assert!(!target.is_empty(), "forward requires a backend target");

    let target = Target::parse(target)?;
    Ok(forwarder.forward(req, &target).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use relay_core::ForwardError;
    use relay_proxy::testing::{MockClient, MockUpstream};
    use relay_proxy::{ClientPool, PoolConfig};

    fn forwarder(upstream: &MockUpstream) -> Forwarder<MockClient> {
        Forwarder::new(Arc::new(ClientPool::new(
            PoolConfig::default(),
            upstream.factory(),
        )))
    }

    fn request() -> Request<Body> {
        Request::builder().uri("/ping").body(Body::default()).unwrap()
    }

    #[tokio::test]
    async fn test_handler_forwards() {
        let upstream = MockUpstream::new();
        let handler = handler_with(Arc::new(forwarder(&upstream)), "backend:80").unwrap();

        let response = handler(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(upstream.calls()[0].target.as_deref(), Some("backend:80"));
    }

    #[tokio::test]
    async fn test_handler_failure_is_503() {
        let upstream = MockUpstream::new();
        upstream.fail_with(ForwardError::Protocol("connection reset".to_string()));
        let handler = handler_with(Arc::new(forwarder(&upstream)), "backend:80").unwrap();

        let response = handler(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_handler_requires_target() {
        assert!(matches!(handler(""), Err(Error::Config(_))));
        assert!(matches!(handler("   "), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_forward_returns_error() {
        let upstream = MockUpstream::new();
        upstream.fail_with(ForwardError::Timeout("backend:80".to_string()));
        let forwarder = forwarder(&upstream);

        let err = forward(&forwarder, request(), "backend:80").await.unwrap_err();
        assert!(matches!(err, Error::Forward(ForwardError::Timeout(_))));
        assert_eq!(err.to_status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(forwarder.pool().idle_count(), 1);
    }

    #[tokio::test]
    #[should_panic(expected = "forward requires a backend target")]
    async fn test_forward_empty_target_panics() {
        let upstream = MockUpstream::new();
        let _ = forward(&forwarder(&upstream), request(), "").await;
    }
}
