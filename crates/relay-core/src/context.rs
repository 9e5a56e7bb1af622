//! Per-request proxy context

use http::{Method, Request};
use uuid::Uuid;

/// What the proxy knows about a request it is handling.
///
/// Built when the request enters the proxy and updated as it is rewritten and
/// routed, so error handlers can report where a failed request was headed.
#[derive(Debug, Clone)]
pub struct ProxyContext {
    /// Unique request ID for tracing
    pub request_id: String,

    /// Request method
    pub method: Method,

    /// Path as received from the host pipeline
    pub original_path: String,

    /// Path after rewrite rules ran, if a rule matched
    pub rewritten_path: Option<String>,

    /// Upstream authority the request was sent to
    pub target: Option<String>,
}

impl ProxyContext {
    /// Capture the context of an incoming request
    pub fn from_request<B>(req: &Request<B>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            method: req.method().clone(),
            original_path: req.uri().path().to_string(),
            rewritten_path: None,
            target: None,
        }
    }

    /// Path the upstream sees
    pub fn path(&self) -> &str {
        self.rewritten_path.as_deref().unwrap_or(&self.original_path)
    }

    /// Whether a rewrite rule applied
    pub fn was_rewritten(&self) -> bool {
        self.rewritten_path.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_from_request() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/widgets?limit=5")
            .body(())
            .unwrap();

        let mut ctx = ProxyContext::from_request(&req);
        assert!(!ctx.request_id.is_empty());
        assert_eq!(ctx.method, Method::POST);
        assert_eq!(ctx.path(), "/api/widgets");
        assert!(!ctx.was_rewritten());

        ctx.rewritten_path = Some("/widgets".to_string());
        assert_eq!(ctx.path(), "/widgets");
        assert!(ctx.was_rewritten());
    }

    #[test]
    fn test_request_ids_are_unique() {
        let req = Request::builder().uri("/").body(()).unwrap();
        let a = ProxyContext::from_request(&req);
        let b = ProxyContext::from_request(&req);
        assert_ne!(a.request_id, b.request_id);
    }
}
