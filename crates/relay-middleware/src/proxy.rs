//! Reverse proxy middleware

use crate::config::{ErrorHandler, Filter};
use async_trait::async_trait;
use http::{Method, Request, Response, Uri};
use relay_core::{Body, ForwardError, Middleware, Next, ProxyContext, Result};
use relay_proxy::{Forwarder, HttpClient, TargetSelector, UpstreamClient};
use relay_rewrite::RuleSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Reverse proxy middleware
///
/// For each request: skip when the filter says so or the method is not
/// allowed, otherwise rewrite the path with the first matching rule, forward
/// to the next backend, and hand any forwarding failure to the error handler.
/// Failures never leave the middleware as errors.
///
/// Build one with [`ProxyConfig`](crate::ProxyConfig).
pub struct ReverseProxy<C: UpstreamClient = HttpClient> {
    pub(crate) selector: TargetSelector,
    pub(crate) methods: Vec<Method>,
    pub(crate) filter: Option<Filter>,
    pub(crate) error_handler: ErrorHandler,
    pub(crate) rules: Arc<RuleSet>,
    pub(crate) forwarder: Forwarder<C>,
}

impl<C: UpstreamClient> ReverseProxy<C> {
    /// Whether requests with this method are proxied
    pub fn allows_method(&self, method: &Method) -> bool {
        self.methods.is_empty()
            || self
                .methods
                .iter()
                .any(|m| m.as_str().eq_ignore_ascii_case(method.as_str()))
    }

    /// The compiled rewrite rules
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Backend selection
    pub fn selector(&self) -> &TargetSelector {
        &self.selector
    }

    /// The forwarder and its client pool
    pub fn forwarder(&self) -> &Forwarder<C> {
        &self.forwarder
    }

    async fn proxy(&self, mut req: Request<Body>) -> Response<Body> {
        let mut ctx = ProxyContext::from_request(&req);

        if let Some(rewritten) = self.rules.rewrite(req.uri().path()) {
            match with_path(req.uri(), &rewritten) {
                Ok(uri) => {
                    debug!(
                        request_id = %ctx.request_id,
                        from = %ctx.original_path,
                        to = %rewritten,
                        "Rewrote request path"
                    );
                    *req.uri_mut() = uri;
                    ctx.rewritten_path = Some(rewritten);
                }
                Err(e) => return self.fail(&ctx, e),
            }
        }

        let target = self.selector.select();
        ctx.target = Some(target.to_string());

        match self.forwarder.forward(req, target).await {
            Ok(response) => response,
            Err(e) => self.fail(&ctx, e),
        }
    }

    fn fail(&self, ctx: &ProxyContext, error: ForwardError) -> Response<Body> {
        debug!(
            request_id = %ctx.request_id,
            error = %error,
            "Handing forwarding failure to error handler"
        );
        (self.error_handler)(ctx, &error)
    }
}

/// Replace the path of `uri`, keeping its query string
fn with_path(uri: &Uri, path: &str) -> std::result::Result<Uri, ForwardError> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query.parse().map_err(|e| {
        ForwardError::InvalidRequest(format!("rewritten path '{path}' is not a valid URI: {e}"))
    })?);

    Uri::from_parts(parts).map_err(|e| {
        ForwardError::InvalidRequest(format!("rewritten path '{path}' is not a valid URI: {e}"))
    })
}

impl<C: UpstreamClient> fmt::Debug for ReverseProxy<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReverseProxy")
            .field("targets", &self.selector.targets())
            .field("balancing", &self.selector.balancing())
            .field("methods", &self.methods)
            .field("has_filter", &self.filter.is_some())
            .field("rules", &self.rules.len())
            .field("forwarder", &self.forwarder)
            .finish()
    }
}

#[async_trait]
impl<C: UpstreamClient + 'static> Middleware for ReverseProxy<C> {
    async fn call(&self, req: Request<Body>, next: Next) -> Result<Response<Body>> {
        if self.filter.as_ref().is_some_and(|filter| filter(&req)) {
            debug!(path = %req.uri().path(), "Filter matched, skipping proxy");
            return next.run(req).await;
        }

        if !self.allows_method(req.method()) {
            debug!(method = %req.method(), "Method not proxied, skipping proxy");
            return next.run(req).await;
        }

        Ok(self.proxy(req).await)
    }
}
