//! Proxy configuration builder

use crate::proxy::ReverseProxy;
use http::{Method, Request, Response};
use relay_core::{responses, Body, Error, ForwardError, ProxyContext, Result};
use relay_proxy::{
    Balancing, ClientConfig, Forwarder, HttpClient, PoolConfig, Target, TargetSelector,
    UpstreamClient,
};
use relay_rewrite::RuleSet;
use std::fmt;
use std::sync::Arc;

/// Predicate deciding whether a request skips the proxy
pub type Filter = Arc<dyn Fn(&Request<Body>) -> bool + Send + Sync>;

/// Builds the response for a request whose forwarding failed
pub type ErrorHandler = Arc<dyn Fn(&ProxyContext, &ForwardError) -> Response<Body> + Send + Sync>;

/// Configuration for a [`ReverseProxy`]
///
/// ```no_run
/// use relay_middleware::ProxyConfig;
///
/// let proxy = ProxyConfig::new()
///     .targets(["127.0.0.1:8081", "127.0.0.1:8082"])
///     .methods(["GET", "POST"])
///     .rule("/api/*", "/$1")
///     .build()?;
/// # Ok::<(), relay_core::Error>(())
/// ```
#[derive(Clone)]
pub struct ProxyConfig {
    targets: Vec<String>,
    methods: Vec<String>,
    filter: Option<Filter>,
    error_handler: Option<ErrorHandler>,
    rules: Vec<(String, String)>,
    pool: PoolConfig,
    client: ClientConfig,
    preserve_host: bool,
    balancing: Balancing,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            methods: Vec::new(),
            filter: None,
            error_handler: None,
            rules: Vec::new(),
            pool: PoolConfig::default(),
            client: ClientConfig::default(),
            preserve_host: true,
            balancing: Balancing::default(),
        }
    }
}

impl ProxyConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a backend `<host>:<port>`
    #[must_use]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.targets.push(target.into());
        self
    }

    /// Add several backends
    #[must_use]
    pub fn targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets.extend(targets.into_iter().map(Into::into));
        self
    }

    /// Allow a request method. With none allowed, every method is proxied.
    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.methods.push(method.into());
        self
    }

    /// Allow several request methods
    #[must_use]
    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods.extend(methods.into_iter().map(Into::into));
        self
    }

    /// Skip the proxy for requests where `filter` returns true
    #[must_use]
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Request<Body>) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Replace the default `503 Service Unavailable` failure response
    #[must_use]
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ProxyContext, &ForwardError) -> Response<Body> + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Add a rewrite rule. Earlier rules take precedence.
    #[must_use]
    pub fn rule(mut self, pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.rules.push((pattern.into(), replacement.into()));
        self
    }

    /// Add several rewrite rules, in precedence order
    #[must_use]
    pub fn rules<I, P, R>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = (P, R)>,
        P: Into<String>,
        R: Into<String>,
    {
        self.rules
            .extend(rules.into_iter().map(|(p, r)| (p.into(), r.into())));
        self
    }

    /// Client pool settings
    #[must_use]
    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Transport settings
    #[must_use]
    pub fn client(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }

    /// Keep the inbound `Host` header (default) or send the backend address
    #[must_use]
    pub fn preserve_host(mut self, preserve: bool) -> Self {
        self.preserve_host = preserve;
        self
    }

    /// Backend selection policy
    #[must_use]
    pub fn balancing(mut self, balancing: Balancing) -> Self {
        self.balancing = balancing;
        self
    }

    /// Build the proxy over the hyper transport
    pub fn build(self) -> Result<ReverseProxy<HttpClient>> {
        let forwarder = Forwarder::http(&self.client, self.pool.clone());
        self.build_with_forwarder(forwarder)
    }

    /// Build the proxy over a caller-supplied forwarder.
    ///
    /// The forwarder's host handling is overridden by
    /// [`preserve_host`](Self::preserve_host). Pool and client settings are
    /// ignored here since the forwarder already owns its pool.
    pub fn build_with_forwarder<C: UpstreamClient>(
        self,
        forwarder: Forwarder<C>,
    ) -> Result<ReverseProxy<C>> {
        if self.targets.is_empty() {
            return Err(Error::config(
                "proxy requires at least one backend server <host>:<port>",
            ));
        }

        let targets = self
            .targets
            .iter()
            .map(|t| Target::parse(t))
            .collect::<Result<Vec<_>>>()?;
        let selector = TargetSelector::new(targets, self.balancing)?;

        let methods = self
            .methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes())
                    .map_err(|e| Error::Config(format!("invalid method '{m}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let rules = RuleSet::compile(self.rules)?;

        let error_handler = match self.error_handler {
            Some(handler) => handler,
            None => default_error_handler(),
        };

        Ok(ReverseProxy {
            selector,
            methods,
            filter: self.filter,
            error_handler,
            rules: Arc::new(rules),
            forwarder: forwarder.preserve_host(self.preserve_host),
        })
    }
}

fn default_error_handler() -> ErrorHandler {
    Arc::new(|_ctx: &ProxyContext, _err: &ForwardError| responses::service_unavailable())
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("targets", &self.targets)
            .field("methods", &self.methods)
            .field("has_filter", &self.filter.is_some())
            .field("has_error_handler", &self.error_handler.is_some())
            .field("rules", &self.rules)
            .field("pool", &self.pool)
            .field("client", &self.client)
            .field("preserve_host", &self.preserve_host)
            .field("balancing", &self.balancing)
            .finish()
    }
}
