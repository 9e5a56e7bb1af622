//! # Relay Middleware
//!
//! Reverse proxy middleware for the Relay pipeline:
//! - Method allow-list and request filter bypass
//! - Wildcard path rewriting, first matching rule wins
//! - Round-robin backend selection over pooled clients
//! - Pluggable failure responses (default `503 Service Unavailable`)
//! - YAML/TOML settings with environment expansion

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod config;
pub mod handler;
pub mod proxy;
pub mod settings;

pub use config::{ErrorHandler, Filter, ProxyConfig};
pub use handler::{forward, handler, handler_with};
pub use proxy::ReverseProxy;
pub use settings::{ProxySettings, RuleSettings, SettingsFormat};

// Re-export core middleware types from relay-core
pub use relay_core::middleware::{Middleware, Next};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ErrorHandler, Filter, ProxyConfig};
    pub use crate::handler::{forward, handler};
    pub use crate::proxy::ReverseProxy;
    pub use crate::settings::ProxySettings;
    pub use relay_core::middleware::{Middleware, Next};
}
