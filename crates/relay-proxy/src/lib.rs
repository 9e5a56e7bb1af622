//! # Relay Proxy
//!
//! Upstream forwarding for the Relay reverse proxy:
//! - Backend targets and round-robin selection
//! - Pooled, reusable upstream client handles
//! - Hyper-based HTTP/1.1 transport
//! - Hop-by-hop header stripping on both legs

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod client;
pub mod forward;
pub mod pool;
pub mod target;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{ClientConfig, HttpClient, UpstreamClient};
pub use forward::{strip_connection, Forwarder};
pub use pool::{ClientPool, PoolConfig, PooledClient};
pub use target::{Balancing, Target, TargetSelector};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::client::{ClientConfig, HttpClient, UpstreamClient};
    pub use crate::forward::Forwarder;
    pub use crate::pool::{ClientPool, PoolConfig};
    pub use crate::target::{Balancing, Target, TargetSelector};
}
