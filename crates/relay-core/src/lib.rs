//! # Relay Core
//!
//! Core types, traits, and error handling for the Relay reverse proxy.
//!
//! This crate provides the foundational abstractions shared by the proxy crates:
//! - Host pipeline interface ([`Middleware`], [`Next`])
//! - Error types
//! - Per-request proxy context
//! - Response helpers

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod context;
pub mod error;
pub mod middleware;
pub mod response;

pub use context::ProxyContext;
pub use error::{Error, ForwardError, Result};
pub use middleware::{Body, HandlerFn, HandlerFuture, Middleware, Next};
pub use response::responses;

// Re-export commonly used HTTP types
pub use bytes::Bytes;
pub use http::{Method, Request, Response, StatusCode};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::context::ProxyContext;
    pub use crate::error::{Error, ForwardError, Result};
    pub use crate::middleware::{Body, HandlerFn, Middleware, Next};
    pub use crate::response::responses;
}
