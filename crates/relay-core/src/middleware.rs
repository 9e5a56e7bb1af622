//! Host pipeline interface
//!
//! The proxy is installed as one [`Middleware`] in a chain. A middleware either
//! answers the request itself or hands it to the rest of the chain through
//! [`Next`].

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Body type alias
pub type Body = Full<Bytes>;

/// Boxed future returned by a [`HandlerFn`]
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response<Body>>> + Send>>;

/// Terminal handler run once every middleware has passed the request on
pub type HandlerFn = Box<dyn Fn(Request<Body>) -> HandlerFuture + Send + Sync>;

/// One stage of the host pipeline
#[async_trait]
pub trait Middleware: Send + Sync + fmt::Debug {
    /// Handle `req`, or pass it on with `next.run(req)`
    async fn call(&self, req: Request<Body>, next: Next) -> Result<Response<Body>>;
}

/// Remainder of a pipeline: the stages after the current one, then the
/// terminal handler.
///
/// Every pipeline ends in a handler, so running a `Next` always produces a
/// response or the error of the stage that failed.
#[derive(Clone)]
pub struct Next {
    stages: Arc<[Arc<dyn Middleware>]>,
    position: usize,
    handler: Arc<HandlerFn>,
}

impl Next {
    /// Start of a pipeline running `stages` in order, then `handler`
    pub fn with_handler(stages: Arc<[Arc<dyn Middleware>]>, handler: HandlerFn) -> Self {
        Self {
            stages,
            position: 0,
            handler: Arc::new(handler),
        }
    }

    /// Hand the request to the following stage
    pub async fn run(self, req: Request<Body>) -> Result<Response<Body>> {
        match self.stages.get(self.position).cloned() {
            Some(stage) => {
                let rest = Self {
                    position: self.position + 1,
                    ..self
                };
                stage.call(req, rest).await
            }
            None => (self.handler)(req).await,
        }
    }

    /// Stages left before the handler
    pub fn remaining(&self) -> usize {
        self.stages.len().saturating_sub(self.position)
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("position", &self.position)
            .field("remaining", &self.remaining())
            .finish_non_exhaustive()
    }
}
