//! Response helpers

use crate::middleware::Body;
use bytes::Bytes;
use http::{Response, StatusCode};
use http_body_util::Full;

/// Convenience functions for common responses
pub mod responses {
    use super::*;

    /// Response with the given status and no body
    pub fn status(status: StatusCode) -> Response<Body> {
        let mut response = Response::new(Full::new(Bytes::new()));
        *response.status_mut() = status;
        response
    }

    /// 503 Service Unavailable, empty body
    pub fn service_unavailable() -> Response<Body> {
        status(StatusCode::SERVICE_UNAVAILABLE)
    }
}
