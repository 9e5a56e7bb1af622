//! Error types for Relay

use http::StatusCode;

/// Result type alias using [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for Relay
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid proxy configuration, raised while the proxy is being built
    #[error("Configuration error: {0}")]
    Config(String),

    /// Forwarding to an upstream failed
    #[error(transparent)]
    Forward(#[from] ForwardError),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Convert error to HTTP status code.
    ///
    /// Forwarding failures answer `503 Service Unavailable`, the same as the
    /// proxy's default error handler. Use [`ForwardError::to_status_code`]
    /// for a 502/504 distinction.
    pub fn to_status_code(&self) -> StatusCode {
        match self {
            Error::Forward(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Config(_) | Error::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Failure of a single upstream round trip.
///
/// Every variant is recoverable at the middleware level: the proxy hands it to
/// the configured error handler and never retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForwardError {
    /// Could not establish or use the upstream connection
    #[error("Failed to connect to upstream '{target}': {message}")]
    Connect {
        /// Upstream authority
        target: String,
        /// Transport error message
        message: String,
    },

    /// The transport gave up waiting for the upstream
    #[error("Upstream '{0}' timed out")]
    Timeout(String),

    /// The upstream answered with something that is not valid HTTP
    #[error("Upstream protocol error: {0}")]
    Protocol(String),

    /// Reading the upstream response body failed
    #[error("Failed to read upstream body: {0}")]
    Body(String),

    /// The outbound request could not be built
    #[error("Invalid upstream request: {0}")]
    InvalidRequest(String),
}

impl ForwardError {
    /// Create a connect error
    pub fn connect(target: impl Into<String>, message: impl Into<String>) -> Self {
        ForwardError::Connect {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Status code a gateway would usually answer with for this failure
    pub fn to_status_code(&self) -> StatusCode {
        match self {
            ForwardError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ForwardError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ForwardError::Connect { .. } | ForwardError::Protocol(_) | ForwardError::Body(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}
