//! Per-request error types and the gateway error handler.

use std::time::Duration;

use axum::http::{Response, StatusCode};
use axum::body::Body;
use axum::response::IntoResponse;
use thiserror::Error;

/// Failure of the secondary fetch that resolves a redirect.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid redirect target '{location}': {source}")]
    InvalidUrl {
        location: String,
        #[source]
        source: url::ParseError,
    },

    #[error("redirect fetch failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("redirect fetch timed out")]
    Timeout(#[source] reqwest::Error),

    #[error("error reading redirect body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("redirect body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
}

impl FetchError {
    pub(crate) fn from_send(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err)
        } else {
            FetchError::Request(err)
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout(_))
    }
}

/// Failure while transforming an upstream response.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error(transparent)]
    Redirect(#[from] FetchError),

    #[error("error reading response body: {0}")]
    BodyRead(#[source] BoxError),

    #[error("response body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
}

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Any failure while handling one proxied request.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("error reading request body: {0}")]
    RequestBody(#[source] axum::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[source] reqwest::Error),

    #[error("upstream timed out")]
    UpstreamTimeout(#[source] reqwest::Error),

    #[error("upstream did not answer within {0:?}")]
    Deadline(Duration),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl ProxyError {
    pub(crate) fn from_send(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProxyError::UpstreamTimeout(err)
        } else {
            ProxyError::Upstream(err)
        }
    }

    /// Gateway status reported to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::UpstreamTimeout(_) | ProxyError::Deadline(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Transform(TransformError::Redirect(e)) if e.is_timeout() => {
                StatusCode::GATEWAY_TIMEOUT
            }
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Turns a per-request failure into the response sent to the client.
pub trait ErrorHandler: Send + Sync + std::fmt::Debug {
    fn handle(&self, request_id: &str, error: &ProxyError) -> Response<Body>;
}

/// Logs the failure and answers with a gateway status and a short diagnostic.
#[derive(Debug, Clone, Default)]
pub struct GatewayErrorHandler;

impl ErrorHandler for GatewayErrorHandler {
    fn handle(&self, request_id: &str, error: &ProxyError) -> Response<Body> {
        let status = error.status();
        tracing::error!(
            request_id = %request_id,
            status = %status,
            error = %error,
            "proxy error"
        );
        (status, format!("proxy error: {}", error)).into_response()
    }
}
