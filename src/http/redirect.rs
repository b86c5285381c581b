//! Inline redirect resolution.
//!
//! # Responsibilities
//! - Issue one GET to a redirect target
//! - Return the raw body and headers of that single hop
//!
//! # Design Decisions
//! - Exactly one hop: the client never follows redirects, so a redirect
//!   returned by the target is surfaced as-is
//! - No retries; every fetch is bounded by `timeouts.redirect_fetch_secs`
//! - No status check on the secondary response
//! - The body is bounded by `limits.max_body_bytes`, like the HTML branch

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use reqwest::redirect::Policy;
use url::Url;

use crate::config::ProxyConfig;
use crate::http::error::FetchError;

/// Body and headers fetched from a redirect target.
#[derive(Debug, Clone)]
pub struct RedirectOutcome {
    /// Status of the secondary response (informational only).
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Fetches redirect targets on behalf of the response transform.
#[derive(Debug, Clone)]
pub struct RedirectResolver {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl RedirectResolver {
    pub fn new(config: &ProxyConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .timeout(Duration::from_secs(config.timeouts.redirect_fetch_secs))
            .user_agent(config.upstream.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            max_body_bytes: config.limits.max_body_bytes,
        })
    }

    /// Resolve a `Location` value, which may be relative to `base`.
    pub fn target_url(base: &Url, location: &str) -> Result<Url, FetchError> {
        base.join(location).map_err(|source| FetchError::InvalidUrl {
            location: location.to_string(),
            source,
        })
    }

    /// Fetch `location` once and return its body and headers.
    pub async fn resolve(&self, location: &Url) -> Result<RedirectOutcome, FetchError> {
        tracing::info!(location = %location, "Redirected to");

        let response = self
            .client
            .get(location.clone())
            .header(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"))
            .header(header::ACCEPT_CHARSET, HeaderValue::from_static("utf-8"))
            .header(header::ACCEPT, HeaderValue::from_static("text/html,*/*;q=0.8"))
            .send()
            .await
            .map_err(FetchError::from_send)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = self.read_body(response).await?;

        tracing::debug!(
            location = %location,
            status = %status,
            bytes = body.len(),
            "Redirect target fetched"
        );

        Ok(RedirectOutcome {
            status,
            headers,
            body,
        })
    }

    async fn read_body(&self, mut response: reqwest::Response) -> Result<Bytes, FetchError> {
        let limit = self.max_body_bytes;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(FetchError::BodyTooLarge { limit });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(e)
            } else {
                FetchError::Body(e)
            }
        })? {
            if body.len() + chunk.len() > limit {
                return Err(FetchError::BodyTooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(body))
    }
}
