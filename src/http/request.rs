//! Request handling and transformation.
//!
//! # Responsibilities
//! - Buffer the inbound request into a [`ProxiedRequest`]
//! - Point it at the upstream, keeping path and query unchanged
//! - Strip hop-by-hop headers before forwarding
//!
//! # Design Decisions
//! - Whole-body buffering, bounded by `limits.max_body_bytes`
//! - Host override happens in the director, not here

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request};
use url::Url;

use crate::http::response::strip_hop_by_hop;

/// The inbound request as it will be forwarded upstream.
#[derive(Debug, Clone)]
pub struct ProxiedRequest {
    pub method: Method,
    /// Absolute upstream URL (upstream origin + inbound path and query).
    pub target: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxiedRequest {
    /// Build an upstream-bound request from an inbound one.
    pub async fn from_inbound(
        request: Request<Body>,
        upstream: &Url,
        max_body_bytes: usize,
    ) -> Result<Self, axum::Error> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, max_body_bytes).await?;

        let target = upstream_target(upstream, parts.uri.path(), parts.uri.query());

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);

        Ok(Self {
            method: parts.method,
            target,
            headers,
            body,
        })
    }

    /// Host (and port, if explicit) of the target URL.
    pub fn target_authority(&self) -> String {
        authority_of(&self.target)
    }
}

/// Join an inbound path and query onto the upstream base URL.
///
/// The inbound path is appended to the upstream's own path with exactly one
/// slash between them; both query strings are kept, upstream first.
pub fn upstream_target(upstream: &Url, path: &str, query: Option<&str>) -> Url {
    let base = upstream.path().trim_end_matches('/');
    let joined = format!("{}/{}", base, path.trim_start_matches('/'));

    let query = match (upstream.query().filter(|q| !q.is_empty()), query) {
        (Some(base_query), Some(q)) if !q.is_empty() => Some(format!("{}&{}", base_query, q)),
        (Some(base_query), _) => Some(base_query.to_string()),
        (None, q) => q.map(str::to_string),
    };

    let mut target = upstream.clone();
    target.set_path(&joined);
    target.set_query(query.as_deref());
    target
}

pub(crate) fn authority_of(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}
