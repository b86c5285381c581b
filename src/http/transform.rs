//! Per-response rewrite pipeline.
//!
//! # State Machine
//! ```text
//! upstream response
//!     ├─ 301/302/307/308 + non-empty Location
//!     │      → RedirectResolver (one hop) → BodyRewriter → 200 OK      [terminal]
//!     ├─ Content-Type lacks "text/html" (or body is compressed)
//!     │      → pass through untouched                                   [terminal]
//!     └─ HTML
//!            → buffer body → BodyRewriter → same status                 [terminal]
//! ```
//!
//! Every branch builds a fresh response. On error the original response is
//! dropped and the caller serves a gateway error instead.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, response::Parts, Response, StatusCode};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use url::Url;

use crate::http::error::TransformError;
use crate::http::redirect::RedirectResolver;
use crate::http::response::{is_html, is_identity_encoded, RewrittenResponse};
use crate::observability::metrics;
use crate::rewrite::BodyRewriter;

const REDIRECT_STATUSES: [StatusCode; 4] = [
    StatusCode::MOVED_PERMANENTLY,
    StatusCode::FOUND,
    StatusCode::TEMPORARY_REDIRECT,
    StatusCode::PERMANENT_REDIRECT,
];

/// Post-receive hook applied to upstream responses in rewrite mode.
#[derive(Debug, Clone)]
pub struct ResponseTransform {
    rewriter: Arc<BodyRewriter>,
    resolver: RedirectResolver,
    max_body_bytes: usize,
}

impl ResponseTransform {
    pub fn new(rewriter: Arc<BodyRewriter>, resolver: RedirectResolver, max_body_bytes: usize) -> Self {
        Self {
            rewriter,
            resolver,
            max_body_bytes,
        }
    }

    /// Transform one upstream response.
    ///
    /// `origin` is the URL the response was fetched from; relative
    /// `Location` values are resolved against it.
    pub async fn transform(
        &self,
        response: Response<Body>,
        origin: &Url,
    ) -> Result<Response<Body>, TransformError> {
        let (parts, body) = response.into_parts();

        if let Some(location) = redirect_location(&parts) {
            let target = RedirectResolver::target_url(origin, location)?;
            drop(body);
            return self.resolve_redirect(&target).await;
        }

        if !is_html(&parts.headers) || !is_identity_encoded(&parts.headers) {
            return Ok(Response::from_parts(parts, body));
        }

        let bytes = read_limited(body, self.max_body_bytes).await?;
        let rewritten = self.rewriter.rewrite(&String::from_utf8_lossy(&bytes));
        metrics::record_rewrite("html");

        Ok(RewrittenResponse::new(parts.status, &parts.headers).finish(rewritten))
    }

    async fn resolve_redirect(&self, target: &Url) -> Result<Response<Body>, TransformError> {
        let outcome = match self.resolver.resolve(target).await {
            Ok(outcome) => outcome,
            Err(e) => {
                metrics::record_redirect_failure();
                return Err(e.into());
            }
        };

        let rewritten = self.rewriter.rewrite(&String::from_utf8_lossy(&outcome.body));
        metrics::record_rewrite("redirect");

        Ok(RewrittenResponse::new(StatusCode::OK, &outcome.headers)
            .without(header::LOCATION)
            .finish(rewritten))
    }
}

async fn read_limited(body: Body, limit: usize) -> Result<Bytes, TransformError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(TransformError::BodyTooLarge { limit }),
        Err(e) => Err(TransformError::BodyRead(e)),
    }
}

/// `Location` of a redirect response, if it should be resolved inline.
fn redirect_location(parts: &Parts) -> Option<&str> {
    if !REDIRECT_STATUSES.contains(&parts.status) {
        return None;
    }
    parts
        .headers
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
