//! Response handling and transformation.
//!
//! # Responsibilities
//! - Convert the upstream response into an axum response
//! - Strip hop-by-hop headers
//! - Build rewritten responses with consistent framing headers
//!
//! # Design Decisions
//! - Pass-through bodies are streamed, rewritten bodies are buffered
//! - A rewritten response is assembled from scratch by [`RewrittenResponse`],
//!   so a failure before `finish` never exposes half-updated headers
//! - Content-Length always equals the byte length of the final body

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Response, StatusCode};

pub const HTML_UTF8: &str = "text/html; charset=utf-8";

static HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
];

/// Remove connection-scoped headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers.remove("proxy-connection");
}

fn content_type(headers: &HeaderMap) -> &str {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Case-insensitive substring check for `text/html`.
///
/// MIME parameters are not parsed.
pub fn is_html(headers: &HeaderMap) -> bool {
    content_type(headers).to_ascii_lowercase().contains("text/html")
}

pub fn has_charset(headers: &HeaderMap) -> bool {
    content_type(headers).to_ascii_lowercase().contains("charset")
}

/// True when the body is not transfer-compressed.
pub fn is_identity_encoded(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::CONTENT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .all(|enc| enc.trim().eq_ignore_ascii_case("identity") || enc.trim().is_empty())
}

/// Convert a reqwest response into a streamed axum response.
pub fn from_upstream(response: reqwest::Response) -> Response<Body> {
    let status = response.status();
    let version = response.version();
    let mut headers = response.headers().clone();
    strip_hop_by_hop(&mut headers);

    let mut out = Response::new(Body::from_stream(response.bytes_stream()));
    *out.status_mut() = status;
    *out.version_mut() = version;
    *out.headers_mut() = headers;
    out
}

/// Builder for a response whose body was replaced.
#[derive(Debug, Clone)]
pub struct RewrittenResponse {
    status: StatusCode,
    headers: HeaderMap,
}

impl RewrittenResponse {
    /// Start from an existing status and header set.
    pub fn new(status: StatusCode, headers: &HeaderMap) -> Self {
        let mut headers = headers.clone();
        strip_hop_by_hop(&mut headers);
        Self { status, headers }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn without(mut self, name: HeaderName) -> Self {
        self.headers.remove(name);
        self
    }

    /// Attach the body and fix Content-Length / Content-Type.
    pub fn finish(mut self, body: String) -> Response<Body> {
        self.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        if !has_charset(&self.headers) {
            self.headers
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(HTML_UTF8));
        }
        // The body is re-encoded as plain UTF-8 text.
        self.headers.remove(header::CONTENT_ENCODING);

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
