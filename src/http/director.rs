//! Outbound request directors.
//!
//! A director runs once per request, after the inbound request has been
//! buffered and before it is sent upstream. It mutates the request in place
//! and cannot fail.

use axum::http::{header, HeaderValue};

use crate::http::request::ProxiedRequest;

/// Pre-forward hook applied to every proxied request.
pub trait RequestDirector: Send + Sync + std::fmt::Debug {
    fn direct(&self, request: &mut ProxiedRequest);
}

fn set_upstream_host(request: &mut ProxiedRequest) {
    if let Ok(host) = HeaderValue::from_str(&request.target_authority()) {
        request.headers.insert(header::HOST, host);
    }
}

/// Director for rewrite mode.
///
/// Forces the upstream Host and asks for an uncompressed UTF-8 body so the
/// response can be rewritten as plain text.
#[derive(Debug, Clone, Default)]
pub struct UpstreamDirector;

impl RequestDirector for UpstreamDirector {
    fn direct(&self, request: &mut ProxiedRequest) {
        set_upstream_host(request);
        request
            .headers
            .insert(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        request
            .headers
            .insert(header::ACCEPT_CHARSET, HeaderValue::from_static("utf-8"));
    }
}

/// Director for mobile mode: upstream Host plus a fixed mobile User-Agent.
#[derive(Debug, Clone)]
pub struct MobileDirector {
    user_agent: HeaderValue,
}

impl MobileDirector {
    pub fn new(user_agent: &str) -> Result<Self, header::InvalidHeaderValue> {
        Ok(Self {
            user_agent: HeaderValue::from_str(user_agent)?,
        })
    }
}

impl RequestDirector for MobileDirector {
    fn direct(&self, request: &mut ProxiedRequest) {
        set_upstream_host(request);
        request
            .headers
            .insert(header::USER_AGENT, self.user_agent.clone());
    }
}
