//! The proxy pipeline: director → upstream → response transform.
//!
//! [`Proxy`] is built once from a validated [`ProxyConfig`] and shared by
//! every request handler. The three hooks are explicit fields, so tests and
//! embedders can swap any of them without touching the forwarding code.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use reqwest::redirect::Policy;
use url::Url;

use crate::config::{ProxyConfig, UpstreamMode};
use crate::http::director::{MobileDirector, RequestDirector, UpstreamDirector};
use crate::http::error::{ErrorHandler, GatewayErrorHandler, ProxyError};
use crate::http::redirect::RedirectResolver;
use crate::http::request::ProxiedRequest;
use crate::http::response::from_upstream;
use crate::http::transform::ResponseTransform;
use crate::lifecycle::startup::{parse_upstream, StartupError};
use crate::rewrite::{BodyRewriter, RewriteRuleset};

/// Single-upstream reverse proxy.
#[derive(Debug, Clone)]
pub struct Proxy {
    upstream: Url,
    client: reqwest::Client,
    director: Arc<dyn RequestDirector>,
    transform: Option<ResponseTransform>,
    error_handler: Arc<dyn ErrorHandler>,
    max_body_bytes: usize,
    /// Bound on the upstream exchange: send, response head, transform.
    upstream_deadline: Duration,
}

impl Proxy {
    /// Assemble the proxy for the configured mode.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, StartupError> {
        let upstream = parse_upstream(&config.upstream.url)?;

        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(StartupError::Client)?;

        let (director, transform): (Arc<dyn RequestDirector>, Option<ResponseTransform>) =
            match config.upstream.mode {
                UpstreamMode::Rewrite => {
                    let ruleset = RewriteRuleset::from_config(&config.rewrite.rules)
                        .map_err(StartupError::Ruleset)?;
                    let rewriter = Arc::new(BodyRewriter::new(
                        ruleset,
                        config.rewrite.inject_hover_script,
                    ));
                    let resolver = RedirectResolver::new(config).map_err(StartupError::Client)?;
                    let director: Arc<dyn RequestDirector> = Arc::new(UpstreamDirector);
                    let transform =
                        ResponseTransform::new(rewriter, resolver, config.limits.max_body_bytes);
                    (director, Some(transform))
                }
                UpstreamMode::Mobile => {
                    let director: Arc<dyn RequestDirector> = Arc::new(
                        MobileDirector::new(&config.upstream.mobile_user_agent)
                            .map_err(|e| StartupError::InvalidUserAgent(e.to_string()))?,
                    );
                    (director, None)
                }
            };

        Ok(Self {
            upstream,
            client,
            director,
            transform,
            error_handler: Arc::new(GatewayErrorHandler),
            max_body_bytes: config.limits.max_body_bytes,
            upstream_deadline: Duration::from_secs(config.timeouts.request_secs),
        })
    }

    pub fn with_director(mut self, director: Arc<dyn RequestDirector>) -> Self {
        self.director = director;
        self
    }

    pub fn with_transform(mut self, transform: Option<ResponseTransform>) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_error_handler(mut self, error_handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = error_handler;
        self
    }

    pub fn upstream(&self) -> &Url {
        &self.upstream
    }

    pub fn error_handler(&self) -> &dyn ErrorHandler {
        self.error_handler.as_ref()
    }

    /// Forward one inbound request and return the response for the client.
    ///
    /// Everything after the inbound body is buffered runs under
    /// `timeouts.request_secs`; a silent upstream ends in a 504.
    pub async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let mut proxied = ProxiedRequest::from_inbound(request, &self.upstream, self.max_body_bytes)
            .await
            .map_err(ProxyError::RequestBody)?;

        self.director.direct(&mut proxied);

        match tokio::time::timeout(self.upstream_deadline, self.exchange(proxied)).await {
            Ok(result) => result,
            Err(_) => Err(ProxyError::Deadline(self.upstream_deadline)),
        }
    }

    async fn exchange(&self, proxied: ProxiedRequest) -> Result<Response<Body>, ProxyError> {
        let target = proxied.target.clone();
        let is_head = proxied.method == Method::HEAD;
        let upstream_response = self
            .client
            .request(proxied.method, proxied.target)
            .headers(proxied.headers)
            .body(proxied.body)
            .send()
            .await
            .map_err(ProxyError::from_send)?;

        tracing::debug!(
            url = %target,
            status = %upstream_response.status(),
            "Upstream responded"
        );

        let response = from_upstream(upstream_response);
        match &self.transform {
            // HEAD responses carry no body to rewrite.
            Some(transform) if !is_head => Ok(transform.transform(response, &target).await?),
            _ => Ok(response),
        }
    }
}
