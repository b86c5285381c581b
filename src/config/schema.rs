//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the mirror proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The single upstream origin every request is forwarded to.
    pub upstream: UpstreamConfig,

    /// Domain substitution rules and script injection.
    pub rewrite: RewriteConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Body size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3430").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3430".to_string(),
        }
    }
}

/// How the proxy treats the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamMode {
    /// Rewrite HTML bodies and resolve redirects inline.
    #[default]
    Rewrite,
    /// Only present a mobile User-Agent upstream; responses pass through untouched.
    Mobile,
}

/// Upstream origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the upstream (scheme + host, e.g. "https://wikipedia.org").
    pub url: String,

    /// Proxy mode.
    pub mode: UpstreamMode,

    /// User-Agent sent on the redirect-resolution hop.
    pub user_agent: String,

    /// User-Agent forced on every forwarded request in mobile mode.
    pub mobile_user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "https://wikipedia.org".to_string(),
            mode: UpstreamMode::Rewrite,
            user_agent: concat!("mirror-proxy/", env!("CARGO_PKG_VERSION")).to_string(),
            mobile_user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
                AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1"
                .to_string(),
        }
    }
}

/// A single literal substitution.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RewriteRuleConfig {
    /// Literal substring to look for.
    pub pattern: String,

    /// Text substituted for every non-overlapping occurrence.
    pub replacement: String,
}

impl RewriteRuleConfig {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }
}

/// Body rewrite configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Ordered substitution rules, most specific first.
    pub rules: Vec<RewriteRuleConfig>,

    /// Inject the link hover script before `</body>`.
    pub inject_hover_script: bool,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            rules: vec![
                RewriteRuleConfig::new(".wikipedia.org", ".m-wikipedia.org"),
                RewriteRuleConfig::new("//wikipedia.org", "//m-wikipedia.org"),
            ],
            inject_hover_script: true,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Upper bound for the secondary fetch that resolves a redirect.
    pub redirect_fetch_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            request_secs: 60,
            redirect_fetch_secs: 30,
        }
    }
}

/// Body size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum bytes buffered for an inbound request body or a rewritten response body.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 16 * 1024 * 1024, // 16MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
