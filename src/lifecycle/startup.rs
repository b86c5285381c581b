//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Parse the upstream URL
//! - Bind the listener
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, nothing is served
//! - Listener binds last (traffic only when the proxy is assembled)

use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;
use tokio::net::TcpListener;
use url::Url;

use crate::config::loader::{load_config, ConfigError};
use crate::config::validation::parse_upstream_url;
use crate::config::ProxyConfig;
use crate::rewrite::RulesetError;

/// Fatal errors raised before the first request is served.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid upstream url '{url}': {reason}")]
    InvalidUpstream { url: String, reason: String },

    #[error("invalid rewrite rules: {0}")]
    Ruleset(#[source] RulesetError),

    #[error("invalid mobile user agent: {0}")]
    InvalidUserAgent(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Config from `path`, or defaults when no file was given.
pub fn load(path: Option<&Path>) -> Result<ProxyConfig, StartupError> {
    match path {
        Some(path) => Ok(load_config(path)?),
        None => Ok(ProxyConfig::default()),
    }
}

pub fn parse_upstream(raw: &str) -> Result<Url, StartupError> {
    parse_upstream_url(raw).map_err(|reason| StartupError::InvalidUpstream {
        url: raw.to_string(),
        reason,
    })
}

pub async fn bind_listener(address: &str) -> Result<TcpListener, StartupError> {
    let bind_err = |source| StartupError::Bind {
        address: address.to_string(),
        source,
    };

    let addr: SocketAddr = address
        .parse()
        .map_err(|e| bind_err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;
    let listener = TcpListener::bind(addr).await.map_err(bind_err)?;

    tracing::info!(address = %listener.local_addr().map_err(bind_err)?, "Listener bound");
    Ok(listener)
}
