//! Mirror reverse proxy library.
//!
//! Fronts a single upstream site, rewrites its HTML for a mirror domain and
//! resolves upstream redirects inline.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod rewrite;

pub use config::schema::ProxyConfig;
pub use http::{HttpServer, Proxy};
pub use lifecycle::Shutdown;
