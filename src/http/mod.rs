//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → server.rs (Axum catch-all, request ID, timeout)
//!     → request.rs (buffer into ProxiedRequest)
//!     → director.rs (Host, Accept-Encoding, Accept-Charset / mobile UA)
//!     → proxy.rs (forward to the single upstream)
//!     → transform.rs (redirect resolution via redirect.rs, HTML rewrite)
//!     → response.rs (re-framed response)
//!     → client, or error.rs on failure (502/504)
//! ```

pub mod director;
pub mod error;
pub mod proxy;
pub mod redirect;
pub mod request;
pub mod response;
pub mod server;
pub mod transform;

pub use director::{MobileDirector, RequestDirector, UpstreamDirector};
pub use error::{ErrorHandler, FetchError, GatewayErrorHandler, ProxyError, TransformError};
pub use proxy::Proxy;
pub use redirect::{RedirectOutcome, RedirectResolver};
pub use request::ProxiedRequest;
pub use server::HttpServer;
pub use transform::ResponseTransform;
