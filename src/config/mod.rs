//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → consumed once at startup to build the proxy
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the rewrite ruleset never changes at runtime
//! - All fields have defaults so the proxy runs without any file
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::ProxyConfig;
pub use schema::ListenerConfig;
pub use schema::UpstreamConfig;
pub use schema::UpstreamMode;
pub use schema::RewriteConfig;
pub use schema::RewriteRuleConfig;
pub use schema::TimeoutConfig;
pub use schema::LimitsConfig;
pub use schema::ObservabilityConfig;
