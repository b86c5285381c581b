//! Response body rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! upstream HTML bytes (decoded as UTF-8)
//!     → rules.rs (ordered literal domain substitution)
//!     → body.rs (hover script before first </body>)
//!     → rewritten text, re-encoded by the response transform
//! ```
//!
//! # Design Decisions
//! - Pure functions over text: no I/O, no failure modes
//! - Ruleset built once at startup and shared read-only across requests

pub mod body;
pub mod rules;

pub use body::{BodyRewriter, HOVER_SCRIPT, HOVER_SCRIPT_MARKER};
pub use rules::{RewriteRule, RewriteRuleset, RulesetError};
