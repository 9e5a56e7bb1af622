//! # Relay Rewrite
//!
//! Declarative path rewriting for proxied requests:
//! - `*` wildcards capture greedily, left to right
//! - `$1`, `$2`, ... place captures into the replacement
//! - Patterns match the end of the path
//! - First matching rule wins, in definition order

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod pattern;
pub mod rules;
pub mod template;

pub use pattern::WildcardPattern;
pub use rules::{RewriteRule, RuleSet};
pub use template::Template;
