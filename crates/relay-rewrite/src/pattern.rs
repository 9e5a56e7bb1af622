//! Wildcard path patterns

use regex::Regex;
use relay_core::{Error, Result};

/// A path pattern where every `*` captures greedily.
///
/// Patterns are anchored at the end of the path only, so `/api/*` matches
/// `/api/widgets` as well as `/v2/api/widgets`. Everything other than `*` is
/// matched literally.
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    /// Original pattern
    pattern: String,

    /// Compiled regex
    regex: Regex,

    /// Number of `*` in the pattern
    wildcards: usize,
}

impl WildcardPattern {
    /// Compile a pattern
    ///
    /// Patterns:
    /// - `/old` - literal suffix
    /// - `/api/*` - one capture
    /// - `/users/*/orders/*` - captures in left-to-right order
    pub fn new(pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return Err(Error::config("rewrite pattern cannot be empty"));
        }

        let regex = Regex::new(&Self::pattern_to_regex(&pattern)).map_err(|e| {
            Error::config(format!("invalid rewrite pattern '{pattern}': {e}"))
        })?;
        let wildcards = pattern.matches('*').count();

        Ok(Self {
            pattern,
            regex,
            wildcards,
        })
    }

    /// Convert a wildcard pattern to an end-anchored regex
    fn pattern_to_regex(pattern: &str) -> String {
        let mut regex_str = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("(.*)");
        regex_str.push('$');
        regex_str
    }

    /// Match a path, returning the captured values in order
    pub fn captures<'p>(&self, path: &'p str) -> Option<Vec<&'p str>> {
        self.regex.captures(path).map(|caps| {
            caps.iter()
                .skip(1)
                .map(|m| m.map_or("", |m| m.as_str()))
                .collect()
        })
    }

    /// Does the path match?
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Get the pattern
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Number of captures a match produces
    pub fn wildcard_count(&self) -> usize {
        self.wildcards
    }
}
