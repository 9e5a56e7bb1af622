//! Rewrite rules and the compiled rule set

use crate::pattern::WildcardPattern;
use crate::template::Template;
use http::uri::PathAndQuery;
use relay_core::{Error, Result};
use tracing::trace;

/// A compiled pattern → template pair
#[derive(Debug, Clone)]
pub struct RewriteRule {
    pattern: WildcardPattern,
    template: Template,
}

impl RewriteRule {
    /// Compile a rule.
    ///
    /// Rejects templates that reference captures the pattern does not produce
    /// and templates whose output would not be a valid URI path.
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Result<Self> {
        let pattern = WildcardPattern::new(pattern)?;
        let template = Template::parse(replacement)?;

        if template.max_capture() > pattern.wildcard_count() {
            return Err(Error::config(format!(
                "template '{}' references ${} but pattern '{}' has {} wildcard(s)",
                template,
                template.max_capture(),
                pattern.pattern(),
                pattern.wildcard_count()
            )));
        }

        check_path_template(&template)?;

        Ok(Self { pattern, template })
    }

    /// Rewrite the path if the rule matches
    pub fn apply(&self, path: &str) -> Option<String> {
        self.pattern
            .captures(path)
            .map(|captures| self.template.render(&captures))
    }

    /// Get the pattern
    pub fn pattern(&self) -> &str {
        self.pattern.pattern()
    }

    /// Get the replacement template
    pub fn replacement(&self) -> &str {
        self.template.as_str()
    }
}

/// Captures are copied from an inbound path, so they are already valid path
/// text. Only the literal parts of the template can break the rewritten URI.
fn check_path_template(template: &Template) -> Result<()> {
    if !template.as_str().starts_with('/') {
        return Err(Error::config(format!(
            "template '{template}' must start with '/'"
        )));
    }

    let placeholders = vec!["x"; template.max_capture()];
    let sample = template.render(&placeholders);
    if sample.contains(['?', '#']) {
        return Err(Error::config(format!(
            "template '{template}' must not contain a query or fragment"
        )));
    }
    sample
        .parse::<PathAndQuery>()
        .map_err(|e| Error::config(format!("template '{template}' is not a valid URI path: {e}")))?;

    Ok(())
}

/// Ordered, read-only set of rewrite rules.
///
/// Built once when the proxy is configured. At most one rule applies per path:
/// rules are tried in the order they were given and the first match wins.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<RewriteRule>,
}

impl RuleSet {
    /// Empty rule set, never rewrites
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `(pattern, replacement)` pairs, keeping their order
    pub fn compile<I, P, R>(rules: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, R)>,
        P: Into<String>,
        R: Into<String>,
    {
        let rules = rules
            .into_iter()
            .map(|(pattern, replacement)| RewriteRule::new(pattern, replacement))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// Rewrite a path with the first matching rule
    pub fn rewrite(&self, path: &str) -> Option<String> {
        self.rules.iter().find_map(|rule| {
            let rewritten = rule.apply(path)?;
            trace!(
                pattern = rule.pattern(),
                from = path,
                to = %rewritten,
                "Rewrite rule matched"
            );
            Some(rewritten)
        })
    }

    /// Iterate over the rules in precedence order
    pub fn iter(&self) -> impl Iterator<Item = &RewriteRule> {
        self.rules.iter()
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Is the rule set empty?
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
