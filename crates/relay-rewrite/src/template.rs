//! Replacement templates with positional `$n` tokens

use relay_core::{Error, Result};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// 1-based capture index
    Capture(usize),
}

/// A parsed replacement template such as `/user/$1/order/$2`.
///
/// A token is `$` followed by the longest run of ASCII digits. A `$` with no
/// digits after it is literal text. Rendering is a single pass: capture values
/// are copied in as-is and never scanned for tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    raw: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            if c != '$' {
                literal.push(c);
                continue;
            }

            let start = i + 1;
            let mut end = start;
            while let Some(&(j, d)) = chars.peek() {
                if !d.is_ascii_digit() {
                    break;
                }
                end = j + 1;
                chars.next();
            }

            if end == start {
                literal.push('$');
                continue;
            }

            let index: usize = raw[start..end].parse().map_err(|_| {
                Error::config(format!("capture token out of range in template '{raw}'"))
            })?;
            if index == 0 {
                return Err(Error::config(format!(
                    "capture tokens start at $1, found $0 in template '{raw}'"
                )));
            }

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Capture(index));
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { raw, segments })
    }

    /// Highest capture index referenced, 0 if none
    pub fn max_capture(&self) -> usize {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Capture(i) => Some(*i),
                Segment::Literal(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Substitute captures into the template
    pub fn render(&self, captures: &[&str]) -> String {
        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Capture(i) => out.push_str(captures.get(i - 1).copied().unwrap_or("")),
            }
        }
        out
    }

    /// Get the raw template
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_positional() {
        let template = Template::parse("/user/$1/order/$2").unwrap();
        assert_eq!(template.max_capture(), 2);
        assert_eq!(template.render(&["42", "7"]), "/user/42/order/7");
    }

    #[test]
    fn test_tokens_can_repeat_and_reorder() {
        let template = Template::parse("/$2/$1/$2").unwrap();
        assert_eq!(template.render(&["a", "b"]), "/b/a/b");
    }

    #[test]
    fn test_multi_digit_token() {
        let template = Template::parse("/$10").unwrap();
        assert_eq!(template.max_capture(), 10);

        let captures: Vec<&str> = vec!["1", "2", "3", "4", "5", "6", "7", "8", "9", "ten"];
        assert_eq!(template.render(&captures), "/ten");
    }

    #[test]
    fn test_bare_dollar_is_literal() {
        let template = Template::parse("/price$/$1$").unwrap();
        assert_eq!(template.render(&["x"]), "/price$/x$");
    }

    #[test]
    fn test_capture_values_not_rescanned() {
        let template = Template::parse("/$1/$2").unwrap();
        assert_eq!(template.render(&["$2", "b"]), "/$2/b");
    }

    #[test]
    fn test_literal_only() {
        let template = Template::parse("/new").unwrap();
        assert_eq!(template.max_capture(), 0);
        assert_eq!(template.render(&[]), "/new");
    }

    #[test]
    fn test_zero_token_rejected() {
        assert!(matches!(Template::parse("/$0"), Err(Error::Config(_))));
    }
}
