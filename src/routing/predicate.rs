//! Composable message predicates
//!
//! Predicates are plain functions over a [`Message`]. Each carries a short
//! description so routing decisions can be logged without an expression
//! language.

use crate::error::ConfigurationError;
use crate::message::Message;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

type PredicateFn = Arc<dyn Fn(&Message) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct Predicate {
    test: PredicateFn,
    description: Arc<str>,
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({})", self.description)
    }
}

impl Predicate {
    /// Wrap an arbitrary closure
    pub fn new<F>(description: impl Into<String>, test: F) -> Self
    where
        F: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        Self {
            test: Arc::new(test),
            description: Arc::from(description.into()),
        }
    }

    pub fn test(&self, message: &Message) -> bool {
        (self.test)(message)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn always() -> Self {
        Self::new("always", |_| true)
    }

    pub fn never() -> Self {
        Self::new("never", |_| false)
    }

    pub fn header_ends_with(header: impl Into<String>, suffix: impl Into<String>) -> Self {
        let header = header.into();
        let suffix = suffix.into();
        let description = format!("header({header}).endsWith({suffix})");
        Self::new(description, move |m| {
            m.header(&header).is_some_and(|v| v.ends_with(&suffix))
        })
    }

    /// Matches when the header value contains a match for `pattern`.
    /// Anchor the pattern to require a full match.
    pub fn header_matches(
        header: impl Into<String>,
        pattern: &str,
    ) -> Result<Self, ConfigurationError> {
        let header = header.into();
        let regex = Regex::new(pattern).map_err(|source| ConfigurationError::InvalidPattern {
            header: header.clone(),
            pattern: pattern.to_string(),
            source,
        })?;
        let description = format!("header({header}).regex({pattern})");
        Ok(Self::new(description, move |m| {
            m.header(&header).is_some_and(|v| regex.is_match(v))
        }))
    }

    pub fn header_equals(header: impl Into<String>, value: impl Into<String>) -> Self {
        let header = header.into();
        let value = value.into();
        let description = format!("header({header}) == {value}");
        Self::new(description, move |m| m.header(&header) == Some(value.as_str()))
    }

    pub fn has_header(header: impl Into<String>) -> Self {
        let header = header.into();
        let description = format!("has header({header})");
        Self::new(description, move |m| m.header(&header).is_some())
    }

    /// Byte-level substring search over the body
    pub fn body_contains(needle: impl Into<String>) -> Self {
        let needle = needle.into();
        let description = format!("body contains {needle:?}");
        Self::new(description, move |m| contains_bytes(m.body(), needle.as_bytes()))
    }

    pub fn and(self, other: Predicate) -> Self {
        let description = format!("({} and {})", self.description, other.description);
        Self::new(description, move |m| self.test(m) && other.test(m))
    }

    pub fn or(self, other: Predicate) -> Self {
        let description = format!("({} or {})", self.description, other.description);
        Self::new(description, move |m| self.test(m) || other.test(m))
    }

    pub fn negate(self) -> Self {
        let description = format!("not {}", self.description);
        Self::new(description, move |m| !self.test(m))
    }
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|window| window == needle)
}
