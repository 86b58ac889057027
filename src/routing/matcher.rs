//! Path prefix matching.
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Prefixes match on segment boundaries: `/api` matches `/api` and
//!   `/api/v1` but not `/apiary`
//! - The root prefix `/` matches everything

/// Matches the request path against a normalized prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a matcher. The prefix is expected to be normalized
    /// (leading `/`, no trailing `/` unless it is the root).
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns true if `path` falls under this prefix.
    pub fn matches(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return path.starts_with('/');
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// The part of `path` after the prefix, always starting with `/`.
    /// Returns `None` when the path does not match.
    pub fn remainder<'a>(&self, path: &'a str) -> Option<&'a str> {
        if !self.matches(path) {
            return None;
        }
        if self.prefix == "/" {
            return Some(path);
        }
        let rest = &path[self.prefix.len()..];
        Some(if rest.is_empty() { "/" } else { rest })
    }
}
