//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up the matching route for a request path
//! - Rewrite the path for the selected backend
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) prefix scan over routes sorted longest first
//! - Explicit `None` rather than a silent default route

use crate::config::RouteConfig;
use crate::routing::matcher::PathPrefixMatcher;

/// A compiled route.
#[derive(Debug, Clone)]
pub struct Route {
    matcher: PathPrefixMatcher,
    /// Backend name resolved through the directory.
    pub backend: String,
    /// Remove the prefix before forwarding.
    pub strip_prefix: bool,
}

impl Route {
    pub fn new(prefix: &str, backend: impl Into<String>, strip_prefix: bool) -> Self {
        Self {
            matcher: PathPrefixMatcher::new(normalize_prefix(prefix)),
            backend: backend.into(),
            strip_prefix,
        }
    }

    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }

    pub fn matches(&self, path: &str) -> bool {
        self.matcher.matches(path)
    }

    /// Path and query to send upstream for an inbound path and query.
    pub fn upstream_path_and_query(&self, path: &str, query: Option<&str>) -> String {
        let path = if self.strip_prefix {
            self.matcher.remainder(path).unwrap_or(path)
        } else {
            path
        };
        match query {
            Some(q) => format!("{path}?{q}"),
            None => path.to_string(),
        }
    }
}

impl From<&RouteConfig> for Route {
    fn from(config: &RouteConfig) -> Self {
        Route::new(&config.path_prefix, config.backend.clone(), config.strip_prefix)
    }
}

/// Normalize a configured prefix: leading `/`, no trailing `/`.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Immutable routing table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(mut routes: Vec<Route>) -> Self {
        // Stable sort keeps configuration order among equal lengths.
        routes.sort_by(|a, b| b.prefix().len().cmp(&a.prefix().len()));
        Self { routes }
    }

    pub fn from_config(configs: &[RouteConfig]) -> Self {
        Self::new(configs.iter().map(Route::from).collect())
    }

    /// Longest prefix that matches `path`.
    pub fn match_path(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.matches(path))
    }

    /// Distinct backend names referenced by the table.
    pub fn backends(&self) -> Vec<String> {
        let mut names: Vec<String> = self.routes.iter().map(|r| r.backend.clone()).collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
