//! Route table: the validated set of upstream routes.
//!
//! # Responsibilities
//! - Validate route patterns and backend URLs
//! - Reject empty tables and duplicate patterns
//! - Hand out read-only route definitions to the forwarding handlers
//!
//! # Design Decisions
//! - Built once at startup, immutable afterwards (shared without locks)
//! - Keeps configuration order, which is also the registration order

use std::collections::HashSet;
use std::str::FromStr;

use axum::http::uri::Authority;
use url::Url;

use crate::config::UpstreamConfig;

/// Minimum pattern length: a slash, one character and the trailing slash.
const MIN_PATTERN_LEN: usize = 3;

/// Errors raised while building route definitions.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("pattern is empty")]
    EmptyPattern,

    #[error("pattern {0:?} must start with /")]
    PatternNotRooted(String),

    #[error("pattern {0:?} must end with /")]
    PatternNotTerminated(String),

    #[error("pattern {0:?} must be at least 3 characters long")]
    PatternTooShort(String),

    #[error("url {url:?} is invalid: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("url {url:?} uses unsupported scheme {scheme:?} (only http is supported)")]
    UnsupportedScheme { url: String, scheme: String },

    #[error("url {0:?} has no host")]
    MissingHost(String),

    #[error("route table must contain at least one route")]
    NoRoutes,

    #[error("pattern {0:?} is registered more than once")]
    DuplicatePattern(String),
}

/// Check that a pattern is rooted, terminated by `/` and long enough.
pub fn check_pattern(pattern: &str) -> Result<(), RouteError> {
    if pattern.is_empty() {
        return Err(RouteError::EmptyPattern);
    }
    if !pattern.starts_with('/') {
        return Err(RouteError::PatternNotRooted(pattern.to_string()));
    }
    if !pattern.ends_with('/') {
        return Err(RouteError::PatternNotTerminated(pattern.to_string()));
    }
    if pattern.len() < MIN_PATTERN_LEN {
        return Err(RouteError::PatternTooShort(pattern.to_string()));
    }
    Ok(())
}

/// Parse a backend base URL: absolute, `http`, with a host.
pub fn parse_backend_url(raw: &str) -> Result<Url, RouteError> {
    let url = Url::parse(raw).map_err(|e| RouteError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.scheme() != "http" {
        return Err(RouteError::UnsupportedScheme {
            url: raw.to_string(),
            scheme: url.scheme().to_string(),
        });
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(RouteError::MissingHost(raw.to_string()));
    }
    Ok(url)
}

/// A single upstream route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDefinition {
    pattern: String,
    backend_url: Url,
    rewrite_prefix: bool,
    authority: Authority,
}

impl RouteDefinition {
    /// Validate and build a route definition.
    pub fn new(
        pattern: impl Into<String>,
        backend_url: &str,
        rewrite_prefix: bool,
    ) -> Result<Self, RouteError> {
        let pattern = pattern.into();
        check_pattern(&pattern)?;
        let backend_url = parse_backend_url(backend_url)?;

        let host = backend_url
            .host_str()
            .ok_or_else(|| RouteError::MissingHost(backend_url.to_string()))?;
        let port = backend_url.port_or_known_default().unwrap_or(80);
        let authority =
            Authority::from_str(&format!("{host}:{port}")).map_err(|e| RouteError::InvalidUrl {
                url: backend_url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            pattern,
            backend_url,
            rewrite_prefix,
            authority,
        })
    }

    /// The registration pattern (e.g., "/api/").
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The backend base URL.
    pub fn backend_url(&self) -> &Url {
        &self.backend_url
    }

    /// Whether the pattern prefix is stripped before forwarding.
    pub fn rewrite_prefix(&self) -> bool {
        self.rewrite_prefix
    }

    /// Backend `host:port`, used as the outbound authority and Host header.
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// The prefix removed from request paths: the pattern without its trailing slash.
    pub fn strip_prefix(&self) -> &str {
        self.pattern.strip_suffix('/').unwrap_or(&self.pattern)
    }
}

/// Immutable, non-empty collection of routes with unique patterns.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteDefinition>,
}

impl RouteTable {
    /// Build a table, rejecting empty input and duplicate patterns.
    pub fn new(routes: Vec<RouteDefinition>) -> Result<Self, RouteError> {
        if routes.is_empty() {
            return Err(RouteError::NoRoutes);
        }
        let mut seen = HashSet::new();
        for route in &routes {
            if !seen.insert(route.pattern()) {
                return Err(RouteError::DuplicatePattern(route.pattern.clone()));
            }
        }
        Ok(Self { routes })
    }

    /// Build a table from upstream configuration entries.
    pub fn from_config(upstreams: &[UpstreamConfig]) -> Result<Self, RouteError> {
        let routes = upstreams
            .iter()
            .map(|u| RouteDefinition::new(u.pattern.clone(), &u.url, u.strip_prefix))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(routes)
    }

    /// Look up a route by its exact pattern.
    pub fn get(&self, pattern: &str) -> Option<&RouteDefinition> {
        self.routes.iter().find(|r| r.pattern == pattern)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteDefinition> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<'a> IntoIterator for &'a RouteTable {
    type Item = &'a RouteDefinition;
    type IntoIter = std::slice::Iter<'a, RouteDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_rules() {
        assert_eq!(check_pattern("/api/"), Ok(()));
        assert_eq!(check_pattern("/a/"), Ok(()));
        assert_eq!(check_pattern(""), Err(RouteError::EmptyPattern));
        assert!(matches!(check_pattern("api/"), Err(RouteError::PatternNotRooted(_))));
        assert!(matches!(check_pattern("/api"), Err(RouteError::PatternNotTerminated(_))));
        assert!(matches!(check_pattern("//"), Err(RouteError::PatternTooShort(_))));
    }

    #[test]
    fn test_backend_url_rules() {
        assert!(parse_backend_url("http://127.0.0.1:9001").is_ok());
        assert!(matches!(
            parse_backend_url("127.0.0.1:9001"),
            Err(RouteError::InvalidUrl { .. }) | Err(RouteError::UnsupportedScheme { .. })
        ));
        assert!(matches!(
            parse_backend_url("https://example.com"),
            Err(RouteError::UnsupportedScheme { .. })
        ));
        assert!(matches!(parse_backend_url("/relative"), Err(RouteError::InvalidUrl { .. })));
    }

    #[test]
    fn test_route_definition() {
        let route = RouteDefinition::new("/api/", "http://localhost/base", true).unwrap();
        assert_eq!(route.pattern(), "/api/");
        assert_eq!(route.strip_prefix(), "/api");
        assert_eq!(route.authority().as_str(), "localhost:80");
        assert!(route.rewrite_prefix());
    }

    #[test]
    fn test_ipv6_authority() {
        let route = RouteDefinition::new("/v6/", "http://[::1]:9001", false).unwrap();
        assert_eq!(route.authority().as_str(), "[::1]:9001");
    }

    #[test]
    fn test_table_rejects_empty_and_duplicates() {
        assert_eq!(RouteTable::new(vec![]).unwrap_err(), RouteError::NoRoutes);

        let a = RouteDefinition::new("/a/", "http://a.local", false).unwrap();
        let dup = RouteDefinition::new("/a/", "http://b.local", false).unwrap();
        assert_eq!(
            RouteTable::new(vec![a, dup]).unwrap_err(),
            RouteError::DuplicatePattern("/a/".into())
        );
    }

    #[test]
    fn test_table_from_config() {
        let upstreams = vec![
            UpstreamConfig {
                pattern: "/a/".into(),
                strip_prefix: false,
                url: "http://a.local".into(),
            },
            UpstreamConfig {
                pattern: "/b/".into(),
                strip_prefix: true,
                url: "http://b.local:8080".into(),
            },
        ];
        let table = RouteTable::from_config(&upstreams).unwrap();

        assert_eq!(table.len(), 2);
        let patterns: Vec<_> = table.iter().map(RouteDefinition::pattern).collect();
        assert_eq!(patterns, ["/a/", "/b/"]);
        assert!(table.get("/b/").unwrap().rewrite_prefix());
        assert!(table.get("/c/").is_none());
    }
}
