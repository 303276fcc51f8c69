//! Pattern dispatch table.
//!
//! # Responsibilities
//! - Register handlers against path patterns
//! - Pick the most specific pattern for a request path
//! - Redirect unclean paths and subtree roots missing their trailing slash
//! - Answer 404 when nothing matches
//!
//! # Design Decisions
//! - A pattern ending in `/` names a subtree; any other pattern is exact
//! - Exact hit first, then the longest matching subtree pattern
//! - Path matching is case-sensitive and byte-wise on the raw path
//! - Immutable once the server starts (shared via Arc, no locks)

use std::collections::HashMap;
use std::fmt;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::http::handler::{Handler, SharedHandler};

/// Errors raised by [`ServeMux::register`].
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("pattern is empty")]
    EmptyPattern,

    #[error("pattern {0:?} must start with /")]
    NotRooted(String),

    #[error("multiple registrations for pattern {0:?}")]
    Duplicate(String),
}

/// Outcome of looking up a request path.
pub enum Resolution<'a> {
    /// A registered handler matched.
    Handler {
        pattern: &'a str,
        handler: &'a SharedHandler,
    },
    /// The client should retry at this path.
    Redirect(String),
    /// No pattern matched.
    NotFound,
}

/// Maps patterns to handlers.
#[derive(Clone, Default)]
pub struct ServeMux {
    /// Every registered pattern, for exact hits.
    exact: HashMap<String, SharedHandler>,
    /// Patterns ending in `/`, longest first.
    subtrees: Vec<(String, SharedHandler)>,
}

impl ServeMux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `pattern`.
    pub fn register(
        &mut self,
        pattern: &str,
        handler: impl Handler,
    ) -> Result<(), RegistrationError> {
        if pattern.is_empty() {
            return Err(RegistrationError::EmptyPattern);
        }
        if !pattern.starts_with('/') {
            return Err(RegistrationError::NotRooted(pattern.to_string()));
        }
        if self.exact.contains_key(pattern) {
            return Err(RegistrationError::Duplicate(pattern.to_string()));
        }

        let handler: SharedHandler = std::sync::Arc::new(handler);
        if pattern.ends_with('/') {
            self.subtrees.push((pattern.to_string(), handler.clone()));
            self.subtrees.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        }
        self.exact.insert(pattern.to_string(), handler);
        Ok(())
    }

    /// Registered patterns, in no particular order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.exact.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    /// Resolve a request path to a handler, a redirect or nothing.
    pub fn resolve(&self, path: &str) -> Resolution<'_> {
        let cleaned = clean_path(path);
        if cleaned != path {
            return Resolution::Redirect(cleaned);
        }

        if let Some((pattern, handler)) = self.exact.get_key_value(path) {
            return Resolution::Handler { pattern, handler };
        }

        if !path.ends_with('/') && self.exact.contains_key(&format!("{path}/")) {
            return Resolution::Redirect(format!("{path}/"));
        }

        self.subtrees
            .iter()
            .find(|(pattern, _)| path.starts_with(pattern.as_str()))
            .map_or(Resolution::NotFound, |(pattern, handler)| Resolution::Handler {
                pattern,
                handler,
            })
    }

    /// Route a request to its handler and return the response.
    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        let resolution = self.resolve(request.uri().path());
        match resolution {
            Resolution::Handler { pattern, handler } => {
                tracing::trace!(pattern = %pattern, path = %request.uri().path(), "Dispatching");
                handler.serve(request).await
            }
            Resolution::Redirect(mut location) => {
                if let Some(query) = request.uri().query() {
                    location.push('?');
                    location.push_str(query);
                }
                tracing::debug!(path = %request.uri().path(), location = %location, "Redirecting");
                (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
            }
            Resolution::NotFound => {
                tracing::debug!(path = %request.uri().path(), "No pattern matched");
                (StatusCode::NOT_FOUND, "404 page not found\n").into_response()
            }
        }
    }
}

impl fmt::Debug for ServeMux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut patterns: Vec<_> = self.patterns().collect();
        patterns.sort_unstable();
        f.debug_struct("ServeMux").field("patterns", &patterns).finish()
    }
}

/// Canonical form of a request path.
///
/// Collapses repeated slashes and resolves `.` and `..` segments, never
/// climbing above the root. A trailing slash on the input is preserved.
pub fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut cleaned = String::with_capacity(path.len() + 1);
    for segment in &segments {
        cleaned.push('/');
        cleaned.push_str(segment);
    }
    if cleaned.is_empty() || path.ends_with('/') {
        cleaned.push('/');
    }
    cleaned
}
