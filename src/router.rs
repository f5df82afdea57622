//! Route table: registration-ordered endpoints with capture segments.
//!
//! Patterns are split on `/`; a segment starting with `:` is a capture that
//! matches any single path component and binds its value. Matching is a
//! linear scan in registration order, so among overlapping routes the first
//! one registered wins. The table is an immutable snapshot: it is built
//! once through [`RouteTableBuilder`] before the server loop starts and is
//! never mutated while serving.

use crate::dispatcher::RouteHandler;
use http::Method;
use std::sync::Arc;
use tracing::info;

/// One component of a registered path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must be byte-equal to the corresponding request segment.
    Literal(String),
    /// Matches any single segment and binds its value under this name.
    Capture(String),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        match raw.strip_prefix(':') {
            Some(name) => Segment::Capture(name.to_string()),
            None => Segment::Literal(raw.to_string()),
        }
    }
}

/// One registered endpoint: method, ordered path segments, handler
/// capability and the async delivery flag.
pub struct Route {
    pub method: Method,
    pub pattern: String,
    pub segments: Vec<Segment>,
    pub handler: Arc<dyn RouteHandler>,
    /// When true the handler is trusted to deliver the response later,
    /// via the message bus or a streaming session.
    pub is_async: bool,
}

impl Route {
    fn new(method: Method, pattern: &str, handler: Arc<dyn RouteHandler>, is_async: bool) -> Self {
        let segments = split_segments(pattern)
            .into_iter()
            .map(Segment::parse)
            .collect();
        Self {
            method,
            pattern: pattern.to_string(),
            segments,
            handler,
            is_async,
        }
    }

    /// True iff the method matches, the segment counts are equal and every
    /// literal segment is byte-equal to the request's segment.
    pub fn matches(&self, method: &Method, segments: &[&str]) -> bool {
        if self.method != *method || self.segments.len() != segments.len() {
            return false;
        }
        self.segments
            .iter()
            .zip(segments)
            .all(|(own, given)| match own {
                Segment::Literal(lit) => lit == given,
                Segment::Capture(_) => true,
            })
    }

    /// Capture bindings for an already-matched request path.
    pub fn captures<'p>(&self, segments: &[&'p str]) -> Vec<(&str, &'p str)> {
        self.segments
            .iter()
            .zip(segments)
            .filter_map(|(own, given)| match own {
                Segment::Capture(name) => Some((name.as_str(), *given)),
                Segment::Literal(_) => None,
            })
            .collect()
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("is_async", &self.is_async)
            .finish()
    }
}

/// Split a path on `/`, dropping empty components.
pub fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Immutable, registration-ordered routing table.
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder { routes: Vec::new() }
    }

    /// First registered route satisfying the match invariant, if any.
    pub fn find(&self, method: &Method, segments: &[&str]) -> Option<&Route> {
        self.routes.iter().find(|r| r.matches(method, segments))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Builder collecting routes in registration order. No de-duplication or
/// conflict detection: later overlapping routes are simply shadowed.
pub struct RouteTableBuilder {
    routes: Vec<Route>,
}

impl RouteTableBuilder {
    pub fn route(
        mut self,
        method: Method,
        pattern: &str,
        handler: Arc<dyn RouteHandler>,
        is_async: bool,
    ) -> Self {
        self.routes.push(Route::new(method, pattern, handler, is_async));
        self
    }

    pub fn get(self, pattern: &str, handler: Arc<dyn RouteHandler>, is_async: bool) -> Self {
        self.route(Method::GET, pattern, handler, is_async)
    }

    pub fn post(self, pattern: &str, handler: Arc<dyn RouteHandler>, is_async: bool) -> Self {
        self.route(Method::POST, pattern, handler, is_async)
    }

    pub fn put(self, pattern: &str, handler: Arc<dyn RouteHandler>, is_async: bool) -> Self {
        self.route(Method::PUT, pattern, handler, is_async)
    }

    pub fn delete(self, pattern: &str, handler: Arc<dyn RouteHandler>, is_async: bool) -> Self {
        self.route(Method::DELETE, pattern, handler, is_async)
    }

    /// Freeze the table. After this point the route set is fixed for the
    /// lifetime of the server.
    pub fn build(self) -> RouteTable {
        info!(routes_count = self.routes.len(), "Routing table frozen");
        RouteTable { routes: self.routes }
    }
}
