//! The ordered route table shared by middleware and routes.

use crate::handler::{BoxedHandler, RequestHandler};
use crate::matcher::{MethodFilter, PathMatcher};
use http::Method;
use std::fmt;

/// One registered handler together with its path matcher and method filter.
pub struct RouteEntry {
    matcher: PathMatcher,
    method: MethodFilter,
    handler: BoxedHandler,
}

impl RouteEntry {
    pub fn matcher(&self) -> &PathMatcher {
        &self.matcher
    }

    pub fn method(&self) -> &MethodFilter {
        &self.method
    }

    pub fn handler(&self) -> &dyn RequestHandler {
        self.handler.as_ref()
    }

    /// Path first, then method.
    #[inline]
    pub fn matches(&self, path: &str, method: &Method) -> bool {
        self.matcher.matches(path) && self.method.matches(method)
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("matcher", &self.matcher)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// Entries in registration order. Append only; there is no way to remove or reorder.
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Appends a single entry.
    pub fn register(&mut self, matcher: PathMatcher, method: MethodFilter, handler: BoxedHandler) {
        self.entries.push(RouteEntry { matcher, method, handler });
    }

    /// Appends one entry per handler, in order, all sharing the matcher and the method filter.
    pub fn register_all(&mut self, matcher: PathMatcher, method: MethodFilter, handlers: Vec<BoxedHandler>) {
        self.entries.reserve(handlers.len());
        for handler in handlers {
            self.register(matcher.clone(), method.clone(), handler);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&RouteEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.iter()
    }
}
