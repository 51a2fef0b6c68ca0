//! Path and method matching for route table entries.
//!
//! Every entry in the [`RouteTable`](crate::table::RouteTable) carries a [`PathMatcher`] and a
//! [`MethodFilter`]. Both are built once, at registration time, from what the caller handed to
//! the [`ApplicationBuilder`](crate::ApplicationBuilder):
//!
//! - a literal path becomes [`PathMatcher::Exact`] for routes and [`PathMatcher::Prefix`] for
//!   middleware
//! - a caller supplied [`Regex`] becomes [`PathMatcher::Pattern`] for routes and
//!   [`PathMatcher::AnchoredPattern`] for middleware
//! - no path at all becomes [`PathMatcher::Any`]
//!
//! Literal paths are compared as plain strings, so characters with a special meaning in
//! pattern syntax (`.`, `$`, `[`, ...) always match literally.
//!
//! # Example
//!
//! ```
//! use micro_relay::matcher::{PathMatcher, PathSpec};
//!
//! let middleware = PathMatcher::prefix(PathSpec::from("/api"));
//! assert!(middleware.matches("/api/users"));
//! assert!(middleware.matches("/apiextra"));
//!
//! let route = PathMatcher::exact(PathSpec::from("/users"));
//! assert!(route.matches("/users"));
//! assert!(!route.matches("/users/"));
//! ```

use http::Method;
use regex::Regex;
use std::fmt;

/// What the caller declared as the path of a registration.
#[derive(Debug, Clone)]
pub enum PathSpec {
    /// A literal path, compared character by character.
    Literal(String),
    /// A pre-built pattern supplied by the caller.
    Pattern(Regex),
    /// No path: the entry applies to every request path.
    All,
}

impl From<&str> for PathSpec {
    fn from(path: &str) -> Self {
        PathSpec::Literal(path.to_owned())
    }
}

impl From<String> for PathSpec {
    fn from(path: String) -> Self {
        PathSpec::Literal(path)
    }
}

impl From<Regex> for PathSpec {
    fn from(pattern: Regex) -> Self {
        PathSpec::Pattern(pattern)
    }
}

/// A predicate over a request path (the pathname only, without query string).
#[derive(Debug, Clone)]
pub enum PathMatcher {
    /// Matches every path.
    Any,
    /// Matches a path equal to the literal.
    Exact(String),
    /// Matches any path starting with the literal. Not segment aware.
    Prefix(String),
    /// Matches wherever the pattern finds a match; the caller controls anchoring.
    Pattern(Regex),
    /// Matches when the pattern has a match starting at the beginning of the path.
    AnchoredPattern(Regex),
}

impl PathMatcher {
    /// Builds the matcher used by method routes: literals must be equal to the path.
    pub fn exact(spec: PathSpec) -> Self {
        match spec {
            PathSpec::Literal(path) => PathMatcher::Exact(path),
            PathSpec::Pattern(pattern) => PathMatcher::Pattern(pattern),
            PathSpec::All => PathMatcher::Any,
        }
    }

    /// Builds the matcher used by middleware: literals and patterns match as a prefix.
    pub fn prefix(spec: PathSpec) -> Self {
        match spec {
            PathSpec::Literal(path) => PathMatcher::Prefix(path),
            PathSpec::Pattern(pattern) => PathMatcher::AnchoredPattern(pattern),
            PathSpec::All => PathMatcher::Any,
        }
    }

    /// Checks the matcher against a request path.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathMatcher::Any => true,
            PathMatcher::Exact(literal) => path == literal,
            PathMatcher::Prefix(literal) => path.starts_with(literal.as_str()),
            PathMatcher::Pattern(pattern) => pattern.is_match(path),
            // the leftmost match starts at 0 iff some match starts at 0
            PathMatcher::AnchoredPattern(pattern) => pattern.find(path).is_some_and(|m| m.start() == 0),
        }
    }
}

impl fmt::Display for PathMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathMatcher::Any => f.write_str("*"),
            PathMatcher::Exact(literal) => write!(f, "={literal}"),
            PathMatcher::Prefix(literal) => write!(f, "{literal}*"),
            PathMatcher::Pattern(pattern) => write!(f, "~{}", pattern.as_str()),
            PathMatcher::AnchoredPattern(pattern) => write!(f, "~^{}", pattern.as_str()),
        }
    }
}

/// Restricts an entry to one HTTP method, or lets every method through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    Any,
    Only(Method),
}

impl MethodFilter {
    /// `Any` always passes; `Only` passes when the method is equal, without normalization.
    #[inline]
    pub fn matches(&self, method: &Method) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Only(expected) => expected == method,
        }
    }
}

impl From<Method> for MethodFilter {
    fn from(method: Method) -> Self {
        MethodFilter::Only(method)
    }
}

impl fmt::Display for MethodFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodFilter::Any => f.write_str("ALL"),
            MethodFilter::Only(method) => f.write_str(method.as_str()),
        }
    }
}

macro_rules! method_filter {
    ($method:ident, $upper_case_method:ident) => {
        #[doc = concat!("Creates a filter that matches HTTP ", stringify!($upper_case_method), " requests.")]
        #[inline]
        pub fn $method() -> MethodFilter {
            MethodFilter::Only(Method::$upper_case_method)
        }
    };
}

method_filter!(get_method, GET);
method_filter!(post_method, POST);
method_filter!(put_method, PUT);
method_filter!(delete_method, DELETE);
method_filter!(head_method, HEAD);
method_filter!(options_method, OPTIONS);
method_filter!(connect_method, CONNECT);
method_filter!(patch_method, PATCH);
method_filter!(trace_method, TRACE);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_is_plain_string_prefix() {
        let matcher = PathMatcher::prefix("/api".into());

        assert!(matcher.matches("/api"));
        assert!(matcher.matches("/api/"));
        assert!(matcher.matches("/api/users"));
        assert!(matcher.matches("/apiextra"));
        assert!(!matcher.matches("/ap"));
        assert!(!matcher.matches("/v1/api"));
    }

    #[test]
    fn test_exact_requires_equality() {
        let matcher = PathMatcher::exact("/users".into());

        assert!(matcher.matches("/users"));
        assert!(!matcher.matches("/users/"));
        assert!(!matcher.matches("/users/1"));
        assert!(!matcher.matches("/user"));
    }

    #[test]
    fn test_literal_with_pattern_characters() {
        let matcher = PathMatcher::exact("/a.b/$x[1]|{y}^".into());
        assert!(matcher.matches("/a.b/$x[1]|{y}^"));
        assert!(!matcher.matches("/aXb/$x[1]|{y}^"));

        let matcher = PathMatcher::prefix("/v1.0".into());
        assert!(matcher.matches("/v1.0/items"));
        assert!(!matcher.matches("/v1x0/items"));
    }

    #[test]
    fn test_middleware_pattern_is_anchored() {
        let matcher = PathMatcher::prefix(Regex::new(r"/v[0-9]+").unwrap().into());

        assert!(matcher.matches("/v1"));
        assert!(matcher.matches("/v22/users"));
        assert!(!matcher.matches("/api/v1"));
        assert!(!matcher.matches("/vx"));
    }

    #[test]
    fn test_route_pattern_is_used_as_given() {
        let unanchored = PathMatcher::exact(Regex::new(r"/items/\d+").unwrap().into());
        assert!(unanchored.matches("/items/42"));
        assert!(unanchored.matches("/shop/items/42"));

        let anchored = PathMatcher::exact(Regex::new(r"^/items/\d+$").unwrap().into());
        assert!(anchored.matches("/items/42"));
        assert!(!anchored.matches("/shop/items/42"));
        assert!(!anchored.matches("/items/42/edit"));
    }

    #[test]
    fn test_catch_all() {
        for matcher in [PathMatcher::prefix(PathSpec::All), PathMatcher::exact(PathSpec::All)] {
            assert!(matcher.matches("/"));
            assert!(matcher.matches("/anything/at/all"));
            assert!(matcher.matches(""));
        }
    }

    #[test]
    fn test_method_filter() {
        assert!(MethodFilter::Any.matches(&Method::GET));
        assert!(MethodFilter::Any.matches(&Method::DELETE));

        assert!(get_method().matches(&Method::GET));
        assert!(!get_method().matches(&Method::POST));
        assert!(post_method().matches(&Method::POST));
        assert!(!post_method().matches(&Method::GET));

        let custom = Method::from_bytes(b"PURGE").unwrap();
        assert!(MethodFilter::from(custom.clone()).matches(&custom));
        assert!(!MethodFilter::from(custom).matches(&Method::GET));
    }

    #[test]
    fn test_display() {
        assert_eq!(PathMatcher::Any.to_string(), "*");
        assert_eq!(PathMatcher::exact("/a".into()).to_string(), "=/a");
        assert_eq!(PathMatcher::prefix("/a".into()).to_string(), "/a*");
        assert_eq!(MethodFilter::Any.to_string(), "ALL");
        assert_eq!(put_method().to_string(), "PUT");
    }
}
