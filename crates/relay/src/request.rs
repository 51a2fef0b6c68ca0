//! The decorated request handed to every handler.
//!
//! A [`Request`] is built once per incoming request from the raw `http::Request`. Decoration
//! parses the URI a single time: the pathname becomes [`Request::path`] (what route matching
//! looks at) and the query string becomes [`Request::query`]. The raw URI, method, headers and
//! collected body stay reachable, and [`Request::extensions_mut`] is the place where middleware
//! attaches data for later handlers.

use bytes::Bytes;
use http::request::Parts;
use http::{Extensions, HeaderMap, Method, Uri, Version};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("request has no query string")]
    MissingQuery,

    #[error("invalid query string: {source}")]
    Query {
        #[from]
        source: serde_qs::Error,
    },

    #[error("invalid json body: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("invalid form body: {source}")]
    Form {
        #[from]
        source: serde_urlencoded::de::Error,
    },

    #[error("request body is not utf8: {source}")]
    NotUtf8 {
        #[from]
        source: std::str::Utf8Error,
    },
}

/// Decoded `key=value` pairs of a query string, in the order they appear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parses a raw query string (without the leading `?`).
    ///
    /// A query string that cannot be decoded yields no parameters.
    pub fn parse(query: &str) -> Self {
        match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
            Ok(pairs) => Self { pairs },
            Err(e) => {
                warn!(cause = %e, query, "can't decode query string");
                Self::default()
            }
        }
    }

    /// First value of the key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Every value of a repeated key.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs.iter().filter(move |(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// A request decorated with its path and query.
#[derive(Debug)]
pub struct Request {
    head: Parts,
    path: String,
    query: QueryParams,
    body: Bytes,
}

impl Request {
    /// Decorates a raw request whose body has already been collected.
    pub fn from_http(req: http::Request<Bytes>) -> Self {
        let (head, body) = req.into_parts();
        let path = head.uri.path().to_owned();
        let query = head.uri.query().map(QueryParams::parse).unwrap_or_default();
        Self { head, path, query, body }
    }

    /// Path used for route matching: the URI pathname, unless a handler rewrote it.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Rewrites the path seen by the entries that run after the current one.
    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    #[inline]
    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    /// Deserializes the query string into `T`, nested keys (`a[b]=c`) included.
    pub fn query_as<T>(&self) -> Result<T, ExtractError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let query = self.head.uri.query().ok_or(ExtractError::MissingQuery)?;
        Ok(serde_qs::from_str::<T>(query)?)
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.head.method
    }

    /// The URI as received, path and query included.
    #[inline]
    pub fn uri(&self) -> &Uri {
        &self.head.uri
    }

    /// The request target as it appeared on the request line.
    pub fn raw_url(&self) -> &str {
        self.head.uri.path_and_query().map_or("/", |pq| pq.as_str())
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.head.version
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    #[inline]
    pub fn extensions(&self) -> &Extensions {
        &self.head.extensions
    }

    #[inline]
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.head.extensions
    }

    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> Result<&str, ExtractError> {
        Ok(std::str::from_utf8(&self.body)?)
    }

    pub fn json<T>(&self) -> Result<T, ExtractError>
    where
        T: for<'de> Deserialize<'de>,
    {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn form<T>(&self) -> Result<T, ExtractError>
    where
        T: for<'de> Deserialize<'de>,
    {
        Ok(serde_urlencoded::from_bytes(&self.body)?)
    }
}
