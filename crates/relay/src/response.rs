//! The response under construction, shared by all handlers of a chain.
//!
//! A [`Response`] buffers status, headers and body until a handler finalizes it with
//! [`Response::end`] (directly, or through [`Response::send`] and [`Response::render`]). Once
//! finalized it no longer changes: later writes are dropped and logged. The host converts it to
//! the wire with [`Response::into_http`].

use crate::view::{RenderError, Views};
use bytes::{Bytes, BytesMut};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use http_body_util::Full;
use serde::Serialize;
use serde_json::Value;
use std::rc::Rc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("send does not accept a {kind} value")]
    UnsupportedBody { kind: &'static str },

    #[error("can't serialize response body: {source}")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },

    #[error("invalid header: {source}")]
    Header {
        #[from]
        source: http::Error,
    },
}

#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
    finished: bool,
    views: Option<Rc<Views>>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// A response with status 200, no headers and no body, not bound to any views.
    pub fn new() -> Self {
        Self { status: StatusCode::OK, headers: HeaderMap::new(), body: BytesMut::new(), finished: false, views: None }
    }

    pub(crate) fn with_views(views: Rc<Views>) -> Self {
        Self { views: Some(views), ..Self::new() }
    }

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        if self.finished {
            warn!(%status, "response already finished, status ignored");
        } else {
            self.status = status;
        }
        self
    }

    /// Sets a header, replacing any previous value of the same name.
    pub fn set_header<K, V>(&mut self, name: K, value: V) -> Result<&mut Self, ResponseError>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let name = HeaderName::try_from(name).map_err(Into::<http::Error>::into)?;
        let value = HeaderValue::try_from(value).map_err(Into::<http::Error>::into)?;
        if self.finished {
            warn!(header = %name, "response already finished, header ignored");
        } else {
            self.headers.insert(name, value);
        }
        Ok(self)
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Appends a chunk to the body.
    pub fn write(&mut self, chunk: impl AsRef<[u8]>) -> &mut Self {
        if self.finished {
            warn!(len = chunk.as_ref().len(), "response already finished, write dropped");
        } else {
            self.body.extend_from_slice(chunk.as_ref());
        }
        self
    }

    /// Finalizes the response.
    pub fn end(&mut self) {
        self.finished = true;
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Writes `value` as the body and finalizes the response.
    ///
    /// The value is classified by its serialized shape: a string is sent as is, a number as its
    /// decimal text, an object, array or null as JSON. Booleans are rejected.
    ///
    /// ```
    /// use micro_relay::Response;
    ///
    /// let mut res = Response::new();
    /// res.send(&42).unwrap();
    /// assert_eq!(res.body(), b"42");
    ///
    /// assert!(Response::new().send(&true).is_err());
    /// ```
    pub fn send<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ResponseError> {
        let body = match serde_json::to_value(value)? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(_) => return Err(ResponseError::UnsupportedBody { kind: "boolean" }),
            // serialized from the original value, `Value` objects would sort the keys
            Value::Object(_) | Value::Array(_) | Value::Null => serde_json::to_string(value)?,
        };
        self.write(body).end();
        Ok(())
    }

    /// Renders `template` with the application's view engine and finalizes the response.
    ///
    /// On success the response is a 200 with `content-type: text/html`. Any failure (no engine,
    /// unknown engine, unreadable template, template error, unserializable data) becomes a 503
    /// without body; the cause is only logged. Either way the outcome replaces whatever was
    /// written before. A response that is already finished is left untouched.
    pub async fn render<T: Serialize + ?Sized>(&mut self, template: &str, data: &T) {
        if self.finished {
            warn!(template, "response already finished, render skipped");
            return;
        }

        let rendered = match (&self.views, serde_json::to_value(data)) {
            (None, _) => Err(RenderError::NoEngine),
            (Some(_), Err(e)) => Err(RenderError::from(e)),
            (Some(views), Ok(data)) => views.render(template, &data).await,
        };

        self.body.clear();
        match rendered {
            Ok(html) => {
                self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(mime::TEXT_HTML.as_ref()));
                self.set_status(StatusCode::OK).write(html).end();
            }
            Err(e) => {
                warn!(cause = %e, template, "render template error");
                self.set_status(StatusCode::SERVICE_UNAVAILABLE).end();
            }
        }
    }

    /// Drops everything written so far. A finalized response is left untouched.
    pub(crate) fn reset(&mut self) {
        if !self.finished {
            self.status = StatusCode::OK;
            self.headers.clear();
            self.body.clear();
        }
    }

    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut response = http::Response::new(Full::new(self.body.freeze()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
