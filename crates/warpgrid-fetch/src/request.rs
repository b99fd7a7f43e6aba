use std::fmt;
use std::io;

use bytes::Bytes;

use crate::body::ReadCloser;
use crate::context::Context;
use crate::header::HeaderMap;

/// An outbound HTTP request.
///
/// The body, if any, is drained and closed by the transport; everything else
/// is read-only to it. The attached [`Context`] bounds how long
/// [`Transport::round_trip`](crate::Transport::round_trip) waits.
pub struct Request {
    method: String,
    url: String,
    headers: HeaderMap,
    body: Option<Box<dyn ReadCloser>>,
    context: Context,
}

impl Request {
    /// Create a request with no body and a context that never fires.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            context: Context::background(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_headers(self, headers: HeaderMap) -> Self {
        Self { headers, ..self }
    }

    /// Attach a body stream. It is read to the end and closed exactly once.
    pub fn with_body(self, body: impl ReadCloser + 'static) -> Self {
        Self {
            body: Some(Box::new(body)),
            ..self
        }
    }

    /// Attach an in-memory body.
    pub fn with_bytes(self, body: impl Into<Bytes>) -> Self {
        self.with_body(io::Cursor::new(body.into()))
    }

    pub fn with_context(self, context: Context) -> Self {
        Self { context, ..self }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    pub(crate) fn take_body(&mut self) -> Option<Box<dyn ReadCloser>> {
        self.body.take()
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("has_body", &self.has_body())
            .finish()
    }
}
