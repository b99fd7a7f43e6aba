use std::io;

use bytes::Bytes;

use crate::body::{Body, ReadCloser};
use crate::header::HeaderMap;

/// An inbound HTTP response produced by one successful round trip.
///
/// The caller owns the body and is responsible for closing it.
#[derive(Debug)]
pub struct Response {
    status: u16,
    status_text: String,
    headers: HeaderMap,
    content_length: i64,
    body: Body,
}

impl Response {
    pub(crate) fn new(
        status: u16,
        status_text: String,
        headers: HeaderMap,
        content_length: i64,
        body: Body,
    ) -> Self {
        Self {
            status,
            status_text,
            headers,
            content_length,
            body,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Status line, e.g. `"200 OK"`.
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Parsed `Content-Length`, or `-1` when absent or malformed.
    pub fn content_length(&self) -> i64 {
        self.content_length
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn into_body(self) -> Body {
        self.body
    }

    /// Read the whole body, close it, and return it.
    pub fn into_bytes(self) -> io::Result<Bytes> {
        self.body.into_bytes()
    }

    /// Close the body without reading it.
    pub fn close(mut self) -> io::Result<()> {
        self.body.close()
    }
}
