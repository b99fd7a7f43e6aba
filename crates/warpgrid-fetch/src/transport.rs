//! Blocking round trips over an asynchronous fetch host.
//!
//! # Round-trip flow
//!
//! ```text
//! Transport::round_trip(req)
//!   → headers bridged to HostHeaders, AbortController created
//!   → request body drained and closed
//!   → host.fetch(url, init)           None → Unsupported
//!   → block: { settled, ctx.done() }
//!       ctx fires     → abort(), Canceled
//!       rejected      → HostCall(message)
//!       fulfilled     → Response (headers, content length, body adapter)
//! ```
//!
//! Response assembly runs in the settlement callback, on whichever thread
//! the host settles from. The transport holds no per-call state, so one
//! instance can serve concurrent round trips.

use std::fmt;
use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;
use tokio::runtime::Handle;

use crate::body::{Body, ReadCloser};
use crate::config::FetchConfig;
use crate::error::{FetchError, FetchResult};
use crate::header::{self, HeaderMap};
use crate::host::{AbortController, CredentialsMode, FetchHost, HostResponse, RequestInit};
use crate::rendezvous::{self, Settled};
use crate::request::Request;
use crate::response::Response;
use crate::status;

/// Synchronous HTTP transport backed by a [`FetchHost`].
#[derive(Clone)]
pub struct Transport {
    host: Arc<dyn FetchHost>,
    runtime: Handle,
    credentials: CredentialsMode,
    default_headers: HeaderMap,
}

impl Transport {
    /// Create a transport. `runtime` drives every blocking wait; it must be a
    /// multi-threaded runtime if round trips are issued from its workers.
    pub fn new(host: Arc<dyn FetchHost>, runtime: Handle) -> Self {
        Self {
            host,
            runtime,
            credentials: CredentialsMode::default(),
            default_headers: HeaderMap::new(),
        }
    }

    /// Apply the credentials policy and default headers from `config`.
    pub fn with_config(self, config: &FetchConfig) -> Self {
        Self {
            credentials: config.credentials,
            default_headers: config
                .default_headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            ..self
        }
    }

    /// Perform one request, blocking until a response or a terminal error.
    ///
    /// The request body is always closed, including on errors. On success
    /// the caller owns the response body.
    pub fn round_trip(&self, mut req: Request) -> FetchResult<Response> {
        tracing::debug!(method = %req.method(), url = %req.url(), "fetch round trip");

        let host_headers = header::to_host(&self.outbound_headers(req.headers()));
        let controller = AbortController::new();

        let body = match req.take_body() {
            Some(body) => Some(drain_body(body)?),
            None => None,
        };

        let init = RequestInit {
            method: req.method().to_string(),
            headers: host_headers,
            credentials: self.credentials,
            signal: controller.signal(),
            body,
        };

        let Some(promise) = self.host.fetch(req.url(), init) else {
            tracing::warn!("host environment has no fetch capability");
            return Err(FetchError::Unsupported);
        };

        let runtime = self.runtime.clone();
        let assembled = promise.map(move |host_response| assemble(host_response, runtime));
        let ctx = req.context();

        match rendezvous::wait(&self.runtime, assembled, Some(ctx)) {
            Settled::Fulfilled(response) => {
                if ctx.is_done() {
                    // Dropped without cancelling the host body; ownership
                    // never reached the caller.
                    tracing::debug!(
                        reason = ctx.reason(),
                        url = %req.url(),
                        "caller gave up during delivery, discarding response"
                    );
                    controller.abort();
                    return Err(FetchError::Canceled);
                }
                tracing::debug!(
                    url = %req.url(),
                    status = response.status(),
                    content_length = response.content_length(),
                    streaming = response.body().is_streaming(),
                    "fetch round trip complete"
                );
                Ok(response)
            }
            Settled::Rejected(err) => {
                tracing::debug!(url = %req.url(), error = %err, "host rejected fetch");
                Err(FetchError::HostCall(err.message().to_string()))
            }
            Settled::Canceled => {
                tracing::debug!(reason = ctx.reason(), url = %req.url(), "aborting fetch");
                controller.abort();
                Err(FetchError::Canceled)
            }
        }
    }

    fn outbound_headers(&self, headers: &HeaderMap) -> HeaderMap {
        let mut merged = headers.clone();
        for h in self.default_headers.iter() {
            if !headers.contains_key(&h.name) {
                merged.append(&h.name, h.value.clone());
            }
        }
        merged
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("credentials", &self.credentials)
            .field("default_headers", &self.default_headers)
            .finish_non_exhaustive()
    }
}

/// Read the request body to the end, then close it exactly once.
fn drain_body(mut body: Box<dyn ReadCloser>) -> FetchResult<Bytes> {
    let mut buf = Vec::new();
    let read = body.read_to_end(&mut buf);
    if let Err(e) = body.close() {
        tracing::debug!(error = %e, "closing request body failed");
    }
    match read {
        Ok(len) => {
            tracing::debug!(len, "request body drained");
            Ok(Bytes::from(buf))
        }
        Err(e) => Err(FetchError::RequestBody(e)),
    }
}

/// Build the caller-facing response from what the host delivered.
fn assemble(mut host: Box<dyn HostResponse>, runtime: Handle) -> Response {
    let code = host.status();
    let headers = header::from_host(host.headers());
    let content_length = content_length(&headers);

    let body = match host.body() {
        Some(reader) => Body::streaming(reader, runtime),
        None => Body::buffered(host.array_buffer(), runtime),
    };

    Response::new(
        code,
        status::status_line(code),
        headers,
        content_length,
        body,
    )
}

/// Base-10 `Content-Length`, or `-1` when absent or unparseable.
fn content_length(headers: &HeaderMap) -> i64 {
    headers
        .get("Content-Length")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingBody {
        closes: Arc<AtomicUsize>,
    }

    impl Read for FailingBody {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("disk gone"))
        }
    }

    impl ReadCloser for FailingBody {
        fn close(&mut self) -> io::Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn content_length_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(content_length(&headers), -1);

        headers.set("Content-Length", "42");
        assert_eq!(content_length(&headers), 42);

        headers.set("Content-Length", "abc");
        assert_eq!(content_length(&headers), -1);

        headers.set("Content-Length", "");
        assert_eq!(content_length(&headers), -1);
    }

    #[test]
    fn drain_body_reads_everything() {
        let body = Box::new(io::Cursor::new(b"hello".to_vec()));
        assert_eq!(drain_body(body).unwrap(), Bytes::from("hello"));
    }

    #[test]
    fn drain_body_failure_maps_to_request_body_error() {
        let closes = Arc::new(AtomicUsize::new(0));
        let body = FailingBody {
            closes: Arc::clone(&closes),
        };
        let err = drain_body(Box::new(body)).unwrap_err();
        assert!(matches!(err, FetchError::RequestBody(_)));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(err.to_string().contains("disk gone"));
    }

    #[test]
    fn default_headers_do_not_override_request_headers() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut config = FetchConfig::default();
        config
            .default_headers
            .insert("user-agent".to_string(), "warp-fetch".to_string());
        config
            .default_headers
            .insert("Accept".to_string(), "*/*".to_string());

        let transport = Transport::new(Arc::new(crate::host::UnsupportedHost), runtime.handle().clone())
            .with_config(&config);

        let mut headers = HeaderMap::new();
        headers.append("accept", "text/html");
        let merged = transport.outbound_headers(&headers);

        assert_eq!(merged.get_all("Accept"), vec!["text/html"]);
        assert_eq!(merged.get("User-Agent"), Some("warp-fetch"));
    }
}
