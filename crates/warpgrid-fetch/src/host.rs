//! The host network primitive, as consumed by the transport.
//!
//! The host is a fetch-style capability: it takes a URL plus [`RequestInit`]
//! options and answers with a [`Promise`] of a [`HostResponse`]. Its body is
//! either an incremental [`StreamReader`] or, when the host exposes none, a
//! whole-body [`HostResponse::array_buffer`] promise.
//!
//! Everything here is a black box from the transport's point of view. Tests
//! substitute a deterministic mock; production binds a real host at startup
//! (see `ReqwestHost` behind the `reqwest` feature).

use std::fmt;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::promise::Promise;

/// Opaque failure reported by the host, e.g. the message of a host-side
/// exception object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostError {
    message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HostError {}

impl From<String> for HostError {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for HostError {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The host's native header collection.
///
/// Supports multiple values per name through [`append`](HostHeaders::append);
/// nothing is ever overwritten. Iteration order is the host's order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostHeaders {
    entries: Vec<(String, String)>,
}

impl HostHeaders {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Visit every (name, value) pair in host order.
    pub fn for_each(&self, mut f: impl FnMut(&str, &str)) {
        for (name, value) in &self.entries {
            f(name, value);
        }
    }

    /// All values stored under `name` (case-insensitive).
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for HostHeaders {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Credentials policy passed to the host with every request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialsMode {
    Omit,
    #[default]
    SameOrigin,
    Include,
}

impl CredentialsMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialsMode::Omit => "omit",
            CredentialsMode::SameOrigin => "same-origin",
            CredentialsMode::Include => "include",
        }
    }
}

type AbortListener = Box<dyn FnOnce() + Send>;

struct AbortInner {
    state: watch::Sender<bool>,
    listeners: Mutex<Vec<AbortListener>>,
}

/// Read side of an [`AbortController`], handed to the host.
#[derive(Clone)]
pub struct AbortSignal {
    inner: Arc<AbortInner>,
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        *self.inner.state.borrow()
    }

    /// Run `listener` once when the signal fires, or now if it already has.
    pub fn on_abort(&self, listener: impl FnOnce() + Send + 'static) {
        {
            let mut listeners = self.inner.listeners.lock().unwrap();
            if !self.is_aborted() {
                listeners.push(Box::new(listener));
                return;
            }
        }
        listener();
    }

    /// Wait until the signal fires.
    pub async fn aborted(&self) {
        let mut rx = self.inner.state.subscribe();
        if rx.wait_for(|aborted| *aborted).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

/// Cancellation handle for one round trip's host-side work.
///
/// Signalling is one-shot: listeners run on the first [`abort`](AbortController::abort)
/// and later calls do nothing.
#[derive(Debug)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            signal: AbortSignal {
                inner: Arc::new(AbortInner {
                    state,
                    listeners: Mutex::new(Vec::new()),
                }),
            },
        }
    }

    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    pub fn abort(&self) {
        let listeners = {
            let mut listeners = self.signal.inner.listeners.lock().unwrap();
            if self.signal.is_aborted() {
                return;
            }
            self.signal.inner.state.send_replace(true);
            std::mem::take(&mut *listeners)
        };
        for listener in listeners {
            listener();
        }
    }
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for one host fetch call.
#[derive(Debug, Clone)]
pub struct RequestInit {
    pub method: String,
    pub headers: HostHeaders,
    pub credentials: CredentialsMode,
    pub signal: AbortSignal,
    /// Complete request body. The host needs it up front.
    pub body: Option<Bytes>,
}

/// Result of one pull from a [`StreamReader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadChunk {
    pub done: bool,
    pub value: Bytes,
}

impl ReadChunk {
    pub fn data(value: impl Into<Bytes>) -> Self {
        Self {
            done: false,
            value: value.into(),
        }
    }

    pub fn done() -> Self {
        Self {
            done: true,
            value: Bytes::new(),
        }
    }
}

/// Incremental, pull-based body handle (the `getReader()` analogue).
pub trait StreamReader: Send {
    /// Request the next chunk. Callers never issue a second read while one is
    /// outstanding.
    fn read(&mut self) -> Promise<ReadChunk>;

    /// Best-effort cancellation of the underlying stream.
    fn cancel(&mut self);
}

/// A response as produced by the host.
pub trait HostResponse: Send {
    fn status(&self) -> u16;

    fn headers(&self) -> &HostHeaders;

    /// The incremental body reader, if the host exposes one.
    fn body(&mut self) -> Option<Box<dyn StreamReader>>;

    /// Whole-body retrieval, used when [`body`](HostResponse::body) is `None`.
    fn array_buffer(&mut self) -> Promise<Bytes>;
}

/// The host network primitive.
pub trait FetchHost: Send + Sync {
    /// Start a fetch. `None` means the environment has no fetch capability.
    fn fetch(&self, url: &str, init: RequestInit) -> Option<Promise<Box<dyn HostResponse>>>;
}

/// Host binding for environments without a network primitive.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedHost;

impl FetchHost for UnsupportedHost {
    fn fetch(&self, _url: &str, _init: RequestInit) -> Option<Promise<Box<dyn HostResponse>>> {
        None
    }
}
