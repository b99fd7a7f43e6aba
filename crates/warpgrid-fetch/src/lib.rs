//! warpgrid-fetch: blocking HTTP transport over an asynchronous fetch host.
//!
//! The host network primitive ([`FetchHost`]) answers requests through
//! promises and callbacks. [`Transport::round_trip`] turns that into a single
//! blocking call returning a [`Response`] whose [`Body`] supports blocking,
//! incremental `std::io::Read`.
//!
//! # Components
//!
//! - [`Transport`]: orchestrates one round trip, including cancellation
//!   through the request's [`Context`].
//! - [`HeaderMap`]: canonical multi-valued headers, bridged to and from
//!   [`HostHeaders`].
//! - [`Body`]: streaming adapter over the host's incremental reader, or a
//!   buffered adapter over its whole-body promise, picked per response.
//!
//! # Bridging
//!
//! Each host completion (the round trip, every body pull, the whole-body
//! fetch) is handed to the blocked caller through a one-shot channel,
//! populated once by the promise's settlement callback. Blocking runs on the
//! tokio runtime handle given to the transport.
//!
//! # Host bindings
//!
//! Tests inject a deterministic [`FetchHost`]. With the `reqwest` feature
//! (on by default), `ReqwestHost` binds a native HTTP client.

mod body;
mod config;
mod context;
mod error;
mod header;
mod host;
mod promise;
mod rendezvous;
mod request;
mod response;
mod status;
mod transport;

#[cfg(feature = "reqwest")]
mod reqwest_host;

pub use body::{Body, BufferedBody, ReadCloser, StreamBody};
pub use config::{FetchConfig, parse_duration};
pub use context::Context;
pub use error::{FetchError, FetchResult};
pub use header::{Header, HeaderMap, canonical_header_key};
pub use host::{
    AbortController, AbortSignal, CredentialsMode, FetchHost, HostError, HostHeaders,
    HostResponse, ReadChunk, RequestInit, StreamReader, UnsupportedHost,
};
pub use promise::{Promise, Resolver, Settlement};
pub use request::Request;
pub use response::Response;
pub use transport::Transport;

#[cfg(feature = "reqwest")]
pub use reqwest_host::ReqwestHost;
pub use status::{status_line, status_text};
