//! Error types for the fetch transport.

use std::io;

use thiserror::Error;

/// Result type alias for fetch transport operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors surfaced by [`Transport::round_trip`](crate::Transport::round_trip)
/// and by response body reads.
///
/// None of these are retried internally. Best-effort cleanup (aborting host
/// work, cancelling a body stream) never produces one of these.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The hosting environment exposes no fetch capability at all.
    #[error("fetch is not supported by this host environment")]
    Unsupported,

    /// Draining the outbound request body failed. The body was closed first.
    #[error("reading request body: {0}")]
    RequestBody(#[source] io::Error),

    /// The host rejected the round trip.
    #[error("fetch() failed: {0}")]
    HostCall(String),

    /// The caller's context was cancelled or hit its deadline first.
    #[error("request canceled")]
    Canceled,

    /// Pulling a response body chunk failed on the host side.
    #[error("reading response body: {0}")]
    StreamRead(String),
}

impl FetchError {
    /// Advisory hint for callers that implement their own retry policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::HostCall(_))
    }

    /// Wrap this error for the `std::io::Read` contract of response bodies.
    pub(crate) fn into_io(self) -> io::Error {
        io::Error::other(self)
    }
}
