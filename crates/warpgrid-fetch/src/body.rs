//! Response body adapters.
//!
//! [`Body`] exposes a blocking `std::io::Read` plus `close()` over one of two
//! host body shapes, chosen once per response:
//!
//! - **Streaming**: pulls one chunk at a time from the host's
//!   [`StreamReader`]. A pull is only issued when no bytes are pending and
//!   the stream has not reported `done`; pulls never overlap.
//! - **Buffered**: awaits the host's whole-body promise on the first read,
//!   then drains it.
//!
//! Chunks are handed out with `Bytes::split_to`, so a chunk is copied once,
//! into the caller's buffer. `Ok(0)` always means end-of-data; a zero-length
//! non-final chunk from the host is skipped rather than reported.

use std::fmt;
use std::io::{self, Read};

use bytes::Bytes;
use tokio::runtime::Handle;

use crate::error::FetchError;
use crate::host::{ReadChunk, StreamReader};
use crate::promise::Promise;
use crate::rendezvous::{self, Settled};

/// A blocking, readable and closable byte stream.
pub trait ReadCloser: Read + Send {
    /// Release the underlying resource. Best-effort cleanup is not reported.
    fn close(&mut self) -> io::Result<()>;
}

impl<T: AsRef<[u8]> + Send> ReadCloser for io::Cursor<T> {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Copy as much of `pending` as fits into `buf` and advance past it.
fn drain_into(pending: &mut Bytes, buf: &mut [u8]) -> usize {
    let n = buf.len().min(pending.len());
    let chunk = pending.split_to(n);
    buf[..n].copy_from_slice(&chunk);
    n
}

fn settled_error<T>(settled: Settled<T>) -> io::Error {
    match settled {
        Settled::Rejected(err) => FetchError::StreamRead(err.message().to_string()).into_io(),
        Settled::Canceled => FetchError::Canceled.into_io(),
        Settled::Fulfilled(_) => io::Error::other("unexpected fulfilled settlement"),
    }
}

/// Streaming adapter over the host's incremental reader.
pub struct StreamBody {
    reader: Box<dyn StreamReader>,
    pending: Bytes,
    exhausted: bool,
    closed: bool,
    runtime: Handle,
}

impl StreamBody {
    pub(crate) fn new(reader: Box<dyn StreamReader>, runtime: Handle) -> Self {
        Self {
            reader,
            pending: Bytes::new(),
            exhausted: false,
            closed: false,
            runtime,
        }
    }

    /// Issue one pull and block until it settles.
    fn pull(&mut self) -> Result<ReadChunk, io::Error> {
        match rendezvous::wait(&self.runtime, self.reader.read(), None) {
            Settled::Fulfilled(chunk) => Ok(chunk),
            other => Err(settled_error(other)),
        }
    }
}

impl Read for StreamBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pending.is_empty() {
            if self.exhausted {
                return Ok(0);
            }
            let chunk = self.pull().inspect_err(|e| {
                tracing::debug!(error = %e, "response body pull failed");
            })?;
            if chunk.done {
                tracing::debug!("response body stream exhausted");
                self.exhausted = true;
                return Ok(0);
            }
            tracing::trace!(len = chunk.value.len(), "response body chunk");
            self.pending = chunk.value;
        }
        Ok(drain_into(&mut self.pending, buf))
    }
}

impl ReadCloser for StreamBody {
    /// Cancel the host stream. Reads after close report end-of-data.
    fn close(&mut self) -> io::Result<()> {
        if !self.closed {
            self.closed = true;
            self.exhausted = true;
            self.pending = Bytes::new();
            self.reader.cancel();
            tracing::debug!("response body stream cancelled");
        }
        Ok(())
    }
}

/// Whole-body fallback adapter.
pub struct BufferedBody {
    array: Option<Promise<Bytes>>,
    fetched: bool,
    pending: Bytes,
    runtime: Handle,
}

impl BufferedBody {
    pub(crate) fn new(array: Promise<Bytes>, runtime: Handle) -> Self {
        Self {
            array: Some(array),
            fetched: false,
            pending: Bytes::new(),
            runtime,
        }
    }
}

impl Read for BufferedBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.fetched {
            self.fetched = true;
            if let Some(array) = self.array.take() {
                match rendezvous::wait(&self.runtime, array, None) {
                    Settled::Fulfilled(bytes) => {
                        tracing::debug!(len = bytes.len(), "response body buffered");
                        self.pending = bytes;
                    }
                    other => {
                        let err = settled_error(other);
                        tracing::debug!(error = %err, "response body fetch failed");
                        return Err(err);
                    }
                }
            }
        }
        if self.pending.is_empty() {
            return Ok(0);
        }
        Ok(drain_into(&mut self.pending, buf))
    }
}

impl ReadCloser for BufferedBody {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

enum BodyKind {
    Streaming(StreamBody),
    Buffered(BufferedBody),
}

/// Response body handle. The caller owns it and is expected to close it.
pub struct Body {
    kind: BodyKind,
}

impl Body {
    pub(crate) fn streaming(reader: Box<dyn StreamReader>, runtime: Handle) -> Self {
        Self {
            kind: BodyKind::Streaming(StreamBody::new(reader, runtime)),
        }
    }

    pub(crate) fn buffered(array: Promise<Bytes>, runtime: Handle) -> Self {
        Self {
            kind: BodyKind::Buffered(BufferedBody::new(array, runtime)),
        }
    }

    /// Returns `true` if chunks are pulled incrementally from the host.
    pub fn is_streaming(&self) -> bool {
        matches!(self.kind, BodyKind::Streaming(_))
    }

    /// Read to end-of-data, close, and return everything read.
    pub fn into_bytes(mut self) -> io::Result<Bytes> {
        let mut collected = Vec::new();
        let read = self.read_to_end(&mut collected);
        self.close()?;
        read?;
        Ok(Bytes::from(collected))
    }
}

impl Read for Body {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.kind {
            BodyKind::Streaming(body) => body.read(buf),
            BodyKind::Buffered(body) => body.read(buf),
        }
    }
}

impl ReadCloser for Body {
    fn close(&mut self) -> io::Result<()> {
        match &mut self.kind {
            BodyKind::Streaming(body) => body.close(),
            BodyKind::Buffered(body) => body.close(),
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("streaming", &self.is_streaming())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostError;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scripted reader: hands out queued settlements, one per pull.
    struct ScriptedReader {
        script: VecDeque<Result<ReadChunk, HostError>>,
        pulls: Arc<AtomicUsize>,
        cancels: Arc<AtomicUsize>,
    }

    impl ScriptedReader {
        fn new(script: Vec<Result<ReadChunk, HostError>>) -> Self {
            Self {
                script: script.into(),
                pulls: Arc::new(AtomicUsize::new(0)),
                cancels: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl StreamReader for ScriptedReader {
        fn read(&mut self) -> Promise<ReadChunk> {
            self.pulls.fetch_add(1, Ordering::SeqCst);
            match self.script.pop_front() {
                Some(Ok(chunk)) => Promise::resolved(chunk),
                Some(Err(err)) => Promise::rejected(err),
                None => Promise::resolved(ReadChunk::done()),
            }
        }

        fn cancel(&mut self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn read_all_with(body: &mut impl Read, buf_size: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; buf_size];
        loop {
            let n = body.read(&mut buf).unwrap();
            if n == 0 {
                return out;
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stream_body_concatenates_chunks_for_any_buffer_size() {
        for buf_size in [1, 2, 3, 5, 64] {
            let reader = ScriptedReader::new(vec![
                Ok(ReadChunk::data("hello ")),
                Ok(ReadChunk::data("world")),
            ]);
            let mut body = StreamBody::new(Box::new(reader), Handle::current());
            assert_eq!(read_all_with(&mut body, buf_size), b"hello world");

            let mut buf = [0u8; 8];
            assert_eq!(body.read(&mut buf).unwrap(), 0);
            assert_eq!(body.read(&mut buf).unwrap(), 0);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stream_body_does_not_pull_while_pending() {
        let reader = ScriptedReader::new(vec![Ok(ReadChunk::data("abcdef"))]);
        let pulls = Arc::clone(&reader.pulls);
        let mut body = StreamBody::new(Box::new(reader), Handle::current());

        let mut buf = [0u8; 2];
        for _ in 0..3 {
            assert_eq!(body.read(&mut buf).unwrap(), 2);
        }
        assert_eq!(pulls.load(Ordering::SeqCst), 1);

        assert_eq!(body.read(&mut buf).unwrap(), 0);
        assert_eq!(pulls.load(Ordering::SeqCst), 2);

        // Exhausted: no further pulls.
        assert_eq!(body.read(&mut buf).unwrap(), 0);
        assert_eq!(pulls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stream_body_skips_empty_chunks() {
        let reader = ScriptedReader::new(vec![
            Ok(ReadChunk::data(Bytes::new())),
            Ok(ReadChunk::data("x")),
        ]);
        let mut body = StreamBody::new(Box::new(reader), Handle::current());
        let mut buf = [0u8; 4];
        assert_eq!(body.read(&mut buf).unwrap(), 1);
        assert_eq!(&buf[..1], b"x");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stream_body_error_does_not_mark_exhausted() {
        let reader = ScriptedReader::new(vec![
            Err(HostError::new("connection reset")),
            Ok(ReadChunk::data("after")),
        ]);
        let mut body = StreamBody::new(Box::new(reader), Handle::current());
        let mut buf = [0u8; 16];

        let err = body.read(&mut buf).unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        assert!(matches!(
            err.get_ref().and_then(|e| e.downcast_ref::<FetchError>()),
            Some(FetchError::StreamRead(_))
        ));

        assert_eq!(body.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"after");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stream_body_close_cancels_once() {
        let reader = ScriptedReader::new(vec![Ok(ReadChunk::data("abc"))]);
        let cancels = Arc::clone(&reader.cancels);
        let pulls = Arc::clone(&reader.pulls);
        let mut body = StreamBody::new(Box::new(reader), Handle::current());

        body.close().unwrap();
        body.close().unwrap();
        assert_eq!(cancels.load(Ordering::SeqCst), 1);

        let mut buf = [0u8; 4];
        assert_eq!(body.read(&mut buf).unwrap(), 0);
        assert_eq!(pulls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stream_body_pull_resolved_from_another_thread() {
        struct ThreadedReader {
            remaining: usize,
        }
        impl StreamReader for ThreadedReader {
            fn read(&mut self) -> Promise<ReadChunk> {
                let (promise, resolver) = Promise::pending();
                let chunk = if self.remaining == 0 {
                    ReadChunk::done()
                } else {
                    self.remaining -= 1;
                    ReadChunk::data("ab")
                };
                std::thread::spawn(move || resolver.resolve(chunk));
                promise
            }
            fn cancel(&mut self) {}
        }

        let mut body = StreamBody::new(Box::new(ThreadedReader { remaining: 3 }), Handle::current());
        assert_eq!(read_all_with(&mut body, 3), b"ababab");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn buffered_body_drains_then_eof() {
        let data: Vec<u8> = (0..=255).collect();
        let mut body = BufferedBody::new(Promise::resolved(Bytes::from(data.clone())), Handle::current());
        assert_eq!(read_all_with(&mut body, 7), data);

        let mut buf = [0u8; 7];
        for _ in 0..3 {
            assert_eq!(body.read(&mut buf).unwrap(), 0);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn buffered_body_zero_length_is_immediate_eof() {
        let mut body = BufferedBody::new(Promise::resolved(Bytes::new()), Handle::current());
        let mut buf = [0u8; 4];
        assert_eq!(body.read(&mut buf).unwrap(), 0);
        assert_eq!(body.read(&mut buf).unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn buffered_body_failure_is_not_retried() {
        let mut body = BufferedBody::new(Promise::rejected("body stream lost"), Handle::current());
        let mut buf = [0u8; 4];

        let err = body.read(&mut buf).unwrap_err();
        assert!(err.to_string().contains("body stream lost"));
        assert_eq!(body.read(&mut buf).unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn empty_buffer_read_does_not_pull() {
        let reader = ScriptedReader::new(vec![Ok(ReadChunk::data("abc"))]);
        let pulls = Arc::clone(&reader.pulls);
        let mut body = StreamBody::new(Box::new(reader), Handle::current());

        assert_eq!(body.read(&mut []).unwrap(), 0);
        assert_eq!(pulls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn body_dispatches_to_variant() {
        let streaming = Body::streaming(
            Box::new(ScriptedReader::new(vec![Ok(ReadChunk::data("s"))])),
            Handle::current(),
        );
        assert!(streaming.is_streaming());
        assert_eq!(streaming.into_bytes().unwrap(), Bytes::from("s"));

        let buffered = Body::buffered(Promise::resolved(Bytes::from("b")), Handle::current());
        assert!(!buffered.is_streaming());
        assert_eq!(buffered.into_bytes().unwrap(), Bytes::from("b"));
    }

    #[test]
    fn cursor_is_a_read_closer() {
        let mut cursor = io::Cursor::new(b"abc".to_vec());
        let mut out = String::new();
        cursor.read_to_string(&mut out).unwrap();
        assert_eq!(out, "abc");
        assert!(cursor.close().is_ok());
    }
}
