//! Production [`FetchHost`] binding on `reqwest`.
//!
//! Every host promise is settled from a task spawned on the supplied runtime.
//! The round trip's abort signal races both the send and each body pull.
//! Credentials policy is a browser concept and is only logged here.

use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::Mutex;

use crate::host::{
    AbortSignal, FetchHost, HostError, HostHeaders, HostResponse, ReadChunk, RequestInit,
    StreamReader,
};
use crate::promise::Promise;

const ABORTED: &str = "The operation was aborted.";

type ChunkStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Fetch host backed by a `reqwest::Client`.
pub struct ReqwestHost {
    client: reqwest::Client,
    runtime: Handle,
}

impl ReqwestHost {
    /// Create a host with a default client.
    pub fn new(runtime: Handle) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(client, runtime))
    }

    pub fn with_client(client: reqwest::Client, runtime: Handle) -> Self {
        Self { client, runtime }
    }
}

impl FetchHost for ReqwestHost {
    fn fetch(&self, url: &str, init: RequestInit) -> Option<Promise<Box<dyn HostResponse>>> {
        let method = match reqwest::Method::from_bytes(init.method.as_bytes()) {
            Ok(method) => method,
            Err(e) => {
                return Some(Promise::rejected(format!(
                    "invalid method {:?}: {e}",
                    init.method
                )));
            }
        };
        tracing::trace!(
            credentials = init.credentials.as_str(),
            "credentials policy not applicable to native host"
        );

        let mut pairs = Vec::with_capacity(init.headers.len());
        init.headers
            .for_each(|name, value| pairs.push((name.to_string(), value.to_string())));

        let mut builder = self.client.request(method, url);
        for (name, value) in pairs {
            builder = builder.header(name, value);
        }
        if let Some(body) = init.body {
            builder = builder.body(body);
        }

        let signal = init.signal;
        let runtime = self.runtime.clone();
        Some(Promise::spawn(&self.runtime, async move {
            let sent = tokio::select! {
                biased;
                _ = signal.aborted() => return Err(HostError::new(ABORTED)),
                sent = builder.send() => sent,
            };
            match sent {
                Ok(response) => {
                    let response: Box<dyn HostResponse> =
                        Box::new(ReqwestResponse::new(response, signal, runtime));
                    Ok(response)
                }
                Err(e) => Err(HostError::new(e.to_string())),
            }
        }))
    }
}

struct ReqwestResponse {
    status: u16,
    headers: HostHeaders,
    response: Option<reqwest::Response>,
    signal: AbortSignal,
    runtime: Handle,
}

impl ReqwestResponse {
    fn new(response: reqwest::Response, signal: AbortSignal, runtime: Handle) -> Self {
        let mut headers = HostHeaders::new();
        for (name, value) in response.headers() {
            headers.append(
                name.as_str(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }
        Self {
            status: response.status().as_u16(),
            headers,
            response: Some(response),
            signal,
            runtime,
        }
    }
}

impl HostResponse for ReqwestResponse {
    fn status(&self) -> u16 {
        self.status
    }

    fn headers(&self) -> &HostHeaders {
        &self.headers
    }

    fn body(&mut self) -> Option<Box<dyn StreamReader>> {
        let response = self.response.take()?;
        let stream: ChunkStream = Box::pin(response.bytes_stream());
        Some(Box::new(ReqwestStreamReader {
            stream: Arc::new(Mutex::new(Some(stream))),
            signal: self.signal.clone(),
            runtime: self.runtime.clone(),
        }))
    }

    fn array_buffer(&mut self) -> Promise<Bytes> {
        match self.response.take() {
            Some(response) => Promise::spawn(&self.runtime, async move {
                response
                    .bytes()
                    .await
                    .map_err(|e| HostError::new(e.to_string()))
            }),
            None => Promise::rejected("body already used"),
        }
    }
}

struct ReqwestStreamReader {
    stream: Arc<Mutex<Option<ChunkStream>>>,
    signal: AbortSignal,
    runtime: Handle,
}

impl StreamReader for ReqwestStreamReader {
    fn read(&mut self) -> Promise<ReadChunk> {
        let stream = Arc::clone(&self.stream);
        let signal = self.signal.clone();
        Promise::spawn(&self.runtime, async move {
            let mut guard = stream.lock().await;
            let Some(chunks) = guard.as_mut() else {
                return Ok(ReadChunk::done());
            };
            tokio::select! {
                biased;
                _ = signal.aborted() => Err(HostError::new(ABORTED)),
                next = chunks.next() => match next {
                    Some(Ok(bytes)) => Ok(ReadChunk::data(bytes)),
                    Some(Err(e)) => Err(HostError::new(e.to_string())),
                    None => Ok(ReadChunk::done()),
                },
            }
        })
    }

    fn cancel(&mut self) {
        let stream = Arc::clone(&self.stream);
        self.runtime.spawn(async move {
            stream.lock().await.take();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{AbortController, CredentialsMode};
    use crate::{Request, Transport};

    fn init(signal: AbortSignal) -> RequestInit {
        RequestInit {
            method: "GET".into(),
            headers: HostHeaders::new(),
            credentials: CredentialsMode::SameOrigin,
            signal,
            body: None,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn invalid_method_is_rejected() {
        let host = ReqwestHost::new(Handle::current()).unwrap();
        let mut bad = init(AbortController::new().signal());
        bad.method = "BAD METHOD".into();

        let promise = host.fetch("http://127.0.0.1:9/", bad).unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        promise.then(move |outcome| {
            let _ = tx.send(outcome.err().map(|e| e.message().to_string()));
        });
        let message = rx.await.unwrap().unwrap();
        assert!(message.contains("invalid method"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn pre_aborted_signal_rejects() {
        let host = ReqwestHost::new(Handle::current()).unwrap();
        let controller = AbortController::new();
        controller.abort();

        // Non-routable address keeps the send pending; the abort wins.
        let promise = host
            .fetch("http://10.255.255.1:81/", init(controller.signal()))
            .unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        promise.then(move |outcome| {
            let _ = tx.send(outcome.err().map(|e| e.message().to_string()));
        });
        assert_eq!(rx.await.unwrap().as_deref(), Some(ABORTED));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn connection_refused_surfaces_as_host_call_error() {
        let host = Arc::new(ReqwestHost::new(Handle::current()).unwrap());
        let transport = Transport::new(host, Handle::current());

        // Port 9 (discard) is closed on test machines.
        let err = transport
            .round_trip(Request::get("http://127.0.0.1:9/"))
            .unwrap_err();
        assert!(matches!(err, crate::FetchError::HostCall(_)));
        assert!(err.to_string().starts_with("fetch() failed:"));
    }
}
