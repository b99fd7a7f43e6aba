//! Callback-to-blocking bridge.
//!
//! Every interaction with the host (the round trip, each stream pull, the
//! whole-body fetch) goes through [`wait`]: the promise's settlement callback
//! populates a one-shot channel exactly once, and the calling thread blocks
//! on that channel, optionally racing the caller's [`Context`].
//!
//! Blocking uses `block_in_place` + `Handle::block_on`, so callers may sit on
//! a plain thread or on a multi-threaded runtime worker. Calling from a
//! current-thread runtime panics.

use std::future::Future;

use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::context::Context;
use crate::host::HostError;
use crate::promise::Promise;

const COMPLETION_DROPPED: &str = "host completion dropped without settling";

/// What a blocked waiter observed first.
#[derive(Debug)]
pub(crate) enum Settled<T> {
    Fulfilled(T),
    Rejected(HostError),
    Canceled,
}

/// Block until `promise` settles or `ctx` fires, whichever comes first.
///
/// A settlement arriving after cancellation finds the channel closed and is
/// dropped on the settling thread.
pub(crate) fn wait<T: Send + 'static>(
    runtime: &Handle,
    promise: Promise<T>,
    ctx: Option<&Context>,
) -> Settled<T> {
    let (tx, rx) = oneshot::channel();
    promise.then(move |outcome| {
        let _ = tx.send(outcome);
    });

    block_on(runtime, async move {
        let delivered = async {
            match rx.await {
                Ok(Ok(value)) => Settled::Fulfilled(value),
                Ok(Err(err)) => Settled::Rejected(err),
                Err(_) => Settled::Rejected(HostError::new(COMPLETION_DROPPED)),
            }
        };
        match ctx {
            Some(ctx) => tokio::select! {
                biased;
                _ = ctx.done() => Settled::Canceled,
                settled = delivered => settled,
            },
            None => delivered.await,
        }
    })
}

/// Drive `future` to completion from synchronous code.
pub(crate) fn block_on<F: Future>(runtime: &Handle, future: F) -> F::Output {
    tokio::task::block_in_place(|| runtime.block_on(future))
}
