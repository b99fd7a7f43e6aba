//! Host-side asynchronous completions.
//!
//! A [`Promise`] is the Rust shape of a host promise: it settles at most once,
//! and its settlement is handed to exactly one callback registered through
//! [`Promise::then`]. The callback fires on whichever thread settles the
//! promise, or immediately if the promise had already settled. The paired
//! [`Resolver`] is the host's end.
//!
//! A resolver dropped without settling rejects its promise, so a waiter is
//! never left blocked on a completion nobody will deliver.

use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::host::HostError;

/// Outcome carried by a settled promise.
pub type Settlement<T> = Result<T, HostError>;

type Callback<T> = Box<dyn FnOnce(Settlement<T>) + Send>;

const ABANDONED: &str = "promise abandoned before settling";

struct State<T> {
    settled: bool,
    outcome: Option<Settlement<T>>,
    callback: Option<Callback<T>>,
}

/// Pending or settled host completion. See the module docs.
pub struct Promise<T> {
    shared: Arc<Mutex<State<T>>>,
}

/// Settling end of a [`Promise`].
pub struct Resolver<T: Send + 'static> {
    shared: Arc<Mutex<State<T>>>,
}

impl<T: Send + 'static> Promise<T> {
    /// Create an unsettled promise and its resolver.
    pub fn pending() -> (Self, Resolver<T>) {
        let shared = Arc::new(Mutex::new(State {
            settled: false,
            outcome: None,
            callback: None,
        }));
        (
            Self {
                shared: Arc::clone(&shared),
            },
            Resolver { shared },
        )
    }

    pub fn resolved(value: T) -> Self {
        let (promise, resolver) = Self::pending();
        resolver.resolve(value);
        promise
    }

    pub fn rejected(error: impl Into<HostError>) -> Self {
        let (promise, resolver) = Self::pending();
        resolver.reject(error);
        promise
    }

    /// Settle from a future driven on `runtime`.
    pub fn spawn<F>(runtime: &tokio::runtime::Handle, future: F) -> Self
    where
        F: Future<Output = Settlement<T>> + Send + 'static,
    {
        let (promise, resolver) = Self::pending();
        runtime.spawn(async move { resolver.settle(future.await) });
        promise
    }

    /// Register the single settlement callback.
    pub fn then<F>(self, callback: F)
    where
        F: FnOnce(Settlement<T>) + Send + 'static,
    {
        let outcome = {
            let mut state = self.shared.lock().unwrap();
            match state.outcome.take() {
                Some(outcome) => outcome,
                None => {
                    state.callback = Some(Box::new(callback));
                    return;
                }
            }
        };
        callback(outcome);
    }

    /// Transform the fulfilled value, passing rejections through.
    pub fn map<U, F>(self, f: F) -> Promise<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let (mapped, resolver) = Promise::pending();
        self.then(move |outcome| resolver.settle(outcome.map(f)));
        mapped
    }
}

impl<T: Send + 'static> Resolver<T> {
    pub fn resolve(self, value: T) {
        self.settle(Ok(value));
    }

    pub fn reject(self, error: impl Into<HostError>) {
        self.settle(Err(error.into()));
    }

    pub fn settle(self, outcome: Settlement<T>) {
        self.settle_once(outcome);
    }

    fn settle_once(&self, outcome: Settlement<T>) {
        let callback = {
            let mut state = self.shared.lock().unwrap();
            if state.settled {
                return;
            }
            state.settled = true;
            match state.callback.take() {
                Some(callback) => callback,
                None => {
                    state.outcome = Some(outcome);
                    return;
                }
            }
        };
        callback(outcome);
    }
}

impl<T: Send + 'static> Drop for Resolver<T> {
    fn drop(&mut self) {
        let settled = self.shared.lock().unwrap().settled;
        if !settled {
            self.settle_once(Err(HostError::new(ABANDONED)));
        }
    }
}
