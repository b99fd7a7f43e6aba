//! Caller-side cancellation and deadline signal.
//!
//! A [`Context`] governs the lifetime of one round trip. It fires either when
//! [`Context::cancel`] is called on any clone or when its deadline passes.
//! Firing it after the response has been delivered has no effect on body
//! reads; body read deadlines are the caller's concern.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;

/// Cancellation and deadline signal supplied by the caller of a round trip.
///
/// Clones share the same cancellation state.
#[derive(Clone, Debug)]
pub struct Context {
    cancel: Option<Arc<watch::Sender<bool>>>,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that never fires. [`cancel`](Context::cancel) is a no-op.
    pub fn background() -> Self {
        Self {
            cancel: None,
            deadline: None,
        }
    }

    /// A context that fires when [`cancel`](Context::cancel) is called.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            cancel: Some(Arc::new(tx)),
            deadline: None,
        }
    }

    /// Derive a context that additionally fires after `timeout`.
    ///
    /// A timeout too large to represent as an instant adds no deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Derive a context that additionally fires at `deadline`.
    ///
    /// An earlier existing deadline is kept.
    pub fn with_deadline(self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing <= deadline => existing,
            _ => deadline,
        };
        Self {
            deadline: Some(deadline),
            ..self
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fire the cancellation signal. Idempotent.
    pub fn cancel(&self) {
        if let Some(tx) = &self.cancel {
            tx.send_replace(true);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|tx| *tx.borrow())
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Non-blocking check: has the signal fired by either route?
    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.is_deadline_exceeded()
    }

    /// Short description of why the context is done, for logging.
    pub(crate) fn reason(&self) -> &'static str {
        if self.is_cancelled() {
            "canceled"
        } else if self.is_deadline_exceeded() {
            "deadline exceeded"
        } else {
            "active"
        }
    }

    /// Wait until the context fires. Never resolves for a background context.
    pub(crate) async fn done(&self) {
        let cancelled = async {
            match &self.cancel {
                Some(tx) => {
                    let mut rx = tx.subscribe();
                    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => {
                    tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await
                }
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = cancelled => {}
            _ = expired => {}
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
