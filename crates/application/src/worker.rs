//! Worker-per-operation execution.
//!
//! Every externally triggered operation runs on its own short-lived task and
//! resolves exactly once through a [`Pending`] handle.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use domain::{PrinterError, Result};
use tokio::sync::oneshot;

/// Single-resolution completion of a worker
#[must_use = "a Pending does nothing unless awaited"]
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Pending<T> {
    /// Already resolved, no worker spawned
    pub fn ready(result: Result<T>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| {
            // Sender dropped without a value: the worker panicked or was aborted
            received.unwrap_or_else(|_| {
                Err(PrinterError::transport("Worker interrupted before completing"))
            })
        })
    }
}

/// Run `work` on a dedicated task and hand back its completion
pub fn spawn_worker<T, F>(operation: &'static str, work: F) -> Pending<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let result = work.await;
        if let Err(e) = &result {
            tracing::debug!(operation, error = %e, "Operation failed");
        }
        if tx.send(result).is_err() {
            tracing::trace!(operation, "Caller went away before completion");
        }
    });
    Pending { rx }
}
