//! Future side of a dispatched store call

use crate::types::LedgerError;
use futures::channel::oneshot;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Result of a ledger operation that is running on the executor
///
/// Resolves once the store call has finished. If the executor discards the
/// task without running it, resolves to [`LedgerError::TaskDropped`].
#[derive(Debug)]
#[must_use = "a Pending result does nothing unless awaited or polled"]
pub struct Pending<T> {
    inner: PendingInner<T>,
}

#[derive(Debug)]
enum PendingInner<T> {
    Waiting(oneshot::Receiver<Result<T, LedgerError>>),
    Ready(Option<LedgerError>),
}

impl<T> Pending<T> {
    pub(crate) fn waiting(rx: oneshot::Receiver<Result<T, LedgerError>>) -> Self {
        Self {
            inner: PendingInner::Waiting(rx),
        }
    }

    /// A future that fails immediately without touching the executor
    pub(crate) fn failed(error: LedgerError) -> Self {
        Self {
            inner: PendingInner::Ready(Some(error)),
        }
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T, LedgerError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.inner {
            PendingInner::Waiting(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(result)) => Poll::Ready(result),
                Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(LedgerError::TaskDropped)),
                Poll::Pending => Poll::Pending,
            },
            PendingInner::Ready(error) => {
                Poll::Ready(Err(error.take().unwrap_or(LedgerError::TaskDropped)))
            }
        }
    }
}
