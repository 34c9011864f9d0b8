//! Awaiting a promise from async code.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::promise::Promise;
use crate::Settled;

/// Future that resolves once its promise settles.
///
/// Obtained from [`Promise::waiter`]. Any number of waiters may observe the
/// same promise; each receives a clone of the settlement. Polling parks the
/// waker every time — settling the promise wakes them all.
pub struct Waiter<T, E> {
    promise: Promise<T, E>,
}

impl<T, E> Waiter<T, E> {
    pub(crate) fn new(promise: Promise<T, E>) -> Self {
        Waiter { promise }
    }
}

impl<T, E> Future for Waiter<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    type Output = Settled<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.promise.poll_settled(cx.waker()) {
            Some(settled) => Poll::Ready(settled),
            None => Poll::Pending,
        }
    }
}
