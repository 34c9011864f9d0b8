//! Promises/A+ style deferred results with pluggable scheduling.
//!
//! A [`Promise`] is a handle to a value or error that will arrive later.
//! Handlers attached with [`then`](Promise::then) never run inside the
//! caller's stack; every dispatch goes through a [`Scheduler`] as a
//! zero-delay task, so settlement is always observed in a later turn.
//!
//! The crate only consumes scheduling: hosts implement [`Scheduler`] over
//! whatever timer facility they own, and [`ManualScheduler`] provides a
//! virtual clock for deterministic tests.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use deferral::{ManualScheduler, Outcome, Scheduler, SchedulerExt};
//!
//! let manual = Arc::new(ManualScheduler::new());
//! let scheduler: Arc<dyn Scheduler> = manual.clone();
//!
//! let answer = scheduler
//!     .defer::<i32, String, _>(|| Outcome::Value(41))
//!     .then(|v| Outcome::Value(v + 1));
//!
//! manual.run_until_idle();
//! assert_eq!(futures::executor::block_on(answer.waiter()), Ok(42));
//! ```

use thiserror::Error;

pub mod deferred;
pub mod future;
pub mod list;
pub mod manual;
pub mod promise;
pub mod scheduler;

pub use deferred::Deferred;
pub use future::Waiter;
pub use list::PromiseList;
pub use manual::ManualScheduler;
pub use promise::Promise;
pub use scheduler::{CancelHandle, Scheduler, SchedulerExt, Task};

/// Why a promise rejected.
///
/// Reasons travel down a chain unchanged until a rejection handler consumes
/// them, so a handler always sees the original reason, not a wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Reason<E> {
    /// A chained call returned the very promise it was meant to settle.
    #[error("chained call returned the promise it was meant to settle")]
    SelfResolution,
    /// An application-supplied rejection.
    #[error("{0}")]
    Rejected(E),
}

impl<E> From<E> for Reason<E> {
    fn from(error: E) -> Self {
        Reason::Rejected(error)
    }
}

/// What a deferred call or a `then` handler produced.
///
/// The promise-like case is an explicit variant rather than a capability
/// probe: returning [`Outcome::Chain`] makes the target promise mirror the
/// chained promise's eventual settlement.
pub enum Outcome<T, E> {
    /// A plain value; settles the target promise directly.
    Value(T),
    /// Another promise; the target adopts its eventual outcome.
    Chain(Promise<T, E>),
    /// A failure raised by the call.
    Fail(Reason<E>),
}

impl<T, E> Outcome<T, E> {
    /// Shorthand for failing with a plain application error.
    pub fn fail(error: impl Into<Reason<E>>) -> Self {
        Outcome::Fail(error.into())
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Outcome::Value(value),
            Err(error) => Outcome::Fail(Reason::Rejected(error)),
        }
    }
}

/// One settled slot: the fulfillment value or the rejection reason.
pub type Settled<T, E> = Result<T, Reason<E>>;
