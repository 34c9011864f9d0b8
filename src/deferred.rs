//! One-shot call wrappers.
//!
//! A [`Deferred`] owns a callable and the promise its outcome will settle.
//! It is the failure boundary of the engine: whatever the call produces —
//! a value, another promise, or an error — ends up as a settlement of the
//! target promise, never as anything the scheduler has to deal with.

use std::sync::Arc;

use crate::promise::Promise;
use crate::scheduler::Scheduler;
use crate::{Outcome, Reason};

/// Wraps a call to be executed later, bound to the promise it settles.
pub struct Deferred<T, E> {
    work: Box<dyn FnOnce() -> Outcome<T, E> + Send>,
    target: Promise<T, E>,
}

impl<T, E> Deferred<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Wraps `work` with a fresh pending promise on `scheduler`.
    pub fn new<F>(work: F, scheduler: Arc<dyn Scheduler>) -> Self
    where
        F: FnOnce() -> Outcome<T, E> + Send + 'static,
    {
        Self::with_target(work, Promise::pending(scheduler))
    }

    /// Wraps `work` bound to an existing `target` promise.
    pub fn with_target<F>(work: F, target: Promise<T, E>) -> Self
    where
        F: FnOnce() -> Outcome<T, E> + Send + 'static,
    {
        Deferred {
            work: Box::new(work),
            target,
        }
    }

    /// The promise that will carry the call's outcome.
    pub fn promise(&self) -> Promise<T, E> {
        self.target.clone()
    }

    /// Executes the wrapped call and settles the target.
    ///
    /// Invoked exactly once, by the scheduler. A returned
    /// [`Outcome::Chain`] makes the target mirror the chained promise —
    /// unless the call returned the target itself, which rejects it with
    /// [`Reason::SelfResolution`].
    pub fn run(self) {
        let Deferred { work, target } = self;
        match work() {
            Outcome::Value(value) => target.resolve(value),
            Outcome::Chain(chained) => {
                if chained.same_promise(&target) {
                    log::debug!("deferred call returned its own promise, rejecting");
                    target.reject(Reason::SelfResolution);
                } else {
                    chained.pipe(&target);
                }
            }
            Outcome::Fail(reason) => {
                log::debug!("deferred call failed, rejecting its promise");
                target.reject(reason);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::executor::block_on;

    use super::Deferred;
    use crate::manual::ManualScheduler;
    use crate::scheduler::{Scheduler, SchedulerExt};
    use crate::{Outcome, Reason};

    fn scheduler() -> (Arc<ManualScheduler>, Arc<dyn Scheduler>) {
        let manual = Arc::new(ManualScheduler::new());
        let dynamic: Arc<dyn Scheduler> = manual.clone();
        (manual, dynamic)
    }

    #[test]
    fn test_value_resolves_target() {
        let (_, scheduler) = scheduler();
        let deferred = Deferred::<i32, String>::new(|| Outcome::Value(3), scheduler);
        let promise = deferred.promise();

        deferred.run();
        assert_eq!(block_on(promise.waiter()), Ok(3));
    }

    #[test]
    fn test_failure_rejects_target() {
        let (_, scheduler) = scheduler();
        let deferred = Deferred::<i32, String>::new(|| Outcome::fail("x".to_owned()), scheduler);
        let promise = deferred.promise();

        deferred.run();
        assert_eq!(
            block_on(promise.waiter()),
            Err(Reason::Rejected("x".to_owned()))
        );
    }

    #[test]
    fn test_chained_promise_is_flattened() {
        let (manual, scheduler) = scheduler();
        let inner = scheduler.new_promise::<i32, String>();
        let handed = inner.clone();
        let deferred = Deferred::new(move || Outcome::Chain(handed), scheduler);
        let promise = deferred.promise();

        deferred.run();
        assert!(promise.is_pending());

        inner.resolve(11);
        manual.run_until_idle();
        assert_eq!(block_on(promise.waiter()), Ok(11));
    }

    #[test]
    fn test_chained_rejection_is_mirrored() {
        let (manual, scheduler) = scheduler();
        let inner = scheduler.new_promise::<i32, String>();
        let handed = inner.clone();
        let deferred = Deferred::new(move || Outcome::Chain(handed), scheduler);
        let promise = deferred.promise();

        deferred.run();
        inner.reject("inner gone".to_owned());
        manual.run_until_idle();
        assert_eq!(
            block_on(promise.waiter()),
            Err(Reason::Rejected("inner gone".to_owned()))
        );
    }

    #[test]
    fn test_returning_own_promise_rejects() {
        let (_, scheduler) = scheduler();
        let target = scheduler.new_promise::<i32, String>();
        let own = target.clone();
        let deferred = Deferred::with_target(move || Outcome::Chain(own), target.clone());

        deferred.run();
        assert_eq!(block_on(target.waiter()), Err(Reason::SelfResolution));
    }
}
