//! The scheduling capability boundary.
//!
//! The engine never waits on its own: everything that must happen later is
//! handed to a [`Scheduler`] as a [`Task`] with a delay. Hosts implement
//! the trait over whatever timer facility they own; the engine only needs
//! delay-zero turns plus cancellation of tasks that have not fired yet.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::deferred::Deferred;
use crate::list::PromiseList;
use crate::promise::Promise;
use crate::{Outcome, Settled};

/// A unit of schedulable work.
///
/// One-shot tasks are built with [`Task::once`]; a repeating schedule needs
/// [`Task::repeating`]. Running a consumed one-shot again is a no-op.
pub struct Task(Box<dyn FnMut() + Send>);

impl Task {
    pub fn once<F>(work: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let mut work = Some(work);
        Task(Box::new(move || {
            if let Some(work) = work.take() {
                work();
            }
        }))
    }

    pub fn repeating<F>(work: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Task(Box::new(work))
    }

    pub fn run(&mut self) {
        (self.0)()
    }
}

/// Cancellation handle for a scheduled task.
///
/// Cancelling prevents a task that has not fired yet from firing; after the
/// task has fired (or on repeated cancellation) it is a no-op. Schedulers
/// check [`is_cancelled`](CancelHandle::is_cancelled) at fire time.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        CancelHandle {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Host-provided scheduling of callbacks after a delay.
///
/// Implementations must serialize task invocation; the engine relies on
/// that for its ordering guarantees and does no further locking around
/// dispatch.
pub trait Scheduler: Send + Sync {
    /// Schedules `task` to run once after `delay`, or at every `delay`
    /// interval when `repeat` is set.
    fn schedule_task(&self, task: Task, delay: Duration, repeat: bool) -> CancelHandle;
}

/// Promise-producing operations on a scheduler handle.
pub trait SchedulerExt {
    /// A fresh pending promise bound to this scheduler.
    fn new_promise<T, E>(&self) -> Promise<T, E>
    where
        T: Clone + Send + 'static,
        E: Clone + Send + 'static;

    /// Wraps `work` in a [`Deferred`], submits it for the next turn, and
    /// returns its promise immediately.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use deferral::{ManualScheduler, Outcome, Scheduler, SchedulerExt};
    ///
    /// let manual = Arc::new(ManualScheduler::new());
    /// let scheduler: Arc<dyn Scheduler> = manual.clone();
    ///
    /// let p = scheduler.defer::<String, String, _>(|| Outcome::Value("done".into()));
    /// assert!(p.is_pending());
    ///
    /// manual.run_until_idle();
    /// assert!(p.is_fulfilled());
    /// ```
    fn defer<T, E, F>(&self, work: F) -> Promise<T, E>
    where
        T: Clone + Send + 'static,
        E: Clone + Send + 'static,
        F: FnOnce() -> Outcome<T, E> + Send + 'static;

    /// The aggregate promise over `promises`; see [`PromiseList`].
    fn all<T, E>(&self, promises: &[Promise<T, E>]) -> Promise<Vec<T>, Vec<Settled<T, E>>>
    where
        T: Clone + Send + 'static,
        E: Clone + Send + 'static;
}

impl SchedulerExt for Arc<dyn Scheduler> {
    fn new_promise<T, E>(&self) -> Promise<T, E>
    where
        T: Clone + Send + 'static,
        E: Clone + Send + 'static,
    {
        Promise::pending(self.clone())
    }

    fn defer<T, E, F>(&self, work: F) -> Promise<T, E>
    where
        T: Clone + Send + 'static,
        E: Clone + Send + 'static,
        F: FnOnce() -> Outcome<T, E> + Send + 'static,
    {
        let deferred = Deferred::new(work, self.clone());
        let promise = deferred.promise();
        log::trace!("deferring work to the next turn");
        self.schedule_task(Task::once(move || deferred.run()), Duration::ZERO, false);
        promise
    }

    fn all<T, E>(&self, promises: &[Promise<T, E>]) -> Promise<Vec<T>, Vec<Settled<T, E>>>
    where
        T: Clone + Send + 'static,
        E: Clone + Send + 'static,
    {
        PromiseList::new(promises, self).promise()
    }
}
