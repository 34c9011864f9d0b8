//! The promise state machine.
//!
//! A [`Promise`] is a cloneable handle over shared state: `Pending` with a
//! queue of continuations, or settled as `Fulfilled`/`Rejected`. Settling is
//! monotonic and idempotent; the first transition wins and later attempts
//! are ignored. Continuations are dispatched through the scheduler at delay
//! zero, in attachment order, never inline.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::task::Waker;
use std::time::Duration;

use crate::deferred::Deferred;
use crate::future::Waiter;
use crate::scheduler::{Scheduler, Task};
use crate::{Outcome, Reason, Settled};

/// Handle to an eventual fulfillment value or rejection reason.
pub struct Promise<T, E> {
    inner: Arc<Mutex<Inner<T, E>>>,
    scheduler: Arc<dyn Scheduler>,
}

struct Inner<T, E> {
    state: State<T, E>,
    wakers: Vec<Waker>,
}

enum State<T, E> {
    Pending(Vec<Continuation<T, E>>),
    Fulfilled(T),
    Rejected(Reason<E>),
}

/// One registration made by `then` and friends: a dispatch branch per
/// settlement direction. Branches only schedule work, they never run
/// handlers themselves, so firing one while holding the caller's stack is
/// safe.
struct Continuation<T, E> {
    fulfilled: Box<dyn FnOnce(T) + Send>,
    rejected: Box<dyn FnOnce(Reason<E>) + Send>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.inner.lock().unwrap().state {
            State::Pending(ref queue) => format!("pending ({} queued)", queue.len()),
            State::Fulfilled(_) => "fulfilled".to_owned(),
            State::Rejected(_) => "rejected".to_owned(),
        };
        f.debug_struct("Promise").field("state", &state).finish()
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Creates a pending promise bound to `scheduler`.
    ///
    /// Most callers want [`SchedulerExt::new_promise`] or
    /// [`SchedulerExt::defer`] instead.
    ///
    /// [`SchedulerExt::new_promise`]: crate::SchedulerExt::new_promise
    /// [`SchedulerExt::defer`]: crate::SchedulerExt::defer
    pub fn pending(scheduler: Arc<dyn Scheduler>) -> Self {
        Promise {
            inner: Arc::new(Mutex::new(Inner {
                state: State::Pending(Vec::new()),
                wakers: Vec::new(),
            })),
            scheduler,
        }
    }

    /// Attaches a fulfillment handler and returns the downstream promise.
    ///
    /// The handler runs in a later scheduler turn with the fulfillment
    /// value; its [`Outcome`] settles the returned promise. If this promise
    /// rejects instead, the returned promise rejects with the same reason,
    /// untouched.
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
    /// let p = scheduler.new_promise::<i32, String>();
    /// p.resolve(5);
    /// let q = p.then(|v| Outcome::Value(v + 1));
    ///
    /// manual.run_until_idle();
    /// assert_eq!(futures::executor::block_on(q.waiter()), Ok(6));
    /// ```
    pub fn then<U, F>(&self, fulfilled: F) -> Promise<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Outcome<U, E> + Send + 'static,
    {
        let next = Promise::pending(self.scheduler.clone());
        self.enqueue(Continuation {
            fulfilled: handler_branch(self.scheduler.clone(), next.clone(), fulfilled),
            rejected: reject_branch(self.scheduler.clone(), next.clone()),
        });
        next
    }

    /// Attaches a rejection handler and returns the downstream promise.
    ///
    /// A recovering handler fulfills the returned promise: returning
    /// [`Outcome::Value`] after a rejection puts the chain back on the happy
    /// path. If this promise fulfills, the value passes through unchanged.
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
    /// let p = scheduler.new_promise::<&str, &str>();
    /// p.reject("boom");
    /// let q = p.catch(|_| Outcome::Value("recovered"));
    ///
    /// manual.run_until_idle();
    /// assert_eq!(futures::executor::block_on(q.waiter()), Ok("recovered"));
    /// ```
    pub fn catch<R>(&self, rejected: R) -> Promise<T, E>
    where
        R: FnOnce(Reason<E>) -> Outcome<T, E> + Send + 'static,
    {
        let next = Promise::pending(self.scheduler.clone());
        self.enqueue(Continuation {
            fulfilled: passthrough_branch(self.scheduler.clone(), next.clone()),
            rejected: handler_branch(self.scheduler.clone(), next.clone(), rejected),
        });
        next
    }

    /// Attaches both handlers at once.
    pub fn then_catch<U, F, R>(&self, fulfilled: F, rejected: R) -> Promise<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Outcome<U, E> + Send + 'static,
        R: FnOnce(Reason<E>) -> Outcome<U, E> + Send + 'static,
    {
        let next = Promise::pending(self.scheduler.clone());
        self.enqueue(Continuation {
            fulfilled: handler_branch(self.scheduler.clone(), next.clone(), fulfilled),
            rejected: handler_branch(self.scheduler.clone(), next.clone(), rejected),
        });
        next
    }

    /// Fulfills the promise. A no-op once settled.
    ///
    /// Queued continuations are dispatched in attachment order, each as a
    /// zero-delay task; none runs before this call returns.
    pub fn resolve(&self, value: T) {
        let (queue, wakers) = {
            let mut inner = self.inner.lock().unwrap();
            if !matches!(inner.state, State::Pending(_)) {
                return;
            }
            let previous = std::mem::replace(&mut inner.state, State::Fulfilled(value.clone()));
            let wakers = std::mem::take(&mut inner.wakers);
            match previous {
                State::Pending(queue) => (queue, wakers),
                _ => (Vec::new(), wakers),
            }
        };
        for continuation in queue {
            (continuation.fulfilled)(value.clone());
        }
        for waker in wakers {
            waker.wake();
        }
    }

    /// Rejects the promise. A no-op once settled.
    ///
    /// Accepts either a plain application error or a [`Reason`], so
    /// rerouted reasons propagate without re-wrapping.
    pub fn reject(&self, reason: impl Into<Reason<E>>) {
        let reason = reason.into();
        let (queue, wakers) = {
            let mut inner = self.inner.lock().unwrap();
            if !matches!(inner.state, State::Pending(_)) {
                return;
            }
            let previous = std::mem::replace(&mut inner.state, State::Rejected(reason.clone()));
            let wakers = std::mem::take(&mut inner.wakers);
            match previous {
                State::Pending(queue) => (queue, wakers),
                _ => (Vec::new(), wakers),
            }
        };
        for continuation in queue {
            (continuation.rejected)(reason.clone());
        }
        for waker in wakers {
            waker.wake();
        }
    }

    /// A future resolving to this promise's [`Settled`] outcome.
    pub fn waiter(&self) -> Waiter<T, E> {
        Waiter::new(self.clone())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.inner.lock().unwrap().state, State::Pending(_))
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self.inner.lock().unwrap().state, State::Fulfilled(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.inner.lock().unwrap().state, State::Rejected(_))
    }

    /// Whether two handles refer to the same underlying promise.
    pub fn same_promise(&self, other: &Promise<T, E>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Mirrors this promise's settlement into `target`: value passes
    /// through, reason rejects, both untouched. This is the flattening
    /// bridge used when a call returns [`Outcome::Chain`].
    pub(crate) fn pipe(&self, target: &Promise<T, E>) {
        self.enqueue(Continuation {
            fulfilled: passthrough_branch(self.scheduler.clone(), target.clone()),
            rejected: reject_branch(self.scheduler.clone(), target.clone()),
        });
    }

    /// Queues the continuation, or fires its branch right away when already
    /// settled. Firing only schedules; the handler still runs in a later
    /// turn.
    fn enqueue(&self, continuation: Continuation<T, E>) {
        let mut inner = self.inner.lock().unwrap();
        if let State::Pending(queue) = &mut inner.state {
            queue.push(continuation);
            return;
        }
        let settled = match &inner.state {
            State::Fulfilled(value) => Ok(value.clone()),
            State::Rejected(reason) => Err(reason.clone()),
            State::Pending(_) => return,
        };
        drop(inner);
        match settled {
            Ok(value) => (continuation.fulfilled)(value),
            Err(reason) => (continuation.rejected)(reason),
        }
    }

    /// Poll support for [`Waiter`]: the settled outcome, or `None` after
    /// parking the waker.
    pub(crate) fn poll_settled(&self, waker: &Waker) -> Option<Settled<T, E>> {
        let mut inner = self.inner.lock().unwrap();
        match &inner.state {
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(reason.clone())),
            State::Pending(_) => {
                // Every poll parks its waker; settling drains them all.
                inner.wakers.push(waker.clone());
                None
            }
        }
    }
}

/// Branch that hands `input` to a user handler inside a [`Deferred`] bound
/// to `target`, one scheduler turn later.
fn handler_branch<X, U, E, H>(
    scheduler: Arc<dyn Scheduler>,
    target: Promise<U, E>,
    handler: H,
) -> Box<dyn FnOnce(X) + Send>
where
    X: Send + 'static,
    U: Clone + Send + 'static,
    E: Clone + Send + 'static,
    H: FnOnce(X) -> Outcome<U, E> + Send + 'static,
{
    Box::new(move |input: X| {
        let deferred = Deferred::with_target(move || handler(input), target);
        schedule_turn(&scheduler, Task::once(move || deferred.run()));
    })
}

/// Branch used when no fulfillment handler was given: the value rides
/// through unchanged, still via a Deferred turn.
fn passthrough_branch<T, E>(
    scheduler: Arc<dyn Scheduler>,
    target: Promise<T, E>,
) -> Box<dyn FnOnce(T) + Send>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    handler_branch(scheduler, target, Outcome::Value)
}

/// Branch used when no rejection handler was given: there is no user code
/// to run, so the task rejects `target` directly with the same reason.
fn reject_branch<U, E>(
    scheduler: Arc<dyn Scheduler>,
    target: Promise<U, E>,
) -> Box<dyn FnOnce(Reason<E>) + Send>
where
    U: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    Box::new(move |reason: Reason<E>| {
        schedule_turn(&scheduler, Task::once(move || target.reject(reason)));
    })
}

fn schedule_turn(scheduler: &Arc<dyn Scheduler>, task: Task) {
    scheduler.schedule_task(task, Duration::ZERO, false);
}
