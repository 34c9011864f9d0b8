//! All-settle aggregation over a set of promises.

use std::sync::{Arc, Mutex};

use crate::promise::Promise;
use crate::scheduler::Scheduler;
use crate::{Outcome, Reason, Settled};

/// Aggregates N promises into one that settles only after every input has.
///
/// Results keep input order regardless of completion order. A single
/// rejection marks the aggregate for rejection but does not short-circuit:
/// all inputs are still awaited, and the rejection payload is the full
/// per-index [`Settled`] sequence.
pub struct PromiseList<T, E> {
    aggregate: Promise<Vec<T>, Vec<Settled<T, E>>>,
}

struct Bookkeeping<T, E> {
    results: Vec<Option<Settled<T, E>>>,
    settled: Vec<bool>,
    any_rejected: bool,
}

impl<T, E> PromiseList<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Attaches per-index bookkeeping to every input promise.
    ///
    /// An empty input settles the aggregate immediately with no results.
    pub fn new(promises: &[Promise<T, E>], scheduler: &Arc<dyn Scheduler>) -> Self {
        let aggregate = Promise::pending(scheduler.clone());
        if promises.is_empty() {
            aggregate.resolve(Vec::new());
            return PromiseList { aggregate };
        }

        let book = Arc::new(Mutex::new(Bookkeeping {
            results: vec![None; promises.len()],
            settled: vec![false; promises.len()],
            any_rejected: false,
        }));

        for (index, promise) in promises.iter().enumerate() {
            let on_fulfilled = {
                let book = book.clone();
                let aggregate = aggregate.clone();
                move |value: T| {
                    Self::record(&book, &aggregate, index, Ok(value.clone()));
                    Outcome::Value(value)
                }
            };
            let on_rejected = {
                let book = book.clone();
                let aggregate = aggregate.clone();
                move |reason: Reason<E>| {
                    Self::record(&book, &aggregate, index, Err(reason.clone()));
                    Outcome::Fail(reason)
                }
            };
            promise.then_catch(on_fulfilled, on_rejected);
        }

        PromiseList { aggregate }
    }

    /// The aggregate promise; the list's only public surface.
    pub fn promise(&self) -> Promise<Vec<T>, Vec<Settled<T, E>>> {
        self.aggregate.clone()
    }

    fn record(
        book: &Arc<Mutex<Bookkeeping<T, E>>>,
        aggregate: &Promise<Vec<T>, Vec<Settled<T, E>>>,
        index: usize,
        entry: Settled<T, E>,
    ) {
        let finished = {
            let mut book = book.lock().unwrap();
            if entry.is_err() {
                book.any_rejected = true;
            }
            book.results[index] = Some(entry);
            book.settled[index] = true;
            if book.settled.iter().all(|done| *done) {
                Some((std::mem::take(&mut book.results), book.any_rejected))
            } else {
                None
            }
        };

        let Some((slots, any_rejected)) = finished else {
            return;
        };
        let results: Vec<Settled<T, E>> = slots.into_iter().flatten().collect();
        match results.iter().cloned().collect::<Result<Vec<T>, Reason<E>>>() {
            Ok(values) if !any_rejected => aggregate.resolve(values),
            _ => aggregate.reject(results),
        }
    }
}
