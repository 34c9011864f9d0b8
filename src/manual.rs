//! A manually advanced scheduler for deterministic tests.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Mutex;
use std::time::Duration;

use crate::scheduler::{CancelHandle, Scheduler, Task};

/// Virtual-clock [`Scheduler`]: nothing fires until the clock is advanced.
///
/// Entries are kept in a min-heap ordered by deadline, with a sequence
/// number breaking ties so same-deadline tasks fire in submission order —
/// delay-zero continuation dispatch therefore preserves attachment order.
/// Cancelled entries are skipped at fire time.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use deferral::{ManualScheduler, Scheduler, Task};
///
/// let manual = Arc::new(ManualScheduler::new());
/// let handle = manual.schedule_task(Task::once(|| ()), Duration::from_secs(4), false);
/// handle.cancel();
///
/// manual.advance(Duration::from_secs(5));
/// assert_eq!(manual.pending(), 0);
/// ```
pub struct ManualScheduler {
    inner: Mutex<ClockInner>,
}

struct ClockInner {
    now: Duration,
    sequence: u64,
    queue: BinaryHeap<Entry>,
}

struct Entry {
    deadline: Duration,
    sequence: u64,
    period: Option<Duration>,
    task: Task,
    handle: CancelHandle,
}

impl Eq for Entry {}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.sequence == other.sequence
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the BinaryHeap pops the earliest entry first.
        other
            .deadline
            .cmp(&self.deadline)
            .then(other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl ManualScheduler {
    pub fn new() -> Self {
        ManualScheduler {
            inner: Mutex::new(ClockInner {
                now: Duration::ZERO,
                sequence: 0,
                queue: BinaryHeap::new(),
            }),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.inner.lock().unwrap().now
    }

    /// Live (not cancelled) scheduled entries.
    pub fn pending(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .queue
            .iter()
            .filter(|entry| !entry.handle.is_cancelled())
            .count()
    }

    /// Runs everything already due, including work those tasks schedule at
    /// delay zero, without moving the clock.
    pub fn run_until_idle(&self) {
        self.advance(Duration::ZERO);
    }

    /// Moves the clock forward by `elapsed`, firing every due entry in
    /// deadline order. Tasks run outside the scheduler lock, so they may
    /// freely schedule more work; cascaded delay-zero tasks fire within the
    /// same call.
    pub fn advance(&self, elapsed: Duration) {
        let target = self.inner.lock().unwrap().now + elapsed;
        log::trace!("advancing virtual clock by {elapsed:?}");
        loop {
            let mut entry = {
                let mut inner = self.inner.lock().unwrap();
                let due = inner
                    .queue
                    .peek()
                    .is_some_and(|entry| entry.deadline <= target);
                if !due {
                    inner.now = target;
                    break;
                }
                let Some(entry) = inner.queue.pop() else {
                    inner.now = target;
                    break;
                };
                if entry.deadline > inner.now {
                    inner.now = entry.deadline;
                }
                entry
            };

            if entry.handle.is_cancelled() {
                continue;
            }
            entry.task.run();

            if let Some(period) = entry.period {
                if !entry.handle.is_cancelled() {
                    let mut inner = self.inner.lock().unwrap();
                    inner.sequence += 1;
                    entry.deadline += period;
                    entry.sequence = inner.sequence;
                    inner.queue.push(entry);
                }
            }
        }
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_task(&self, task: Task, delay: Duration, repeat: bool) -> CancelHandle {
        let handle = CancelHandle::new();
        let mut inner = self.inner.lock().unwrap();
        inner.sequence += 1;
        // A repeating zero period would never let `advance` reach its
        // target; degrade it to one-shot.
        let period = if repeat {
            Some(delay).filter(|delay| !delay.is_zero())
        } else {
            None
        };
        let entry = Entry {
            deadline: inner.now + delay,
            sequence: inner.sequence,
            period,
            task,
            handle: handle.clone(),
        };
        log::trace!("scheduled task #{} for {:?}", entry.sequence, entry.deadline);
        inner.queue.push(entry);
        handle
    }
}
