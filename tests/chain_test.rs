#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use futures::executor::block_on;

    use deferral::{
        ManualScheduler, Outcome, Promise, Reason, Scheduler, SchedulerExt, Task,
    };

    fn scheduler() -> (Arc<ManualScheduler>, Arc<dyn Scheduler>) {
        let manual = Arc::new(ManualScheduler::new());
        let dynamic: Arc<dyn Scheduler> = manual.clone();
        (manual, dynamic)
    }

    #[test]
    fn test_deferred_work_flows_through_a_chain() {
        let (manual, scheduler) = scheduler();

        let answer = scheduler
            .defer::<i32, String, _>(|| Outcome::Value(5))
            .then(|v| Outcome::Value(v + 1))
            .then(|v| Outcome::Value(v * 2));

        assert!(answer.is_pending());
        manual.run_until_idle();
        assert_eq!(block_on(answer.waiter()), Ok(12));
    }

    #[test]
    fn test_failing_deferred_work_rejects() {
        let (manual, scheduler) = scheduler();

        let p = scheduler.defer::<i32, String, _>(|| Outcome::fail("x".to_owned()));

        manual.run_until_idle();
        assert_eq!(block_on(p.waiter()), Err(Reason::Rejected("x".to_owned())));
    }

    #[test]
    fn test_rejection_ripples_until_handled() {
        let (manual, scheduler) = scheduler();

        let p = scheduler.new_promise::<i32, String>();
        let recovered = p
            .then(|v| Outcome::Value(v + 1))
            .then(|v| Outcome::Value(v + 1))
            .catch(|reason| match reason {
                Reason::Rejected(text) => Outcome::Value(text.len() as i32),
                other => Outcome::Fail(other),
            });

        p.reject("boom".to_owned());
        manual.run_until_idle();
        assert_eq!(block_on(recovered.waiter()), Ok(4));
    }

    #[test]
    fn test_fulfilled_handler_returning_own_promise_rejects() {
        let (manual, scheduler) = scheduler();
        let start = scheduler.new_promise::<i32, String>();
        start.resolve(1);

        let slot: Arc<Mutex<Option<Promise<i32, String>>>> = Arc::new(Mutex::new(None));
        let held = slot.clone();
        let chained = start.then(move |_| {
            let own = held.lock().unwrap().clone().expect("downstream registered");
            Outcome::Chain(own)
        });
        *slot.lock().unwrap() = Some(chained.clone());

        manual.run_until_idle();
        assert_eq!(block_on(chained.waiter()), Err(Reason::SelfResolution));
    }

    #[test]
    fn test_rejected_handler_returning_own_promise_rejects() {
        let (manual, scheduler) = scheduler();
        let start = scheduler.new_promise::<i32, String>();
        start.reject("start over".to_owned());

        let slot: Arc<Mutex<Option<Promise<i32, String>>>> = Arc::new(Mutex::new(None));
        let held = slot.clone();
        let chained = start.catch(move |_| {
            let own = held.lock().unwrap().clone().expect("downstream registered");
            Outcome::Chain(own)
        });
        *slot.lock().unwrap() = Some(chained.clone());

        manual.run_until_idle();
        assert_eq!(block_on(chained.waiter()), Err(Reason::SelfResolution));
    }

    #[test]
    fn test_handler_returning_a_promise_is_flattened() {
        let (manual, scheduler) = scheduler();
        let start = scheduler.new_promise::<i32, String>();
        let inner = scheduler.new_promise::<i32, String>();

        let handed = inner.clone();
        let mirrored = start.then(move |_| Outcome::Chain(handed));

        start.resolve(0);
        manual.run_until_idle();
        assert!(mirrored.is_pending());

        inner.resolve(99);
        manual.run_until_idle();
        assert_eq!(block_on(mirrored.waiter()), Ok(99));
    }

    #[test]
    fn test_flattened_rejection_keeps_its_reason() {
        let (manual, scheduler) = scheduler();
        let start = scheduler.new_promise::<i32, String>();
        let inner = scheduler.new_promise::<i32, String>();

        let handed = inner.clone();
        let mirrored = start.then(move |_| Outcome::Chain(handed));

        start.resolve(0);
        inner.reject("inner failed".to_owned());
        manual.run_until_idle();
        assert_eq!(
            block_on(mirrored.waiter()),
            Err(Reason::Rejected("inner failed".to_owned()))
        );
    }

    #[test]
    fn test_all_collects_in_input_order() {
        let (manual, scheduler) = scheduler();
        let inputs: Vec<_> = (0..4)
            .map(|_| scheduler.new_promise::<i32, String>())
            .collect();
        let aggregate = scheduler.all(&inputs);

        for (offset, input) in inputs.iter().enumerate().rev() {
            input.resolve(offset as i32);
        }

        manual.run_until_idle();
        assert_eq!(block_on(aggregate.waiter()), Ok(vec![0, 1, 2, 3]));
    }

    #[test]
    fn test_all_rejects_with_the_full_sequence() {
        let (manual, scheduler) = scheduler();
        let inputs: Vec<_> = (0..2)
            .map(|_| scheduler.new_promise::<&str, &str>())
            .collect();
        let aggregate = scheduler.all(&inputs);

        inputs[0].resolve("a");
        inputs[1].reject("b");

        manual.run_until_idle();
        assert_eq!(
            block_on(aggregate.waiter()),
            Err(Reason::Rejected(vec![
                Ok("a"),
                Err(Reason::Rejected("b"))
            ]))
        );
    }

    #[test]
    fn test_cancelled_task_never_fires() {
        let (manual, _) = scheduler();

        let fired = Arc::new(Mutex::new(false));
        let seen = fired.clone();
        let handle = manual.schedule_task(
            Task::once(move || *seen.lock().unwrap() = true),
            Duration::from_secs(4),
            false,
        );
        handle.cancel();

        manual.advance(Duration::from_secs(10));
        assert!(!*fired.lock().unwrap());
    }
}
