/*!
 * Concurrency Tests
 * Many controllers sharing the global timer thread and signal pool
 */

use deadline_kit::{Deadline, DeadlineExceeded, SignalPool};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_independent_controllers_do_not_cross_talk() {
    let timeouts = Arc::new(AtomicUsize::new(0));
    let successes = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let timeouts = timeouts.clone();
            let successes = successes.clone();
            thread::spawn(move || {
                let deadline = Deadline::new();
                for _ in 0..20 {
                    if i % 2 == 0 {
                        // Always too slow.
                        deadline.set_timeout(Duration::from_millis(1));
                        assert_eq!(
                            deadline.run(|| thread::sleep(Duration::from_millis(15))),
                            Err(DeadlineExceeded)
                        );
                        timeouts.fetch_add(1, Ordering::Relaxed);
                    } else {
                        // Always comfortably fast.
                        deadline.set_timeout(Duration::from_millis(500));
                        assert_eq!(deadline.run(|| {}), Ok(()));
                        successes.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(timeouts.load(Ordering::Relaxed), 160);
    assert_eq!(successes.load(Ordering::Relaxed), 160);
}

#[test]
fn test_setter_and_runner_threads() {
    let deadline = Arc::new(Deadline::new());
    deadline.set_timeout(Duration::from_secs(60));

    let setter = {
        let deadline = deadline.clone();
        thread::spawn(move || {
            // Keep pushing the deadline out.
            for _ in 0..200 {
                deadline.set_timeout(Duration::from_secs(60));
                thread::yield_now();
            }
        })
    };

    for _ in 0..50 {
        assert_eq!(deadline.run(|| {}), Ok(()));
    }

    setter.join().unwrap();
    assert!(!deadline.is_expired());
}

#[test]
fn test_global_pool_recycles_signals() {
    let before = SignalPool::global().stats().recycled;

    let deadline = Deadline::new();
    for _ in 0..64 {
        deadline.set_timeout(Duration::from_secs(1));
        deadline.run(|| {}).unwrap();
    }

    assert!(SignalPool::global().stats().recycled > before);
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Expire,
    Extend,
    Clear,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![Just(Step::Expire), Just(Step::Extend), Just(Step::Clear)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn reused_controller_matches_fresh(steps in prop::collection::vec(step(), 1..12)) {
        let reused = Deadline::new();

        for step in steps {
            let fresh = Deadline::new();
            for controller in [&reused, &fresh] {
                match step {
                    Step::Expire => controller.set(Some(std::time::Instant::now())),
                    Step::Extend => controller.set_timeout(Duration::from_secs(60)),
                    Step::Clear => controller.clear(),
                }
            }

            prop_assert_eq!(reused.deadline().is_some(), fresh.deadline().is_some());
            // Clearing keeps whatever signal was current, expired or not.
            if !matches!(step, Step::Clear) {
                prop_assert_eq!(reused.is_expired(), fresh.is_expired());
                prop_assert_eq!(reused.done().is_closed(), fresh.done().is_closed());
            }
        }
    }
}
