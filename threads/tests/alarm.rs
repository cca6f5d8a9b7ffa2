use std::sync::Arc;

use parking_lot::Mutex;
use proptest::prelude::*;
use xux_threads::config::{KERNEL_TICK, TIMER_INTERVAL};
use xux_threads::task::{self, TaskBuilder, TaskState};
use xux_threads::timer::get_time;
use xux_threads::{alarm, kernel_test, Kernel, KernelConfig};

/// Upper bound of a lone task's wait: the deadline rounded up to the next
/// timer interrupt, plus the tick charged when it re-enables interrupts.
fn latest_wake(ticks: u64) -> u64 {
    ticks + TIMER_INTERVAL + 2 * KERNEL_TICK
}

#[kernel_test]
fn classic_durations() {
    for duration in [1000, 10 * 1000, 100 * 1000] {
        let t0 = get_time();
        alarm().wait_until(duration);
        let waited = get_time() - t0;
        assert!(waited >= duration, "waited {} of {}", waited, duration);
        assert!(waited <= latest_wake(duration), "waited {} of {}", waited, duration);
    }
}

#[kernel_test]
fn sleepers_wake_in_deadline_order() {
    let woken = Arc::new(Mutex::new(Vec::new()));
    let handles: Vec<_> = [3000u64, 1000, 2000]
        .into_iter()
        .map(|duration| {
            let woken = Arc::clone(&woken);
            TaskBuilder::new(format!("sleep-{}", duration))
                .spawn(move || {
                    let t0 = get_time();
                    alarm().wait_until(duration);
                    let waited = get_time() - t0;
                    woken.lock().push(duration);
                    waited >= duration
                })
                .unwrap()
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert_eq!(*woken.lock(), vec![1000, 2000, 3000]);
}

#[kernel_test]
fn cancel_wakes_a_sleeper_early() {
    let sleeper = task::spawn(|| {
        let t0 = get_time();
        alarm().wait_until(1_000_000);
        get_time() - t0
    })
    .unwrap();
    task::yield_current();
    assert_eq!(sleeper.state(), TaskState::Blocked);

    assert!(alarm().cancel(sleeper.id()));
    assert!(!alarm().cancel(sleeper.id()));
    assert!(sleeper.join().unwrap() < 1_000_000);
}

#[kernel_test]
fn each_cancel_matches_one_arm() {
    for _ in 0..3 {
        let sleeper = task::spawn(|| alarm().wait_until(50_000)).unwrap();
        task::yield_current();
        assert!(alarm().cancel(sleeper.id()));
        assert!(!alarm().cancel(sleeper.id()));
        sleeper.join().unwrap();
    }
}

#[test]
fn sleeping_main_never_deadlocks() {
    // Only an alarm can wake main, and the idle processor skips ahead to it.
    let waited = Kernel::new(KernelConfig::default())
        .run(|| {
            let t0 = get_time();
            alarm().wait_until(5_000_000);
            get_time() - t0
        })
        .unwrap();
    assert!(waited >= 5_000_000);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn never_woken_before_deadline(ticks in 1u64..50_000) {
        let waited = Kernel::new(KernelConfig::default())
            .run(move || {
                let t0 = get_time();
                alarm().wait_until(ticks);
                get_time() - t0
            })
            .unwrap();
        prop_assert!(waited >= ticks);
        prop_assert!(waited <= latest_wake(ticks));
    }

    #[test]
    fn concurrent_sleepers_respect_their_deadlines(
        durations in prop::collection::vec(1u64..20_000, 1..6)
    ) {
        let all_on_time = Kernel::new(KernelConfig::default())
            .run(move || {
                let handles: Vec<_> = durations
                    .into_iter()
                    .map(|duration| {
                        task::spawn(move || {
                            let t0 = get_time();
                            alarm().wait_until(duration);
                            get_time() - t0 >= duration
                        })
                        .unwrap()
                    })
                    .collect();
                handles.into_iter().all(|handle| handle.join().unwrap())
            })
            .unwrap();
        prop_assert!(all_on_time);
    }
}
