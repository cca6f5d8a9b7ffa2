use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use xux_threads::task::{self, JoinHandle, TaskBuilder, TaskState};
use xux_threads::timer::get_time;
use xux_threads::{alarm, kernel_test, ConditionVariable, Kernel, KernelConfig, Lock};

/// A kernel whose timer never preempts within a test.
fn quiet_kernel() -> Kernel {
    Kernel::new(KernelConfig::default().timer_interval(1_000_000_000))
}

fn monitor() -> (Arc<Lock>, Arc<ConditionVariable>) {
    let lock = Arc::new(Lock::new());
    let cv = Arc::new(ConditionVariable::new(Arc::clone(&lock)));
    (lock, cv)
}

/// Spawns a task that sleeps on `cv` once.
fn sleeper(name: &str, cv: &Arc<ConditionVariable>) -> JoinHandle<()> {
    let cv = Arc::clone(cv);
    TaskBuilder::new(name)
        .spawn(move || {
            cv.lock().acquire();
            cv.sleep();
            cv.lock().release();
        })
        .unwrap()
}

fn yield_until(mut done: impl FnMut() -> bool) {
    while !done() {
        task::yield_current();
    }
}

#[test]
fn wake_readies_in_sleep_order() {
    quiet_kernel()
        .run(|| {
            let (lock, cv) = monitor();
            let sleepers: Vec<_> = ["t1", "t2", "t3"]
                .into_iter()
                .map(|name| sleeper(name, &cv))
                .collect();
            yield_until(|| cv.waiters() == 3);

            lock.acquire();
            for (i, _) in sleepers.iter().enumerate() {
                cv.wake();
                let states: Vec<_> = sleepers.iter().map(JoinHandle::state).collect();
                for (j, state) in states.into_iter().enumerate() {
                    let expected = if j <= i { TaskState::Ready } else { TaskState::Blocked };
                    assert_eq!(state, expected, "after wake #{}", i + 1);
                }
            }
            lock.release();
            for sleeper in sleepers {
                sleeper.join().unwrap();
            }
        })
        .unwrap();
}

#[test]
fn wake_all_preserves_fifo_order() {
    quiet_kernel()
        .run(|| {
            let (lock, cv) = monitor();
            let resumed = Arc::new(Mutex::new(Vec::new()));
            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let cv = Arc::clone(&cv);
                    let resumed = Arc::clone(&resumed);
                    task::spawn(move || {
                        cv.lock().acquire();
                        cv.sleep();
                        resumed.lock().push(i);
                        cv.lock().release();
                    })
                    .unwrap()
                })
                .collect();
            yield_until(|| cv.waiters() == 4);

            lock.acquire();
            cv.wake_all();
            assert_eq!(cv.waiters(), 0);
            lock.release();
            for handle in handles {
                handle.join().unwrap();
            }
            assert_eq!(*resumed.lock(), vec![0, 1, 2, 3]);
        })
        .unwrap();
}

#[kernel_test]
fn sleep_for_times_out_holding_the_lock() {
    let (lock, cv) = monitor();
    lock.acquire();
    let t0 = get_time();
    cv.sleep_for(7777);
    assert!(get_time() - t0 >= 7777);
    assert!(lock.is_held_by_current_thread());
    assert_eq!(cv.waiters(), 0);
    assert_eq!(alarm().pending(), 0);
    lock.release();
}

#[kernel_test]
fn timed_out_waiter_is_not_woken_again() {
    let (lock, cv) = monitor();
    let timed = {
        let cv = Arc::clone(&cv);
        TaskBuilder::new("timed")
            .spawn(move || {
                cv.lock().acquire();
                cv.sleep_for(1000);
                cv.lock().release();
            })
            .unwrap()
    };
    let plain = sleeper("plain", &cv);
    yield_until(|| cv.waiters() == 2);

    // The timed waiter resumes on its own and drops out of the queue.
    alarm().wait_until(5000);
    assert_eq!(timed.state(), TaskState::Finished);
    assert_eq!(cv.waiters(), 1);

    lock.acquire();
    cv.wake();
    assert_eq!(plain.state(), TaskState::Ready);
    lock.release();
    plain.join().unwrap();
    timed.join().unwrap();
}

#[test]
fn wake_skips_waiter_whose_timeout_fired() {
    quiet_kernel()
        .run(|| {
            let (lock, cv) = monitor();
            let timed = {
                let cv = Arc::clone(&cv);
                TaskBuilder::new("timed")
                    .spawn(move || {
                        cv.lock().acquire();
                        cv.sleep_for(1_000_000);
                        cv.lock().release();
                    })
                    .unwrap()
            };
            let plain = sleeper("plain", &cv);
            yield_until(|| cv.waiters() == 2);

            // Readied through the alarm while still first in the queue.
            assert!(alarm().cancel(timed.id()));
            assert_eq!(timed.state(), TaskState::Ready);

            lock.acquire();
            cv.wake();
            assert_eq!(plain.state(), TaskState::Ready);
            assert_eq!(cv.waiters(), 0);
            lock.release();

            timed.join().unwrap();
            plain.join().unwrap();
            assert_eq!(cv.waiters(), 0);
        })
        .unwrap();
}

#[kernel_test]
fn wake_cancels_the_pending_timeout() {
    let (lock, cv) = monitor();
    let timed = {
        let cv = Arc::clone(&cv);
        task::spawn(move || {
            cv.lock().acquire();
            cv.sleep_for(1_000_000);
            cv.lock().release();
        })
        .unwrap()
    };
    yield_until(|| cv.waiters() == 1);
    assert_eq!(alarm().pending(), 1);

    lock.acquire();
    cv.wake();
    lock.release();
    timed.join().unwrap();
    assert_eq!(alarm().pending(), 0);
    assert!(get_time() < 1_000_000);
}

#[kernel_test]
fn ping_pong_alternates() {
    let (_, cv) = monitor();
    let turns = Arc::new(Mutex::new(Vec::new()));
    let players: Vec<_> = ["ping", "pong"]
        .into_iter()
        .map(|name| {
            let cv = Arc::clone(&cv);
            let turns = Arc::clone(&turns);
            TaskBuilder::new(name)
                .spawn(move || {
                    cv.lock().acquire();
                    for _ in 0..10 {
                        turns.lock().push(name);
                        cv.wake();
                        cv.sleep();
                    }
                    cv.wake();
                    cv.lock().release();
                })
                .unwrap()
        })
        .collect();
    for player in players {
        player.join().unwrap();
    }
    let turns = turns.lock();
    assert_eq!(turns.len(), 20);
    assert!(turns.windows(2).all(|pair| pair[0] != pair[1]));
}

#[kernel_test]
fn consumer_waits_for_all_five_items() {
    let (_, empty) = monitor();
    let list = Arc::new(Mutex::new(VecDeque::new()));

    let consumer = {
        let empty = Arc::clone(&empty);
        let list = Arc::clone(&list);
        TaskBuilder::new("consumer")
            .spawn(move || {
                empty.lock().acquire();
                while list.lock().is_empty() {
                    empty.sleep();
                }
                assert_eq!(list.lock().len(), 5);
                let mut removed = Vec::new();
                loop {
                    let Some(item) = list.lock().pop_front() else { break };
                    task::yield_current();
                    removed.push(item);
                }
                empty.lock().release();
                removed
            })
            .unwrap()
    };
    let producer = {
        let empty = Arc::clone(&empty);
        let list = Arc::clone(&list);
        TaskBuilder::new("producer")
            .spawn(move || {
                empty.lock().acquire();
                for i in 0..5 {
                    list.lock().push_back(i);
                    task::yield_current();
                }
                empty.wake();
                empty.lock().release();
            })
            .unwrap()
    };

    assert_eq!(consumer.join().unwrap(), vec![0, 1, 2, 3, 4]);
    producer.join().unwrap();
}

#[kernel_test]
#[should_panic(expected = "without holding its lock")]
fn wake_all_without_lock_panics() {
    let (_, cv) = monitor();
    cv.wake_all();
}

#[kernel_test]
#[should_panic(expected = "without holding its lock")]
fn sleep_for_without_lock_panics() {
    let (_, cv) = monitor();
    cv.sleep_for(100);
}

#[kernel_test]
#[should_panic(expected = "without holding its lock")]
fn lock_held_by_another_task_does_not_count() {
    let (lock, cv) = monitor();
    let holder = {
        let lock = Arc::clone(&lock);
        task::spawn(move || lock.acquire()).unwrap()
    };
    holder.join().unwrap();
    cv.wake();
}
