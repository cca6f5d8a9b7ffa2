//! Boots a kernel and runs the classic demonstrations of the alarm, the
//! condition variable and the rendezvous.
//!
//! Run with `LOG=INFO` (or `DEBUG`, `TRACE`) to follow the kernel.

use std::collections::VecDeque;
use std::process::ExitCode;
use std::sync::Arc;

use parking_lot::Mutex;
use xux_threads::io::console::Color;
use xux_threads::task::{self, TaskBuilder};
use xux_threads::timer::get_time;
use xux_threads::{color_println, ConditionVariable, Kernel, KernelConfig, KernelError, Lock, Rendezvous};

type Check = Result<(), String>;

fn alarm_waits() -> Check {
    for duration in [1000, 10 * 1000, 100 * 1000] {
        let t0 = get_time();
        xux_threads::alarm().wait_until(duration);
        let waited = get_time() - t0;
        log::info!("alarm: waited for {} ticks", waited);
        if waited < duration {
            return Err(format!("woke after {} of {} ticks", waited, duration));
        }
    }
    Ok(())
}

fn interlock() -> Check {
    let lock = Arc::new(Lock::new());
    let cv = Arc::new(ConditionVariable::new(Arc::clone(&lock)));
    let turns = Arc::new(Mutex::new(Vec::new()));

    let mut players = Vec::new();
    for name in ["ping", "pong"] {
        let cv = Arc::clone(&cv);
        let turns = Arc::clone(&turns);
        let player = TaskBuilder::new(name)
            .spawn(move || {
                cv.lock().acquire();
                for _ in 0..10 {
                    log::info!("{}", name);
                    turns.lock().push(name);
                    cv.wake();
                    cv.sleep();
                }
                // Release the partner from its last sleep.
                cv.wake();
                cv.lock().release();
            })
            .map_err(|err| err.to_string())?;
        players.push(player);
    }
    for player in players {
        player.join().map_err(|err| err.to_string())?;
    }

    let turns = turns.lock();
    let alternates = turns.len() == 20 && turns.windows(2).all(|pair| pair[0] != pair[1]);
    if alternates {
        Ok(())
    } else {
        Err(format!("turns did not alternate: {:?}", *turns))
    }
}

fn producer_consumer() -> Check {
    let lock = Arc::new(Lock::new());
    let empty = Arc::new(ConditionVariable::new(Arc::clone(&lock)));
    let list = Arc::new(Mutex::new(VecDeque::new()));

    let consumer = {
        let empty = Arc::clone(&empty);
        let list = Arc::clone(&list);
        TaskBuilder::new("consumer").spawn(move || {
            empty.lock().acquire();
            while list.lock().is_empty() {
                empty.sleep();
            }
            let seen = list.lock().len();
            let mut removed = Vec::new();
            loop {
                let Some(item) = list.lock().pop_front() else { break };
                task::yield_current();
                log::info!("removed {}", item);
                removed.push(item);
            }
            empty.lock().release();
            (seen, removed)
        })
    }
    .map_err(|err| err.to_string())?;

    let producer = {
        let empty = Arc::clone(&empty);
        let list = Arc::clone(&list);
        TaskBuilder::new("producer").spawn(move || {
            empty.lock().acquire();
            for i in 0..5 {
                list.lock().push_back(i);
                log::info!("added {}", i);
                task::yield_current();
            }
            empty.wake();
            empty.lock().release();
        })
    }
    .map_err(|err| err.to_string())?;

    let (seen, removed) = consumer.join().map_err(|err| err.to_string())?;
    producer.join().map_err(|err| err.to_string())?;
    if seen == 5 && removed == [0, 1, 2, 3, 4] {
        Ok(())
    } else {
        Err(format!("consumer saw {} items and removed {:?}", seen, removed))
    }
}

fn sleep_for_timeout() -> Check {
    let lock = Arc::new(Lock::new());
    let cv = ConditionVariable::new(Arc::clone(&lock));

    lock.acquire();
    let t0 = get_time();
    log::info!("{} sleeping", task::current_task());
    // Nobody wakes us, so this times out.
    cv.sleep_for(7777);
    let slept = get_time() - t0;
    log::info!("{} woke up, slept for {} ticks", task::current_task(), slept);
    let result = if !lock.is_held_by_current_thread() {
        Err(String::from("lock not reacquired"))
    } else if cv.waiters() != 0 {
        Err(String::from("stale condition queue entry"))
    } else if slept < 7777 {
        Err(format!("timed out after {} ticks", slept))
    } else {
        Ok(())
    };
    lock.release();
    result
}

fn rendezvous() -> Check {
    let rendezvous = Arc::new(Rendezvous::new());
    let mut handles = Vec::new();
    for (name, send) in [("t1", -1), ("t2", 1)] {
        let rendezvous = Arc::clone(&rendezvous);
        let handle = TaskBuilder::new(name)
            .spawn(move || {
                log::info!("{} exchanging {}", name, send);
                let recv = rendezvous.exchange(0, send);
                log::info!("{} received {}", name, recv);
                recv
            })
            .map_err(|err| err.to_string())?;
        handles.push(handle);
    }
    let mut received = Vec::new();
    for handle in handles {
        received.push(handle.join().map_err(|err| err.to_string())?);
    }
    if received == [1, -1] {
        Ok(())
    } else {
        Err(format!("received {:?}", received))
    }
}

fn run_all() -> Result<Vec<(&'static str, Check)>, KernelError> {
    Kernel::new(KernelConfig::default()).run(|| {
        let tests: [(&'static str, fn() -> Check); 5] = [
            ("alarm waits", alarm_waits),
            ("ping/pong interlock", interlock),
            ("producer/consumer", producer_consumer),
            ("sleep_for timeout", sleep_for_timeout),
            ("rendezvous", rendezvous),
        ];
        tests
            .into_iter()
            .map(|(name, test)| {
                log::info!("Testing > {}", name);
                (name, test())
            })
            .collect()
    })
}

fn main() -> ExitCode {
    xux_threads::io::init();

    let results = match run_all() {
        Ok(results) => results,
        Err(err) => {
            color_println!(Color::Red, "kernel failed: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let mut failed = 0;
    for (name, result) in &results {
        match result {
            Ok(()) => color_println!(Color::Green, "[ ok ] {}", name),
            Err(reason) => {
                failed += 1;
                color_println!(Color::Red, "[fail] {}: {}", name, reason);
            }
        }
    }

    if failed == 0 {
        color_println!(Color::Green, "\n      All tests passed!");
        ExitCode::SUCCESS
    } else {
        color_println!(Color::Red, "\n      {} of {} tests failed", failed, results.len());
        ExitCode::FAILURE
    }
}
