//! # Condition Variable
//!
//! A [`ConditionVariable`] lets a task give up its [`Lock`] and block until
//! another task signals that the state guarded by that lock has changed. It
//! is bound to one lock at construction and every operation requires the
//! caller to hold it.
//!
//! Waiters are woken in the order they went to sleep. [`sleep_for`] adds a
//! timeout through the kernel [`Alarm`](crate::Alarm): the waiter resumes on
//! whichever comes first, and the other wake-up path is cleared before it
//! returns. Callers tell a timeout from a signal by re-checking their own
//! state.
//!
//! [`sleep_for`]: ConditionVariable::sleep_for

use std::collections::VecDeque;
use std::sync::Arc;

use crate::alarm::Alarm;
use crate::interrupt::InterruptController;
use crate::sync::lock::Lock;
use crate::sync::spin::IrqSpinLock;
use crate::task::{self, TaskId};
use crate::timer::get_time;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Waiter {
    task: TaskId,
    /// Also has an alarm record armed by `sleep_for`.
    timed: bool,
}

pub struct ConditionVariable {
    lock: Arc<Lock>,
    waiters: IrqSpinLock<VecDeque<Waiter>>,
}

impl ConditionVariable {
    pub fn new(lock: Arc<Lock>) -> Self {
        Self {
            lock,
            waiters: IrqSpinLock::new(VecDeque::new()),
        }
    }

    /// The lock this condition variable is bound to.
    pub fn lock(&self) -> &Arc<Lock> {
        &self.lock
    }

    /// Number of queued waiters.
    pub fn waiters(&self) -> usize {
        self.waiters.lock().len()
    }

    #[inline]
    fn assert_lock_held(&self) {
        assert!(
            self.lock.is_held_by_current_thread(),
            "condition variable used without holding its lock"
        );
    }

    /// Atomically releases the lock and blocks until woken, then reacquires
    /// the lock before returning.
    ///
    /// # Panics
    /// If the current task does not hold the lock.
    pub fn sleep(&self) {
        self.assert_lock_held();
        let me = task::current_task();
        {
            let _intr = InterruptController::intr_disable_nested();
            self.lock.release();
            self.waiters.lock().push_back(Waiter { task: me, timed: false });
            task::sleep();
        }
        self.lock.acquire();
    }

    /// Readies the longest waiting task, if any.
    ///
    /// # Panics
    /// If the current task does not hold the lock.
    pub fn wake(&self) {
        self.assert_lock_held();
        let alarm = crate::alarm();
        let mut waiters = self.waiters.lock();
        while let Some(waiter) = waiters.pop_front() {
            if Self::claim(&alarm, waiter) {
                task::ready(waiter.task);
                return;
            }
        }
    }

    /// Readies every waiting task, oldest first.
    ///
    /// # Panics
    /// If the current task does not hold the lock.
    pub fn wake_all(&self) {
        self.assert_lock_held();
        let alarm = crate::alarm();
        let mut waiters = self.waiters.lock();
        for waiter in waiters.drain(..) {
            if Self::claim(&alarm, waiter) {
                task::ready(waiter.task);
            }
        }
    }

    /// Like [`sleep`](Self::sleep), but also resumes once `timeout` ticks
    /// have elapsed.
    ///
    /// A zero timeout, or one that overflows the clock, releases and
    /// reacquires the lock without blocking.
    ///
    /// # Panics
    /// If the current task does not hold the lock.
    pub fn sleep_for(&self, timeout: u64) {
        self.assert_lock_held();
        let alarm = crate::alarm();
        let me = task::current_task();
        {
            let _intr = InterruptController::intr_disable_nested();
            self.lock.release();
            let now = get_time();
            if let Some(deadline) = now.checked_add(timeout).filter(|&d| d > now) {
                self.waiters.lock().push_back(Waiter { task: me, timed: true });
                alarm.arm(me, deadline);
                task::sleep();

                // Whichever path did not wake us must forget us.
                self.waiters.lock().retain(|waiter| waiter.task != me);
                alarm.disarm(me);
            }
        }
        self.lock.acquire();
    }

    /// Takes the wake-up of `waiter` for the condition variable.
    ///
    /// A timed waiter whose alarm record is already gone was readied by the
    /// timer and must not be readied again.
    fn claim(alarm: &Alarm, waiter: Waiter) -> bool {
        if waiter.timed && !alarm.disarm(waiter.task) {
            log::trace!("skip {}, its timeout already fired", waiter.task);
            return false;
        }
        true
    }
}
