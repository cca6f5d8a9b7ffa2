//! # Lock
//!
//! A blocking mutual exclusion lock without data, owned by one task at a time.
//! Unlike the spinlocks, a contended [`Lock`] puts the caller to sleep, so it
//! may be held across blocking calls.
//!
//! Ownership is handed over in arrival order: `release` gives the lock to the
//! oldest waiter directly, so a task that calls `acquire` later can never
//! overtake one that is already waiting.

use std::collections::VecDeque;

use crate::interrupt::InterruptController;
use crate::sync::spin::IrqSpinLock;
use crate::task::{self, TaskId};

#[derive(Debug, Default)]
struct LockState {
    holder: Option<TaskId>,
    waiters: VecDeque<TaskId>,
}

#[derive(Debug, Default)]
pub struct Lock {
    state: IrqSpinLock<LockState>,
}

impl Lock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the current task owns the lock.
    ///
    /// # Panics
    /// If the current task already holds it.
    pub fn acquire(&self) {
        let me = task::current_task();
        let _intr = InterruptController::intr_disable_nested();
        {
            let mut state = self.state.lock();
            assert_ne!(state.holder, Some(me), "{} acquires a lock it already holds", me);
            if state.holder.is_none() {
                state.holder = Some(me);
                return;
            }
            state.waiters.push_back(me);
        }
        task::sleep();
        debug_assert_eq!(self.state.lock().holder, Some(me));
    }

    /// Gives the lock to the oldest waiter, or frees it.
    ///
    /// # Panics
    /// If the current task does not hold it.
    pub fn release(&self) {
        let me = task::current_task();
        let mut state = self.state.lock();
        assert_eq!(state.holder, Some(me), "{} releases a lock it does not hold", me);
        state.holder = state.waiters.pop_front();
        if let Some(next) = state.holder {
            log::trace!("lock handed from {} to {}", me, next);
            task::ready(next);
        }
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        self.state.lock().holder == Some(task::current_task())
    }
}
