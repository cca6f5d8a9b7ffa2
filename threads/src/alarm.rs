//! Timed waits.
//!
//! The [`Alarm`] keeps one wake-up record per sleeping task and is driven by
//! the periodic timer interrupt: every interrupt readies the tasks whose
//! deadline has passed, then asks the processor to yield the interrupted task
//! so the woken ones get to run.

use std::collections::BTreeMap;

use crate::interrupt::{yield_on_return, InterruptController};
use crate::sync::spin::IrqSpinLock;
use crate::task::{self, TaskId};
use crate::timer::{get_time, TimerHandler};

/// Set of tasks waiting for a point in time.
///
/// Every kernel owns exactly one, installed as its timer interrupt
/// handler at boot; get it with [`alarm()`](crate::alarm()).
pub struct Alarm {
    /// Deadline per task. Ordered by task id so one interrupt always readies
    /// expired tasks in the same order.
    records: IrqSpinLock<BTreeMap<TaskId, u64>>,
}

impl Alarm {
    pub(crate) fn new() -> Self {
        Self {
            records: IrqSpinLock::new(BTreeMap::new()),
        }
    }

    /// Blocks the current task for at least `ticks` ticks.
    ///
    /// The task is readied by the first timer interrupt after the deadline
    /// `now + ticks`, so the actual wait is rounded up to the timer period.
    /// Returns at once when `ticks` is zero or the deadline overflows.
    pub fn wait_until(&self, ticks: u64) {
        let _intr = InterruptController::intr_disable_nested();
        let now = get_time();
        let deadline = match now.checked_add(ticks) {
            Some(deadline) if deadline > now => deadline,
            _ => return,
        };
        let me = task::current_task();
        self.arm(me, deadline);
        log::debug!("{} waits until tick {}", me, deadline);
        task::sleep();
    }

    /// Removes the record of `task` and readies it.
    ///
    /// Returns whether a record existed. Without one this does nothing.
    pub fn cancel(&self, task: TaskId) -> bool {
        let mut records = self.records.lock();
        if records.remove(&task).is_some() {
            log::debug!("cancel alarm of {}", task);
            task::ready(task);
            true
        } else {
            false
        }
    }

    /// Records a deadline for `task` without blocking it.
    ///
    /// An existing record keeps the later of the two deadlines.
    pub(crate) fn arm(&self, task: TaskId, deadline: u64) {
        self.records
            .lock()
            .entry(task)
            .and_modify(|old| *old = (*old).max(deadline))
            .or_insert(deadline);
    }

    /// Removes the record of `task` without readying it.
    ///
    /// Returns `false` when the record is gone, i.e. the timer already fired
    /// or someone cancelled it; either way the task has been readied.
    pub(crate) fn disarm(&self, task: TaskId) -> bool {
        self.records.lock().remove(&task).is_some()
    }

    /// Deadline recorded for `task`, if it has one.
    pub fn deadline_of(&self, task: TaskId) -> Option<u64> {
        self.records.lock().get(&task).copied()
    }

    /// Number of tasks with an outstanding record.
    pub fn pending(&self) -> usize {
        self.records.lock().len()
    }
}

impl TimerHandler for Alarm {
    fn timer_interrupt(&self) {
        let now = get_time();
        {
            let mut records = self.records.lock();
            records.retain(|&task, &mut deadline| {
                if deadline < now {
                    log::trace!("alarm of {} expired at tick {}", task, now);
                    task::ready(task);
                    false
                } else {
                    true
                }
            });
        }
        yield_on_return();
    }

    fn next_deadline(&self) -> Option<u64> {
        self.records.lock().values().copied().min()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::task::{spawn, yield_current, TaskState};
    use threads_macros::kernel_test;

    #[kernel_test]
    fn zero_or_overflowing_wait_returns_at_once() {
        let alarm = crate::alarm();
        let before = get_time();
        alarm.wait_until(0);
        alarm.wait_until(u64::MAX);
        assert_eq!(alarm.pending(), 0);
        // Only the interrupt re-enables were charged.
        assert!(get_time() - before < crate::config::TIMER_INTERVAL);
    }

    #[kernel_test]
    fn rearming_keeps_the_later_deadline() {
        let alarm = crate::alarm();
        let me = task::current_task();
        let now = get_time();
        alarm.arm(me, now + 1000);
        alarm.arm(me, now + 500);
        assert_eq!(alarm.deadline_of(me), Some(now + 1000));
        assert!(alarm.disarm(me));
        assert_eq!(alarm.deadline_of(me), None);
    }

    #[kernel_test]
    fn longest_wait_wins() {
        let alarm = crate::alarm();
        let me = task::current_task();
        let t0 = get_time();
        alarm.arm(me, t0 + 1000);
        alarm.wait_until(500);
        assert!(get_time() > t0 + 1000);
        assert_eq!(alarm.pending(), 0);
    }

    #[kernel_test]
    fn cancel_is_true_once() {
        let alarm = crate::alarm();
        let sleeper = spawn(|| crate::alarm().wait_until(1_000_000)).unwrap();
        yield_current();
        assert_eq!(sleeper.state(), TaskState::Blocked);

        assert!(alarm.cancel(sleeper.id()));
        assert!(!alarm.cancel(sleeper.id()));
        assert_eq!(sleeper.state(), TaskState::Ready);
        sleeper.join().unwrap();
        assert!(get_time() < 1_000_000);
    }

    #[kernel_test]
    fn cancel_of_never_armed_task_is_false() {
        assert!(!crate::alarm().cancel(task::current_task()));
    }

    #[kernel_test]
    fn next_deadline_is_the_minimum() {
        let alarm = crate::alarm();
        let a = spawn(|| crate::alarm().wait_until(3000)).unwrap();
        let b = spawn(|| crate::alarm().wait_until(2000)).unwrap();
        yield_current();
        let earliest = alarm.deadline_of(b.id()).unwrap();
        assert!(earliest < alarm.deadline_of(a.id()).unwrap());
        assert_eq!(alarm.next_deadline(), Some(earliest));
        a.join().unwrap();
        b.join().unwrap();
        assert_eq!(alarm.next_deadline(), None);
    }
}
