use std::collections::VecDeque;

use super::TaskId;

/// Ready-queue policy of a processor.
///
/// The processor state lock is held around every call.
pub trait Scheduler: Send {
    fn add_task(&mut self, task: TaskId);
    fn fetch_task(&mut self) -> Option<TaskId>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// First come, first served. A yielding task goes to the back.
pub struct FiFoScheduler {
    ready_queue: VecDeque<TaskId>,
}

impl Scheduler for FiFoScheduler {
    fn add_task(&mut self, task: TaskId) {
        debug_assert!(
            !self.ready_queue.contains(&task),
            "{} is already in the ready queue",
            task
        );
        self.ready_queue.push_back(task);
    }

    fn fetch_task(&mut self) -> Option<TaskId> {
        self.ready_queue.pop_front()
    }

    fn len(&self) -> usize {
        self.ready_queue.len()
    }
}

impl FiFoScheduler {
    pub fn new() -> Self {
        Self {
            ready_queue: VecDeque::new(),
        }
    }
}

impl Default for FiFoScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::task::allocator::TaskIdAllocator;

    #[test]
    fn fetches_in_arrival_order() {
        let mut scheduler = FiFoScheduler::new();
        let ids: Vec<_> = (0..3).map(|_| TaskIdAllocator::allocate()).collect();
        for &id in &ids {
            scheduler.add_task(id);
        }
        assert_eq!(scheduler.len(), 3);
        let fetched: Vec<_> = std::iter::from_fn(|| scheduler.fetch_task()).collect();
        assert_eq!(fetched, ids);
        assert!(scheduler.is_empty());
    }
}
