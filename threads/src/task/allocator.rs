use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// Next id to hand out. Shared by every kernel in the process so ids stay
/// unique even across kernels.
static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a kernel task.
///
/// Ids are never recycled: a stale id compares unequal to every live task.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct TaskId(u64);

impl TaskId {
    #[inline(always)]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

impl From<TaskId> for u64 {
    fn from(value: TaskId) -> Self {
        value.0
    }
}

pub struct TaskIdAllocator;

impl TaskIdAllocator {
    pub fn allocate() -> TaskId {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let a = TaskIdAllocator::allocate();
        let b = TaskIdAllocator::allocate();
        assert_ne!(a, b);
        assert!(b > a);
        assert_eq!(format!("{}", a), format!("task#{}", a.as_u64()));
    }
}
