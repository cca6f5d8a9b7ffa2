use core::fmt;
use std::sync::Arc;

use parking_lot::Condvar;
use strum::{Display, IntoStaticStr};

use super::TaskId;

#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, IntoStaticStr)]
pub enum TaskState {
    Ready,
    Running,
    Blocked,
    Finished,
}

/// Task's control information used by the processor.
///
/// Lives in the processor's task table, guarded by the processor state
/// lock, from fork until the task finishes.
pub(crate) struct TaskControlBlock {
    pub id: TaskId,
    pub name: String,
    pub state: TaskState,
    /// Notified when the processor is handed to this task.
    pub wakeup: Arc<Condvar>,
    /// Tasks blocked in `join` on this one.
    pub joiners: Vec<TaskId>,
}

impl TaskControlBlock {
    pub fn new(id: TaskId, name: String, wakeup: Arc<Condvar>) -> Self {
        Self {
            id,
            name,
            state: TaskState::Ready,
            wakeup,
            joiners: Vec::new(),
        }
    }
}

impl fmt::Debug for TaskControlBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskControlBlock")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("joiners", &self.joiners.len())
            .finish_non_exhaustive()
    }
}
