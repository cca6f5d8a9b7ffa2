//! Kernel tasks: the thread abstraction the synchronization primitives
//! build on.
//!
//! `sleep` and `ready` are the two scheduler hooks every primitive uses: a
//! task records itself in some wait queue with interrupts disabled, then calls
//! [`sleep`]; whoever later removes it from that queue calls [`ready`].

pub(crate) mod allocator;
pub(crate) mod scheduler;
mod task;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

pub use allocator::TaskId;
pub use task::TaskState;
pub(crate) use task::TaskControlBlock;

use crate::error::{panic_message, KernelError};
use crate::processor::{current_task_id, get_current_processor, Processor};

/// Returns the running task.
pub fn current_task() -> TaskId {
    current_task_id()
}

/// Blocks the running task until another one calls [`ready`] on it.
///
/// # Panics
/// If interrupts are enabled: the caller must have queued itself somewhere
/// inside the same critical section, or the wake-up could be lost.
pub fn sleep() {
    get_current_processor().sleep_current();
}

/// Moves a blocked task to the ready queue.
///
/// # Panics
/// If interrupts are enabled or `task` is not blocked.
pub fn ready(task: TaskId) {
    get_current_processor().ready(task);
}

/// Gives the rest of the running task's quantum to the next ready task.
pub fn yield_current() {
    get_current_processor().yield_current();
}

/// Spawns an unnamed task. See [`TaskBuilder::spawn`].
pub fn spawn<F, T>(f: F) -> Result<JoinHandle<T>, KernelError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    TaskBuilder::new("task").spawn(f)
}

/// Task factory, which can be used in order to configure the properties of
/// a new task.
pub struct TaskBuilder {
    name: String,
}

impl TaskBuilder {
    pub fn new<I: Into<String>>(name: I) -> Self {
        Self { name: name.into() }
    }

    /// Forks a task running `f` on the current kernel.
    ///
    /// The new task is appended to the ready queue; it runs once the tasks
    /// ahead of it block, finish or yield.
    pub fn spawn<F, T>(self, f: F) -> Result<JoinHandle<T>, KernelError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let processor = get_current_processor();
        let packet: Packet<T> = Arc::new(Mutex::new(None));
        let their_packet = Arc::clone(&packet);
        let name = self.name.clone();

        let body = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(f));
            *their_packet.lock() = Some(result);
        });
        let id = processor.spawn_task(self.name, body, false)?;

        Ok(JoinHandle {
            id,
            name,
            packet,
            processor,
        })
    }
}

type Packet<T> = Arc<Mutex<Option<std::thread::Result<T>>>>;

/// An owned permission to join on a task (block on its termination).
pub struct JoinHandle<T> {
    id: TaskId,
    name: String,
    packet: Packet<T>,
    processor: Arc<Processor>,
}

impl<T> JoinHandle<T> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> TaskState {
        self.processor.task_state(self.id)
    }

    pub fn is_finished(&self) -> bool {
        self.state() == TaskState::Finished
    }

    /// Waits for the task to finish and returns its result.
    ///
    /// # Errors
    /// [`KernelError::TaskPanicked`] if the task unwound.
    pub fn join(self) -> Result<T, KernelError> {
        self.processor.join(self.id);
        match self.packet.lock().take() {
            Some(Ok(value)) => Ok(value),
            Some(Err(payload)) => Err(KernelError::TaskPanicked {
                name: self.name,
                message: panic_message(&*payload),
            }),
            None => unreachable!("{} finished without a result", self.id),
        }
    }
}
