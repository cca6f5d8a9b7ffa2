//! The simulated single-core processor.
//!
//! Each kernel task is backed by a host thread, but only the task recorded as
//! `current` may execute kernel code. Switching hands the processor to the
//! next ready task by notifying that task's wake-up condvar and parking the
//! caller on its own, all under the processor state lock, so exactly one
//! logical thread runs at any time.
//!
//! The processor also owns the machine clock, the interrupt-enable level and
//! the timer device. Time only moves when interrupts go from disabled to
//! enabled, or when nothing is ready and the processor idles until the next
//! useful timer interrupt.

use core::mem;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::alarm::Alarm;
use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::interrupt::InterruptState;
use crate::task::allocator::TaskIdAllocator;
use crate::task::scheduler::{FiFoScheduler, Scheduler};
use crate::task::{TaskControlBlock, TaskId, TaskState};
use crate::timer::{interrupt_request_handler, TimerHandler};

thread_local! {
    /// Processor and task the running host thread belongs to.
    static CURRENT: RefCell<Option<Binding>> = const { RefCell::new(None) };
}

#[derive(Clone)]
struct Binding {
    processor: Arc<Processor>,
    task: TaskId,
}

/// Why a kernel stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Halt {
    MainFinished,
    Deadlock { blocked: usize },
}

pub struct Processor {
    config: KernelConfig,
    state: Mutex<ProcessorState>,
    /// Signalled once `halt` is set.
    halted: Condvar,
    alarm: Arc<Alarm>,
}

pub(crate) struct ProcessorState {
    ticks: u64,
    interrupts: InterruptState,
    yield_on_return: bool,
    next_timer: u64,
    timer_handler: Option<Arc<dyn TimerHandler>>,
    scheduler: Box<dyn Scheduler>,
    tasks: HashMap<TaskId, TaskControlBlock>,
    current: Option<TaskId>,
    halt: Option<Halt>,
}

impl ProcessorState {
    fn task(&self, id: TaskId) -> &TaskControlBlock {
        self.tasks
            .get(&id)
            .unwrap_or_else(|| panic!("{} is not a live task", id))
    }

    fn task_mut(&mut self, id: TaskId) -> &mut TaskControlBlock {
        self.tasks
            .get_mut(&id)
            .unwrap_or_else(|| panic!("{} is not a live task", id))
    }

    fn make_ready(&mut self, id: TaskId) {
        let task = self.task_mut(id);
        assert_eq!(
            task.state,
            TaskState::Blocked,
            "{} ({}) readied while {}",
            id,
            task.name,
            task.state
        );
        task.state = TaskState::Ready;
        self.scheduler.add_task(id);
    }

    fn blocked_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|task| task.state == TaskState::Blocked)
            .count()
    }
}

impl Processor {
    /// Creates a processor with its alarm installed as the timer handler.
    pub(crate) fn new(config: KernelConfig) -> Arc<Self> {
        let alarm = Arc::new(Alarm::new());
        let processor = Arc::new(Self {
            config,
            state: Mutex::new(ProcessorState {
                ticks: 0,
                // A task always starts by enabling interrupts.
                interrupts: InterruptState::Disabled,
                yield_on_return: false,
                next_timer: config.get_timer_interval(),
                timer_handler: None,
                scheduler: Box::new(FiFoScheduler::new()),
                tasks: HashMap::new(),
                current: None,
                halt: None,
            }),
            halted: Condvar::new(),
            alarm: Arc::clone(&alarm),
        });
        processor.set_timer_handler(alarm);
        processor
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub(crate) fn alarm(&self) -> &Arc<Alarm> {
        &self.alarm
    }

    // ========== Clock and timer ========== //

    pub fn ticks(&self) -> u64 {
        self.state.lock().ticks
    }

    /// Registers the one periodic timer callback of this processor.
    ///
    /// # Panics
    /// If a handler is already registered.
    pub fn set_timer_handler(&self, handler: Arc<dyn TimerHandler>) {
        let mut state = self.state.lock();
        assert!(
            state.timer_handler.is_none(),
            "a timer interrupt handler is already registered"
        );
        state.timer_handler = Some(handler);
    }

    /// Claims a due timer interrupt: schedules the next one and enters
    /// interrupt context (interrupts disabled).
    ///
    /// Returns the handler to run and the interrupt state to restore
    /// afterwards, or `None` when nothing is due.
    #[allow(clippy::type_complexity)]
    pub(crate) fn take_due_interrupt(
        &self,
    ) -> Option<(Option<Arc<dyn TimerHandler>>, InterruptState)> {
        let mut state = self.state.lock();
        if state.halt.is_some() || state.ticks < state.next_timer {
            return None;
        }
        state.next_timer = state.ticks.saturating_add(self.config.get_timer_interval());
        let saved = mem::replace(&mut state.interrupts, InterruptState::Disabled);
        Some((state.timer_handler.clone(), saved))
    }

    /// Leaves interrupt context entered by [`take_due_interrupt`].
    ///
    /// [`take_due_interrupt`]: Processor::take_due_interrupt
    pub(crate) fn finish_interrupt(&self, saved: InterruptState) {
        self.state.lock().interrupts = saved;
    }

    // ========== Interrupt level ========== //

    pub fn interrupt_state(&self) -> InterruptState {
        self.state.lock().interrupts
    }

    /// Disables interrupts and returns the previous state.
    pub fn disable_interrupts(&self) -> InterruptState {
        mem::replace(&mut self.state.lock().interrupts, InterruptState::Disabled)
    }

    /// Enables interrupts. A disabled-to-enabled transition advances the
    /// clock, delivers a due timer interrupt and honours a yield request.
    pub fn enable_interrupts(&self) {
        let was = mem::replace(&mut self.state.lock().interrupts, InterruptState::Enabled);
        if was == InterruptState::Disabled {
            self.tick();
        }
    }

    fn restore_interrupts(&self, state: InterruptState) {
        match state {
            InterruptState::Enabled => self.enable_interrupts(),
            InterruptState::Disabled => {
                self.disable_interrupts();
            }
        }
    }

    pub(crate) fn set_yield_on_return(&self) {
        self.state.lock().yield_on_return = true;
    }

    fn tick(&self) {
        {
            let mut state = self.state.lock();
            state.ticks = state.ticks.saturating_add(self.config.get_kernel_tick());
        }
        if interrupt_request_handler(self) {
            let yield_now = mem::take(&mut self.state.lock().yield_on_return);
            if yield_now {
                self.yield_current();
            }
        }
    }

    // ========== Tasks ========== //

    /// Creates a task running `body` on a fresh host thread and appends it to
    /// the ready queue. The main task halts the kernel when its body returns;
    /// every other task just finishes.
    pub(crate) fn spawn_task(
        self: &Arc<Self>,
        name: String,
        body: Box<dyn FnOnce() + Send>,
        is_main: bool,
    ) -> Result<TaskId, KernelError> {
        let id = TaskIdAllocator::allocate();
        let wakeup = Arc::new(Condvar::new());
        let task = TaskControlBlock::new(id, name.clone(), Arc::clone(&wakeup));

        let processor = Arc::clone(self);
        std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || processor.task_entry(id, wakeup, body, is_main))?;

        let mut state = self.state.lock();
        state.tasks.insert(id, task);
        state.scheduler.add_task(id);
        drop(state);

        log::debug!("fork {} ({})", id, name);
        Ok(id)
    }

    fn task_entry(
        self: Arc<Self>,
        id: TaskId,
        wakeup: Arc<Condvar>,
        body: Box<dyn FnOnce() + Send>,
        is_main: bool,
    ) {
        bind(Arc::clone(&self), id);
        {
            let mut state = self.state.lock();
            while state.current != Some(id) {
                wakeup.wait(&mut state);
            }
        }
        log::trace!("{} begins", id);
        self.enable_interrupts();

        body();

        if is_main {
            log::info!("main task finished, halting");
            self.halt(Halt::MainFinished);
        } else {
            self.finish_current(id);
        }
    }

    /// Hands the processor to the first ready task. Used once at boot.
    pub(crate) fn start(&self) {
        let mut state = self.state.lock();
        if state.current.is_some() {
            return;
        }
        if let Some(first) = state.scheduler.fetch_task() {
            state.task_mut(first).state = TaskState::Running;
            state.current = Some(first);
            state.task(first).wakeup.notify_one();
        }
    }

    /// Blocks the current task until someone calls [`ready`] on it.
    ///
    /// # Panics
    /// If interrupts are enabled.
    ///
    /// [`ready`]: Processor::ready
    pub fn sleep_current(&self) {
        let me = current_task_id();
        let mut state = self.state.lock();
        assert_eq!(
            state.interrupts,
            InterruptState::Disabled,
            "sleep() requires interrupts to be disabled"
        );
        state.task_mut(me).state = TaskState::Blocked;
        self.run_next(state, Some(me));
    }

    /// Moves a blocked task to the back of the ready queue.
    ///
    /// # Panics
    /// If interrupts are enabled or the task is not blocked.
    pub fn ready(&self, task: TaskId) {
        let mut state = self.state.lock();
        assert_eq!(
            state.interrupts,
            InterruptState::Disabled,
            "ready() requires interrupts to be disabled"
        );
        state.make_ready(task);
    }

    /// Gives up the rest of the current quantum.
    pub fn yield_current(&self) {
        let me = current_task_id();
        let old = self.disable_interrupts();
        {
            let mut state = self.state.lock();
            state.task_mut(me).state = TaskState::Ready;
            state.scheduler.add_task(me);
            self.run_next(state, Some(me));
        }
        self.restore_interrupts(old);
    }

    /// Blocks the current task until `target` finishes.
    pub(crate) fn join(&self, target: TaskId) {
        let me = current_task_id();
        assert_ne!(me, target, "{} cannot join itself", me);
        let old = self.disable_interrupts();
        let mut state = self.state.lock();
        if state.tasks.contains_key(&target) {
            state.task_mut(target).joiners.push(me);
            state.task_mut(me).state = TaskState::Blocked;
            self.run_next(state, Some(me));
        } else {
            drop(state);
        }
        self.restore_interrupts(old);
    }

    pub fn task_state(&self, task: TaskId) -> TaskState {
        self.state
            .lock()
            .tasks
            .get(&task)
            .map_or(TaskState::Finished, |task| task.state)
    }

    fn finish_current(&self, me: TaskId) {
        self.disable_interrupts();
        log::debug!("{} finished", me);
        let mut state = self.state.lock();
        let joiners = state
            .tasks
            .remove(&me)
            .map(|task| task.joiners)
            .unwrap_or_default();
        for joiner in joiners {
            state.make_ready(joiner);
        }
        self.run_next(state, None);
    }

    /// Switches to the next ready task.
    ///
    /// `me` is the task giving up the processor, or `None` when it finished;
    /// in that case its host thread returns instead of waiting to be resumed.
    fn run_next<'a>(&'a self, mut state: MutexGuard<'a, ProcessorState>, me: Option<TaskId>) {
        loop {
            if state.halt.is_some() {
                let Some(me) = me else { return };
                // Abandoned: nothing will ever run this task again.
                let wakeup = Arc::clone(&state.task(me).wakeup);
                loop {
                    wakeup.wait(&mut state);
                }
            }

            if let Some(next) = state.scheduler.fetch_task() {
                state.task_mut(next).state = TaskState::Running;
                state.current = Some(next);
                if Some(next) == me {
                    return;
                }
                state.task(next).wakeup.notify_one();

                let Some(me) = me else { return };
                let wakeup = Arc::clone(&state.task(me).wakeup);
                while state.current != Some(me) {
                    wakeup.wait(&mut state);
                }
                return;
            }

            drop(state);
            self.idle();
            state = self.state.lock();
        }
    }

    /// Runs while no task is ready: jumps the clock to the first timer
    /// interrupt after the handler's earliest deadline and delivers it. Halts
    /// with a deadlock when no deadline exists, or when no timer tick after
    /// it fits on the clock.
    fn idle(&self) {
        let handler = self.state.lock().timer_handler.clone();
        let Some(deadline) = handler.and_then(|handler| handler.next_deadline()) else {
            let blocked = self.state.lock().blocked_count();
            log::warn!("no task can ever become ready, {} blocked", blocked);
            self.halt(Halt::Deadlock { blocked });
            return;
        };

        {
            let mut state = self.state.lock();
            let interval = self.config.get_timer_interval();
            let start = state.next_timer.max(state.ticks);
            let fire = if start > deadline {
                Some(start)
            } else {
                ((deadline - start) / interval + 1)
                    .checked_mul(interval)
                    .and_then(|skip| start.checked_add(skip))
            };
            let Some(fire) = fire else {
                let blocked = state.blocked_count();
                drop(state);
                log::warn!(
                    "deadline {} is past the last timer tick, {} blocked",
                    deadline,
                    blocked
                );
                self.halt(Halt::Deadlock { blocked });
                return;
            };
            state.ticks = fire;
            state.next_timer = fire;
        }
        interrupt_request_handler(self);
        // No task was interrupted.
        self.state.lock().yield_on_return = false;
    }

    fn halt(&self, reason: Halt) {
        let mut state = self.state.lock();
        if state.halt.is_none() {
            state.halt = Some(reason);
        }
        state.current = None;
        self.halted.notify_all();
    }

    /// Blocks the host thread until the kernel halts.
    pub(crate) fn wait_halt(&self) -> Halt {
        let mut state = self.state.lock();
        loop {
            if let Some(halt) = state.halt {
                return halt;
            }
            self.halted.wait(&mut state);
        }
    }
}

fn bind(processor: Arc<Processor>, task: TaskId) {
    CURRENT.with(|current| *current.borrow_mut() = Some(Binding { processor, task }));
}

fn binding() -> Option<Binding> {
    CURRENT
        .try_with(|current| current.borrow().clone())
        .ok()
        .flatten()
}

/// Returns the processor the calling kernel task runs on.
///
/// # Panics
/// If the caller is not a kernel task.
pub fn get_current_processor() -> Arc<Processor> {
    match binding() {
        Some(binding) => binding.processor,
        None => panic!("not running on a kernel thread"),
    }
}

/// Returns the calling kernel task.
///
/// # Panics
/// If the caller is not a kernel task.
pub(crate) fn current_task_id() -> TaskId {
    match binding() {
        Some(binding) => binding.task,
        None => panic!("not running on a kernel thread"),
    }
}

/// Clock and task for log lines; `None` off kernel threads.
///
/// Never blocks, so logging while the processor state is locked is safe.
pub(crate) fn log_context() -> Option<(Option<u64>, TaskId)> {
    let binding = binding()?;
    let ticks = binding.processor.state.try_lock().map(|state| state.ticks);
    Some((ticks, binding.task))
}
