//! Interrupt control of the simulated processor.
//!
//! Disabling interrupts is the only critical-section primitive of the kernel:
//! while they are disabled the running task cannot be preempted and no timer
//! interrupt fires, so every queue manipulation bracketed by
//! [`InterruptController::disable`] / [`InterruptController::restore`] is
//! atomic with respect to other tasks and to the timer handler.
//!
//! Re-enabling interrupts advances the clock by one kernel tick and delivers
//! any timer interrupt that became due.

use core::marker::PhantomData;

use strum::{Display, IntoStaticStr};

use crate::processor::get_current_processor;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Display, IntoStaticStr)]
pub enum InterruptState {
    Enabled,
    Disabled,
}

impl From<InterruptState> for bool {
    fn from(value: InterruptState) -> Self {
        match value {
            InterruptState::Enabled => true,
            InterruptState::Disabled => false,
        }
    }
}

impl From<bool> for InterruptState {
    fn from(value: bool) -> Self {
        match value {
            true => InterruptState::Enabled,
            false => InterruptState::Disabled,
        }
    }
}

pub struct InterruptController;

impl InterruptController {
    /// Enables interrupts, charging a kernel tick if they were disabled.
    #[inline]
    pub fn enable() {
        get_current_processor().enable_interrupts();
    }

    /// Disables interrupts and returns the previous state.
    #[inline]
    pub fn disable() -> InterruptState {
        get_current_processor().disable_interrupts()
    }

    /// Restores a state previously returned by [`disable`].
    ///
    /// [`disable`]: InterruptController::disable
    #[inline]
    pub fn restore(state: InterruptState) {
        match state {
            InterruptState::Enabled => Self::enable(),
            InterruptState::Disabled => {
                Self::disable();
            }
        }
    }

    pub fn get_state() -> InterruptState {
        get_current_processor().interrupt_state()
    }

    pub fn intr_disable_nested() -> IntrReqGuard {
        IntrReqGuard::new()
    }
}

/// Asks the processor to yield the interrupted task once the running
/// interrupt handler returns.
///
/// Outside a handler the request lingers until the next interrupt is
/// delivered. It is dropped when the handler ran while the processor was idle.
pub fn yield_on_return() {
    get_current_processor().set_yield_on_return();
}

/// RAII guard for interrupt-disabled critical sections.
///
/// When dropped, restores the interrupt state observed when it was created,
/// so guards may nest freely. The guard is bound to the task that created it.
pub struct IntrReqGuard {
    saved: InterruptState,
    _not_send: PhantomData<*const ()>,
}

impl IntrReqGuard {
    fn new() -> Self {
        let saved = InterruptController::disable();
        Self {
            saved,
            _not_send: PhantomData,
        }
    }

    /// State that will be restored on drop.
    pub fn saved_state(&self) -> InterruptState {
        self.saved
    }
}

impl Drop for IntrReqGuard {
    fn drop(&mut self) {
        InterruptController::restore(self.saved);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::timer::get_time;
    use threads_macros::kernel_test;

    #[kernel_test]
    fn nested_guards_restore_outer_state() {
        assert_eq!(InterruptController::get_state(), InterruptState::Enabled);
        {
            let outer = InterruptController::intr_disable_nested();
            assert_eq!(outer.saved_state(), InterruptState::Enabled);
            {
                let inner = InterruptController::intr_disable_nested();
                assert_eq!(inner.saved_state(), InterruptState::Disabled);
            }
            assert_eq!(InterruptController::get_state(), InterruptState::Disabled);
        }
        assert_eq!(InterruptController::get_state(), InterruptState::Enabled);
    }

    #[kernel_test]
    fn enabling_charges_one_kernel_tick() {
        let old = InterruptController::disable();
        assert_eq!(old, InterruptState::Enabled);
        let before = get_time();
        InterruptController::restore(old);
        assert_eq!(get_time(), before + crate::config::KERNEL_TICK);

        // Already enabled: no transition, no tick.
        let before = get_time();
        InterruptController::enable();
        assert_eq!(get_time(), before);
    }
}
