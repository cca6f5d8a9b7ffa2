//! The virtual clock and the timer device.

mod intr_req;

use std::sync::Arc;

use crate::processor::get_current_processor;

pub(crate) use intr_req::interrupt_request_handler;

/// Callback of the periodic timer interrupt.
///
/// Runs in interrupt context: interrupts are disabled and the callback must
/// not block. It may ready tasks and request a yield through
/// [`yield_on_return`](crate::interrupt::yield_on_return).
pub trait TimerHandler: Send + Sync {
    fn timer_interrupt(&self);

    /// Earliest tick at which the handler has work, if any.
    ///
    /// An idle processor uses it to skip ahead to the first timer interrupt
    /// strictly after that tick.
    fn next_deadline(&self) -> Option<u64>;
}

/// Returns the current machine time in ticks.
///
/// The clock is monotonic and only moves when interrupts are re-enabled or
/// while the processor idles.
pub fn get_time() -> u64 {
    get_current_processor().ticks()
}

/// Registers the periodic timer callback of the current kernel.
///
/// # Panics
/// If a handler is already registered. Every kernel installs its
/// [`Alarm`](crate::Alarm) at boot, so this fails unless called on a
/// processor built without one.
pub fn set_interrupt_handler(handler: Arc<dyn TimerHandler>) {
    get_current_processor().set_timer_handler(handler);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::KERNEL_TICK;
    use crate::task::yield_current;
    use threads_macros::kernel_test;

    #[kernel_test]
    fn clock_is_monotonic() {
        let mut last = get_time();
        for _ in 0..50 {
            yield_current();
            let now = get_time();
            assert!(now >= last + KERNEL_TICK);
            last = now;
        }
    }

    struct Nop;

    impl TimerHandler for Nop {
        fn timer_interrupt(&self) {}

        fn next_deadline(&self) -> Option<u64> {
            None
        }
    }

    #[kernel_test]
    #[should_panic(expected = "already registered")]
    fn second_handler_is_rejected() {
        set_interrupt_handler(Arc::new(Nop));
    }
}
