use crate::processor::Processor;

/// Delivers a due timer interrupt, if any.
///
/// Runs the registered handler with interrupts disabled and restores the
/// interrupted level afterwards. Returns whether an interrupt was taken; the
/// caller decides what to do with a pending yield request.
pub(crate) fn interrupt_request_handler(processor: &Processor) -> bool {
    let Some((handler, saved)) = processor.take_due_interrupt() else {
        return false;
    };
    log::trace!("Handle timer interrupt");
    if let Some(handler) = handler {
        handler.timer_interrupt();
    }
    processor.finish_interrupt(saved);
    true
}
