//! Errors reported to the host side of the kernel.
//!
//! The synchronization primitives themselves never return errors: misuse is
//! a panic and benign cases are no-ops. Only booting, spawning and joining
//! can fail in a way the caller may want to handle.

use thiserror::Error;

/// Kernel-level error type.
#[derive(Error, Debug)]
pub enum KernelError {
    /// Every remaining task is blocked and no timer will ever ready one.
    #[error("deadlock: {blocked} task(s) blocked with nothing left to wake them")]
    Deadlock {
        /// Number of tasks still blocked when the kernel halted.
        blocked: usize,
    },

    /// A task unwound instead of returning.
    #[error("task `{name}` panicked: {message}")]
    TaskPanicked {
        name: String,
        message: String,
    },

    /// The host refused to create a backing thread.
    #[error("failed to spawn task: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("<non-string panic payload>")
    }
}
