//! # Spin Locks Module
//!
//! Interrupt-disabling spinlocks for data shared between tasks and the timer
//! handler.
//!
//! On the single simulated processor a spinlock never actually spins: holding
//! it disables interrupts, so no other task can run until it is released. The
//! spin loop only matters if a holder goes to sleep, which is a bug.
//!
//! ## Safety
//! - Spinlocks MUST NOT be held across scheduling boundaries
//!   (use the blocking [`Lock`](crate::sync::Lock) instead)

pub mod mutex;

pub use mutex::{IrqSpinLock, RawIrqSpinLock};
