//! XUX threads
//!
//! Thread synchronization for a simulated single-processor kernel:
//! - [`Alarm`]: timed waits driven by the periodic timer interrupt
//! - [`ConditionVariable`]: FIFO condition variable with an optional timeout
//! - [`Rendezvous`]: tag-addressed pairwise value exchange
//!
//! # Machine model
//! ```text
//! +--------------------------------------------+
//! |   Alarm  |  ConditionVariable  | Rendezvous |
//! +--------------------------------------------+
//! |        Lock        |      IrqSpinLock      |
//! +--------------------------------------------+
//! | Tasks: sleep / ready / yield / current      |
//! +--------------------------------------------+
//! | Processor: clock, interrupts, timer device  |
//! +--------------------------------------------+
//! ```
//!
//! Tasks run on host threads, but the [`processor`] lets exactly one of them
//! execute at a time. Disabling interrupts is the only critical section.
//! Time is virtual: it moves by a kernel tick whenever interrupts are
//! re-enabled, and jumps ahead while every task is blocked on an alarm.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use xux_threads::{task, Kernel, KernelConfig, Rendezvous};
//!
//! let (a, b) = Kernel::new(KernelConfig::default())
//!     .run(|| {
//!         let rendezvous = Arc::new(Rendezvous::new());
//!         let peer = Arc::clone(&rendezvous);
//!         let partner = task::spawn(move || peer.exchange(0, 1)).unwrap();
//!         let a = rendezvous.exchange(0, -1);
//!         (a, partner.join().unwrap())
//!     })
//!     .unwrap();
//! assert_eq!((a, b), (1, -1));
//! ```

// `#[kernel_test]` expands to `::xux_threads::...` paths.
extern crate self as xux_threads;

pub mod alarm;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod io;
pub mod kernel;
pub mod processor;
pub mod sync;
pub mod task;
pub mod timer;

use std::sync::Arc;

pub use alarm::Alarm;
pub use config::KernelConfig;
pub use error::KernelError;
pub use kernel::Kernel;
pub use sync::{ConditionVariable, Lock, Rendezvous};
pub use task::{JoinHandle, TaskBuilder, TaskId, TaskState};
pub use threads_macros::kernel_test;

/// The alarm of the running kernel.
///
/// # Panics
/// If the caller is not a kernel task.
pub fn alarm() -> Arc<Alarm> {
    Arc::clone(processor::get_current_processor().alarm())
}
