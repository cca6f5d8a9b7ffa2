//! Booting a kernel.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::processor::{Halt, Processor};

/// A simulated single-core kernel.
///
/// # Example
/// ```
/// use xux_threads::{Kernel, KernelConfig};
///
/// let slept = Kernel::new(KernelConfig::default())
///     .run(|| {
///         let start = xux_threads::timer::get_time();
///         xux_threads::alarm().wait_until(1000);
///         xux_threads::timer::get_time() - start
///     })
///     .unwrap();
/// assert!(slept >= 1000);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Kernel {
    config: KernelConfig,
}

impl Kernel {
    pub fn new(config: KernelConfig) -> Self {
        Self { config }
    }

    /// Boots a fresh processor and runs `main` as its first task.
    ///
    /// Returns once `main` returns; tasks still blocked at that point are
    /// abandoned. A panic in `main` is resumed on the caller.
    ///
    /// # Errors
    /// [`KernelError::Deadlock`] if every task blocked with no pending alarm,
    /// [`KernelError::Spawn`] if the main task could not be created.
    pub fn run<F, R>(&self, main: F) -> Result<R, KernelError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let processor = Processor::new(self.config);
        let packet = Arc::new(Mutex::new(None));
        let their_packet = Arc::clone(&packet);
        let body = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(main));
            *their_packet.lock() = Some(result);
        });
        processor.spawn_task(String::from("main"), body, true)?;

        log::info!(
            "kernel boot: timer interval {}, kernel tick {}",
            self.config.get_timer_interval(),
            self.config.get_kernel_tick()
        );
        processor.start();

        match processor.wait_halt() {
            Halt::MainFinished => match packet.lock().take() {
                Some(Ok(value)) => Ok(value),
                Some(Err(payload)) => panic::resume_unwind(payload),
                None => unreachable!("main finished without a result"),
            },
            Halt::Deadlock { blocked } => Err(KernelError::Deadlock { blocked }),
        }
    }
}

/// Entry point of `#[kernel_test]` functions.
#[doc(hidden)]
pub fn run_test(name: &str, file: &str, body: fn()) {
    crate::io::logging::init();
    log::info!("Testing > {} ({})", name, file);
    if let Err(err) = Kernel::new(KernelConfig::default()).run(body) {
        panic!("kernel test `{}` failed: {}", name, err);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sync::Lock;

    #[test]
    fn returns_main_value() {
        let value = Kernel::default().run(|| 7 * 6).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn blocked_forever_is_a_deadlock() {
        let result = Kernel::default().run(|| {
            let lock = Arc::new(Lock::new());
            lock.acquire();
            let other = Arc::clone(&lock);
            let waiter = crate::task::spawn(move || other.acquire()).unwrap();
            // Main now waits for a task that waits for main.
            waiter.join().unwrap();
        });
        match result {
            Err(KernelError::Deadlock { blocked }) => assert_eq!(blocked, 2),
            Err(err) => panic!("unexpected error: {}", err),
            Ok(()) => panic!("kernel should not finish"),
        }
    }

    #[test]
    fn wait_past_the_last_timer_tick_is_a_deadlock() {
        let result = Kernel::default().run(|| {
            let now = crate::timer::get_time();
            // Deadline u64::MAX: no timer interrupt can come strictly after it.
            crate::alarm().wait_until(u64::MAX - now);
        });
        match result {
            Err(KernelError::Deadlock { blocked }) => assert_eq!(blocked, 1),
            Err(err) => panic!("unexpected error: {}", err),
            Ok(()) => panic!("kernel should not finish"),
        }
    }

    #[test]
    #[should_panic(expected = "main gave up")]
    fn main_panic_reaches_the_host() {
        let _ = Kernel::default().run(|| panic!("main gave up"));
    }

    #[test]
    #[should_panic(expected = "not running on a kernel thread")]
    fn host_thread_has_no_processor() {
        crate::timer::get_time();
    }
}
