use core::hint;
use core::sync::atomic::{AtomicBool, Ordering};
#[cfg(debug_assertions)]
use core::sync::atomic::AtomicU64;

use lock_api::{GuardNoSend, RawMutex};

use crate::interrupt::{InterruptController, InterruptState};
#[cfg(debug_assertions)]
use crate::processor::current_task_id;

/// A spinlock that keeps interrupts disabled while it is held.
///
/// This is the only way kernel data structures shared with the timer handler
/// are protected: holding the lock means no timer interrupt can run and the
/// holder cannot be preempted. The interrupt level observed at `lock` is
/// restored at `unlock`, so these locks nest with each other and with
/// [`IntrReqGuard`](crate::interrupt::IntrReqGuard).
///
/// Never sleep while holding one.
///
/// # Example
/// ```
/// use xux_threads::{Kernel, KernelConfig, sync::IrqSpinLock};
///
/// Kernel::new(KernelConfig::default())
///     .run(|| {
///         let lock = IrqSpinLock::new(0);
///         *lock.lock() = 42;
///         assert_eq!(*lock.lock(), 42);
///     })
///     .unwrap();
/// ```
pub type IrqSpinLock<T> = lock_api::Mutex<RawIrqSpinLock, T>;

pub struct RawIrqSpinLock {
    /// Atomic flag indicating whether the lock is held
    locked: AtomicBool,
    /// Interrupt level to restore at unlock, as a bool.
    saved: AtomicBool,

    #[cfg(debug_assertions)]
    /// Track lock holder for recursion detection (debug only)
    holder_id: AtomicU64,
}

impl RawIrqSpinLock {
    /// Sentinel value indicating no holder (debug builds only)
    #[cfg(debug_assertions)]
    const NO_HOLDER: u64 = 0;

    /// Checks for recursive locking (debug builds only)
    #[inline(always)]
    fn check_dead_lock(&self) {
        #[cfg(debug_assertions)]
        {
            let holder = self.holder_id.load(Ordering::Relaxed);
            if holder != Self::NO_HOLDER && holder == current_task_id().as_u64() {
                panic!("dead lock occur, holder: task#{}", holder);
            }
        }
    }
}

unsafe impl RawMutex for RawIrqSpinLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: RawIrqSpinLock = RawIrqSpinLock {
        locked: AtomicBool::new(false),
        saved: AtomicBool::new(false),
        #[cfg(debug_assertions)]
        holder_id: AtomicU64::new(Self::NO_HOLDER),
    };

    type GuardMarker = GuardNoSend;

    fn lock(&self) {
        let saved = InterruptController::disable();
        self.check_dead_lock();

        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            hint::spin_loop();
        }
        self.saved.store(saved.into(), Ordering::Relaxed);

        #[cfg(debug_assertions)]
        self.holder_id
            .store(current_task_id().as_u64(), Ordering::Relaxed);
    }

    fn try_lock(&self) -> bool {
        let saved = InterruptController::disable();
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            self.saved.store(saved.into(), Ordering::Relaxed);
            #[cfg(debug_assertions)]
            self.holder_id
                .store(current_task_id().as_u64(), Ordering::Relaxed);
            true
        } else {
            InterruptController::restore(saved);
            false
        }
    }

    unsafe fn unlock(&self) {
        let saved = InterruptState::from(self.saved.load(Ordering::Relaxed));
        #[cfg(debug_assertions)]
        self.holder_id.store(Self::NO_HOLDER, Ordering::Relaxed);
        self.locked.store(false, Ordering::Release);
        // Re-enabling may deliver a timer interrupt, which must find the
        // lock free.
        InterruptController::restore(saved);
    }

    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}
