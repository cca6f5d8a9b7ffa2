//! # Rendezvous
//!
//! Pairwise exchange of an `i32` between two tasks meeting on the same tag.
//!
//! Each tag owns a slot with a private lock and condition variable. Every
//! arrival draws a ticket when it first gets the slot lock, and tickets `2k`
//! and `2k + 1` form pair `k`. Only the pair being served touches the value:
//!
//! ```text
//!   Empty --ticket 2k--> Waiting(a) --ticket 2k+1--> Answered(b) --ticket 2k collects--> Empty
//! ```
//!
//! Collecting moves service on to pair `k + 1`. The lock hands itself over in
//! arrival order, so tickets follow arrival order however the timer
//! interleaves the tasks afterwards. An arrival without a partner blocks for
//! ever.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::sync::condition_variable::ConditionVariable;
use crate::sync::lock::Lock;
use crate::sync::spin::IrqSpinLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Empty,
    /// The first arrival of the served pair is asleep with this value.
    Waiting(i32),
    /// The partner left this value for the first arrival.
    Answered(i32),
}

#[derive(Debug)]
struct SlotState {
    next_ticket: u64,
    /// Pair currently allowed to exchange.
    serving: u64,
    pending: Pending,
}

struct RendezvousSlot {
    lock: Arc<Lock>,
    cond: ConditionVariable,
    /// Only touched while `lock` is held.
    state: IrqSpinLock<SlotState>,
}

impl RendezvousSlot {
    fn new() -> Self {
        let lock = Arc::new(Lock::new());
        Self {
            cond: ConditionVariable::new(Arc::clone(&lock)),
            lock,
            state: IrqSpinLock::new(SlotState {
                next_ticket: 0,
                serving: 0,
                pending: Pending::Empty,
            }),
        }
    }

    fn pending(&self) -> Pending {
        self.state.lock().pending
    }

    fn set_pending(&self, pending: Pending) {
        self.state.lock().pending = pending;
    }

    fn take_ticket(&self) -> u64 {
        let mut state = self.state.lock();
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        ticket
    }

    fn exchange(&self, value: i32) -> i32 {
        self.lock.acquire();
        let ticket = self.take_ticket();
        let pair = ticket / 2;
        while self.state.lock().serving != pair {
            self.cond.sleep();
        }

        let theirs = if ticket % 2 == 0 {
            debug_assert_eq!(self.pending(), Pending::Empty);
            self.set_pending(Pending::Waiting(value));
            // The partner may have been let in before us.
            self.cond.wake_all();
            let theirs = loop {
                self.cond.sleep();
                if let Pending::Answered(theirs) = self.pending() {
                    break theirs;
                }
            };
            {
                let mut state = self.state.lock();
                state.pending = Pending::Empty;
                state.serving += 1;
            }
            self.cond.wake_all();
            theirs
        } else {
            let theirs = loop {
                if let Pending::Waiting(theirs) = self.pending() {
                    break theirs;
                }
                self.cond.sleep();
            };
            self.set_pending(Pending::Answered(value));
            // Sleepers of later pairs share the queue, so wake everyone.
            self.cond.wake_all();
            theirs
        };
        log::trace!("pair {} done with ticket {}", pair, ticket);
        self.lock.release();
        theirs
    }
}

/// A table of rendezvous points addressed by tag.
///
/// Tags are independent: exchanges on different tags never pair or contend.
#[derive(Default)]
pub struct Rendezvous {
    slots: IrqSpinLock<BTreeMap<i32, Arc<RendezvousSlot>>>,
}

impl Rendezvous {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until another task calls `exchange` with the same `tag`, then
    /// returns the partner's value. The partner gets `value`.
    pub fn exchange(&self, tag: i32, value: i32) -> i32 {
        let slot = Arc::clone(
            self.slots
                .lock()
                .entry(tag)
                .or_insert_with(|| Arc::new(RendezvousSlot::new())),
        );
        log::debug!("exchange on tag {} with {}", tag, value);
        slot.exchange(value)
    }
}
