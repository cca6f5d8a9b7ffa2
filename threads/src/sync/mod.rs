//! Synchronization primitives.

pub mod condition_variable;
pub mod lock;
pub mod rendezvous;
pub mod spin;

pub use condition_variable::ConditionVariable;
pub use lock::Lock;
pub use rendezvous::Rendezvous;
pub use spin::IrqSpinLock;
