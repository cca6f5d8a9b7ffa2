//! Console and logging.

pub mod console;
pub mod logging;

pub use logging::init;
