//! A logging module that configures and outputs log messages with color coding.
//!
//! This module provides a custom logger `OSLogger` that prints log messages in different colors
//! based on their severity level (error, warn, info, debug, trace). It relies on the `log` crate
//! to capture log messages and format them using ANSI escape codes for color output in the Linux console.
//!
//! Every line carries the simulated clock and the running task when the
//! message comes from a kernel thread: `[KERNEL][ INFO][1500,task#3] ...`.

use log::{self, Level, LevelFilter, Log, Metadata, Record};
use spin::Once;

use crate::color_println;
use crate::processor;

use super::console::Color;

static INIT: Once = Once::new();

/// # Initialization
/// The logger is initialized using the `init` function, which sets up the logging system based on the
/// `LOG` environment variable. The available log levels are:
/// - "ERROR" -> `LevelFilter::Error`
/// - "WARN" -> `LevelFilter::Warn`
/// - "INFO" -> `LevelFilter::Info`
/// - "DEBUG" -> `LevelFilter::Debug`
/// - "TRACE" -> `LevelFilter::Trace`
/// - Any other value -> `LevelFilter::Off`
///
/// The variable is read at runtime first and falls back to the value seen at
/// compile time. Calling `init` more than once is harmless: only the first call
/// installs the logger, so every test may call it.
pub fn init() {
    static LOGGER: OSLogger = OSLogger;
    INIT.call_once(|| {
        // Another logger may already be installed by the embedding program.
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(level_filter());
        }
    });
}

fn level_filter() -> LevelFilter {
    let level = std::env::var("LOG")
        .ok()
        .or_else(|| option_env!("LOG").map(String::from));
    match level.as_deref() {
        Some("ERROR") => LevelFilter::Error,
        Some("WARN") => LevelFilter::Warn,
        Some("INFO") => LevelFilter::Info,
        Some("DEBUG") => LevelFilter::Debug,
        Some("TRACE") => LevelFilter::Trace,
        _ => LevelFilter::Off,
    }
}

/// A custom logger that prints log messages to the console with color coding.
///
/// This logger formats the log message based on its severity level, using ANSI escape sequences
/// for color output. It supports all log levels provided by the `log` crate.
struct OSLogger;

impl Log for OSLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    /// Processes the log message and prints it to the console with color formatting.
    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let color = level_to_color(record.level());

        match processor::log_context() {
            Some((Some(ticks), task)) => color_println!(
                color,
                "[KERNEL][{:>5}][{},{}] {}",
                record.level(),
                ticks,
                task,
                record.args()
            ),
            Some((None, task)) => color_println!(
                color,
                "[KERNEL][{:>5}][-,{}] {}",
                record.level(),
                task,
                record.args()
            ),
            None => color_println!(
                color,
                "[KERNEL][{:>5}][-,-] {}",
                record.level(),
                record.args()
            ),
        }
    }

    /// Flushes the log output (no-op in this case).
    fn flush(&self) {}
}

/// Converts a log level to the corresponding ANSI color code.
///
/// - `Level::Error` -> Red (31)
/// - `Level::Warn` -> Bright Yellow (93)
/// - `Level::Info` -> Blue (34)
/// - `Level::Debug` -> Green (32)
/// - `Level::Trace` -> Bright Black (90)
fn level_to_color(level: Level) -> Color {
    match level {
        Level::Error => Color::Red,
        Level::Warn => Color::BrightYellow,
        Level::Info => Color::Blue,
        Level::Debug => Color::Green,
        Level::Trace => Color::BrightBlack,
    }
}
