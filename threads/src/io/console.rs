//! Console output for the simulated kernel.
//!
//! All kernel output goes to the host's standard error so that it interleaves
//! with the test harness output instead of being captured as program output.

use std::fmt::{self, Write};
use std::io::Write as _;

/// A struct implementing `Write` that forwards to the host's stderr.
struct Stderr;

impl Write for Stderr {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        std::io::stderr()
            .lock()
            .write_all(s.as_bytes())
            .map_err(|_| fmt::Error)
    }
}

/// ANSI color codes for terminal output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(unused)]
pub enum Color {
    Black = 30,
    Red = 31,
    Green = 32,
    Yellow = 33,
    Blue = 34,
    Magenta = 35,
    Cyan = 36,
    White = 37,
    BrightBlack = 90,
    BrightRed = 91,
    BrightGreen = 92,
    BrightYellow = 93,
    BrightBlue = 94,
    BrightMagenta = 95,
    BrightCyan = 96,
    BrightWhite = 97,
}

/// Prints `args` wrapped in the escape sequences for `color`.
///
/// The whole line is formatted first and written with a single call, so
/// lines from different kernels running side by side do not tear.
pub fn color_print(color: Color, args: fmt::Arguments) {
    let line = format!("\x1B[{}m{}\x1B[0m", color as u8, args);
    // Nothing sensible to do if stderr is gone.
    let _ = Stderr.write_str(&line);
}

/// Print macro with color
#[macro_export]
macro_rules! color_print {
    ($color:expr, $fmt:literal $(, $($arg:tt)+)?) => {
        $crate::io::console::color_print(
            $color,
            format_args!($fmt $(, $($arg)+)?)
        )
    };
}

/// Print macro with color and a trailing newline
#[macro_export]
macro_rules! color_println {
    ($color:expr, $fmt:literal $(, $($arg:tt)+)?) => {
        $crate::io::console::color_print(
            $color,
            format_args!(concat!($fmt, "\n") $(, $($arg)+)?)
        )
    };
}
