//! NexaOS MP Test Suite
//!
//! Tests the MP bring-up code by directly including its source files.
//!
//! # How it works
//! 1. We define stub macros (kinfo!, kwarn!, etc.) that print and record to
//!    a capture buffer instead of the serial console
//! 2. We use `#[path = "..."]` to include the `mp` module directly
//! 3. The `core::` references work because std re-exports core
//! 4. `mock::MockPlatform` stands in for the hardware; every AP is a thread
//!
//! This allows testing real bring-up logic without running in QEMU.

// ===========================================================================
// Logging macro stubs
// ===========================================================================

/// Stub for kinfo! - recorded, printed to stderr in tests
#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => {{
        $crate::log_capture::record("INFO", format_args!($($arg)*));
    }};
}

/// Stub for ktrace! - recorded only
#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => {{
        $crate::log_capture::record_quiet("TRACE", format_args!($($arg)*));
    }};
}

/// Stub for kdebug! - recorded only
#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => {{
        $crate::log_capture::record_quiet("DEBUG", format_args!($($arg)*));
    }};
}

/// Stub for kwarn! - recorded, printed to stderr in tests
#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => {{
        $crate::log_capture::record("WARN", format_args!($($arg)*));
    }};
}

/// Stub for kerror! - recorded, printed to stderr in tests
#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => {{
        $crate::log_capture::record("ERROR", format_args!($($arg)*));
    }};
}

/// Stub for kfatal! - recorded, printed to stderr in tests
#[macro_export]
macro_rules! kfatal {
    ($($arg:tt)*) => {{
        $crate::log_capture::record("FATAL", format_args!($($arg)*));
    }};
}

/// Captured log lines, for asserting on warnings
pub mod log_capture {
    use std::fmt;
    use std::sync::Mutex;

    static LINES: Mutex<Vec<(&'static str, String)>> = Mutex::new(Vec::new());

    pub fn record(level: &'static str, args: fmt::Arguments<'_>) {
        let line = args.to_string();
        eprintln!("[{}] {}", level, line);
        push(level, line);
    }

    pub fn record_quiet(level: &'static str, args: fmt::Arguments<'_>) {
        push(level, args.to_string());
    }

    fn push(level: &'static str, line: String) {
        if let Ok(mut lines) = LINES.lock() {
            lines.push((level, line));
        }
    }

    pub fn clear() {
        if let Ok(mut lines) = LINES.lock() {
            lines.clear();
        }
    }

    /// Whether a line at `level` containing `needle` was recorded
    pub fn contains(level: &str, needle: &str) -> bool {
        LINES
            .lock()
            .map(|lines| {
                lines
                    .iter()
                    .any(|(lvl, line)| *lvl == level && line.contains(needle))
            })
            .unwrap_or(false)
    }
}

// ===========================================================================
// Import MP source files directly using #[path]
// ===========================================================================

#[path = "../../src/mp/mod.rs"]
pub mod mp;

// ===========================================================================
// Mock hardware
// ===========================================================================


// ===========================================================================
// Test modules
// ===========================================================================
