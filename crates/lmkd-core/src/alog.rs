//! Android-style leveled logging to stderr
//!
//! Lines are written as `<L> lowmemorykiller: <message>`, where `<L>` is the
//! logcat priority letter (E, W, I, D, V).
//!
//! # Environment Variables
//!
//! - `LMKD_LOG_LEVEL=<level>` - off, error, warn, info, debug, verbose (or 0-5)
//! - `LMKD_FLUSH_LOG=1` - Flush stderr after every line
//!
//! # Usage
//!
//! ```ignore
//! use lmkd_core::{aloge, alogi};
//!
//! alogi!("Process {} was reaped in {}ms", pid, ms);
//! aloge!("pipe failed: {}", err);
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Once;

/// Tag prepended to every line.
pub const LOG_TAG: &str = "lowmemorykiller";

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Verbose = 5,
}

impl LogLevel {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Off,
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            _ => LogLevel::Verbose,
        }
    }

    /// Parse a level name or number. Unknown strings yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let level = match s.to_ascii_lowercase().as_str() {
            "off" | "0" => LogLevel::Off,
            "error" | "e" | "1" => LogLevel::Error,
            "warn" | "w" | "2" => LogLevel::Warn,
            "info" | "i" | "3" => LogLevel::Info,
            "debug" | "d" | "4" => LogLevel::Debug,
            "verbose" | "v" | "5" => LogLevel::Verbose,
            _ => return None,
        };
        Some(level)
    }

    /// logcat priority letter
    pub fn letter(&self) -> char {
        match self {
            LogLevel::Off => ' ',
            LogLevel::Error => 'E',
            LogLevel::Warn => 'W',
            LogLevel::Info => 'I',
            LogLevel::Debug => 'D',
            LogLevel::Verbose => 'V',
        }
    }
}

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static FLUSH_ENABLED: AtomicBool = AtomicBool::new(false);
static INIT: Once = Once::new();

/// Read `LMKD_LOG_LEVEL` / `LMKD_FLUSH_LOG`. Runs at most once; later
/// calls are no-ops. Called lazily by the first log line.
pub fn init() {
    INIT.call_once(|| {
        if let Some(level) = std::env::var("LMKD_LOG_LEVEL")
            .ok()
            .and_then(|v| LogLevel::parse(&v))
        {
            LOG_LEVEL.store(level as u8, Ordering::Relaxed);
        }
        if crate::env::env_get_bool("LMKD_FLUSH_LOG", false) {
            FLUSH_ENABLED.store(true, Ordering::Relaxed);
        }
    });
}

#[inline]
pub fn log_level() -> LogLevel {
    init();
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Override the level. Takes precedence over the environment.
pub fn set_log_level(level: LogLevel) {
    init();
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

#[inline]
pub fn level_enabled(level: LogLevel) -> bool {
    level != LogLevel::Off && level <= log_level()
}

#[doc(hidden)]
pub fn _alog_impl(level: LogLevel, args: std::fmt::Arguments<'_>) {
    if !level_enabled(level) {
        return;
    }
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = write!(handle, "{} {}: ", level.letter(), LOG_TAG);
    let _ = handle.write_fmt(args);
    let _ = handle.write_all(b"\n");
    if FLUSH_ENABLED.load(Ordering::Relaxed) {
        let _ = handle.flush();
    }
}

#[macro_export]
macro_rules! aloge {
    ($($arg:tt)*) => {{
        $crate::alog::_alog_impl($crate::alog::LogLevel::Error, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! alogw {
    ($($arg:tt)*) => {{
        $crate::alog::_alog_impl($crate::alog::LogLevel::Warn, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! alogi {
    ($($arg:tt)*) => {{
        $crate::alog::_alog_impl($crate::alog::LogLevel::Info, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! alogd {
    ($($arg:tt)*) => {{
        $crate::alog::_alog_impl($crate::alog::LogLevel::Debug, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! alogv {
    ($($arg:tt)*) => {{
        $crate::alog::_alog_impl($crate::alog::LogLevel::Verbose, format_args!($($arg)*));
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_order() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Verbose);
    }

    #[test]
    fn test_parse() {
        assert_eq!(LogLevel::parse("ERROR"), Some(LogLevel::Error));
        assert_eq!(LogLevel::parse("v"), Some(LogLevel::Verbose));
        assert_eq!(LogLevel::parse("3"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("loud"), None);
        assert_eq!(LogLevel::from_u8(42), LogLevel::Verbose);
    }

    #[test]
    fn test_letters() {
        assert_eq!(LogLevel::Error.letter(), 'E');
        assert_eq!(LogLevel::Verbose.letter(), 'V');
    }

    #[test]
    fn test_macros_compile() {
        set_log_level(LogLevel::Off);
        assert!(!level_enabled(LogLevel::Error));

        aloge!("error {}", 1);
        alogw!("warn");
        alogi!("info {}", "x");
        alogd!("debug");
        alogv!("verbose");
    }
}
