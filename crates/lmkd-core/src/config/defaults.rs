//! Compile-time defaults for `LmkdConfig`.

/// Directory holding Android reserved-namespace sockets.
pub const SOCKET_DIR: &str = "/dev/socket";

/// Reserved socket name of the daemon.
pub const SOCKET_NAME: &str = "lmkd";

/// 0 = one reaper thread per online CPU.
pub const REAPER_THREADS: usize = 0;

pub const REAPER_DEBUG: bool = false;

pub const WATCHDOG_TIMEOUT_SECS: u64 = 2;

/// Upper bound on reaper threads regardless of CPU count.
pub const MAX_REAPER_THREADS: usize = 64;
