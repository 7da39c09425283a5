//! lmkd-utils configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Example
//!
//! ```rust,ignore
//! use lmkd_core::config::LmkdConfig;
//!
//! let config = LmkdConfig::from_env().reaper_threads(2);
//! ```

pub mod defaults;

use std::path::PathBuf;
use std::time::Duration;

use crate::env::{env_get, env_get_bool, env_get_opt};
use crate::error::{LmkdError, LmkdResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LmkdConfig {
    /// Path of the lmkd control socket
    pub socket_path: PathBuf,
    /// Reaper pool size, 0 = CPU count
    pub reaper_threads: usize,
    /// Log per-process reap latency
    pub reaper_debug: bool,
    /// Watchdog bite timeout
    pub watchdog_timeout: Duration,
}

impl Default for LmkdConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl LmkdConfig {
    /// Defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `LMKD_SOCKET_PATH` - control socket path
    /// - `LMKD_REAPER_THREADS` - reaper pool size (0 = CPU count)
    /// - `LMKD_REAPER_DEBUG` - log reap latency (0/1)
    /// - `LMKD_WATCHDOG_TIMEOUT_S` - watchdog timeout in seconds
    pub fn from_env() -> Self {
        let base = Self::new();
        Self {
            socket_path: env_get_opt::<String>("LMKD_SOCKET_PATH")
                .map(PathBuf::from)
                .unwrap_or(base.socket_path),
            reaper_threads: env_get("LMKD_REAPER_THREADS", base.reaper_threads),
            reaper_debug: env_get_bool("LMKD_REAPER_DEBUG", base.reaper_debug),
            watchdog_timeout: Duration::from_secs(env_get(
                "LMKD_WATCHDOG_TIMEOUT_S",
                defaults::WATCHDOG_TIMEOUT_SECS,
            )),
        }
    }

    /// Library defaults, ignoring the environment.
    pub fn new() -> Self {
        Self {
            socket_path: PathBuf::from(defaults::SOCKET_DIR).join(defaults::SOCKET_NAME),
            reaper_threads: defaults::REAPER_THREADS,
            reaper_debug: defaults::REAPER_DEBUG,
            watchdog_timeout: Duration::from_secs(defaults::WATCHDOG_TIMEOUT_SECS),
        }
    }

    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = path.into();
        self
    }

    pub fn reaper_threads(mut self, n: usize) -> Self {
        self.reaper_threads = n;
        self
    }

    pub fn reaper_debug(mut self, enable: bool) -> Self {
        self.reaper_debug = enable;
        self
    }

    pub fn watchdog_timeout(mut self, d: Duration) -> Self {
        self.watchdog_timeout = d;
        self
    }

    /// Reaper pool size with 0 resolved to the CPU count.
    pub fn effective_reaper_threads(&self) -> usize {
        let n = if self.reaper_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.reaper_threads
        };
        n.min(defaults::MAX_REAPER_THREADS)
    }

    pub fn validate(&self) -> LmkdResult<()> {
        if self.socket_path.as_os_str().is_empty() {
            return Err(LmkdError::Config("socket_path must not be empty"));
        }
        if self.watchdog_timeout.is_zero() {
            return Err(LmkdError::Config("watchdog_timeout must be non-zero"));
        }
        Ok(())
    }
}
