//! # lmkd-runtime
//!
//! Threads that lmkd runs next to its main event loop.
//!
//! - `reaper` - pool that kills victims through pidfds and releases their
//!   memory with `process_mrelease` without blocking the main loop
//! - `watchdog` - fires a callback when the main loop stalls between
//!   `set()` and `reset()`
//! - `pidfd` - raw pidfd syscalls

pub mod pidfd;
pub mod reaper;
pub mod watchdog;

pub use reaper::Reaper;
pub use watchdog::Watchdog;
