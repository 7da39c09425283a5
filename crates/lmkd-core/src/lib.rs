//! # lmkd-core
//!
//! Shared building blocks for talking to the low-memory-killer daemon.
//!
//! Socket and filesystem sequencing lives in `lmkd-client`; the reaper and
//! watchdog threads live in `lmkd-runtime`. This crate only holds what both
//! share.
//!
//! ## Modules
//!
//! - `packet` - lmkd control packet codec
//! - `error` - Error types
//! - `alog` - Android-style leveled logging macros
//! - `env` - Environment variable utilities
//! - `config` - Runtime configuration with env overrides
//! - `sys` - EINTR-retrying read/write on raw descriptors

pub mod packet;
pub mod error;
pub mod alog;
pub mod env;
pub mod config;
pub mod sys;

// Re-exports for convenience
pub use packet::{CtrlPacket, LmkCmd, ProcPrio, ProcRemove, ProcType, UpdatePropsReply};
pub use error::{LmkdError, LmkdResult, MemcgError};
pub use config::LmkdConfig;
pub use env::{env_get, env_get_bool, env_get_opt};
