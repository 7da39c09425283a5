//! Error types for lmkd-utils

use core::fmt;

/// Result type for lmkd operations
pub type LmkdResult<T> = Result<T, LmkdError>;

/// Errors that can occur talking to lmkd or provisioning memcgs.
///
/// OS failures carry the raw errno so errors stay `Clone + Eq`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LmkdError {
    /// socket() or connect() to the lmkd socket failed
    Connect(i32),

    /// write() of a control packet failed
    Send(i32),

    /// read() of a reply packet failed
    Recv(i32),

    /// Reply had the wrong size or command tag
    Format { len: usize, cmd: i32 },

    /// lmkd answered with a non-zero result
    Daemon(i32),

    /// Memcg provisioning failed
    Memcg(MemcgError),

    /// Reaper setup or thread communication failed
    Reaper(i32),

    /// Watchdog thread could not be started
    Watchdog,

    /// Invalid configuration value
    Config(&'static str),

    /// Any other OS error
    Platform(i32),
}

impl LmkdError {
    /// Platform-style return code: -1 for transport and protocol
    /// failures, the stage code for memcg failures.
    pub fn code(&self) -> i32 {
        match self {
            LmkdError::Memcg(e) => e.code(),
            _ => -1,
        }
    }
}

impl fmt::Display for LmkdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LmkdError::Connect(e) => write!(f, "connect to lmkd failed: {}", errno_str(*e)),
            LmkdError::Send(e) => write!(f, "send to lmkd failed: {}", errno_str(*e)),
            LmkdError::Recv(e) => write!(f, "receive from lmkd failed: {}", errno_str(*e)),
            LmkdError::Format { len, cmd } => {
                write!(f, "malformed lmkd reply: {} bytes, cmd {}", len, cmd)
            }
            LmkdError::Daemon(result) => write!(f, "lmkd reported failure: result {}", result),
            LmkdError::Memcg(e) => write!(f, "memcg error: {}", e),
            LmkdError::Reaper(e) => write!(f, "reaper error: {}", errno_str(*e)),
            LmkdError::Watchdog => write!(f, "failed to start watchdog thread"),
            LmkdError::Config(msg) => write!(f, "invalid config: {}", msg),
            LmkdError::Platform(e) => write!(f, "platform error: {}", errno_str(*e)),
        }
    }
}

impl std::error::Error for LmkdError {}

/// Stage at which `create_memcg` failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemcgError {
    /// mkdir of the uid or pid directory failed (other than EEXIST)
    CreateDir { path: String, errno: i32 },

    /// The tasks file could not be opened for writing
    OpenTasks { path: String, errno: i32 },

    /// Writing the pid into the tasks file failed
    WriteTasks { path: String, errno: i32 },
}

impl MemcgError {
    /// -1 directory stage, -2 open stage, -3 write stage.
    pub fn code(&self) -> i32 {
        match self {
            MemcgError::CreateDir { .. } => -1,
            MemcgError::OpenTasks { .. } => -2,
            MemcgError::WriteTasks { .. } => -3,
        }
    }

    pub fn errno(&self) -> i32 {
        match self {
            MemcgError::CreateDir { errno, .. }
            | MemcgError::OpenTasks { errno, .. }
            | MemcgError::WriteTasks { errno, .. } => *errno,
        }
    }
}

impl fmt::Display for MemcgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemcgError::CreateDir { path, errno } => {
                write!(f, "mkdir {} failed: {}", path, errno_str(*errno))
            }
            MemcgError::OpenTasks { path, errno } => {
                write!(f, "open {} failed: {}", path, errno_str(*errno))
            }
            MemcgError::WriteTasks { path, errno } => {
                write!(f, "write {} failed: {}", path, errno_str(*errno))
            }
        }
    }
}

impl std::error::Error for MemcgError {}

impl From<MemcgError> for LmkdError {
    fn from(e: MemcgError) -> Self {
        LmkdError::Memcg(e)
    }
}

impl From<std::io::Error> for LmkdError {
    fn from(e: std::io::Error) -> Self {
        LmkdError::Platform(errno_of(&e))
    }
}

/// errno carried by an I/O error, EIO for synthetic errors.
pub fn errno_of(e: &std::io::Error) -> i32 {
    e.raw_os_error().unwrap_or(libc::EIO)
}

fn errno_str(errno: i32) -> String {
    std::io::Error::from_raw_os_error(errno).to_string()
}
