//! Per-process memory cgroup helpers.
//!
//! Layout produced under the apps directory:
//!
//! ```text
//! <apps_dir>/uid_<uid>/pid_<pid>/tasks   <- "<pid>"
//! ```

use std::fs::{self, DirBuilder, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::Path;
use std::sync::OnceLock;

use lmkd_core::error::{errno_of, MemcgError};
use lmkd_core::sys::temp_failure_retry;

/// Lists the controllers enabled on the unified hierarchy.
pub const CGROUP_CONTROLLERS: &str = "/sys/fs/cgroup/cgroup.controllers";

pub const MEMCG_V2_APPS_DIR: &str = "/sys/fs/cgroup";
pub const MEMCG_V1_APPS_DIR: &str = "/dev/memcg/apps";

/// rwxrwxr-x, before umask.
const MEMCG_DIR_MODE: u32 = 0o775;

static USING_MEMCG_V2: OnceLock<bool> = OnceLock::new();

/// C `isspace`: ASCII whitespace plus vertical tab.
fn is_token_sep(b: &u8) -> bool {
    b.is_ascii_whitespace() || *b == 0x0b
}

/// True when `path` lists the exact whitespace-separated token `memory`.
///
/// An unreadable or missing file is a plain `false`.
pub fn detect_memcg_v2(path: impl AsRef<Path>) -> bool {
    match fs::read(path) {
        Ok(contents) => contents
            .split(is_token_sep)
            .any(|token| token == b"memory"),
        Err(_) => false,
    }
}

/// Whether the memory controller runs on cgroup v2.
///
/// Evaluated once per process; concurrent first callers block until the
/// single scan finishes.
pub fn using_memcg_v2() -> bool {
    *USING_MEMCG_V2.get_or_init(|| detect_memcg_v2(CGROUP_CONTROLLERS))
}

/// Root under which per-app memcgs are created.
pub fn memcg_apps_dir() -> &'static str {
    if using_memcg_v2() {
        MEMCG_V2_APPS_DIR
    } else {
        MEMCG_V1_APPS_DIR
    }
}

fn mkdir_tolerant(path: &Path) -> Result<(), MemcgError> {
    match DirBuilder::new().mode(MEMCG_DIR_MODE).create(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(MemcgError::CreateDir {
            path: path.display().to_string(),
            errno: errno_of(&e),
        }),
    }
}

/// Create `uid_<uid>/pid_<pid>` under `apps_dir` and move `pid` into it.
///
/// Existing directories are reused, so repeated calls are harmless.
/// `MemcgError::code()` tells the failing stage apart: -1 mkdir,
/// -2 opening `tasks`, -3 writing the pid.
pub fn create_memcg(
    apps_dir: impl AsRef<Path>,
    uid: libc::uid_t,
    pid: libc::pid_t,
) -> Result<(), MemcgError> {
    let uid_dir = apps_dir.as_ref().join(format!("uid_{}", uid));
    mkdir_tolerant(&uid_dir)?;

    // pids are formatted unsigned, matching how the kernel names them.
    let pid_dir = uid_dir.join(format!("pid_{}", pid as u32));
    mkdir_tolerant(&pid_dir)?;

    let tasks_path = pid_dir.join("tasks");
    let mut tasks = OpenOptions::new()
        .write(true)
        .create(true)
        .mode(0o644)
        .custom_flags(libc::O_CLOEXEC)
        .open(&tasks_path)
        .map_err(|e| MemcgError::OpenTasks {
            path: tasks_path.display().to_string(),
            errno: errno_of(&e),
        })?;

    let pid_str = (pid as u32).to_string();
    let written = temp_failure_retry(|| tasks.write(pid_str.as_bytes()));
    drop(tasks);

    written.map(|_| ()).map_err(|e| MemcgError::WriteTasks {
        path: tasks_path.display().to_string(),
        errno: errno_of(&e),
    })
}
