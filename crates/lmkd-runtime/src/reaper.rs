//! `Reaper`: asynchronous process killer.
//!
//! The main loop hands a victim's pidfd to `request_kill()` and moves on.
//! A worker thread sends SIGKILL through the pidfd and then calls
//! `process_mrelease` so the victim's memory is freed without waiting for
//! its exit path. When SIGKILL cannot be delivered the worker writes the
//! pid into a non-blocking pipe; the main loop polls the read end returned
//! by `setup_thread_comm()` and collects it with `get_failed_kill_pid()`.
//!
//! At most one request per worker is in flight. `request_kill()` refuses
//! new work instead of queueing past that bound.

use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread;
use std::time::Instant;

use crossbeam_queue::ArrayQueue;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::unistd::pipe2;

use lmkd_core::config::defaults::MAX_REAPER_THREADS;
use lmkd_core::config::LmkdConfig;
use lmkd_core::error::{errno_of, LmkdError, LmkdResult};
use lmkd_core::sys::{read_fd, write_fd};
use lmkd_core::{aloge, alogi};

use crate::pidfd::{pidfd_send_signal, process_mrelease, sys_process_mrelease};

const PID_SIZE: usize = std::mem::size_of::<libc::pid_t>();

/// A kill request owned by the worker that dequeues it.
#[derive(Debug)]
struct QueuedProc {
    /// Private duplicate; the caller keeps its own pidfd for waiting.
    pidfd: OwnedFd,
    pid: libc::pid_t,
}

struct State {
    active_requests: usize,
    thread_cnt: usize,
    /// Write end of the kill-failure pipe
    comm_write: Option<OwnedFd>,
    shutdown: bool,
}

struct Inner {
    state: Mutex<State>,
    cond: Condvar,
    queue: ArrayQueue<QueuedProc>,
    debug_logs: AtomicBool,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn debug_logs_enabled(&self) -> bool {
        self.debug_logs.load(Ordering::Relaxed)
    }

    /// Block until a request is queued. `None` once shut down.
    fn dequeue_request(&self) -> Option<QueuedProc> {
        let mut state = self.lock();
        loop {
            if state.shutdown {
                return None;
            }
            if let Some(proc) = self.queue.pop() {
                return Some(proc);
            }
            state = self.cond.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn request_complete(&self) {
        let mut state = self.lock();
        state.active_requests = state.active_requests.saturating_sub(1);
    }

    fn notify_kill_failure(&self, pid: libc::pid_t) {
        let state = self.lock();
        let Some(comm) = state.comm_write.as_ref() else {
            aloge!("kill of {} failed and no thread communication is set up", pid);
            return;
        };
        match write_fd(comm.as_fd(), &pid.to_ne_bytes()) {
            Ok(PID_SIZE) => {}
            Ok(n) => aloge!("thread communication write failed: short write {}", n),
            Err(e) => aloge!("thread communication write failed: {}", e),
        }
    }
}

pub struct Reaper {
    inner: Arc<Inner>,
    /// Read end of the kill-failure pipe, non-blocking
    comm_read: Option<OwnedFd>,
    pool_size: usize,
    threads: Vec<thread::JoinHandle<()>>,
}

impl Reaper {
    /// Reaper sized from `LMKD_REAPER_THREADS` / `LMKD_REAPER_DEBUG`.
    pub fn new() -> Self {
        Self::from_config(&LmkdConfig::from_env())
    }

    pub fn from_config(config: &LmkdConfig) -> Self {
        let inner = Arc::new(Inner {
            state: Mutex::new(State {
                active_requests: 0,
                thread_cnt: 0,
                comm_write: None,
                shutdown: false,
            }),
            cond: Condvar::new(),
            queue: ArrayQueue::new(MAX_REAPER_THREADS),
            debug_logs: AtomicBool::new(config.reaper_debug),
        });
        Self {
            inner,
            comm_read: None,
            pool_size: config.effective_reaper_threads(),
            threads: Vec::new(),
        }
    }

    /// Whether the kernel implements `process_mrelease`. Probed once.
    pub fn is_reaping_supported() -> bool {
        static SUPPORTED: OnceLock<bool> = OnceLock::new();
        *SUPPORTED.get_or_init(|| match sys_process_mrelease(-1, 0) {
            Err(e) => e.raw_os_error() != Some(libc::ENOSYS),
            Ok(()) => true,
        })
    }

    /// Create the kill-failure pipe. Returns the read end for polling.
    pub fn setup_thread_comm(&mut self) -> LmkdResult<RawFd> {
        let (read_end, write_end) = pipe2(OFlag::O_CLOEXEC).map_err(|e| {
            aloge!("pipe failed: {}", e);
            LmkdError::Reaper(e as i32)
        })?;

        // The main loop must never block on this read.
        let set_nonblock = fcntl(read_end.as_raw_fd(), FcntlArg::F_GETFL).and_then(|flags| {
            let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
            fcntl(read_end.as_raw_fd(), FcntlArg::F_SETFL(flags))
        });
        if let Err(e) = set_nonblock {
            aloge!("fcntl failed: {}", e);
            return Err(LmkdError::Reaper(e as i32));
        }

        let fd = read_end.as_raw_fd();
        self.comm_read = Some(read_end);
        self.inner.lock().comm_write = Some(write_end);
        Ok(fd)
    }

    /// Close both ends of the kill-failure pipe.
    pub fn drop_thread_comm(&mut self) {
        self.inner.lock().comm_write = None;
        self.comm_read = None;
    }

    /// Spawn the configured number of workers.
    pub fn create_thread_pool(&mut self) -> bool {
        self.create_thread_pool_with(self.pool_size)
    }

    /// Spawn up to `n` workers. False if not a single one started, or if
    /// the reaper has been shut down.
    pub fn create_thread_pool_with(&mut self, n: usize) -> bool {
        if self.inner.lock().shutdown {
            return false;
        }
        let n = n.min(MAX_REAPER_THREADS);
        let mut spawned = 0;
        for i in 0..n {
            let inner = Arc::clone(&self.inner);
            match thread::Builder::new()
                .name(format!("lmkd-reaper-{}", i))
                .spawn(move || reaper_main(inner))
            {
                Ok(handle) => {
                    self.threads.push(handle);
                    spawned += 1;
                }
                Err(e) => aloge!("reaper thread spawn failed: {}", e),
            }
        }
        self.inner.lock().thread_cnt += spawned;
        spawned > 0
    }

    pub fn thread_count(&self) -> usize {
        self.inner.lock().thread_cnt
    }

    pub fn active_requests(&self) -> usize {
        self.inner.lock().active_requests
    }

    pub fn enable_debug_logs(&self, enable: bool) {
        self.inner.debug_logs.store(enable, Ordering::Relaxed);
    }

    pub fn debug_logs_enabled(&self) -> bool {
        self.inner.debug_logs_enabled()
    }

    /// Queue `pid` for killing. False when no worker is free.
    ///
    /// `pidfd` is duplicated; the caller keeps ownership of its own copy.
    pub fn request_kill(&self, pidfd: BorrowedFd<'_>, pid: libc::pid_t) -> bool {
        let mut state = self.inner.lock();
        if state.shutdown || state.thread_cnt == 0 {
            return false;
        }
        if state.active_requests >= state.thread_cnt {
            return false;
        }

        let pidfd = match pidfd.try_clone_to_owned() {
            Ok(fd) => fd,
            Err(e) => {
                aloge!("dup of pidfd for {} failed: {}", pid, e);
                return false;
            }
        };
        if self.inner.queue.push(QueuedProc { pidfd, pid }).is_err() {
            return false;
        }
        state.active_requests += 1;
        self.inner.cond.notify_one();
        true
    }

    /// Read one failed pid from the thread communication pipe.
    pub fn get_failed_kill_pid(&self) -> LmkdResult<libc::pid_t> {
        let Some(comm) = self.comm_read.as_ref() else {
            return Err(LmkdError::Reaper(libc::EBADF));
        };
        let mut buf = [0u8; PID_SIZE];
        match read_fd(comm.as_fd(), &mut buf) {
            Ok(PID_SIZE) => Ok(libc::pid_t::from_ne_bytes(buf)),
            Ok(n) => {
                aloge!("thread communication read failed: short read {}", n);
                Err(LmkdError::Reaper(libc::EIO))
            }
            Err(e) => {
                // EAGAIN just means nothing has failed yet.
                if e.raw_os_error() != Some(libc::EAGAIN) {
                    aloge!("thread communication read failed: {}", e);
                }
                Err(LmkdError::Reaper(errno_of(&e)))
            }
        }
    }

    /// Stop all workers and wait for them. Queued requests are dropped.
    pub fn shutdown(&mut self) {
        {
            let mut state = self.inner.lock();
            state.shutdown = true;
            state.thread_cnt = 0;
        }
        self.inner.cond.notify_all();
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
        while self.inner.queue.pop().is_some() {}
        self.inner.lock().active_requests = 0;
    }
}

impl Default for Reaper {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Worker thread main loop.
fn reaper_main(inner: Arc<Inner>) {
    while let Some(proc) = inner.dequeue_request() {
        let start = inner.debug_logs_enabled().then(Instant::now);

        if pidfd_send_signal(proc.pidfd.as_fd(), libc::SIGKILL).is_err() {
            inner.notify_kill_failure(proc.pid);
        } else if let Err(e) = process_mrelease(proc.pidfd.as_fd(), 0) {
            aloge!("process_mrelease {} failed: {}", proc.pid, e);
        } else if let Some(start) = start {
            alogi!(
                "Process {} was reaped in {}ms",
                proc.pid,
                start.elapsed().as_millis()
            );
        }

        drop(proc);
        inner.request_complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pidfd::pidfd_open;
    use std::os::unix::process::ExitStatusExt;
    use std::process::{Child, Command};
    use std::time::Duration;

    fn spawn_sleeper() -> Child {
        Command::new("sleep").arg("30").spawn().unwrap()
    }

    /// None when pidfds are unavailable in this environment.
    fn open_pidfd(child: &Child) -> Option<OwnedFd> {
        pidfd_open(child.id() as libc::pid_t).ok()
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        for _ in 0..400 {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_request_kill_without_threads() {
        let reaper = Reaper::from_config(&LmkdConfig::new());
        let mut child = spawn_sleeper();
        if let Some(pidfd) = open_pidfd(&child) {
            assert!(!reaper.request_kill(pidfd.as_fd(), child.id() as libc::pid_t));
        }
        child.kill().unwrap();
        child.wait().unwrap();
    }

    #[test]
    fn test_pool_size() {
        let mut reaper = Reaper::from_config(&LmkdConfig::new().reaper_threads(2));
        assert!(reaper.create_thread_pool());
        assert_eq!(reaper.thread_count(), 2);
        reaper.shutdown();
        assert!(!reaper.create_thread_pool_with(0));
    }

    #[test]
    fn test_no_pool_after_shutdown() {
        let mut reaper = Reaper::from_config(&LmkdConfig::new());
        assert!(reaper.create_thread_pool_with(1));
        reaper.shutdown();
        assert_eq!(reaper.thread_count(), 0);

        assert!(!reaper.create_thread_pool_with(2));
        assert_eq!(reaper.thread_count(), 0);
        assert!(reaper.threads.is_empty());
    }

    #[test]
    fn test_queue_holds_largest_pool() {
        let reaper = Reaper::from_config(&LmkdConfig::new().reaper_threads(1));
        assert_eq!(reaper.inner.queue.capacity(), MAX_REAPER_THREADS);
    }

    #[test]
    fn test_kills_process() {
        let mut child = spawn_sleeper();
        let Some(pidfd) = open_pidfd(&child) else {
            child.kill().unwrap();
            child.wait().unwrap();
            return;
        };

        let mut reaper = Reaper::from_config(&LmkdConfig::new().reaper_debug(true));
        assert!(reaper.create_thread_pool_with(1));
        assert!(reaper.request_kill(pidfd.as_fd(), child.id() as libc::pid_t));

        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(libc::SIGKILL));
        assert!(wait_until(|| reaper.active_requests() == 0));
    }

    #[test]
    fn test_failed_kill_is_reported() {
        let mut child = Command::new("true").spawn().unwrap();
        let Some(pidfd) = open_pidfd(&child) else {
            child.wait().unwrap();
            return;
        };
        let pid = child.id() as libc::pid_t;
        // Reaped: signalling through the pidfd now fails with ESRCH.
        child.wait().unwrap();

        let mut reaper = Reaper::from_config(&LmkdConfig::new());
        let comm = reaper.setup_thread_comm().unwrap();
        assert!(comm >= 0);
        assert!(reaper.create_thread_pool_with(1));
        assert!(reaper.request_kill(pidfd.as_fd(), pid));

        let mut failed = None;
        assert!(wait_until(|| {
            failed = reaper.get_failed_kill_pid().ok();
            failed.is_some()
        }));
        assert_eq!(failed, Some(pid));
        assert!(wait_until(|| reaper.active_requests() == 0));
    }

    #[test]
    fn test_thread_comm_is_non_blocking() {
        let mut reaper = Reaper::from_config(&LmkdConfig::new());
        assert_eq!(reaper.get_failed_kill_pid(), Err(LmkdError::Reaper(libc::EBADF)));

        let fd = reaper.setup_thread_comm().unwrap();
        let flags = fcntl(fd, FcntlArg::F_GETFL).unwrap();
        assert!(OFlag::from_bits_truncate(flags).contains(OFlag::O_NONBLOCK));
        assert_eq!(reaper.get_failed_kill_pid(), Err(LmkdError::Reaper(libc::EAGAIN)));

        reaper.drop_thread_comm();
        assert_eq!(reaper.get_failed_kill_pid(), Err(LmkdError::Reaper(libc::EBADF)));
    }

    #[test]
    fn test_debug_logs_toggle() {
        let reaper = Reaper::from_config(&LmkdConfig::new());
        assert!(!reaper.debug_logs_enabled());
        reaper.enable_debug_logs(true);
        assert!(reaper.debug_logs_enabled());
    }

    #[test]
    fn test_reaping_support_is_stable() {
        assert_eq!(Reaper::is_reaping_supported(), Reaper::is_reaping_supported());
    }
}
