//! pidfd syscalls not wrapped by libc.
//!
//! On targets without pidfds every call fails with `ENOSYS`, which the
//! reaper treats as "reaping unsupported".

use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

cfg_if::cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android"))] {
        /// Same number on every architecture (unified syscall table).
        const NR_PROCESS_MRELEASE: libc::c_long = 448;

        fn check(ret: libc::c_long) -> io::Result<libc::c_long> {
            if ret < 0 {
                Err(io::Error::last_os_error())
            } else {
                Ok(ret)
            }
        }

        pub(crate) fn sys_process_mrelease(pidfd: RawFd, flags: u32) -> io::Result<()> {
            // SAFETY: plain integer arguments; the kernel validates the fd.
            check(unsafe { libc::syscall(NR_PROCESS_MRELEASE, pidfd, flags) }).map(|_| ())
        }

        /// Send `sig` to the process behind `pidfd`.
        pub fn pidfd_send_signal(pidfd: BorrowedFd<'_>, sig: libc::c_int) -> io::Result<()> {
            // SAFETY: null siginfo is allowed; the fd is borrowed for the call.
            check(unsafe {
                libc::syscall(
                    libc::SYS_pidfd_send_signal,
                    pidfd.as_raw_fd(),
                    sig,
                    std::ptr::null::<libc::siginfo_t>(),
                    0u32,
                )
            })
            .map(|_| ())
        }

        /// Open a pidfd for `pid`. The descriptor is close-on-exec.
        pub fn pidfd_open(pid: libc::pid_t) -> io::Result<OwnedFd> {
            // SAFETY: plain integer arguments.
            let fd = check(unsafe { libc::syscall(libc::SYS_pidfd_open, pid, 0u32) })?;
            // SAFETY: the kernel just returned a fresh descriptor we own.
            Ok(unsafe { OwnedFd::from_raw_fd(fd as RawFd) })
        }
    } else {
        fn enosys<T>() -> io::Result<T> {
            Err(io::Error::from_raw_os_error(libc::ENOSYS))
        }

        pub(crate) fn sys_process_mrelease(_pidfd: RawFd, _flags: u32) -> io::Result<()> {
            enosys()
        }

        pub fn pidfd_send_signal(_pidfd: BorrowedFd<'_>, _sig: libc::c_int) -> io::Result<()> {
            enosys()
        }

        pub fn pidfd_open(_pid: libc::pid_t) -> io::Result<OwnedFd> {
            enosys()
        }
    }
}

/// Reclaim the address space of a process that is already dying.
pub fn process_mrelease(pidfd: BorrowedFd<'_>, flags: u32) -> io::Result<()> {
    sys_process_mrelease(pidfd.as_raw_fd(), flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsFd;

    #[test]
    fn test_mrelease_bad_fd() {
        // EBADF where supported, ENOSYS on old kernels, EPERM under seccomp.
        let err = sys_process_mrelease(-1, 0).unwrap_err();
        assert!(err.raw_os_error().is_some());
    }

    #[test]
    fn test_pidfd_open_self() {
        // SAFETY: getpid has no preconditions.
        let pid = unsafe { libc::getpid() };
        match pidfd_open(pid) {
            Ok(fd) => {
                // Signal 0 only checks that the process exists.
                pidfd_send_signal(fd.as_fd(), 0).unwrap();
            }
            Err(e) => assert!(matches!(e.raw_os_error(), Some(libc::ENOSYS | libc::EPERM))),
        }
    }
}
