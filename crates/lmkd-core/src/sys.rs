//! Raw descriptor I/O with interruption retry.
//!
//! Every helper issues exactly one successful syscall. Only `EINTR` is
//! retried; short transfers and every other errno go back to the caller.

use std::io;
use std::os::fd::{AsRawFd, BorrowedFd};

/// Re-run `f` while it fails with `ErrorKind::Interrupted`.
#[inline]
pub fn temp_failure_retry<T, F>(mut f: F) -> io::Result<T>
where
    F: FnMut() -> io::Result<T>,
{
    loop {
        match f() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Single write(2) of `buf`. Returns the byte count the kernel accepted.
pub fn write_fd(fd: BorrowedFd<'_>, buf: &[u8]) -> io::Result<usize> {
    temp_failure_retry(|| {
        // SAFETY: `fd` is borrowed for the call and `buf` is a valid slice.
        let ret = unsafe {
            libc::write(fd.as_raw_fd(), buf.as_ptr() as *const libc::c_void, buf.len())
        };
        if ret < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(ret as usize)
        }
    })
}

/// Single read(2) into `buf`. Returns the byte count read.
pub fn read_fd(fd: BorrowedFd<'_>, buf: &mut [u8]) -> io::Result<usize> {
    temp_failure_retry(|| {
        // SAFETY: `fd` is borrowed for the call and `buf` is writable.
        let ret = unsafe {
            libc::read(fd.as_raw_fd(), buf.as_mut_ptr() as *mut libc::c_void, buf.len())
        };
        if ret < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(ret as usize)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{File, OpenOptions};
    use std::os::fd::AsFd;

    #[test]
    fn test_retry_on_interrupt_only() {
        let mut calls = 0;
        let res: io::Result<u32> = temp_failure_retry(|| {
            calls += 1;
            if calls < 3 {
                Err(io::Error::from(io::ErrorKind::Interrupted))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(res.unwrap(), 3);

        let mut calls = 0;
        let res: io::Result<()> = temp_failure_retry(|| {
            calls += 1;
            Err(io::Error::from_raw_os_error(libc::EAGAIN))
        });
        assert!(res.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_write_on_read_only_fd_fails() {
        let f = File::open("/dev/null").unwrap();
        let err = write_fd(f.as_fd(), b"x").unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    }

    #[test]
    fn test_read_write_dev_null() {
        let f = OpenOptions::new().read(true).write(true).open("/dev/null").unwrap();
        assert_eq!(write_fd(f.as_fd(), b"abcd").unwrap(), 4);
        let mut buf = [0u8; 8];
        assert_eq!(read_fd(f.as_fd(), &mut buf).unwrap(), 0);
    }
}
