//! Connection to the lmkd control socket.
//!
//! lmkd listens on the Android reserved-namespace socket "lmkd", which
//! lives at `/dev/socket/lmkd`. The socket is `SOCK_SEQPACKET`, so each
//! write is one control packet and each read returns at most one.

use std::os::fd::{AsRawFd, OwnedFd};
use std::path::Path;

use nix::sys::socket::{self, AddressFamily, SockFlag, SockType, UnixAddr};

use lmkd_core::config::LmkdConfig;
use lmkd_core::error::{LmkdError, LmkdResult};

/// Connect to lmkd at the configured socket path.
///
/// One attempt, no retry. The returned descriptor is close-on-exec and
/// owned by the caller.
pub fn connect() -> LmkdResult<OwnedFd> {
    connect_to(&LmkdConfig::from_env().socket_path)
}

/// Connect to an lmkd-protocol socket at `path`.
pub fn connect_to(path: &Path) -> LmkdResult<OwnedFd> {
    let fd = socket::socket(
        AddressFamily::Unix,
        SockType::SeqPacket,
        SockFlag::SOCK_CLOEXEC,
        None,
    )
    .map_err(|e| LmkdError::Connect(e as i32))?;

    let addr = UnixAddr::new(path).map_err(|e| LmkdError::Connect(e as i32))?;
    socket::connect(fd.as_raw_fd(), &addr).map_err(|e| LmkdError::Connect(e as i32))?;

    Ok(fd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_missing_socket() {
        let dir = tempfile::tempdir().unwrap();
        let err = connect_to(&dir.path().join("lmkd")).unwrap_err();
        assert_eq!(err, LmkdError::Connect(libc::ENOENT));
        assert_eq!(err.code(), -1);
    }

    #[test]
    fn test_connect_to_listener() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lmkd");

        let listener = socket::socket(
            AddressFamily::Unix,
            SockType::SeqPacket,
            SockFlag::SOCK_CLOEXEC,
            None,
        )
        .unwrap();
        socket::bind(listener.as_raw_fd(), &UnixAddr::new(&path).unwrap()).unwrap();
        // SAFETY: listener is a valid bound socket.
        assert_eq!(unsafe { libc::listen(listener.as_raw_fd(), 1) }, 0);

        let fd = connect_to(&path).unwrap();
        // SAFETY: fd is a valid open descriptor.
        let flags = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_GETFD) };
        assert!(flags & libc::FD_CLOEXEC != 0);
    }
}
