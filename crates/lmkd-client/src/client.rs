//! Request/response exchanges with lmkd.
//!
//! Each function packs one control packet, writes it with a single
//! `write(2)` (retried on `EINTR` only) and, for update-props, reads one
//! reply packet back.

use core::fmt;
use std::os::fd::AsFd;

use lmkd_core::error::{errno_of, LmkdError, LmkdResult};
use lmkd_core::packet::{
    CtrlPacket, LmkCmd, ProcPrio, ProcRemove, CTRL_PACKET_MAX_SIZE, UPDATE_PROPS_REPLY_SIZE,
    WORD_SIZE,
};
use lmkd_core::sys::{read_fd, write_fd};

/// Outcome of [`update_props`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePropsResult {
    /// lmkd reloaded its properties
    Success,
    /// lmkd replied with a non-zero result
    Fail(i32),
    /// Writing the request failed (errno)
    SendErr(i32),
    /// Reading the reply failed (errno)
    RecvErr(i32),
    /// Reply had an unexpected size or command tag; `cmd` is -1 when
    /// the reply was too short to carry one
    FormatErr { len: usize, cmd: i32 },
}

impl UpdatePropsResult {
    pub fn is_success(&self) -> bool {
        matches!(self, UpdatePropsResult::Success)
    }

    /// Convert to `LmkdResult` for callers that want `?`.
    pub fn into_result(self) -> LmkdResult<()> {
        match self {
            UpdatePropsResult::Success => Ok(()),
            UpdatePropsResult::Fail(result) => Err(LmkdError::Daemon(result)),
            UpdatePropsResult::SendErr(e) => Err(LmkdError::Send(e)),
            UpdatePropsResult::RecvErr(e) => Err(LmkdError::Recv(e)),
            UpdatePropsResult::FormatErr { len, cmd } => Err(LmkdError::Format { len, cmd }),
        }
    }
}

impl fmt::Display for UpdatePropsResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdatePropsResult::Success => write!(f, "success"),
            UpdatePropsResult::Fail(result) => write!(f, "lmkd failed to reload props (result {})", result),
            UpdatePropsResult::SendErr(e) => write!(f, "{}", LmkdError::Send(*e)),
            UpdatePropsResult::RecvErr(e) => write!(f, "{}", LmkdError::Recv(*e)),
            UpdatePropsResult::FormatErr { len, cmd } => {
                write!(f, "{}", LmkdError::Format { len: *len, cmd: *cmd })
            }
        }
    }
}

fn send_packet<Fd: AsFd>(sock: Fd, packet: &CtrlPacket, size: usize) -> LmkdResult<()> {
    write_fd(sock.as_fd(), packet.bytes(size))
        .map(|_| ())
        .map_err(|e| LmkdError::Send(errno_of(&e)))
}

/// Register `params.pid` with lmkd (LMK_PROCPRIO). No reply is read.
pub fn register_process<Fd: AsFd>(sock: Fd, params: &ProcPrio) -> LmkdResult<()> {
    let mut packet = CtrlPacket::new();
    let size = packet.pack_procprio(params);
    send_packet(sock, &packet, size)
}

/// Tell lmkd that `params.pid` is gone (LMK_PROCREMOVE). No reply is read.
pub fn unregister_process<Fd: AsFd>(sock: Fd, params: &ProcRemove) -> LmkdResult<()> {
    let mut packet = CtrlPacket::new();
    let size = packet.pack_procremove(params);
    send_packet(sock, &packet, size)
}

/// Ask lmkd to reload its system properties and wait for the verdict.
pub fn update_props<Fd: AsFd>(sock: Fd) -> UpdatePropsResult {
    let fd = sock.as_fd();
    let mut packet = CtrlPacket::new();

    let size = packet.pack_update_props();
    if let Err(e) = write_fd(fd, packet.bytes(size)) {
        return UpdatePropsResult::SendErr(errno_of(&e));
    }

    let len = match read_fd(fd, &mut packet.as_mut_bytes()[..CTRL_PACKET_MAX_SIZE]) {
        Ok(n) => n,
        Err(e) => return UpdatePropsResult::RecvErr(errno_of(&e)),
    };

    // Bytes past `len` are left over from the request.
    let cmd = if len >= WORD_SIZE { packet.get_cmd() } else { -1 };
    if len != UPDATE_PROPS_REPLY_SIZE || cmd != LmkCmd::UpdateProps as i32 {
        return UpdatePropsResult::FormatErr { len, cmd };
    }

    match packet.get_update_props_reply().result {
        0 => UpdatePropsResult::Success,
        result => UpdatePropsResult::Fail(result),
    }
}
