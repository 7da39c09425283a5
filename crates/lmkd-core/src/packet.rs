//! lmkd control packet codec
//!
//! A control packet is an array of 32-bit words in network byte order.
//! Word 0 always carries the command tag; the rest is command specific.
//!
//! ```text
//! LMK_PROCPRIO      | cmd | pid | uid | oomadj | ptype |
//! LMK_PROCREMOVE    | cmd | pid |
//! LMK_UPDATE_PROPS  | cmd |                    (request)
//! LMK_UPDATE_PROPS  | cmd | result |           (reply)
//! ```

use core::fmt;

/// Maximum number of (minfree, oom_adj) pairs in an LMK_TARGET packet.
pub const MAX_TARGETS: usize = 6;

/// Size of one packet word.
pub const WORD_SIZE: usize = core::mem::size_of::<i32>();

/// Largest packet lmkd sends or accepts: LMK_TARGET with every slot used.
pub const CTRL_PACKET_MAX_SIZE: usize = WORD_SIZE * (MAX_TARGETS * 2 + 1);

/// Byte size of the LMK_UPDATE_PROPS reply (cmd + result).
pub const UPDATE_PROPS_REPLY_SIZE: usize = 2 * WORD_SIZE;

const MAX_WORDS: usize = CTRL_PACKET_MAX_SIZE / WORD_SIZE;

/// Command tags understood by lmkd.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LmkCmd {
    Target = 0,
    ProcPrio = 1,
    ProcRemove = 2,
    ProcPurge = 3,
    GetKillCnt = 4,
    Subscribe = 5,
    ProcKill = 6,
    UpdateProps = 7,
    StatKillOccurred = 8,
    StateChanged = 9,
}

impl LmkCmd {
    pub fn from_i32(v: i32) -> Option<Self> {
        let cmd = match v {
            0 => LmkCmd::Target,
            1 => LmkCmd::ProcPrio,
            2 => LmkCmd::ProcRemove,
            3 => LmkCmd::ProcPurge,
            4 => LmkCmd::GetKillCnt,
            5 => LmkCmd::Subscribe,
            6 => LmkCmd::ProcKill,
            7 => LmkCmd::UpdateProps,
            8 => LmkCmd::StatKillOccurred,
            9 => LmkCmd::StateChanged,
            _ => return None,
        };
        Some(cmd)
    }
}

impl fmt::Display for LmkCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LmkCmd::Target => "LMK_TARGET",
            LmkCmd::ProcPrio => "LMK_PROCPRIO",
            LmkCmd::ProcRemove => "LMK_PROCREMOVE",
            LmkCmd::ProcPurge => "LMK_PROCPURGE",
            LmkCmd::GetKillCnt => "LMK_GETKILLCNT",
            LmkCmd::Subscribe => "LMK_SUBSCRIBE",
            LmkCmd::ProcKill => "LMK_PROCKILL",
            LmkCmd::UpdateProps => "LMK_UPDATE_PROPS",
            LmkCmd::StatKillOccurred => "LMK_STAT_KILL_OCCURRED",
            LmkCmd::StateChanged => "LMK_STATE_CHANGED",
        };
        f.write_str(name)
    }
}

/// Kind of process being registered.
#[repr(i32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProcType {
    #[default]
    App = 0,
    Service = 1,
}

impl core::str::FromStr for ProcType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "app" | "0" => Ok(ProcType::App),
            "service" | "1" => Ok(ProcType::Service),
            _ => Err(()),
        }
    }
}

/// LMK_PROCPRIO payload: register a process and its oom_score_adj.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcPrio {
    pub pid: i32,
    pub uid: u32,
    pub oomadj: i32,
    pub ptype: ProcType,
}

/// LMK_PROCREMOVE payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcRemove {
    pub pid: i32,
}

/// Decoded LMK_UPDATE_PROPS reply. `result == 0` means lmkd reloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdatePropsReply {
    pub result: i32,
}

/// Fixed-capacity control packet buffer.
///
/// The `pack_*` methods fill the buffer from word 0 and return the number
/// of bytes that make up the packet; only that prefix goes on the wire.
#[derive(Clone)]
pub struct CtrlPacket {
    buf: [u8; CTRL_PACKET_MAX_SIZE],
}

impl CtrlPacket {
    pub fn new() -> Self {
        Self { buf: [0; CTRL_PACKET_MAX_SIZE] }
    }

    /// Whole buffer, for reads.
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// First `len` bytes, clamped to capacity.
    pub fn bytes(&self, len: usize) -> &[u8] {
        &self.buf[..len.min(CTRL_PACKET_MAX_SIZE)]
    }

    #[inline]
    fn put(&mut self, idx: usize, val: i32) {
        debug_assert!(idx < MAX_WORDS);
        let off = idx * WORD_SIZE;
        self.buf[off..off + WORD_SIZE].copy_from_slice(&val.to_be_bytes());
    }

    #[inline]
    fn get(&self, idx: usize) -> i32 {
        let off = idx * WORD_SIZE;
        let mut word = [0u8; WORD_SIZE];
        word.copy_from_slice(&self.buf[off..off + WORD_SIZE]);
        i32::from_be_bytes(word)
    }

    pub fn pack_procprio(&mut self, params: &ProcPrio) -> usize {
        self.put(0, LmkCmd::ProcPrio as i32);
        self.put(1, params.pid);
        self.put(2, params.uid as i32);
        self.put(3, params.oomadj);
        self.put(4, params.ptype as i32);
        5 * WORD_SIZE
    }

    pub fn pack_procremove(&mut self, params: &ProcRemove) -> usize {
        self.put(0, LmkCmd::ProcRemove as i32);
        self.put(1, params.pid);
        2 * WORD_SIZE
    }

    pub fn pack_update_props(&mut self) -> usize {
        self.put(0, LmkCmd::UpdateProps as i32);
        WORD_SIZE
    }

    /// Raw command tag in word 0.
    pub fn get_cmd(&self) -> i32 {
        self.get(0)
    }

    /// Decode an update-props reply. Callers check size and tag first.
    pub fn get_update_props_reply(&self) -> UpdatePropsReply {
        UpdatePropsReply { result: self.get(1) }
    }

    /// Build a reply packet as lmkd would send it. Returns its size.
    pub fn pack_update_props_reply(&mut self, reply: &UpdatePropsReply) -> usize {
        self.put(0, LmkCmd::UpdateProps as i32);
        self.put(1, reply.result);
        UPDATE_PROPS_REPLY_SIZE
    }
}

impl Default for CtrlPacket {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CtrlPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cmd = self.get_cmd();
        match LmkCmd::from_i32(cmd) {
            Some(c) => write!(f, "CtrlPacket({})", c),
            None => write!(f, "CtrlPacket(cmd={})", cmd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_size() {
        assert_eq!(CTRL_PACKET_MAX_SIZE, 52);
        assert_eq!(UPDATE_PROPS_REPLY_SIZE, 8);
    }

    #[test]
    fn test_procprio_layout() {
        let mut pkt = CtrlPacket::new();
        let size = pkt.pack_procprio(&ProcPrio {
            pid: 1234,
            uid: 10_057,
            oomadj: 900,
            ptype: ProcType::Service,
        });
        assert_eq!(size, 20);
        assert_eq!(
            pkt.bytes(size),
            &[
                0, 0, 0, 1, // LMK_PROCPRIO
                0, 0, 0x04, 0xd2, // 1234
                0, 0, 0x27, 0x49, // 10057
                0, 0, 0x03, 0x84, // 900
                0, 0, 0, 1, // service
            ]
        );
    }

    #[test]
    fn test_negative_oomadj_is_twos_complement() {
        let mut pkt = CtrlPacket::new();
        let size = pkt.pack_procprio(&ProcPrio {
            pid: 1,
            uid: 0,
            oomadj: -1000,
            ptype: ProcType::App,
        });
        assert_eq!(&pkt.bytes(size)[12..16], &(-1000i32).to_be_bytes());
    }

    #[test]
    fn test_procremove_and_update_props_sizes() {
        let mut pkt = CtrlPacket::new();
        assert_eq!(pkt.pack_procremove(&ProcRemove { pid: 77 }), 8);
        assert_eq!(LmkCmd::from_i32(pkt.get_cmd()), Some(LmkCmd::ProcRemove));

        assert_eq!(pkt.pack_update_props(), 4);
        assert_eq!(pkt.get_cmd(), LmkCmd::UpdateProps as i32);
    }

    #[test]
    fn test_update_props_reply_decode() {
        let mut pkt = CtrlPacket::new();
        pkt.as_mut_bytes()[..8].copy_from_slice(&[0, 0, 0, 7, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(pkt.get_cmd(), LmkCmd::UpdateProps as i32);
        assert_eq!(pkt.get_update_props_reply(), UpdatePropsReply { result: -1 });
    }

    #[test]
    fn test_bytes_clamped() {
        let pkt = CtrlPacket::new();
        assert_eq!(pkt.bytes(1000).len(), CTRL_PACKET_MAX_SIZE);
    }

    #[test]
    fn test_proc_type_parse() {
        assert_eq!("app".parse::<ProcType>(), Ok(ProcType::App));
        assert_eq!("service".parse::<ProcType>(), Ok(ProcType::Service));
        assert!("daemon".parse::<ProcType>().is_err());
    }

    #[test]
    fn test_debug_names_command() {
        let mut pkt = CtrlPacket::new();
        pkt.pack_update_props();
        assert_eq!(format!("{:?}", pkt), "CtrlPacket(LMK_UPDATE_PROPS)");
    }
}
