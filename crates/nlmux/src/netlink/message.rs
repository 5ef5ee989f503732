//! Netlink message header and datagram framing.

use super::error::{Error, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Netlink message header alignment.
pub const NLMSG_ALIGNTO: usize = 4;

/// Align a length to NLMSG_ALIGNTO boundary.
#[inline]
pub const fn nlmsg_align(len: usize) -> usize {
    (len + NLMSG_ALIGNTO - 1) & !(NLMSG_ALIGNTO - 1)
}

/// Size of the netlink message header.
pub const NLMSG_HDRLEN: usize = nlmsg_align(std::mem::size_of::<NlMsgHdr>());

/// Netlink message header (mirrors struct nlmsghdr).
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
pub struct NlMsgHdr {
    /// Length of message including header.
    pub nlmsg_len: u32,
    /// Message type.
    pub nlmsg_type: u16,
    /// Additional flags.
    pub nlmsg_flags: u16,
    /// Sequence number.
    pub nlmsg_seq: u32,
    /// Sending process port ID.
    pub nlmsg_pid: u32,
}

impl NlMsgHdr {
    /// Create a new message header.
    pub fn new(msg_type: u16, flags: u16) -> Self {
        Self {
            nlmsg_len: NLMSG_HDRLEN as u32,
            nlmsg_type: msg_type,
            nlmsg_flags: flags,
            nlmsg_seq: 0,
            nlmsg_pid: 0,
        }
    }

    /// Check if this is an error message.
    pub fn is_error(&self) -> bool {
        self.nlmsg_type == NlMsgType::ERROR
    }

    /// Check if this is a done message.
    pub fn is_done(&self) -> bool {
        self.nlmsg_type == NlMsgType::DONE
    }

    /// Check if this message has the multi flag.
    pub fn is_multi(&self) -> bool {
        self.nlmsg_flags & NLM_F_MULTI != 0
    }

    /// Convert header to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Copy a header out of the front of `data`.
    pub fn read(data: &[u8]) -> Result<Self> {
        Self::read_from_prefix(data)
            .map(|(h, _)| h)
            .map_err(|_| Error::Truncated {
                expected: NLMSG_HDRLEN,
                actual: data.len(),
            })
    }
}

/// Standard netlink message types.
pub struct NlMsgType;

impl NlMsgType {
    /// No operation, message must be discarded.
    pub const NOOP: u16 = 1;
    /// Error message or ACK.
    pub const ERROR: u16 = 2;
    /// End of multipart message.
    pub const DONE: u16 = 3;
    /// Data lost, request resend.
    pub const OVERRUN: u16 = 4;

    // Link messages
    pub const RTM_NEWLINK: u16 = 16;
    pub const RTM_DELLINK: u16 = 17;
    pub const RTM_GETLINK: u16 = 18;
    pub const RTM_SETLINK: u16 = 19;

    // Address messages
    pub const RTM_NEWADDR: u16 = 20;
    pub const RTM_DELADDR: u16 = 21;
    pub const RTM_GETADDR: u16 = 22;

    // Route messages
    pub const RTM_NEWROUTE: u16 = 24;
    pub const RTM_DELROUTE: u16 = 25;
    pub const RTM_GETROUTE: u16 = 26;

    // Neighbor messages
    pub const RTM_NEWNEIGH: u16 = 28;
    pub const RTM_DELNEIGH: u16 = 29;
    pub const RTM_GETNEIGH: u16 = 30;

    // Netns messages
    pub const RTM_NEWNSID: u16 = 88;
    pub const RTM_DELNSID: u16 = 89;
    pub const RTM_GETNSID: u16 = 90;

    /// Human-readable name of a message type.
    pub fn name(msg_type: u16) -> &'static str {
        match msg_type {
            Self::NOOP => "noop",
            Self::ERROR => "error",
            Self::DONE => "done",
            Self::OVERRUN => "overrun",
            Self::RTM_NEWLINK => "new link",
            Self::RTM_DELLINK => "del link",
            Self::RTM_GETLINK => "get link",
            Self::RTM_SETLINK => "set link",
            Self::RTM_NEWADDR => "new addr",
            Self::RTM_DELADDR => "del addr",
            Self::RTM_GETADDR => "get addr",
            Self::RTM_NEWROUTE => "new route",
            Self::RTM_DELROUTE => "del route",
            Self::RTM_GETROUTE => "get route",
            Self::RTM_NEWNEIGH => "new neighbor",
            Self::RTM_DELNEIGH => "del neighbor",
            Self::RTM_GETNEIGH => "get neighbor",
            Self::RTM_NEWNSID => "new nsid",
            Self::RTM_DELNSID => "del nsid",
            Self::RTM_GETNSID => "get nsid",
            _ => "unknown",
        }
    }
}

/// Netlink message flags.
pub const NLM_F_REQUEST: u16 = 0x01;
pub const NLM_F_MULTI: u16 = 0x02;
pub const NLM_F_ACK: u16 = 0x04;
pub const NLM_F_ECHO: u16 = 0x08;
pub const NLM_F_DUMP_INTR: u16 = 0x10;
pub const NLM_F_DUMP_FILTERED: u16 = 0x20;

// Modifiers to GET request
pub const NLM_F_ROOT: u16 = 0x100;
pub const NLM_F_MATCH: u16 = 0x200;
pub const NLM_F_ATOMIC: u16 = 0x400;
pub const NLM_F_DUMP: u16 = NLM_F_ROOT | NLM_F_MATCH;

// Modifiers to NEW request
pub const NLM_F_REPLACE: u16 = 0x100;
pub const NLM_F_EXCL: u16 = 0x200;
pub const NLM_F_CREATE: u16 = 0x400;
pub const NLM_F_APPEND: u16 = 0x800;

/// Render header flags as `|`-joined names.
pub fn flag_names(flags: u16) -> String {
    const NAMES: &[(u16, &str)] = &[
        (NLM_F_REQUEST, "request"),
        (NLM_F_MULTI, "multi"),
        (NLM_F_ACK, "ack"),
        (NLM_F_ECHO, "echo"),
        (NLM_F_DUMP_INTR, "dump-intr"),
        (NLM_F_DUMP_FILTERED, "dump-filtered"),
        (NLM_F_ROOT, "root"),
        (NLM_F_MATCH, "match"),
        (NLM_F_ATOMIC, "atomic"),
        (NLM_F_APPEND, "append"),
    ];
    let mut out = Vec::new();
    let mut rest = flags;
    for &(bit, name) in NAMES {
        if flags & bit != 0 {
            out.push(name.to_string());
            rest &= !bit;
        }
    }
    if rest != 0 {
        out.push(format!("{:#x}", rest));
    }
    out.join(" | ")
}

/// Iterator over the messages packed into one datagram.
///
/// Each item is the complete message span, header included, cut to the
/// header's declared length. A declared length that is shorter than a
/// header or longer than the remaining bytes ends the walk with an error.
pub struct MessageIter<'a> {
    data: &'a [u8],
}

impl<'a> MessageIter<'a> {
    /// Create a new message iterator.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for MessageIter<'a> {
    type Item = Result<&'a [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.is_empty() {
            return None;
        }

        let header = match NlMsgHdr::read(self.data) {
            Ok(h) => h,
            Err(e) => {
                self.data = &[];
                return Some(Err(e));
            }
        };

        let msg_len = header.nlmsg_len as usize;
        if msg_len < NLMSG_HDRLEN || msg_len > self.data.len() {
            let actual = self.data.len();
            self.data = &[];
            return Some(Err(Error::Truncated {
                expected: msg_len.max(NLMSG_HDRLEN),
                actual,
            }));
        }

        let msg = &self.data[..msg_len];
        let aligned_len = nlmsg_align(msg_len);

        // Trailing padding after the last message may be absent.
        if aligned_len >= self.data.len() {
            self.data = &[];
        } else {
            self.data = &self.data[aligned_len..];
        }

        Some(Ok(msg))
    }
}

/// Netlink error message payload.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
pub struct NlMsgError {
    /// Error code (negative errno or 0 for ACK).
    pub error: i32,
    /// Original message header that caused the error.
    pub msg: NlMsgHdr,
}

impl NlMsgError {
    /// Size of this structure.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}
