//! Route message types.

use std::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::netlink::attr::attr_kinds;

/// Route message (struct rtmsg).
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
pub struct RtMsg {
    /// Address family.
    pub rtm_family: u8,
    /// Destination prefix length.
    pub rtm_dst_len: u8,
    /// Source prefix length.
    pub rtm_src_len: u8,
    /// TOS filter.
    pub rtm_tos: u8,
    /// Routing table ID.
    pub rtm_table: u8,
    /// Routing protocol (RTPROT_*).
    pub rtm_protocol: u8,
    /// Route scope (RT_SCOPE_*).
    pub rtm_scope: u8,
    /// Route type (RTN_*).
    pub rtm_type: u8,
    /// Route flags.
    pub rtm_flags: u32,
}

impl RtMsg {
    /// Size of this structure.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Create a new route message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the address family.
    pub fn with_family(mut self, family: u8) -> Self {
        self.rtm_family = family;
        self
    }

    /// Set the destination prefix length.
    pub fn with_dst_len(mut self, len: u8) -> Self {
        self.rtm_dst_len = len;
        self
    }

    /// Set the routing table.
    pub fn with_table(mut self, table: u8) -> Self {
        self.rtm_table = table;
        self
    }

    /// Set the protocol.
    pub fn with_protocol(mut self, protocol: u8) -> Self {
        self.rtm_protocol = protocol;
        self
    }

    /// Set the scope.
    pub fn with_scope(mut self, scope: u8) -> Self {
        self.rtm_scope = scope;
        self
    }

    /// Set the route type.
    pub fn with_type(mut self, rtype: u8) -> Self {
        self.rtm_type = rtype;
        self
    }
}

attr_kinds! {
    /// Route attributes (RTA_*).
    pub enum Rta ("route", max = 32) {
        Unspec = 0 => "unspec",
        Dst = 1 => "dst",
        Src = 2 => "src",
        Iif = 3 => "iif",
        Oif = 4 => "oif",
        Gateway = 5 => "gateway",
        Priority = 6 => "priority",
        Prefsrc = 7 => "prefsrc",
        Metrics = 8 => "metrics",
        Multipath = 9 => "multipath",
        Protoinfo = 10 => "protoinfo",
        Flow = 11 => "flow",
        Cacheinfo = 12 => "cacheinfo",
        Session = 13 => "session",
        MpAlgo = 14 => "mp_algo",
        Table = 15 => "table",
        Mark = 16 => "mark",
        MfcStats = 17 => "mfc_stats",
        Via = 18 => "via",
        Newdst = 19 => "newdst",
        Pref = 20 => "pref",
        EncapType = 21 => "encap_type",
        Encap = 22 => "encap",
        Expires = 23 => "expires",
        Pad = 24 => "pad",
        Uid = 25 => "uid",
        TtlPropagate = 26 => "ttl_propagate",
        IpProto = 27 => "ip_proto",
        Sport = 28 => "sport",
        Dport = 29 => "dport",
        NhId = 30 => "nh_id",
        Flowlabel = 31 => "flowlabel",
    }
}

/// Route table IDs.
pub mod rt_table {
    pub const UNSPEC: u8 = 0;
    pub const COMPAT: u8 = 252;
    pub const DEFAULT: u8 = 253;
    pub const MAIN: u8 = 254;
    pub const LOCAL: u8 = 255;
}

/// Route flags.
pub mod rtm_flags {
    pub const NOTIFY: u32 = 0x100;
    pub const CLONED: u32 = 0x200;
    pub const EQUALIZE: u32 = 0x400;
    pub const PREFIX: u32 = 0x800;
    pub const LOOKUP_TABLE: u32 = 0x1000;
    pub const FIB_MATCH: u32 = 0x2000;
    pub const OFFLOAD: u32 = 0x4000;
    pub const TRAP: u32 = 0x8000;
    pub const OFFLOAD_FAILED: u32 = 0x20000000;
}

/// Route cache info (struct rta_cacheinfo).
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
pub struct RtaCacheInfo {
    pub rta_clntref: u32,
    pub rta_lastuse: u32,
    /// Remaining lifetime in jiffies; zero when the route does not expire.
    pub rta_expires: i32,
    pub rta_error: u32,
    pub rta_used: u32,
    pub rta_id: u32,
    pub rta_ts: u32,
    pub rta_tsage: u32,
}

impl fmt::Display for RtaCacheInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "clntref {} lastuse {} expires {} error {} used {}",
            self.rta_clntref, self.rta_lastuse, self.rta_expires, self.rta_error, self.rta_used
        )
    }
}
