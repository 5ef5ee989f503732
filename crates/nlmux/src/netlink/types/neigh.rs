//! Neighbor (ARP/NDP) message types.

use std::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::netlink::attr::attr_kinds;

/// Neighbor message (struct ndmsg).
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
pub struct NdMsg {
    /// Address family.
    pub ndm_family: u8,
    /// Padding.
    pub ndm_pad1: u8,
    /// Padding.
    pub ndm_pad2: u16,
    /// Interface index.
    pub ndm_ifindex: i32,
    /// Neighbor state (NUD_*).
    pub ndm_state: u16,
    /// Neighbor flags (NTF_*).
    pub ndm_flags: u8,
    /// Neighbor type.
    pub ndm_type: u8,
}

impl NdMsg {
    /// Size of this structure.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Create a new neighbor message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the address family.
    pub fn with_family(mut self, family: u8) -> Self {
        self.ndm_family = family;
        self
    }

    /// Set the interface index.
    pub fn with_ifindex(mut self, ifindex: i32) -> Self {
        self.ndm_ifindex = ifindex;
        self
    }

    /// Set the neighbor state.
    pub fn with_state(mut self, state: u16) -> Self {
        self.ndm_state = state;
        self
    }

    /// Set the neighbor flags.
    pub fn with_flags(mut self, flags: u8) -> Self {
        self.ndm_flags = flags;
        self
    }
}

attr_kinds! {
    /// Neighbor attributes (NDA_*).
    pub enum Nda ("neighbor", max = 18) {
        Unspec = 0 => "unspec",
        Dst = 1 => "dst",
        Lladdr = 2 => "lladdr",
        Cacheinfo = 3 => "cacheinfo",
        Probes = 4 => "probes",
        Vlan = 5 => "vlan",
        Port = 6 => "port",
        Vni = 7 => "vni",
        Ifindex = 8 => "ifindex",
        Master = 9 => "master",
        LinkNetnsid = 10 => "link_netnsid",
        SrcVni = 11 => "src_vni",
        Protocol = 12 => "protocol",
        NhId = 13 => "nh_id",
        FdbExtAttrs = 14 => "fdb_ext_attrs",
        FlagsExt = 15 => "flags_ext",
        NdmStateMask = 16 => "ndm_state_mask",
        NdmFlagsMask = 17 => "ndm_flags_mask",
    }
}

/// Neighbor state (NUD_*).
pub mod nud {
    pub const NONE: u16 = 0x00;
    pub const INCOMPLETE: u16 = 0x01;
    pub const REACHABLE: u16 = 0x02;
    pub const STALE: u16 = 0x04;
    pub const DELAY: u16 = 0x08;
    pub const PROBE: u16 = 0x10;
    pub const FAILED: u16 = 0x20;
    pub const NOARP: u16 = 0x40;
    pub const PERMANENT: u16 = 0x80;
}

/// Render a NUD_* state bitmask, e.g. `REACHABLE` or `STALE|NOARP`.
pub fn nud_state_names(state: u16) -> String {
    const NAMES: &[(u16, &str)] = &[
        (nud::INCOMPLETE, "INCOMPLETE"),
        (nud::REACHABLE, "REACHABLE"),
        (nud::STALE, "STALE"),
        (nud::DELAY, "DELAY"),
        (nud::PROBE, "PROBE"),
        (nud::FAILED, "FAILED"),
        (nud::NOARP, "NOARP"),
        (nud::PERMANENT, "PERMANENT"),
    ];
    if state == nud::NONE {
        return "NONE".to_string();
    }
    let mut out: Vec<String> = NAMES
        .iter()
        .filter(|(bit, _)| state & bit != 0)
        .map(|(_, name)| name.to_string())
        .collect();
    let known = NAMES.iter().fold(0u16, |acc, (bit, _)| acc | bit);
    if state & !known != 0 {
        out.push(format!("{:#x}", state & !known));
    }
    out.join("|")
}

/// Neighbor flags (NTF_*).
pub mod ntf {
    pub const USE: u8 = 0x01;
    pub const SELF: u8 = 0x02;
    pub const MASTER: u8 = 0x04;
    pub const PROXY: u8 = 0x08;
    pub const EXT_LEARNED: u8 = 0x10;
    pub const OFFLOADED: u8 = 0x20;
    pub const STICKY: u8 = 0x40;
    pub const ROUTER: u8 = 0x80;
}

/// Neighbor cache info (struct nda_cacheinfo).
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
pub struct NdaCacheInfo {
    pub ndm_confirmed: u32,
    pub ndm_used: u32,
    pub ndm_updated: u32,
    pub ndm_refcnt: u32,
}

impl fmt::Display for NdaCacheInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "used {}/{}/{} refcnt {}",
            self.ndm_used, self.ndm_confirmed, self.ndm_updated, self.ndm_refcnt
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nud_state_names() {
        assert_eq!(nud_state_names(nud::REACHABLE), "REACHABLE");
        assert_eq!(nud_state_names(nud::STALE | nud::NOARP), "STALE|NOARP");
        assert_eq!(nud_state_names(0), "NONE");
    }
}
