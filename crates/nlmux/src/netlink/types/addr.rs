//! Address message types.

use std::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::netlink::attr::attr_kinds;

/// Interface address message (struct ifaddrmsg).
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
pub struct IfAddrMsg {
    /// Address family (AF_INET, AF_INET6).
    pub ifa_family: u8,
    /// Prefix length.
    pub ifa_prefixlen: u8,
    /// Address flags (IFA_F_*), low 8 bits only.
    pub ifa_flags: u8,
    /// Address scope.
    pub ifa_scope: u8,
    /// Interface index.
    pub ifa_index: u32,
}

impl IfAddrMsg {
    /// Size of this structure.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Create a new address message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the address family.
    pub fn with_family(mut self, family: u8) -> Self {
        self.ifa_family = family;
        self
    }

    /// Set the prefix length.
    pub fn with_prefixlen(mut self, prefixlen: u8) -> Self {
        self.ifa_prefixlen = prefixlen;
        self
    }

    /// Set the interface index.
    pub fn with_index(mut self, index: u32) -> Self {
        self.ifa_index = index;
        self
    }

    /// Set the scope.
    pub fn with_scope(mut self, scope: u8) -> Self {
        self.ifa_scope = scope;
        self
    }
}

attr_kinds! {
    /// Interface address attributes (IFA_*).
    pub enum Ifa ("address", max = 12) {
        Unspec = 0 => "unspec",
        Address = 1 => "address",
        Local = 2 => "local",
        Label = 3 => "label",
        Broadcast = 4 => "broadcast",
        Anycast = 5 => "anycast",
        Cacheinfo = 6 => "cacheinfo",
        Multicast = 7 => "multicast",
        Flags = 8 => "flags",
        RtPriority = 9 => "rt_priority",
        TargetNetnsid = 10 => "target_netnsid",
        Proto = 11 => "proto",
    }
}

/// Address flags (IFA_F_*).
pub mod ifa_flags {
    pub const SECONDARY: u32 = 0x01;
    pub const NODAD: u32 = 0x02;
    pub const OPTIMISTIC: u32 = 0x04;
    pub const DADFAILED: u32 = 0x08;
    pub const HOMEADDRESS: u32 = 0x10;
    pub const DEPRECATED: u32 = 0x20;
    pub const TENTATIVE: u32 = 0x40;
    pub const PERMANENT: u32 = 0x80;
    pub const MANAGETEMPADDR: u32 = 0x100;
    pub const NOPREFIXROUTE: u32 = 0x200;
    pub const MCAUTOJOIN: u32 = 0x400;
    pub const STABLE_PRIVACY: u32 = 0x800;
}

/// Render IFA_F_* flags as space-separated `ip addr` keywords.
pub fn ifa_flag_names(flags: u32) -> String {
    use ifa_flags::*;
    const NAMES: &[(u32, &str)] = &[
        (SECONDARY, "secondary"),
        (NODAD, "nodad"),
        (OPTIMISTIC, "optimistic"),
        (DADFAILED, "dadfailed"),
        (HOMEADDRESS, "homeaddress"),
        (DEPRECATED, "deprecated"),
        (TENTATIVE, "tentative"),
        (PERMANENT, "permanent"),
        (MANAGETEMPADDR, "mngtmpaddr"),
        (NOPREFIXROUTE, "noprefixroute"),
        (MCAUTOJOIN, "autojoin"),
        (STABLE_PRIVACY, "stable-privacy"),
    ];
    let mut out: Vec<String> = NAMES
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, name)| name.to_string())
        .collect();
    let known = NAMES.iter().fold(0u32, |acc, (bit, _)| acc | bit);
    if flags & !known != 0 {
        out.push(format!("{:#x}", flags & !known));
    }
    if out.is_empty() {
        return "0".to_string();
    }
    out.join(" ")
}

/// Address cache info (struct ifa_cacheinfo).
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
pub struct IfaCacheInfo {
    /// Preferred lifetime in seconds.
    pub ifa_prefered: u32,
    /// Valid lifetime in seconds.
    pub ifa_valid: u32,
    pub cstamp: u32,
    pub tstamp: u32,
}

impl IfaCacheInfo {
    /// Lifetime value meaning "never expires".
    pub const INFINITY: u32 = u32::MAX;
}

fn lifetime(f: &mut fmt::Formatter<'_>, secs: u32) -> fmt::Result {
    if secs == IfaCacheInfo::INFINITY {
        f.write_str("forever")
    } else {
        write!(f, "{}sec", secs)
    }
}

impl fmt::Display for IfaCacheInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("valid_lft ")?;
        lifetime(f, self.ifa_valid)?;
        f.write_str(" preferred_lft ")?;
        lifetime(f, self.ifa_prefered)?;
        write!(f, " cstamp {} tstamp {}", self.cstamp, self.tstamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_names() {
        assert_eq!(
            ifa_flag_names(ifa_flags::PERMANENT | ifa_flags::NOPREFIXROUTE),
            "permanent noprefixroute"
        );
        assert_eq!(ifa_flag_names(0), "0");
        assert_eq!(ifa_flag_names(0x10000), "0x10000");
    }

    #[test]
    fn test_cacheinfo_display() {
        let info = IfaCacheInfo {
            ifa_prefered: 3600,
            ifa_valid: IfaCacheInfo::INFINITY,
            cstamp: 1,
            tstamp: 2,
        };
        assert_eq!(
            info.to_string(),
            "valid_lft forever preferred_lft 3600sec cstamp 1 tstamp 2"
        );
    }
}
