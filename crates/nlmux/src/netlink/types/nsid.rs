//! Namespace ID netlink message types and constants.
//!
//! Used by RTM_NEWNSID, RTM_DELNSID and RTM_GETNSID, which map network
//! namespaces to the ids the kernel tags cross-namespace messages with.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::netlink::attr::attr_kinds;

attr_kinds! {
    /// Namespace id attributes (NETNSA_*).
    pub enum Netnsa ("netns", max = 6) {
        None = 0 => "none",
        Nsid = 1 => "nsid",
        Pid = 2 => "pid",
        Fd = 3 => "fd",
        TargetNsid = 4 => "target_nsid",
        CurrentNsid = 5 => "current_nsid",
    }
}

/// NETNSA_NSID value for a namespace without an assigned id.
pub const NETNSA_NSID_NOT_ASSIGNED: i32 = -1;

/// Multicast group for namespace id events.
pub const RTNLGRP_NSID: u32 = 28;

/// rtgenmsg, padded to the 4-byte netlink alignment.
///
/// Body of RTM_*NSID messages and of generic dump requests.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
pub struct RtGenMsg {
    /// Address family (usually AF_UNSPEC = 0).
    pub rtgen_family: u8,
    /// Padding.
    pub rtgen_pad: [u8; 3],
}

impl RtGenMsg {
    /// Size of this structure.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Create a new rtgenmsg with AF_UNSPEC family.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a specific address family.
    pub fn with_family(family: u8) -> Self {
        Self {
            rtgen_family: family,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::attr::AttrKind;

    #[test]
    fn test_padded_size() {
        assert_eq!(RtGenMsg::SIZE, 4);
        assert_eq!(RtGenMsg::with_family(2).as_bytes(), &[2, 0, 0, 0]);
    }

    #[test]
    fn test_netnsa_table() {
        assert_eq!(Netnsa::MAX, 6);
        assert_eq!(Netnsa::name(3), Some("fd"));
    }
}
