//! Link (network interface) message types.

use std::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::netlink::attr::attr_kinds;

/// Interface info message (struct ifinfomsg).
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
pub struct IfInfoMsg {
    /// Address family (usually AF_UNSPEC).
    pub ifi_family: u8,
    /// Padding.
    pub __ifi_pad: u8,
    /// Device type (ARPHRD_*).
    pub ifi_type: u16,
    /// Interface index.
    pub ifi_index: i32,
    /// Device flags (IFF_*).
    pub ifi_flags: u32,
    /// Change mask.
    pub ifi_change: u32,
}

impl IfInfoMsg {
    /// Size of this structure.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Create a new interface info message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interface index.
    pub fn with_index(mut self, index: i32) -> Self {
        self.ifi_index = index;
        self
    }

    /// Set the address family.
    pub fn with_family(mut self, family: u8) -> Self {
        self.ifi_family = family;
        self
    }

    /// Set the device type.
    pub fn with_type(mut self, ty: u16) -> Self {
        self.ifi_type = ty;
        self
    }

    /// Set the device flags and change mask.
    pub fn with_flags(mut self, flags: u32, change: u32) -> Self {
        self.ifi_flags = flags;
        self.ifi_change = change;
        self
    }
}

attr_kinds! {
    /// Interface link attributes (IFLA_*).
    pub enum Ifla ("link", max = 70) {
        Unspec = 0 => "unspec",
        Address = 1 => "address",
        Broadcast = 2 => "broadcast",
        Ifname = 3 => "ifname",
        Mtu = 4 => "mtu",
        Link = 5 => "link",
        Qdisc = 6 => "qdisc",
        Stats = 7 => "stats",
        Cost = 8 => "cost",
        Priority = 9 => "priority",
        Master = 10 => "master",
        Wireless = 11 => "wireless",
        Protinfo = 12 => "protinfo",
        TxqLen = 13 => "txqlen",
        Map = 14 => "map",
        Weight = 15 => "weight",
        Operstate = 16 => "operstate",
        Linkmode = 17 => "linkmode",
        Linkinfo = 18 => "linkinfo",
        NetNsPid = 19 => "net_ns_pid",
        Ifalias = 20 => "ifalias",
        NumVf = 21 => "num_vf",
        VfinfoList = 22 => "vfinfo_list",
        Stats64 = 23 => "stats64",
        VfPorts = 24 => "vf_ports",
        PortSelf = 25 => "port_self",
        AfSpec = 26 => "af_spec",
        Group = 27 => "group",
        NetNsFd = 28 => "net_ns_fd",
        ExtMask = 29 => "ext_mask",
        Promiscuity = 30 => "promiscuity",
        NumTxQueues = 31 => "num_tx_queues",
        NumRxQueues = 32 => "num_rx_queues",
        Carrier = 33 => "carrier",
        PhysPortId = 34 => "phys_port_id",
        CarrierChanges = 35 => "carrier_changes",
        PhysSwitchId = 36 => "phys_switch_id",
        LinkNetnsid = 37 => "link_netnsid",
        PhysPortName = 38 => "phys_port_name",
        ProtoDown = 39 => "proto_down",
        GsoMaxSegs = 40 => "gso_max_segs",
        GsoMaxSize = 41 => "gso_max_size",
        Pad = 42 => "pad",
        Xdp = 43 => "xdp",
        Event = 44 => "event",
        NewNetnsid = 45 => "new_netnsid",
        IfNetnsid = 46 => "if_netnsid",
        CarrierUpCount = 47 => "carrier_up_count",
        CarrierDownCount = 48 => "carrier_down_count",
        NewIfindex = 49 => "new_ifindex",
        MinMtu = 50 => "min_mtu",
        MaxMtu = 51 => "max_mtu",
        PropList = 52 => "prop_list",
        AltIfname = 53 => "alt_ifname",
        PermAddress = 54 => "perm_address",
        ProtoDownReason = 55 => "proto_down_reason",
        ParentDevName = 56 => "parent_dev_name",
        ParentDevBusName = 57 => "parent_dev_bus_name",
        GroMaxSize = 58 => "gro_max_size",
        TsoMaxSize = 59 => "tso_max_size",
        TsoMaxSegs = 60 => "tso_max_segs",
        Allmulti = 61 => "allmulti",
        DevlinkPort = 62 => "devlink_port",
        GsoIpv4MaxSize = 63 => "gso_ipv4_max_size",
        GroIpv4MaxSize = 64 => "gro_ipv4_max_size",
        DpllPin = 65 => "dpll_pin",
        MaxPacingOffloadHorizon = 66 => "max_pacing_offload_horizon",
        NetnsImmutable = 67 => "netns_immutable",
        Headroom = 68 => "headroom",
        Tailroom = 69 => "tailroom",
    }
}

/// Interface flags (IFF_*).
pub mod iff {
    pub const UP: u32 = 1 << 0;
    pub const BROADCAST: u32 = 1 << 1;
    pub const DEBUG: u32 = 1 << 2;
    pub const LOOPBACK: u32 = 1 << 3;
    pub const POINTOPOINT: u32 = 1 << 4;
    pub const NOTRAILERS: u32 = 1 << 5;
    pub const RUNNING: u32 = 1 << 6;
    pub const NOARP: u32 = 1 << 7;
    pub const PROMISC: u32 = 1 << 8;
    pub const ALLMULTI: u32 = 1 << 9;
    pub const MASTER: u32 = 1 << 10;
    pub const SLAVE: u32 = 1 << 11;
    pub const MULTICAST: u32 = 1 << 12;
    pub const PORTSEL: u32 = 1 << 13;
    pub const AUTOMEDIA: u32 = 1 << 14;
    pub const DYNAMIC: u32 = 1 << 15;
    pub const LOWER_UP: u32 = 1 << 16;
    pub const DORMANT: u32 = 1 << 17;
    pub const ECHO: u32 = 1 << 18;
}

/// Render IFF_* flags in `ip link` style, e.g. `UP,LOWER_UP`.
pub fn iff_names(flags: u32) -> String {
    const NAMES: &[(u32, &str)] = &[
        (iff::UP, "UP"),
        (iff::BROADCAST, "BROADCAST"),
        (iff::DEBUG, "DEBUG"),
        (iff::LOOPBACK, "LOOPBACK"),
        (iff::POINTOPOINT, "POINTOPOINT"),
        (iff::NOTRAILERS, "NOTRAILERS"),
        (iff::RUNNING, "RUNNING"),
        (iff::NOARP, "NOARP"),
        (iff::PROMISC, "PROMISC"),
        (iff::ALLMULTI, "ALLMULTI"),
        (iff::MASTER, "MASTER"),
        (iff::SLAVE, "SLAVE"),
        (iff::MULTICAST, "MULTICAST"),
        (iff::PORTSEL, "PORTSEL"),
        (iff::AUTOMEDIA, "AUTOMEDIA"),
        (iff::DYNAMIC, "DYNAMIC"),
        (iff::LOWER_UP, "LOWER_UP"),
        (iff::DORMANT, "DORMANT"),
        (iff::ECHO, "ECHO"),
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
    out.join(",")
}

/// Operational state (IF_OPER_*).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OperState {
    Unknown = 0,
    NotPresent = 1,
    Down = 2,
    LowerLayerDown = 3,
    Testing = 4,
    Dormant = 5,
    Up = 6,
}

impl TryFrom<u8> for OperState {
    type Error = u8;

    fn try_from(val: u8) -> Result<Self, u8> {
        match val {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::NotPresent),
            2 => Ok(Self::Down),
            3 => Ok(Self::LowerLayerDown),
            4 => Ok(Self::Testing),
            5 => Ok(Self::Dormant),
            6 => Ok(Self::Up),
            other => Err(other),
        }
    }
}

impl OperState {
    /// Get the name of this state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::NotPresent => "NOTPRESENT",
            Self::Down => "DOWN",
            Self::LowerLayerDown => "LOWERLAYERDOWN",
            Self::Testing => "TESTING",
            Self::Dormant => "DORMANT",
            Self::Up => "UP",
        }
    }
}

/// Interface counters (struct rtnl_link_stats).
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
pub struct LinkStats {
    pub rx_packets: u32,
    pub tx_packets: u32,
    pub rx_bytes: u32,
    pub tx_bytes: u32,
    pub rx_errors: u32,
    pub tx_errors: u32,
    pub rx_dropped: u32,
    pub tx_dropped: u32,
    pub multicast: u32,
    pub collisions: u32,
    pub rx_length_errors: u32,
    pub rx_over_errors: u32,
    pub rx_crc_errors: u32,
    pub rx_frame_errors: u32,
    pub rx_fifo_errors: u32,
    pub rx_missed_errors: u32,
    pub tx_aborted_errors: u32,
    pub tx_carrier_errors: u32,
    pub tx_fifo_errors: u32,
    pub tx_heartbeat_errors: u32,
    pub tx_window_errors: u32,
    pub rx_compressed: u32,
    pub tx_compressed: u32,
    pub rx_nohandler: u32,
}

/// 64-bit interface counters (struct rtnl_link_stats64).
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
pub struct LinkStats64 {
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
    pub multicast: u64,
    pub collisions: u64,
    pub rx_length_errors: u64,
    pub rx_over_errors: u64,
    pub rx_crc_errors: u64,
    pub rx_frame_errors: u64,
    pub rx_fifo_errors: u64,
    pub rx_missed_errors: u64,
    pub tx_aborted_errors: u64,
    pub tx_carrier_errors: u64,
    pub tx_fifo_errors: u64,
    pub tx_heartbeat_errors: u64,
    pub tx_window_errors: u64,
    pub rx_compressed: u64,
    pub tx_compressed: u64,
    pub rx_nohandler: u64,
    pub rx_otherhost_dropped: u64,
}

macro_rules! stats_display {
    ($name:ident) => {
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    f,
                    "rx {} bytes {} packets {} errors {} dropped, \
                     tx {} bytes {} packets {} errors {} dropped",
                    self.rx_bytes,
                    self.rx_packets,
                    self.rx_errors,
                    self.rx_dropped,
                    self.tx_bytes,
                    self.tx_packets,
                    self.tx_errors,
                    self.tx_dropped
                )
            }
        }
    };
}

stats_display!(LinkStats);
stats_display!(LinkStats64);

/// Per-interface inet6 cache info (struct ifla_cacheinfo).
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
pub struct IflaCacheInfo {
    pub max_reasm_len: u32,
    /// Creation time in hundredths of a second.
    pub tstamp: u32,
    pub reachable_time: u32,
    pub retrans_time: u32,
}

impl fmt::Display for IflaCacheInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "max_reasm_len {} tstamp {} reachable_time {}ms retrans_time {}ms",
            self.max_reasm_len, self.tstamp, self.reachable_time, self.retrans_time
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::attr::AttrKind;

    #[test]
    fn test_ifla_table() {
        assert_eq!(Ifla::MAX, 70);
        assert_eq!(u16::from(Ifla::Tailroom), Ifla::MAX - 1);
        assert_eq!(Ifla::try_from(26u16), Ok(Ifla::AfSpec));
        assert_eq!(Ifla::name(3), Some("ifname"));
    }

    #[test]
    fn test_iff_names() {
        assert_eq!(iff_names(iff::UP | iff::LOWER_UP), "UP,LOWER_UP");
        assert_eq!(iff_names(iff::LOOPBACK | 1 << 30), "LOOPBACK,0x40000000");
        assert_eq!(iff_names(0), "");
    }

    #[test]
    fn test_oper_state() {
        assert_eq!(OperState::try_from(6u8), Ok(OperState::Up));
        assert_eq!(OperState::try_from(9u8), Err(9));
        assert_eq!(OperState::LowerLayerDown.name(), "LOWERLAYERDOWN");
    }
}
