//! Name tables for protocol numbers, scopes, tables and families.

/// Get the name of a routing protocol.
pub fn protocol_name(id: u8) -> &'static str {
    match id {
        0 => "unspec",
        1 => "redirect",
        2 => "kernel",
        3 => "boot",
        4 => "static",
        8 => "gated",
        9 => "ra",
        10 => "mrt",
        11 => "zebra",
        12 => "bird",
        13 => "dnrouted",
        14 => "xorp",
        15 => "ntk",
        16 => "dhcp",
        17 => "mrouted",
        18 => "keepalived",
        42 => "babel",
        99 => "openr",
        186 => "bgp",
        187 => "isis",
        188 => "ospf",
        189 => "rip",
        192 => "eigrp",
        _ => "unknown",
    }
}

/// Get the name of a route scope.
pub fn scope_name(id: u8) -> &'static str {
    match id {
        0 => "global",
        200 => "site",
        253 => "link",
        254 => "host",
        255 => "nowhere",
        _ => "unknown",
    }
}

/// Get the name of a routing table.
pub fn table_name(id: u32) -> String {
    match id {
        0 => "unspec".to_string(),
        252 => "compat".to_string(),
        253 => "default".to_string(),
        254 => "main".to_string(),
        255 => "local".to_string(),
        _ => id.to_string(),
    }
}

/// Get the name of a route type.
pub fn route_type_name(id: u8) -> &'static str {
    match id {
        0 => "unspec",
        1 => "unicast",
        2 => "local",
        3 => "broadcast",
        4 => "anycast",
        5 => "multicast",
        6 => "blackhole",
        7 => "unreachable",
        8 => "prohibit",
        9 => "throw",
        10 => "nat",
        11 => "xresolve",
        _ => "unknown",
    }
}

/// Get the name of an address family, if it has one.
pub fn family(id: u8) -> Option<&'static str> {
    match id {
        0 => Some("unspec"),
        1 => Some("unix"),
        2 => Some("inet"),
        7 => Some("bridge"),
        10 => Some("inet6"),
        16 => Some("netlink"),
        17 => Some("packet"),
        28 => Some("mpls"),
        _ => None,
    }
}

/// Get the name of an address family.
pub fn family_name(id: u8) -> &'static str {
    family(id).unwrap_or("unknown")
}

/// Get the name of a link-layer device type (ARPHRD_*).
pub fn link_type_name(id: u16) -> &'static str {
    match id {
        1 => "ether",
        24 => "ieee1394",
        32 => "infiniband",
        65534 => "none",
        768 => "ipip",
        769 => "tunnel6",
        772 => "loopback",
        776 => "sit",
        778 => "gre",
        823 => "ip6gre",
        801 => "ieee80211",
        803 => "ieee80211_radiotap",
        519 => "can",
        _ => "unknown",
    }
}
