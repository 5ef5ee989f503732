//! Typed attribute values.
//!
//! [`AttrValue`] is the closed set of shapes an attribute payload can take.
//! Which shape a given `(message kind, attribute kind)` pair decodes to is
//! decided by the per-message dispatch tables in
//! [`messages`](super::messages); this module only knows how each shape is
//! read, written and rendered.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use zerocopy::IntoBytes;

use super::attr::{AttrIter, nla_size, write_attr};
use super::error::{Error, Result};
use super::pool::{self, Pool, Poolable, Pooled};
use super::types::addr::{IfaCacheInfo, ifa_flag_names};
use super::types::link::{IflaCacheInfo, LinkStats, LinkStats64, OperState};
use super::types::neigh::NdaCacheInfo;
use super::types::read_record;
use super::types::route::RtaCacheInfo;
use crate::util::names::{family, family_name};

/// A decoded attribute payload.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// 8-bit unsigned integer.
    U8(u8),
    /// 16-bit unsigned integer, host byte order.
    U16(u16),
    /// 32-bit unsigned integer, host byte order.
    U32(u32),
    /// 8-bit signed integer.
    I8(i8),
    /// 16-bit signed integer, host byte order.
    I16(i16),
    /// 32-bit signed integer, host byte order.
    I32(i32),
    /// 16-bit integer carried in network byte order.
    Be16(u16),
    /// 32-bit integer carried in network byte order.
    Be32(u32),
    /// NUL-terminated string, stored without the terminator.
    Str(String),
    /// Opaque bytes: unknown attributes and unstructured payloads.
    Bytes(Vec<u8>),
    /// Network or link-layer address.
    Addr(Address),
    /// 32-bit interface counters.
    LinkStats(Pooled<LinkStats>),
    /// 64-bit interface counters.
    LinkStats64(Pooled<LinkStats64>),
    /// Address lifetime metadata.
    AddrCacheInfo(IfaCacheInfo),
    /// Route cache metadata.
    RouteCacheInfo(RtaCacheInfo),
    /// Neighbor cache metadata.
    NeighCacheInfo(NdaCacheInfo),
    /// Per-interface inet6 metadata.
    LinkCacheInfo(IflaCacheInfo),
    /// RFC 2863 operational state.
    OperState(OperState),
    /// IFA_F_* address flags.
    AddrFlags(u32),
    /// Recursively nested attribute set.
    Nested(Nest),
    /// Zero-length presence flag.
    Flag,
}

fn short(what: &str, want: usize, data: &[u8]) -> Error {
    Error::InvalidAttribute(format!(
        "{} attribute needs {} bytes, got {}",
        what,
        want,
        data.len()
    ))
}

fn array<const N: usize>(what: &str, data: &[u8]) -> Result<[u8; N]> {
    data.get(..N)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| short(what, N, data))
}

impl AttrValue {
    /// Decode a u8 payload.
    pub fn u8(data: &[u8]) -> Result<Self> {
        Ok(Self::U8(u8::from_ne_bytes(array("u8", data)?)))
    }

    /// Decode a host-order u16 payload.
    pub fn u16(data: &[u8]) -> Result<Self> {
        Ok(Self::U16(u16::from_ne_bytes(array("u16", data)?)))
    }

    /// Decode a host-order u32 payload.
    pub fn u32(data: &[u8]) -> Result<Self> {
        Ok(Self::U32(u32::from_ne_bytes(array("u32", data)?)))
    }

    /// Decode an i8 payload.
    pub fn i8(data: &[u8]) -> Result<Self> {
        Ok(Self::I8(i8::from_ne_bytes(array("i8", data)?)))
    }

    /// Decode a host-order i16 payload.
    pub fn i16(data: &[u8]) -> Result<Self> {
        Ok(Self::I16(i16::from_ne_bytes(array("i16", data)?)))
    }

    /// Decode a host-order i32 payload.
    pub fn i32(data: &[u8]) -> Result<Self> {
        Ok(Self::I32(i32::from_ne_bytes(array("i32", data)?)))
    }

    /// Decode a network-order u16 payload.
    pub fn be16(data: &[u8]) -> Result<Self> {
        Ok(Self::Be16(u16::from_be_bytes(array("be16", data)?)))
    }

    /// Decode a network-order u32 payload.
    pub fn be32(data: &[u8]) -> Result<Self> {
        Ok(Self::Be32(u32::from_be_bytes(array("be32", data)?)))
    }

    /// Decode an IF_OPER_* byte; states this codec does not know stay plain
    /// integers.
    pub fn oper_state(data: &[u8]) -> Result<Self> {
        let raw = u8::from_ne_bytes(array("operstate", data)?);
        Ok(OperState::try_from(raw).map_or(Self::U8(raw), Self::OperState))
    }

    /// Decode a 32-bit IFA_F_* flag word.
    pub fn addr_flags(data: &[u8]) -> Result<Self> {
        Ok(Self::AddrFlags(u32::from_ne_bytes(array("flags", data)?)))
    }

    /// Decode a C string, dropping the trailing NUL.
    ///
    /// A payload that is not UTF-8 is kept whole as [`AttrValue::Bytes`].
    pub fn string(data: &[u8]) -> Self {
        let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        match String::from_utf8(pool::STRINGS.take(&data[..end])) {
            Ok(s) => Self::Str(s),
            Err(e) => {
                pool::STRINGS.give(e.into_bytes());
                Self::bytes(data)
            }
        }
    }

    /// Keep the payload as opaque bytes.
    pub fn bytes(data: &[u8]) -> Self {
        Self::Bytes(pool::OPAQUE.take(data))
    }

    /// Decode an address sized by `family`.
    pub fn addr(family: u8, data: &[u8]) -> Result<Self> {
        Address::decode(family, data).map(Self::Addr)
    }

    /// Decode an attribute carrying no payload.
    pub fn flag(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            Ok(Self::Flag)
        } else {
            Err(Error::InvalidAttribute(format!(
                "flag attribute carries {} bytes",
                data.len()
            )))
        }
    }

    /// Decode a nested attribute set in the given space.
    pub fn nested(space: AttrSpace, data: &[u8]) -> Result<Self> {
        Nest::decode(space, data).map(Self::Nested)
    }

    /// Decode a 32-bit counter block.
    pub fn link_stats(data: &[u8]) -> Self {
        let mut stats = Pooled::<LinkStats>::acquire();
        *stats = read_record(data);
        Self::LinkStats(stats)
    }

    /// Decode a 64-bit counter block.
    pub fn link_stats64(data: &[u8]) -> Self {
        let mut stats = Pooled::<LinkStats64>::acquire();
        *stats = read_record(data);
        Self::LinkStats64(stats)
    }

    /// Length of the value bytes on the wire, padding excluded.
    pub fn payload_len(&self) -> usize {
        match self {
            Self::U8(_) | Self::I8(_) | Self::OperState(_) => 1,
            Self::U16(_) | Self::I16(_) | Self::Be16(_) => 2,
            Self::U32(_) | Self::I32(_) | Self::Be32(_) | Self::AddrFlags(_) => 4,
            Self::Str(s) => s.len() + 1,
            Self::Bytes(b) => b.len(),
            Self::Addr(a) => a.len(),
            Self::LinkStats(_) => std::mem::size_of::<LinkStats>(),
            Self::LinkStats64(_) => std::mem::size_of::<LinkStats64>(),
            Self::AddrCacheInfo(_) => std::mem::size_of::<IfaCacheInfo>(),
            Self::RouteCacheInfo(_) => std::mem::size_of::<RtaCacheInfo>(),
            Self::NeighCacheInfo(_) => std::mem::size_of::<NdaCacheInfo>(),
            Self::LinkCacheInfo(_) => std::mem::size_of::<IflaCacheInfo>(),
            Self::Nested(n) => n.encoded_len(),
            Self::Flag => 0,
        }
    }

    /// Append the value bytes (no header, no padding) to `buf`.
    pub fn write_payload(&self, buf: &mut Vec<u8>) -> Result<()> {
        match self {
            Self::U8(v) => buf.push(*v),
            Self::U16(v) => buf.extend_from_slice(&v.to_ne_bytes()),
            Self::U32(v) | Self::AddrFlags(v) => buf.extend_from_slice(&v.to_ne_bytes()),
            Self::I8(v) => buf.extend_from_slice(&v.to_ne_bytes()),
            Self::I16(v) => buf.extend_from_slice(&v.to_ne_bytes()),
            Self::I32(v) => buf.extend_from_slice(&v.to_ne_bytes()),
            Self::Be16(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Self::Be32(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Self::Str(s) => {
                buf.extend_from_slice(s.as_bytes());
                buf.push(0);
            }
            Self::Bytes(b) => buf.extend_from_slice(b),
            Self::Addr(a) => a.write_to(buf),
            Self::LinkStats(s) => buf.extend_from_slice(s.as_bytes()),
            Self::LinkStats64(s) => buf.extend_from_slice(s.as_bytes()),
            Self::AddrCacheInfo(c) => buf.extend_from_slice(c.as_bytes()),
            Self::RouteCacheInfo(c) => buf.extend_from_slice(c.as_bytes()),
            Self::NeighCacheInfo(c) => buf.extend_from_slice(c.as_bytes()),
            Self::LinkCacheInfo(c) => buf.extend_from_slice(c.as_bytes()),
            Self::OperState(s) => buf.push(*s as u8),
            Self::Nested(n) => n.encode_into(buf)?,
            Self::Flag => {}
        }
        Ok(())
    }

    /// Return heap-backed storage to the pool of its value kind.
    pub fn recycle(self) {
        match self {
            Self::Str(s) => pool::STRINGS.give(s.into_bytes()),
            Self::Bytes(b) => pool::OPAQUE.give(b),
            Self::Addr(Address::Link(b)) => pool::LINK_ADDRS.give(b),
            Self::LinkStats(s) => s.release(),
            Self::LinkStats64(s) => s.release(),
            Self::Nested(n) => n.recycle(),
            _ => {}
        }
    }

    /// Integer view of any fixed-width integer variant.
    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Self::U8(v) => Some(v as u32),
            Self::U16(v) | Self::Be16(v) => Some(v as u32),
            Self::U32(v) | Self::Be32(v) | Self::AddrFlags(v) => Some(v),
            _ => None,
        }
    }

    /// Signed 32-bit view.
    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Self::I8(v) => Some(v as i32),
            Self::I16(v) => Some(v as i32),
            Self::I32(v) => Some(v),
            _ => None,
        }
    }

    /// String view.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Raw byte view of byte-like variants.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            Self::Str(s) => Some(s.as_bytes()),
            Self::Addr(Address::Link(b)) => Some(b),
            _ => None,
        }
    }

    /// Address view.
    pub fn as_addr(&self) -> Option<&Address> {
        match self {
            Self::Addr(a) => Some(a),
            _ => None,
        }
    }

    /// Nested set view.
    pub fn as_nest(&self) -> Option<&Nest> {
        match self {
            Self::Nested(n) => Some(n),
            _ => None,
        }
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, data: &[u8], sep: &str) -> fmt::Result {
    for (i, b) in data.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{:02x}", b)?;
    }
    Ok(())
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8(v) => write!(f, "{}", v),
            Self::U16(v) | Self::Be16(v) => write!(f, "{}", v),
            Self::U32(v) | Self::Be32(v) => write!(f, "{}", v),
            Self::I8(v) => write!(f, "{}", v),
            Self::I16(v) => write!(f, "{}", v),
            Self::I32(v) => write!(f, "{}", v),
            Self::Str(s) => f.write_str(s),
            Self::Bytes(b) if b.is_empty() => f.write_str("(empty)"),
            Self::Bytes(b) => write_hex(f, b, ""),
            Self::Addr(a) => write!(f, "{}", a),
            Self::LinkStats(s) => write!(f, "{}", **s),
            Self::LinkStats64(s) => write!(f, "{}", **s),
            Self::AddrCacheInfo(c) => write!(f, "{}", c),
            Self::RouteCacheInfo(c) => write!(f, "{}", c),
            Self::NeighCacheInfo(c) => write!(f, "{}", c),
            Self::LinkCacheInfo(c) => write!(f, "{}", c),
            Self::OperState(s) => f.write_str(s.name()),
            Self::AddrFlags(v) => f.write_str(&ifa_flag_names(*v)),
            Self::Nested(n) => write!(f, "{}", n),
            Self::Flag => f.write_str("true"),
        }
    }
}

/// Address attribute payload.
///
/// The width of an internet address comes from the enclosing message's
/// address family; anything that is not AF_INET or AF_INET6 is sized
/// purely by its byte length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// 4-byte IPv4 address.
    V4(Ipv4Addr),
    /// 16-byte IPv6 address.
    V6(Ipv6Addr),
    /// Any other width, e.g. a hardware address.
    Link(Vec<u8>),
}

impl Address {
    /// Decode `data` under `family`.
    ///
    /// AF_INET requires exactly 4 bytes and AF_INET6 exactly 16; any other
    /// family infers the width from the payload length.
    pub fn decode(family: u8, data: &[u8]) -> Result<Self> {
        let want = match family as i32 {
            libc::AF_INET => Some(4),
            libc::AF_INET6 => Some(16),
            _ => None,
        };
        if let Some(want) = want {
            if data.len() != want {
                return Err(Error::InvalidAttribute(format!(
                    "{} address needs {} bytes, got {}",
                    family_name(family),
                    want,
                    data.len()
                )));
            }
        }

        Ok(match data.len() {
            4 => Self::V4(Ipv4Addr::from(array::<4>("inet", data)?)),
            16 => Self::V6(Ipv6Addr::from(array::<16>("inet6", data)?)),
            _ => Self::Link(pool::LINK_ADDRS.take(data)),
        })
    }

    /// Width in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::V4(_) => 4,
            Self::V6(_) => 16,
            Self::Link(b) => b.len(),
        }
    }

    /// Whether the address has no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append the raw bytes, network order, to `buf`.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        match self {
            Self::V4(a) => buf.extend_from_slice(&a.octets()),
            Self::V6(a) => buf.extend_from_slice(&a.octets()),
            Self::Link(b) => buf.extend_from_slice(b),
        }
    }

    /// IP view, if this is an internet address.
    pub fn ip(&self) -> Option<std::net::IpAddr> {
        match self {
            Self::V4(a) => Some((*a).into()),
            Self::V6(a) => Some((*a).into()),
            Self::Link(_) => None,
        }
    }
}

impl From<std::net::IpAddr> for Address {
    fn from(addr: std::net::IpAddr) -> Self {
        match addr {
            std::net::IpAddr::V4(a) => Self::V4(a),
            std::net::IpAddr::V6(a) => Self::V6(a),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4(a) => write!(f, "{}", a),
            Self::V6(a) => write!(f, "{}", a),
            Self::Link(b) => write_hex(f, b, ":"),
        }
    }
}

/// Attribute-kind namespace of a nested set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrSpace {
    /// IFLA_AF_SPEC: keyed by address family.
    AfSpec,
    /// IFLA_INET_* under AF_INET.
    Inet,
    /// IFLA_INET6_* under AF_INET6.
    Inet6,
    /// IFLA_BRIDGE_* under an AF_BRIDGE link.
    Bridge,
    /// RTAX_* route metrics.
    Metrics,
    /// Anything not interpreted further.
    Opaque,
}

impl AttrSpace {
    /// Display name of `id` in this space.
    pub fn name(self, id: u16) -> Option<&'static str> {
        match self {
            Self::AfSpec => u8::try_from(id).ok().and_then(family),
            Self::Inet => match id {
                1 => Some("conf"),
                _ => None,
            },
            Self::Inet6 => match id {
                1 => Some("flags"),
                2 => Some("conf"),
                3 => Some("stats"),
                4 => Some("mcast"),
                5 => Some("cacheinfo"),
                6 => Some("icmp6stats"),
                7 => Some("token"),
                8 => Some("addr_gen_mode"),
                9 => Some("ra_mtu"),
                _ => None,
            },
            Self::Bridge => match id {
                0 => Some("flags"),
                1 => Some("mode"),
                2 => Some("vlan_info"),
                3 => Some("vlan_tunnel_info"),
                4 => Some("mrp"),
                5 => Some("cfm"),
                6 => Some("mst"),
                _ => None,
            },
            Self::Metrics => match id {
                1 => Some("lock"),
                2 => Some("mtu"),
                3 => Some("window"),
                4 => Some("rtt"),
                5 => Some("rttvar"),
                6 => Some("ssthresh"),
                7 => Some("cwnd"),
                8 => Some("advmss"),
                9 => Some("reordering"),
                10 => Some("hoplimit"),
                11 => Some("initcwnd"),
                12 => Some("features"),
                13 => Some("rto_min"),
                14 => Some("initrwnd"),
                15 => Some("quickack"),
                16 => Some("congctl"),
                17 => Some("fastopen_no_cookie"),
                _ => None,
            },
            Self::Opaque => None,
        }
    }

    /// Decode one entry of this space.
    fn decode(self, id: u16, data: &[u8]) -> Result<AttrValue> {
        match (self, id) {
            (Self::AfSpec, id) if id as i32 == libc::AF_INET => {
                AttrValue::nested(Self::Inet, data)
            }
            (Self::AfSpec, id) if id as i32 == libc::AF_INET6 => {
                AttrValue::nested(Self::Inet6, data)
            }
            (Self::Inet6, 1) | (Self::Inet6, 9) => AttrValue::u32(data),
            (Self::Inet6, 5) => Ok(AttrValue::LinkCacheInfo(read_record(data))),
            (Self::Inet6, 7) => AttrValue::addr(libc::AF_INET6 as u8, data),
            (Self::Inet6, 8) => AttrValue::u8(data),
            (Self::Bridge, 0) | (Self::Bridge, 1) => AttrValue::u16(data),
            (Self::Metrics, 16) => Ok(AttrValue::string(data)),
            (Self::Metrics, 1..=15) | (Self::Metrics, 17) => AttrValue::u32(data),
            _ => Ok(AttrValue::bytes(data)),
        }
    }
}

/// A recursively nested attribute set.
///
/// Entries are kept in ascending id order so that encoding is canonical.
#[derive(Debug, Clone, PartialEq)]
pub struct Nest {
    space: AttrSpace,
    entries: Vec<(u16, AttrValue)>,
}

impl Nest {
    /// Create an empty nest in `space`.
    pub fn new(space: AttrSpace) -> Self {
        Self {
            space,
            entries: Vec::new(),
        }
    }

    /// Decode the TLVs in `data` as entries of `space`.
    pub fn decode(space: AttrSpace, data: &[u8]) -> Result<Self> {
        let mut nest = Self::new(space);
        for attr in AttrIter::new(data) {
            let (id, payload) = attr?;
            nest.entries.push((id, space.decode(id, payload)?));
        }
        nest.entries.sort_by_key(|(id, _)| *id);
        Ok(nest)
    }

    /// Add an entry, keeping ascending order.
    pub fn push(&mut self, id: u16, value: AttrValue) {
        let at = self.entries.partition_point(|(k, _)| *k <= id);
        self.entries.insert(at, (id, value));
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, id: u16, value: AttrValue) -> Self {
        self.push(id, value);
        self
    }

    /// Attribute space of the entries.
    pub fn space(&self) -> AttrSpace {
        self.space
    }

    /// First entry with the given id.
    pub fn get(&self, id: u16) -> Option<&AttrValue> {
        self.entries.iter().find(|(k, _)| *k == id).map(|(_, v)| v)
    }

    /// Entries in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &AttrValue)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the nest has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Display name of an entry id, falling back to the number.
    pub fn name_of(&self, id: u16) -> String {
        self.space
            .name(id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("attr{}", id))
    }

    /// Encoded size of all entries, padding included.
    pub fn encoded_len(&self) -> usize {
        self.entries
            .iter()
            .map(|(_, v)| nla_size(v.payload_len()))
            .sum()
    }

    /// Append all entries to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) -> Result<()> {
        for (id, value) in &self.entries {
            write_attr(buf, *id, value)?;
        }
        Ok(())
    }

    /// Return heap-backed storage of every entry to its pool.
    pub fn recycle(self) {
        for (_, value) in self.entries {
            value.recycle();
        }
    }
}

impl fmt::Display for Nest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (id, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", self.name_of(id), value)?;
        }
        f.write_str("}")
    }
}

impl Poolable for LinkStats {
    fn pool() -> &'static Pool<Self> {
        static POOL: Pool<LinkStats> = Pool::new("link stats");
        &POOL
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Poolable for LinkStats64 {
    fn pool() -> &'static Pool<Self> {
        static POOL: Pool<LinkStats64> = Pool::new("link stats64");
        &POOL
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}
