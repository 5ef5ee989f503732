//! Route message (RTM_NEWROUTE / RTM_DELROUTE / RTM_GETROUTE).

use std::fmt;
use std::net::IpAddr;

use zerocopy::IntoBytes;

use super::{Block, NSID_NONE, NetlinkMessage};
use crate::netlink::attr::AttrSet;
use crate::netlink::error::Result;
use crate::netlink::message::{NlMsgHdr, NlMsgType};
use crate::netlink::pool::{Pool, Poolable};
use crate::netlink::types::route::{Rta, RtaCacheInfo, RtMsg};
use crate::netlink::types::{read_body, read_record};
use crate::netlink::value::{AttrSpace, AttrValue};
use crate::util::names::{family_name, protocol_name, route_type_name, scope_name, table_name};

/// Routing table entry or change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMessage {
    pub header: NlMsgHdr,
    pub nsid: i32,
    pub rtmsg: RtMsg,
    pub attrs: AttrSet<Rta>,
}

impl Default for RouteMessage {
    fn default() -> Self {
        Self {
            header: NlMsgHdr::default(),
            nsid: NSID_NONE,
            rtmsg: RtMsg::new(),
            attrs: AttrSet::new(),
        }
    }
}

impl RouteMessage {
    fn ip(&self, kind: Rta) -> Option<IpAddr> {
        self.attrs.get(kind)?.as_addr()?.ip()
    }

    /// Destination prefix (RTA_DST).
    pub fn destination(&self) -> Option<IpAddr> {
        self.ip(Rta::Dst)
    }

    /// Next hop (RTA_GATEWAY).
    pub fn gateway(&self) -> Option<IpAddr> {
        self.ip(Rta::Gateway)
    }

    /// Preferred source (RTA_PREFSRC).
    pub fn prefsrc(&self) -> Option<IpAddr> {
        self.ip(Rta::Prefsrc)
    }

    /// Output interface index (RTA_OIF).
    pub fn oif(&self) -> Option<u32> {
        self.attrs.get(Rta::Oif)?.as_u32()
    }

    /// Metric (RTA_PRIORITY).
    pub fn priority(&self) -> Option<u32> {
        self.attrs.get(Rta::Priority)?.as_u32()
    }

    /// Routing table; RTA_TABLE when present, else the 8-bit header field.
    pub fn table(&self) -> u32 {
        self.attrs
            .get(Rta::Table)
            .and_then(AttrValue::as_u32)
            .unwrap_or(self.rtmsg.rtm_table as u32)
    }

    /// Check if this is a default route (prefix length zero).
    pub fn is_default(&self) -> bool {
        self.rtmsg.rtm_dst_len == 0
    }
}

fn decode_attr(family: u8) -> impl FnMut(Rta, &[u8]) -> Result<AttrValue> {
    move |kind, data| {
        use Rta::*;
        match kind {
            Dst | Src | Prefsrc | Gateway => AttrValue::addr(family, data),
            Iif | Oif | Priority | Table | Flow | Mark | Uid | NhId => AttrValue::u32(data),
            EncapType => AttrValue::u16(data),
            Pref | TtlPropagate | IpProto => AttrValue::u8(data),
            Cacheinfo => Ok(AttrValue::RouteCacheInfo(read_record::<RtaCacheInfo>(data))),
            Sport | Dport => AttrValue::be16(data),
            Flowlabel => AttrValue::be32(data),
            Metrics => AttrValue::nested(AttrSpace::Metrics, data),
            Unspec | Multipath | Protoinfo | Session | MpAlgo | MfcStats | Via | Newdst
            | Encap | Expires | Pad => Ok(AttrValue::bytes(data)),
        }
    }
}

impl Poolable for RouteMessage {
    fn pool() -> &'static Pool<Self> {
        static POOL: Pool<RouteMessage> = Pool::new("route");
        &POOL
    }

    fn reset(&mut self) {
        self.header = NlMsgHdr::default();
        self.nsid = NSID_NONE;
        self.rtmsg = RtMsg::new();
        self.attrs.clear();
    }
}

impl NetlinkMessage for RouteMessage {
    const BODY_SIZE: usize = RtMsg::SIZE;

    fn header(&self) -> &NlMsgHdr {
        &self.header
    }

    fn header_mut(&mut self) -> &mut NlMsgHdr {
        &mut self.header
    }

    fn nsid(&self) -> i32 {
        self.nsid
    }

    fn set_nsid(&mut self, nsid: i32) {
        self.nsid = nsid;
    }

    fn decode_body(&mut self, body: &[u8]) -> Result<()> {
        self.rtmsg = read_body(body)?;
        let family = self.rtmsg.rtm_family;
        self.attrs
            .decode_with(&body[RtMsg::SIZE..], decode_attr(family))
    }

    fn body_len(&self) -> usize {
        RtMsg::SIZE + self.attrs.encoded_len()
    }

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(self.rtmsg.as_bytes());
        self.attrs.encode_into(buf)
    }
}

impl fmt::Display for RouteMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rt = &self.rtmsg;
        let mut out = Block::open(f, NlMsgType::name(self.header.nlmsg_type))?;
        out.header(self.nsid, &self.header)?;
        out.field("family", family_name(rt.rtm_family))?;
        out.field("dst_len", rt.rtm_dst_len)?;
        out.field("src_len", rt.rtm_src_len)?;
        out.field("tos", rt.rtm_tos)?;
        out.field("table", table_name(rt.rtm_table as u32))?;
        out.field("protocol", protocol_name(rt.rtm_protocol))?;
        out.field("scope", scope_name(rt.rtm_scope))?;
        out.field("type", route_type_name(rt.rtm_type))?;
        if rt.rtm_flags != 0 {
            out.field("rtm flags", format_args!("{:#x}", rt.rtm_flags))?;
        }
        out.attrs(&self.attrs)
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use super::*;
    use crate::netlink::attr::write_attr;
    use crate::netlink::messages::{Message, encode_as};
    use crate::netlink::pool::Pooled;
    use crate::netlink::types::route::rt_table;
    use crate::netlink::value::{Address, Nest};

    fn route(family: libc::c_int, dst_len: u8) -> Pooled<RouteMessage> {
        let mut msg = Pooled::<RouteMessage>::acquire();
        msg.header = NlMsgHdr::new(NlMsgType::RTM_NEWROUTE, 0);
        msg.rtmsg = RtMsg::new()
            .with_family(family as u8)
            .with_dst_len(dst_len)
            .with_table(rt_table::MAIN)
            .with_protocol(4)
            .with_type(1);
        msg
    }

    fn append(mut raw: Vec<u8>, kind: Rta, payload: &[u8]) -> Vec<u8> {
        write_attr(&mut raw, kind.into(), &AttrValue::Bytes(payload.to_vec())).unwrap();
        let len = raw.len() as u32;
        raw[..4].copy_from_slice(&len.to_ne_bytes());
        raw
    }

    #[test]
    fn test_v4_gateway_from_four_bytes() {
        let msg = route(libc::AF_INET, 0);
        let raw = append(encode_as(&*msg).unwrap(), Rta::Gateway, &[10, 0, 0, 1]);
        let back = Message::decode(&raw, NSID_NONE).unwrap();
        let Message::Route(rt) = &back else {
            panic!("expected route message");
        };
        assert_eq!(rt.gateway(), Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
        assert!(rt.is_default());
        assert_eq!(rt.table(), 254);
        back.release();
        msg.release();
    }

    #[test]
    fn test_v6_destination_from_sixteen_bytes() {
        let msg = route(libc::AF_INET6, 64);
        let dst = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0);
        let raw = append(encode_as(&*msg).unwrap(), Rta::Dst, &dst.octets());
        let back = Message::decode(&raw, NSID_NONE).unwrap();
        let Message::Route(rt) = &back else {
            panic!("expected route message");
        };
        assert_eq!(rt.destination(), Some(IpAddr::V6(dst)));
        assert!(back.to_string().contains("    dst: 2001:db8::\n"));
        back.release();
        msg.release();
    }

    #[test]
    fn test_address_width_must_match_family() {
        let msg = route(libc::AF_INET6, 0);
        let raw = append(encode_as(&*msg).unwrap(), Rta::Gateway, &[10, 0, 0, 1]);
        let err = Message::decode(&raw, NSID_NONE).unwrap_err();
        assert!(err.is_fatal());
        msg.release();
    }

    #[test]
    fn test_ports_are_network_order() {
        let msg = route(libc::AF_INET, 32);
        let raw = append(encode_as(&*msg).unwrap(), Rta::Dport, &443u16.to_be_bytes());
        let back = Message::decode(&raw, NSID_NONE).unwrap();
        let Message::Route(rt) = &back else {
            panic!("expected route message");
        };
        assert_eq!(rt.attrs.get(Rta::Dport), Some(&AttrValue::Be16(443)));

        let again = encode_as(&**rt).unwrap();
        assert_eq!(again, raw);
        back.release();
        msg.release();
    }

    #[test]
    fn test_round_trip_with_metrics() {
        let mut msg = route(libc::AF_INET, 24);
        msg.attrs.set(
            Rta::Dst,
            AttrValue::Addr(Address::from(IpAddr::V4(Ipv4Addr::new(192, 168, 0, 0)))),
        );
        msg.attrs.set(Rta::Oif, AttrValue::U32(3));
        msg.attrs.set(Rta::Priority, AttrValue::U32(100));
        msg.attrs.set(Rta::Table, AttrValue::U32(1000));
        msg.attrs.set(
            Rta::Metrics,
            AttrValue::Nested(Nest::new(AttrSpace::Metrics).with(2, AttrValue::U32(1400))),
        );
        let bytes = encode_as(&*msg).unwrap();
        let back = Message::decode(&bytes, NSID_NONE).unwrap();
        let Message::Route(rt) = &back else {
            panic!("expected route message");
        };
        assert_eq!(rt.rtmsg, msg.rtmsg);
        assert_eq!(rt.attrs, msg.attrs);
        assert_eq!(rt.oif(), Some(3));
        assert_eq!(rt.table(), 1000);

        let text = back.to_string();
        assert!(text.starts_with("new route:\n"));
        assert!(text.contains("    table: main\n"));
        assert!(text.contains("    protocol: static\n"));
        assert!(text.contains("    type: unicast\n"));
        assert!(text.contains("    metrics: {mtu: 1400}\n"));
        back.release();
        msg.release();
    }
}
