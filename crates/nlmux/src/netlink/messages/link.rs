//! Link message (RTM_NEWLINK / RTM_DELLINK / RTM_GETLINK / RTM_SETLINK).

use std::fmt;

use zerocopy::IntoBytes;

use super::{Block, NSID_NONE, NetlinkMessage};
use crate::netlink::attr::AttrSet;
use crate::netlink::error::Result;
use crate::netlink::message::{NlMsgHdr, NlMsgType};
use crate::netlink::pool::{Pool, Poolable};
use crate::netlink::types::link::{IfInfoMsg, Ifla, OperState, iff, iff_names};
use crate::netlink::types::read_body;
use crate::netlink::value::{AttrSpace, AttrValue};
use crate::util::names::{family_name, link_type_name};

const AF_UNSPEC: u8 = libc::AF_UNSPEC as u8;
const AF_BRIDGE: u8 = libc::AF_BRIDGE as u8;

/// Interface state or change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkMessage {
    pub header: NlMsgHdr,
    pub nsid: i32,
    pub ifinfo: IfInfoMsg,
    pub attrs: AttrSet<Ifla>,
}

impl Default for LinkMessage {
    fn default() -> Self {
        Self {
            header: NlMsgHdr::default(),
            nsid: NSID_NONE,
            ifinfo: IfInfoMsg::new(),
            attrs: AttrSet::new(),
        }
    }
}

impl LinkMessage {
    /// Interface index.
    pub fn ifindex(&self) -> i32 {
        self.ifinfo.ifi_index
    }

    /// Interface name (IFLA_IFNAME).
    pub fn name(&self) -> Option<&str> {
        self.attrs.get(Ifla::Ifname)?.as_str()
    }

    /// MTU (IFLA_MTU).
    pub fn mtu(&self) -> Option<u32> {
        self.attrs.get(Ifla::Mtu)?.as_u32()
    }

    /// Master device index (IFLA_MASTER).
    pub fn master(&self) -> Option<u32> {
        self.attrs.get(Ifla::Master)?.as_u32()
    }

    /// Operational state (IFLA_OPERSTATE).
    pub fn operstate(&self) -> Option<OperState> {
        match self.attrs.get(Ifla::Operstate)? {
            AttrValue::OperState(state) => Some(*state),
            _ => None,
        }
    }

    /// Namespace id of the peer for cross-namespace links (IFLA_LINK_NETNSID).
    pub fn link_netnsid(&self) -> Option<i32> {
        self.attrs.get(Ifla::LinkNetnsid)?.as_i32()
    }

    /// Check if the interface is administratively up.
    pub fn is_up(&self) -> bool {
        self.ifinfo.ifi_flags & iff::UP != 0
    }

    /// Check if the interface is a loopback.
    pub fn is_loopback(&self) -> bool {
        self.ifinfo.ifi_flags & iff::LOOPBACK != 0
    }
}

fn decode_attr(family: u8) -> impl FnMut(Ifla, &[u8]) -> Result<AttrValue> {
    move |kind, data| {
        use Ifla::*;
        match kind {
            Ifname | Qdisc | Ifalias | PhysPortName | AltIfname | ParentDevName
            | ParentDevBusName => Ok(AttrValue::string(data)),
            Address | Broadcast | PermAddress => AttrValue::addr(AF_UNSPEC, data),
            Mtu | Link | Master | Weight | TxqLen | NetNsPid | NetNsFd | ExtMask | Promiscuity
            | NumTxQueues | NumRxQueues | CarrierChanges | Group | NumVf | GsoMaxSegs
            | GsoMaxSize | Event | CarrierUpCount | CarrierDownCount | MinMtu | MaxMtu
            | GroMaxSize | TsoMaxSize | TsoMaxSegs | Allmulti | GsoIpv4MaxSize
            | GroIpv4MaxSize => AttrValue::u32(data),
            LinkNetnsid | NewNetnsid | IfNetnsid | NewIfindex => AttrValue::i32(data),
            Carrier | Linkmode | ProtoDown | NetnsImmutable => AttrValue::u8(data),
            Headroom | Tailroom => AttrValue::u16(data),
            Operstate => AttrValue::oper_state(data),
            Stats => Ok(AttrValue::link_stats(data)),
            Stats64 => Ok(AttrValue::link_stats64(data)),
            // The layout of IFLA_AF_SPEC depends on the message family.
            AfSpec => match family {
                AF_UNSPEC => AttrValue::nested(AttrSpace::AfSpec, data),
                AF_BRIDGE => AttrValue::nested(AttrSpace::Bridge, data),
                _ => Ok(AttrValue::bytes(data)),
            },
            Unspec | Cost | Priority | Wireless | Protinfo | Map | Linkinfo | VfinfoList
            | VfPorts | PortSelf | PhysPortId | PhysSwitchId | Pad | Xdp | PropList
            | ProtoDownReason | DevlinkPort | DpllPin | MaxPacingOffloadHorizon => {
                Ok(AttrValue::bytes(data))
            }
        }
    }
}

impl Poolable for LinkMessage {
    fn pool() -> &'static Pool<Self> {
        static POOL: Pool<LinkMessage> = Pool::new("link");
        &POOL
    }

    fn reset(&mut self) {
        self.header = NlMsgHdr::default();
        self.nsid = NSID_NONE;
        self.ifinfo = IfInfoMsg::new();
        self.attrs.clear();
    }
}

impl NetlinkMessage for LinkMessage {
    const BODY_SIZE: usize = IfInfoMsg::SIZE;

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
        self.ifinfo = read_body(body)?;
        self.attrs
            .decode_with(&body[IfInfoMsg::SIZE..], decode_attr(self.ifinfo.ifi_family))
    }

    fn body_len(&self) -> usize {
        IfInfoMsg::SIZE + self.attrs.encoded_len()
    }

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(self.ifinfo.as_bytes());
        self.attrs.encode_into(buf)
    }
}

impl fmt::Display for LinkMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = Block::open(f, NlMsgType::name(self.header.nlmsg_type))?;
        out.header(self.nsid, &self.header)?;
        out.field("index", self.ifinfo.ifi_index)?;
        out.field("family", family_name(self.ifinfo.ifi_family))?;
        out.field("type", link_type_name(self.ifinfo.ifi_type))?;
        out.field("ifinfo flags", iff_names(self.ifinfo.ifi_flags))?;
        if self.ifinfo.ifi_change != 0 {
            out.field("changed flags", iff_names(self.ifinfo.ifi_change))?;
        }
        out.attrs(&self.attrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::attr::write_attr;
    use crate::netlink::messages::{Message, encode_as};
    use crate::netlink::pool::Pooled;
    use crate::netlink::types::link::LinkStats64;
    use crate::netlink::value::{Address, Nest};

    fn eth0() -> Pooled<LinkMessage> {
        let mut link = Pooled::<LinkMessage>::acquire();
        link.header = NlMsgHdr::new(NlMsgType::RTM_NEWLINK, 0);
        link.ifinfo = IfInfoMsg::new()
            .with_index(2)
            .with_type(1)
            .with_flags(iff::UP | iff::BROADCAST, 0);
        link.attrs.set(Ifla::Ifname, AttrValue::Str("eth0".into()));
        link.attrs.set(Ifla::Mtu, AttrValue::U32(1500));
        link
    }

    #[test]
    fn test_ifname_and_mtu_round_trip() {
        let link = eth0();
        let bytes = encode_as(&*link).unwrap();
        assert_eq!(bytes.len() % 4, 0);
        assert_eq!(
            u32::from_ne_bytes(bytes[..4].try_into().unwrap()) as usize,
            bytes.len()
        );

        let msg = Message::decode(&bytes, NSID_NONE).unwrap();
        let Message::Link(back) = &msg else {
            panic!("expected link message");
        };
        assert_eq!(back.attrs.get(Ifla::Ifname), Some(&AttrValue::Str("eth0".into())));
        assert_eq!(back.attrs.get(Ifla::Mtu), Some(&AttrValue::U32(1500)));
        assert_eq!(back.name(), Some("eth0"));
        assert_eq!(back.ifinfo, link.ifinfo);
        assert_eq!(back.attrs, link.attrs);
        assert!(back.is_up());

        msg.release();
        link.release();
    }

    #[test]
    fn test_hardware_address_width_from_length() {
        let mut link = eth0();
        link.ifinfo.ifi_family = libc::AF_INET as u8;
        let mac = vec![0x52, 0x54, 0x00, 0x12, 0x34, 0x56];
        link.attrs.set(Ifla::Address, AttrValue::Addr(Address::Link(mac.clone())));
        let bytes = encode_as(&*link).unwrap();

        let msg = Message::decode(&bytes, NSID_NONE).unwrap();
        let Message::Link(back) = &msg else {
            panic!("expected link message");
        };
        assert_eq!(back.attrs.get(Ifla::Address), Some(&AttrValue::Addr(Address::Link(mac))));
        msg.release();
        link.release();
    }

    #[test]
    fn test_af_spec_nested() {
        let mut link = eth0();
        let inet6 = Nest::new(AttrSpace::Inet6)
            .with(1, AttrValue::U32(0x8000_0000))
            .with(8, AttrValue::U8(0));
        let spec = Nest::new(AttrSpace::AfSpec).with(libc::AF_INET6 as u16, AttrValue::Nested(inet6));
        link.attrs.set(Ifla::AfSpec, AttrValue::Nested(spec));
        let bytes = encode_as(&*link).unwrap();

        let msg = Message::decode(&bytes, NSID_NONE).unwrap();
        let Message::Link(back) = &msg else {
            panic!("expected link message");
        };
        assert_eq!(back.attrs, link.attrs);
        assert!(msg.to_string().contains("af_spec: {inet6: {flags: 2147483648, addr_gen_mode: 0}}"));
        msg.release();
        link.release();
    }

    #[test]
    fn test_bridge_af_spec_vlan_info() {
        let mut link = eth0();
        link.ifinfo.ifi_family = AF_BRIDGE;
        let mut raw = encode_as(&*link).unwrap();
        // IFLA_BRIDGE_FLAGS = master, IFLA_BRIDGE_VLAN_INFO {flags: PVID|UNTAGGED, vid: 10}
        let mut spec = Vec::new();
        write_attr(&mut spec, 0, &AttrValue::U16(1)).unwrap();
        write_attr(&mut spec, 2, &AttrValue::Bytes(vec![6, 0, 10, 0])).unwrap();
        write_attr(&mut raw, Ifla::AfSpec.into(), &AttrValue::Bytes(spec)).unwrap();
        let len = raw.len() as u32;
        raw[..4].copy_from_slice(&len.to_ne_bytes());

        let msg = Message::decode(&raw, NSID_NONE).unwrap();
        let Message::Link(back) = &msg else {
            panic!("expected link message");
        };
        let spec = back.attrs.get(Ifla::AfSpec).and_then(AttrValue::as_nest).unwrap();
        assert_eq!(spec.space(), AttrSpace::Bridge);
        assert_eq!(spec.get(0), Some(&AttrValue::U16(1)));
        assert_eq!(spec.get(2), Some(&AttrValue::Bytes(vec![6, 0, 10, 0])));
        assert!(msg.to_string().contains("af_spec: {flags: 1, vlan_info: 06000a00}"));
        assert_eq!(msg.encode().unwrap(), raw);
        msg.release();
        link.release();
    }

    #[test]
    fn test_af_spec_of_other_family_kept_as_bytes() {
        let mut link = eth0();
        link.ifinfo.ifi_family = libc::AF_INET6 as u8;
        let mut raw = encode_as(&*link).unwrap();
        write_attr(&mut raw, Ifla::AfSpec.into(), &AttrValue::Bytes(vec![1, 2, 3, 4])).unwrap();
        let len = raw.len() as u32;
        raw[..4].copy_from_slice(&len.to_ne_bytes());

        let msg = Message::decode(&raw, NSID_NONE).unwrap();
        let Message::Link(back) = &msg else {
            panic!("expected link message");
        };
        assert_eq!(back.attrs.get(Ifla::AfSpec), Some(&AttrValue::Bytes(vec![1, 2, 3, 4])));
        msg.release();
        link.release();
    }

    #[test]
    fn test_stats64_short_payload_zero_extends() {
        let link = eth0();
        let mut raw = encode_as(&*link).unwrap();
        let mut counters = Vec::new();
        for v in [10u64, 20, 3000, 4000] {
            counters.extend_from_slice(&v.to_ne_bytes());
        }
        write_attr(&mut raw, Ifla::Stats64.into(), &AttrValue::Bytes(counters)).unwrap();
        let len = raw.len() as u32;
        raw[..4].copy_from_slice(&len.to_ne_bytes());

        let msg = Message::decode(&raw, NSID_NONE).unwrap();
        let Message::Link(back) = &msg else {
            panic!("expected link message");
        };
        let Some(AttrValue::LinkStats64(stats)) = back.attrs.get(Ifla::Stats64) else {
            panic!("expected stats64");
        };
        let want = LinkStats64 {
            rx_packets: 10,
            tx_packets: 20,
            rx_bytes: 3000,
            tx_bytes: 4000,
            ..Default::default()
        };
        assert_eq!(**stats, want);
        msg.release();
        link.release();
    }

    #[test]
    fn test_unknown_in_range_kept_as_bytes() {
        let link = eth0();
        let mut raw = encode_as(&*link).unwrap();
        write_attr(&mut raw, Ifla::Xdp.into(), &AttrValue::Bytes(vec![1, 2, 3, 4])).unwrap();
        let len = raw.len() as u32;
        raw[..4].copy_from_slice(&len.to_ne_bytes());

        let msg = Message::decode(&raw, NSID_NONE).unwrap();
        let Message::Link(back) = &msg else {
            panic!("expected link message");
        };
        assert_eq!(back.attrs.get(Ifla::Xdp), Some(&AttrValue::Bytes(vec![1, 2, 3, 4])));
        assert!(msg.to_string().contains("xdp: 01020304"));
        msg.release();
        link.release();
    }

    #[test]
    fn test_kind_beyond_max_is_fatal() {
        let link = eth0();
        let mut raw = encode_as(&*link).unwrap();
        write_attr(&mut raw, 70, &AttrValue::U32(1)).unwrap();
        let len = raw.len() as u32;
        raw[..4].copy_from_slice(&len.to_ne_bytes());

        let err = Message::decode(&raw, NSID_NONE).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "link: attribute kind 70 out of range (max 70)");
        link.release();
    }

    #[test]
    fn test_display() {
        let link = eth0();
        let bytes = encode_as(&*link).unwrap();
        let msg = Message::decode(&bytes, 1).unwrap();
        let text = msg.to_string();
        assert!(text.starts_with("new link:\n    nsid: 1\n"));
        assert!(text.contains("    index: 2\n"));
        assert!(text.contains("    type: ether\n"));
        assert!(text.contains("    ifinfo flags: UP,BROADCAST\n"));
        assert!(text.contains("    ifname: eth0\n    mtu: 1500\n"));
        msg.release();
        link.release();
    }

    #[test]
    fn test_released_object_comes_back_empty() {
        let link = eth0();
        link.release();
        let fresh = Pooled::<LinkMessage>::acquire();
        assert!(fresh.attrs.is_empty());
        assert_eq!(fresh.nsid, NSID_NONE);
        assert_eq!(fresh.ifinfo, IfInfoMsg::new());
        fresh.release();
    }
}
