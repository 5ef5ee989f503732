//! Address message (RTM_NEWADDR / RTM_DELADDR / RTM_GETADDR).

use std::fmt;
use std::net::IpAddr;

use zerocopy::IntoBytes;

use super::{Block, NSID_NONE, NetlinkMessage};
use crate::netlink::attr::AttrSet;
use crate::netlink::error::Result;
use crate::netlink::message::{NlMsgHdr, NlMsgType};
use crate::netlink::pool::{Pool, Poolable};
use crate::netlink::types::addr::{IfAddrMsg, IfaCacheInfo, Ifa};
use crate::netlink::types::{read_body, read_record};
use crate::netlink::value::AttrValue;
use crate::util::names::{family_name, scope_name};

/// Interface address state or change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressMessage {
    pub header: NlMsgHdr,
    pub nsid: i32,
    pub ifaddr: IfAddrMsg,
    pub attrs: AttrSet<Ifa>,
}

impl Default for AddressMessage {
    fn default() -> Self {
        Self {
            header: NlMsgHdr::default(),
            nsid: NSID_NONE,
            ifaddr: IfAddrMsg::new(),
            attrs: AttrSet::new(),
        }
    }
}

impl AddressMessage {
    /// Interface index.
    pub fn ifindex(&self) -> u32 {
        self.ifaddr.ifa_index
    }

    /// Prefix length.
    pub fn prefix_len(&self) -> u8 {
        self.ifaddr.ifa_prefixlen
    }

    /// Interface address (IFA_ADDRESS).
    pub fn address(&self) -> Option<IpAddr> {
        self.attrs.get(Ifa::Address)?.as_addr()?.ip()
    }

    /// Local address (IFA_LOCAL).
    pub fn local(&self) -> Option<IpAddr> {
        self.attrs.get(Ifa::Local)?.as_addr()?.ip()
    }

    /// Address label (IFA_LABEL).
    pub fn label(&self) -> Option<&str> {
        self.attrs.get(Ifa::Label)?.as_str()
    }

    /// Full 32-bit flags, preferring IFA_FLAGS over the 8-bit header field.
    pub fn flags(&self) -> u32 {
        match self.attrs.get(Ifa::Flags) {
            Some(AttrValue::AddrFlags(flags)) => *flags,
            _ => self.ifaddr.ifa_flags as u32,
        }
    }
}

fn decode_attr(family: u8) -> impl FnMut(Ifa, &[u8]) -> Result<AttrValue> {
    move |kind, data| match kind {
        Ifa::Address | Ifa::Local | Ifa::Broadcast | Ifa::Anycast | Ifa::Multicast => {
            AttrValue::addr(family, data)
        }
        Ifa::Label => Ok(AttrValue::string(data)),
        Ifa::Flags => AttrValue::addr_flags(data),
        Ifa::Cacheinfo => Ok(AttrValue::AddrCacheInfo(read_record::<IfaCacheInfo>(data))),
        Ifa::RtPriority => AttrValue::u32(data),
        Ifa::TargetNetnsid => AttrValue::i32(data),
        Ifa::Proto => AttrValue::u8(data),
        Ifa::Unspec => Ok(AttrValue::bytes(data)),
    }
}

impl Poolable for AddressMessage {
    fn pool() -> &'static Pool<Self> {
        static POOL: Pool<AddressMessage> = Pool::new("address");
        &POOL
    }

    fn reset(&mut self) {
        self.header = NlMsgHdr::default();
        self.nsid = NSID_NONE;
        self.ifaddr = IfAddrMsg::new();
        self.attrs.clear();
    }
}

impl NetlinkMessage for AddressMessage {
    const BODY_SIZE: usize = IfAddrMsg::SIZE;

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
        self.ifaddr = read_body(body)?;
        let family = self.ifaddr.ifa_family;
        self.attrs
            .decode_with(&body[IfAddrMsg::SIZE..], decode_attr(family))
    }

    fn body_len(&self) -> usize {
        IfAddrMsg::SIZE + self.attrs.encoded_len()
    }

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(self.ifaddr.as_bytes());
        self.attrs.encode_into(buf)
    }
}

impl fmt::Display for AddressMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = Block::open(f, NlMsgType::name(self.header.nlmsg_type))?;
        out.header(self.nsid, &self.header)?;
        out.field("family", family_name(self.ifaddr.ifa_family))?;
        out.field("prefixlen", self.ifaddr.ifa_prefixlen)?;
        out.field("scope", scope_name(self.ifaddr.ifa_scope))?;
        out.field("index", self.ifaddr.ifa_index)?;
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
    use crate::netlink::types::addr::ifa_flags;
    use crate::netlink::value::Address;

    fn v4_address() -> Pooled<AddressMessage> {
        let mut msg = Pooled::<AddressMessage>::acquire();
        msg.header = NlMsgHdr::new(NlMsgType::RTM_NEWADDR, 0);
        msg.ifaddr = IfAddrMsg::new()
            .with_family(libc::AF_INET as u8)
            .with_prefixlen(24)
            .with_index(2);
        let ip = Address::from(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)));
        msg.attrs.set(Ifa::Address, AttrValue::Addr(ip.clone()));
        msg.attrs.set(Ifa::Local, AttrValue::Addr(ip));
        msg.attrs.set(Ifa::Label, AttrValue::Str("eth0".into()));
        msg.attrs
            .set(Ifa::Flags, AttrValue::AddrFlags(ifa_flags::PERMANENT));
        msg
    }

    #[test]
    fn test_v4_round_trip() {
        let msg = v4_address();
        let bytes = encode_as(&*msg).unwrap();
        let back = Message::decode(&bytes, NSID_NONE).unwrap();
        let Message::Address(addr) = &back else {
            panic!("expected address message");
        };
        assert_eq!(addr.ifaddr, msg.ifaddr);
        assert_eq!(addr.attrs, msg.attrs);
        assert_eq!(addr.address(), Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10))));
        assert_eq!(addr.label(), Some("eth0"));
        assert_eq!(addr.flags(), ifa_flags::PERMANENT);
        back.release();
        msg.release();
    }

    #[test]
    fn test_cacheinfo_and_flags_render() {
        let mut msg = v4_address();
        msg.attrs.set(
            Ifa::Cacheinfo,
            AttrValue::AddrCacheInfo(IfaCacheInfo {
                ifa_prefered: IfaCacheInfo::INFINITY,
                ifa_valid: IfaCacheInfo::INFINITY,
                cstamp: 100,
                tstamp: 200,
            }),
        );
        let bytes = encode_as(&*msg).unwrap();
        let back = Message::decode(&bytes, 4).unwrap();
        let text = back.to_string();
        assert!(text.starts_with("new addr:\n    nsid: 4\n"));
        assert!(text.contains("    family: inet\n"));
        assert!(text.contains("    prefixlen: 24\n"));
        assert!(text.contains("    address: 192.168.1.10\n"));
        assert!(text.contains("    flags: permanent\n"));
        assert!(text.contains("    cacheinfo: valid_lft forever preferred_lft forever cstamp 100 tstamp 200\n"));
        back.release();
        msg.release();
    }

    #[test]
    fn test_v6_address_needs_sixteen_bytes() {
        let mut msg = Pooled::<AddressMessage>::acquire();
        msg.header = NlMsgHdr::new(NlMsgType::RTM_NEWADDR, 0);
        msg.ifaddr = IfAddrMsg::new()
            .with_family(libc::AF_INET6 as u8)
            .with_prefixlen(64);
        let ip = IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1));
        msg.attrs.set(Ifa::Address, AttrValue::Addr(ip.into()));
        let good = encode_as(&*msg).unwrap();
        let back = Message::decode(&good, NSID_NONE).unwrap();
        let Message::Address(addr) = &back else {
            panic!("expected address message");
        };
        assert_eq!(addr.address(), Some(ip));
        back.release();

        msg.attrs.clear();
        let mut bad = encode_as(&*msg).unwrap();
        write_attr(&mut bad, Ifa::Address.into(), &AttrValue::Bytes(vec![10, 0, 0, 1])).unwrap();
        let len = bad.len() as u32;
        bad[..4].copy_from_slice(&len.to_ne_bytes());
        assert!(Message::decode(&bad, NSID_NONE).unwrap_err().is_fatal());
        msg.release();
    }

    #[test]
    fn test_header_flags_without_attribute() {
        let mut msg = AddressMessage::default();
        msg.ifaddr.ifa_flags = ifa_flags::SECONDARY as u8;
        assert_eq!(msg.flags(), ifa_flags::SECONDARY);
        assert_eq!(msg.nsid, NSID_NONE);
    }
}
