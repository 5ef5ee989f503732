//! Neighbor message (RTM_NEWNEIGH / RTM_DELNEIGH / RTM_GETNEIGH).

use std::fmt;
use std::net::IpAddr;

use zerocopy::IntoBytes;

use super::{Block, NSID_NONE, NetlinkMessage};
use crate::netlink::attr::AttrSet;
use crate::netlink::error::Result;
use crate::netlink::message::{NlMsgHdr, NlMsgType};
use crate::netlink::pool::{Pool, Poolable};
use crate::netlink::types::neigh::{Nda, NdaCacheInfo, NdMsg, nud, nud_state_names};
use crate::netlink::types::{read_body, read_record};
use crate::netlink::value::{AttrSpace, AttrValue};
use crate::util::names::family_name;

const AF_UNSPEC: u8 = libc::AF_UNSPEC as u8;

/// ARP / NDP / FDB entry or change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborMessage {
    pub header: NlMsgHdr,
    pub nsid: i32,
    pub ndmsg: NdMsg,
    pub attrs: AttrSet<Nda>,
}

impl Default for NeighborMessage {
    fn default() -> Self {
        Self {
            header: NlMsgHdr::default(),
            nsid: NSID_NONE,
            ndmsg: NdMsg::new(),
            attrs: AttrSet::new(),
        }
    }
}

impl NeighborMessage {
    /// Interface index.
    pub fn ifindex(&self) -> i32 {
        self.ndmsg.ndm_ifindex
    }

    /// Protocol address (NDA_DST).
    pub fn destination(&self) -> Option<IpAddr> {
        self.attrs.get(Nda::Dst)?.as_addr()?.ip()
    }

    /// Link-layer address (NDA_LLADDR).
    pub fn lladdr(&self) -> Option<&[u8]> {
        self.attrs.get(Nda::Lladdr)?.as_bytes()
    }

    /// NUD_* state bits.
    pub fn state(&self) -> u16 {
        self.ndmsg.ndm_state
    }

    /// Check if the entry is usable for forwarding.
    pub fn is_reachable(&self) -> bool {
        self.ndmsg.ndm_state & (nud::REACHABLE | nud::PERMANENT | nud::NOARP) != 0
    }
}

fn decode_attr(family: u8) -> impl FnMut(Nda, &[u8]) -> Result<AttrValue> {
    move |kind, data| match kind {
        Nda::Dst => AttrValue::addr(family, data),
        Nda::Lladdr => AttrValue::addr(AF_UNSPEC, data),
        Nda::Cacheinfo => Ok(AttrValue::NeighCacheInfo(read_record::<NdaCacheInfo>(data))),
        Nda::Probes
        | Nda::Vni
        | Nda::Ifindex
        | Nda::Master
        | Nda::SrcVni
        | Nda::NhId
        | Nda::FlagsExt => AttrValue::u32(data),
        Nda::LinkNetnsid => AttrValue::i32(data),
        Nda::Vlan => AttrValue::u16(data),
        Nda::Port => AttrValue::be16(data),
        Nda::Protocol | Nda::NdmFlagsMask => AttrValue::u8(data),
        Nda::NdmStateMask => AttrValue::u16(data),
        Nda::FdbExtAttrs => AttrValue::nested(AttrSpace::Opaque, data),
        Nda::Unspec => Ok(AttrValue::bytes(data)),
    }
}

impl Poolable for NeighborMessage {
    fn pool() -> &'static Pool<Self> {
        static POOL: Pool<NeighborMessage> = Pool::new("neighbor");
        &POOL
    }

    fn reset(&mut self) {
        self.header = NlMsgHdr::default();
        self.nsid = NSID_NONE;
        self.ndmsg = NdMsg::new();
        self.attrs.clear();
    }
}

impl NetlinkMessage for NeighborMessage {
    const BODY_SIZE: usize = NdMsg::SIZE;

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
        self.ndmsg = read_body(body)?;
        let family = self.ndmsg.ndm_family;
        self.attrs.decode_with(&body[NdMsg::SIZE..], decode_attr(family))
    }

    fn body_len(&self) -> usize {
        NdMsg::SIZE + self.attrs.encoded_len()
    }

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(self.ndmsg.as_bytes());
        self.attrs.encode_into(buf)
    }
}

impl fmt::Display for NeighborMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nd = &self.ndmsg;
        let mut out = Block::open(f, NlMsgType::name(self.header.nlmsg_type))?;
        out.header(self.nsid, &self.header)?;
        out.field("family", family_name(nd.ndm_family))?;
        out.field("index", nd.ndm_ifindex)?;
        out.field("state", nud_state_names(nd.ndm_state))?;
        if nd.ndm_flags != 0 {
            out.field("ndm flags", format_args!("{:#x}", nd.ndm_flags))?;
        }
        out.field("ndm type", nd.ndm_type)?;
        out.attrs(&self.attrs)
    }
}
