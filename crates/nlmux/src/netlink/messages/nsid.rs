//! Namespace id message (RTM_NEWNSID / RTM_DELNSID / RTM_GETNSID).

use std::fmt;
use std::os::fd::RawFd;

use zerocopy::IntoBytes;

use super::{Block, NSID_NONE, NetlinkMessage};
use crate::netlink::attr::AttrSet;
use crate::netlink::error::Result;
use crate::netlink::message::{NLM_F_ACK, NLM_F_REQUEST, NlMsgHdr, NlMsgType};
use crate::netlink::pool::{Pool, Poolable, Pooled};
use crate::netlink::types::nsid::{Netnsa, RtGenMsg};
use crate::netlink::types::read_body;
use crate::netlink::value::AttrValue;
use crate::util::names::family_name;

/// Placeholder for an NETNSA_NSID the kernel left out.
pub const NSID_UNKNOWN: i32 = -2;

/// Placeholder for an NETNSA_FD the kernel left out.
pub const FD_UNKNOWN: u32 = u32::MAX;

/// Namespace id assignment, query or reply.
#[derive(Debug, Clone, PartialEq)]
pub struct NetnsMessage {
    pub header: NlMsgHdr,
    pub nsid: i32,
    pub body: RtGenMsg,
    pub attrs: AttrSet<Netnsa>,
}

impl Default for NetnsMessage {
    fn default() -> Self {
        Self {
            header: NlMsgHdr::default(),
            nsid: NSID_NONE,
            body: RtGenMsg::new(),
            attrs: AttrSet::new(),
        }
    }
}

impl NetnsMessage {
    /// Ask for the id the current namespace uses for the namespace behind `fd`.
    pub fn query_fd(fd: RawFd) -> Pooled<Self> {
        let mut msg = Pooled::<Self>::acquire();
        msg.header = NlMsgHdr::new(NlMsgType::RTM_GETNSID, NLM_F_REQUEST);
        msg.attrs.set(Netnsa::Fd, AttrValue::U32(fd as u32));
        msg
    }

    /// Assign `nsid` to the namespace behind `fd`; a negative id lets the
    /// kernel pick one.
    pub fn assign_fd(fd: RawFd, nsid: i32) -> Pooled<Self> {
        let mut msg = Pooled::<Self>::acquire();
        msg.header = NlMsgHdr::new(NlMsgType::RTM_NEWNSID, NLM_F_REQUEST | NLM_F_ACK);
        msg.attrs.set(Netnsa::Nsid, AttrValue::I32(nsid));
        msg.attrs.set(Netnsa::Fd, AttrValue::U32(fd as u32));
        msg
    }

    /// NETNSA_NSID, or [`NSID_UNKNOWN`] when absent.
    pub fn ns_id(&self) -> i32 {
        self.attrs
            .get(Netnsa::Nsid)
            .and_then(AttrValue::as_i32)
            .unwrap_or(NSID_UNKNOWN)
    }

    /// NETNSA_PID, or 0 when absent.
    pub fn pid(&self) -> u32 {
        self.attrs
            .get(Netnsa::Pid)
            .and_then(AttrValue::as_u32)
            .unwrap_or(0)
    }

    /// NETNSA_FD, or [`FD_UNKNOWN`] when absent.
    pub fn fd(&self) -> u32 {
        self.attrs
            .get(Netnsa::Fd)
            .and_then(AttrValue::as_u32)
            .unwrap_or(FD_UNKNOWN)
    }
}

fn decode_attr(kind: Netnsa, data: &[u8]) -> Result<AttrValue> {
    match kind {
        Netnsa::Nsid | Netnsa::TargetNsid | Netnsa::CurrentNsid => AttrValue::i32(data),
        Netnsa::Pid | Netnsa::Fd => AttrValue::u32(data),
        Netnsa::None => Ok(AttrValue::bytes(data)),
    }
}

impl Poolable for NetnsMessage {
    fn pool() -> &'static Pool<Self> {
        static POOL: Pool<NetnsMessage> = Pool::new("netns");
        &POOL
    }

    fn reset(&mut self) {
        self.header = NlMsgHdr::default();
        self.nsid = NSID_NONE;
        self.body = RtGenMsg::new();
        self.attrs.clear();
    }
}

impl NetlinkMessage for NetnsMessage {
    const BODY_SIZE: usize = RtGenMsg::SIZE;

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
        self.body = read_body(body)?;
        // The kernel may omit any of these.
        self.attrs.set(Netnsa::Nsid, AttrValue::I32(NSID_UNKNOWN));
        self.attrs.set(Netnsa::Pid, AttrValue::U32(0));
        self.attrs.set(Netnsa::Fd, AttrValue::U32(FD_UNKNOWN));
        self.attrs.decode_with(&body[RtGenMsg::SIZE..], decode_attr)
    }

    fn body_len(&self) -> usize {
        RtGenMsg::SIZE + self.attrs.encoded_len()
    }

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(self.body.as_bytes());
        self.attrs.encode_into(buf)
    }
}

impl fmt::Display for NetnsMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = Block::open(f, NlMsgType::name(self.header.nlmsg_type))?;
        out.header(self.nsid, &self.header)?;
        out.field("family", family_name(self.body.rtgen_family))?;
        out.attrs(&self.attrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::messages::{Message, MessageKind, encode_as};

    #[test]
    fn test_absent_attributes_read_as_sentinels() {
        let mut reply = NetnsMessage {
            header: NlMsgHdr::new(NlMsgType::RTM_NEWNSID, 0),
            ..Default::default()
        };
        reply.attrs.set(Netnsa::Nsid, AttrValue::I32(5));
        let bytes = encode_as(&reply).unwrap();

        let msg = Message::decode(&bytes, NSID_NONE).unwrap();
        assert_eq!(msg.kind(), MessageKind::Netns);
        let Message::Netns(ns) = &msg else {
            panic!("expected netns message");
        };
        assert_eq!(ns.ns_id(), 5);
        assert_eq!(ns.pid(), 0);
        assert_eq!(ns.fd(), FD_UNKNOWN);
        assert_eq!(ns.attrs.get(Netnsa::Fd), Some(&AttrValue::U32(u32::MAX)));
        msg.release();
    }

    #[test]
    fn test_empty_reply_has_unknown_nsid() {
        let reply = NetnsMessage {
            header: NlMsgHdr::new(NlMsgType::RTM_NEWNSID, 0),
            ..Default::default()
        };
        let bytes = encode_as(&reply).unwrap();
        assert_eq!(bytes.len(), 20);

        let msg = Message::decode(&bytes, NSID_NONE).unwrap();
        let Message::Netns(ns) = &msg else {
            panic!("expected netns message");
        };
        assert_eq!(ns.attrs.get(Netnsa::Nsid), Some(&AttrValue::I32(-2)));
        let text = msg.to_string();
        assert!(text.starts_with("new nsid:\n"));
        assert!(text.contains("    nsid: -2\n    pid: 0\n    fd: 4294967295\n"));
        msg.release();
    }

    #[test]
    fn test_query_carries_only_fd() {
        let query = NetnsMessage::query_fd(7);
        assert_eq!(query.attrs.len(), 1);
        assert_eq!(query.header.nlmsg_type, NlMsgType::RTM_GETNSID);
        let bytes = encode_as(&*query).unwrap();
        assert_eq!(bytes.len(), 16 + 4 + 8);
        query.release();

        let assign = NetnsMessage::assign_fd(7, -1);
        assert_eq!(assign.attrs.get(Netnsa::Nsid), Some(&AttrValue::I32(-1)));
        assert_ne!(assign.header.nlmsg_flags & NLM_F_ACK, 0);
        assign.release();
    }
}
