//! Header-only, error and generic-family messages.

use std::fmt;

use zerocopy::IntoBytes;

use super::{Block, NSID_NONE, NetlinkMessage};
use crate::netlink::error::Result;
use crate::netlink::message::{NlMsgError, NlMsgHdr, NlMsgType};
use crate::netlink::pool::{self, Pool, Poolable};
use crate::netlink::types::nsid::RtGenMsg;
use crate::netlink::types::read_body;
use crate::util::errno::format_errno;
use crate::util::names::family_name;

/// NLMSG_NOOP and NLMSG_DONE: a header and nothing else.
///
/// A DONE message from a dump may carry a 4-byte status word; any such
/// trailing bytes are kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderMessage {
    pub header: NlMsgHdr,
    pub nsid: i32,
    /// Bytes after the header.
    pub payload: Vec<u8>,
}

impl Default for HeaderMessage {
    fn default() -> Self {
        Self {
            header: NlMsgHdr::default(),
            nsid: NSID_NONE,
            payload: Vec::new(),
        }
    }
}

impl Poolable for HeaderMessage {
    fn pool() -> &'static Pool<Self> {
        static POOL: Pool<HeaderMessage> = Pool::new("header");
        &POOL
    }

    fn reset(&mut self) {
        self.header = NlMsgHdr::default();
        self.nsid = NSID_NONE;
        self.payload.clear();
    }
}

impl NetlinkMessage for HeaderMessage {
    const BODY_SIZE: usize = 0;

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
        self.payload.extend_from_slice(body);
        Ok(())
    }

    fn body_len(&self) -> usize {
        self.payload.len()
    }

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(&self.payload);
        Ok(())
    }
}

impl fmt::Display for HeaderMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = Block::open(f, NlMsgType::name(self.header.nlmsg_type))?;
        out.header(self.nsid, &self.header)
    }
}

/// NLMSG_ERROR: a negated errno plus the header of the failed request.
///
/// An errno of zero is an acknowledgement.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    pub header: NlMsgHdr,
    pub nsid: i32,
    pub error: NlMsgError,
    /// Echoed request payload and extended-ack attributes, kept verbatim.
    pub extra: Vec<u8>,
}

impl Default for ErrorMessage {
    fn default() -> Self {
        Self {
            header: NlMsgHdr::new(NlMsgType::ERROR, 0),
            nsid: NSID_NONE,
            error: NlMsgError::default(),
            extra: Vec::new(),
        }
    }
}

impl ErrorMessage {
    /// Positive errno, zero for an ACK.
    pub fn errno(&self) -> i32 {
        -self.error.error
    }

    /// Whether this is an acknowledgement rather than a failure.
    pub fn is_ack(&self) -> bool {
        self.error.error == 0
    }

    /// Header of the request that failed.
    pub fn request(&self) -> &NlMsgHdr {
        &self.error.msg
    }
}

impl Poolable for ErrorMessage {
    fn pool() -> &'static Pool<Self> {
        static POOL: Pool<ErrorMessage> = Pool::new("error");
        &POOL
    }

    fn reset(&mut self) {
        self.header = NlMsgHdr::new(NlMsgType::ERROR, 0);
        self.nsid = NSID_NONE;
        self.error = NlMsgError::default();
        pool::OPAQUE.give(std::mem::take(&mut self.extra));
    }
}

impl NetlinkMessage for ErrorMessage {
    const BODY_SIZE: usize = NlMsgError::SIZE;

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
        self.error = read_body(body)?;
        self.extra = pool::OPAQUE.take(&body[NlMsgError::SIZE..]);
        Ok(())
    }

    fn body_len(&self) -> usize {
        NlMsgError::SIZE + self.extra.len()
    }

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(self.error.as_bytes());
        buf.extend_from_slice(&self.extra);
        Ok(())
    }
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = Block::open(f, NlMsgType::name(self.header.nlmsg_type))?;
        out.header(self.nsid, &self.header)?;
        if self.is_ack() {
            out.field("error", "ack")?;
        } else {
            out.field("error", format_errno(self.errno()))?;
        }
        let req = self.request();
        out.field("req", NlMsgType::name(req.nlmsg_type))?;
        out.indent();
        out.header(NSID_NONE, req)?;
        out.dedent();
        Ok(())
    }
}

/// rtgenmsg request: a header and an address family.
///
/// The body of generic dump requests.
#[derive(Debug, Clone, PartialEq)]
pub struct GenMessage {
    pub header: NlMsgHdr,
    pub nsid: i32,
    pub body: RtGenMsg,
}

impl Default for GenMessage {
    fn default() -> Self {
        Self {
            header: NlMsgHdr::default(),
            nsid: NSID_NONE,
            body: RtGenMsg::new(),
        }
    }
}

impl Poolable for GenMessage {
    fn pool() -> &'static Pool<Self> {
        static POOL: Pool<GenMessage> = Pool::new("generic");
        &POOL
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

impl NetlinkMessage for GenMessage {
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
        Ok(())
    }

    fn body_len(&self) -> usize {
        RtGenMsg::SIZE
    }

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(self.body.as_bytes());
        Ok(())
    }
}

impl fmt::Display for GenMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = Block::open(f, NlMsgType::name(self.header.nlmsg_type))?;
        out.header(self.nsid, &self.header)?;
        out.field("family", family_name(self.body.rtgen_family))
    }
}
