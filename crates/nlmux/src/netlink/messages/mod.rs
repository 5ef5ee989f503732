//! Typed netlink messages.
//!
//! Each message kind is a struct holding the netlink header, the
//! originating namespace id, its fixed body and an [`AttrSet`] keyed by the
//! kind's attribute enumeration. Decoded messages live in per-kind
//! [pools](crate::netlink::pool) and are handed around as [`Message`], a
//! closed enum over [`Pooled`] guards.
//!
//! # Example
//!
//! ```ignore
//! use nlmux::netlink::messages::Message;
//!
//! let msg = Message::decode(&datagram, -1)?;
//! println!("{}", msg);
//! msg.release();
//! ```

mod address;
mod header;
mod link;
mod neighbor;
mod nsid;
mod route;

pub use address::*;
pub use header::*;
pub use link::*;
pub use neighbor::*;
pub use nsid::*;
pub use route::*;

use std::fmt;
use std::str::FromStr;

use super::attr::{AttrKind, AttrSet};
use super::error::{Error, Result};
use super::message::{NLM_F_DUMP, NLM_F_REQUEST, NLMSG_HDRLEN, NlMsgHdr, NlMsgType, flag_names, nlmsg_align};
use super::pool::{Poolable, Pooled};
use super::types::nsid::RtGenMsg;

/// Namespace id of a message that is not namespace-scoped.
pub const NSID_NONE: i32 = -1;

/// The kind of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    Noop,
    Error,
    Done,
    Generic,
    Link,
    Address,
    Route,
    Neighbor,
    Netns,
}

impl MessageKind {
    /// Every kind, in declaration order.
    pub const ALL: [MessageKind; 9] = [
        Self::Noop,
        Self::Error,
        Self::Done,
        Self::Generic,
        Self::Link,
        Self::Address,
        Self::Route,
        Self::Neighbor,
        Self::Netns,
    ];

    /// Short name used by filters.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Error => "error",
            Self::Done => "done",
            Self::Generic => "generic",
            Self::Link => "link",
            Self::Address => "addr",
            Self::Route => "route",
            Self::Neighbor => "neighbor",
            Self::Netns => "netns",
        }
    }

    /// Kind a header type decodes to, ignoring the generic request form.
    pub fn from_type(msg_type: u16) -> Option<Self> {
        match msg_type {
            NlMsgType::NOOP => Some(Self::Noop),
            NlMsgType::ERROR => Some(Self::Error),
            NlMsgType::DONE => Some(Self::Done),
            NlMsgType::RTM_NEWLINK..=NlMsgType::RTM_SETLINK => Some(Self::Link),
            NlMsgType::RTM_NEWADDR..=NlMsgType::RTM_GETADDR => Some(Self::Address),
            NlMsgType::RTM_NEWROUTE..=NlMsgType::RTM_GETROUTE => Some(Self::Route),
            NlMsgType::RTM_NEWNEIGH..=NlMsgType::RTM_GETNEIGH => Some(Self::Neighbor),
            NlMsgType::RTM_NEWNSID..=NlMsgType::RTM_GETNSID => Some(Self::Netns),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MessageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| Error::InvalidMessage(format!("unknown message kind: {}", s)))
    }
}

/// Shared shape of every typed message.
pub trait NetlinkMessage: Poolable {
    /// Size of the fixed body that follows the header.
    const BODY_SIZE: usize;

    /// Netlink header.
    fn header(&self) -> &NlMsgHdr;

    /// Mutable netlink header.
    fn header_mut(&mut self) -> &mut NlMsgHdr;

    /// Originating namespace id, [`NSID_NONE`] if not namespace-scoped.
    fn nsid(&self) -> i32;

    /// Tag the message with a namespace id.
    fn set_nsid(&mut self, nsid: i32);

    /// Decode everything after the header.
    ///
    /// `body` is cut to the header's declared length and holds at least
    /// `BODY_SIZE` bytes.
    fn decode_body(&mut self, body: &[u8]) -> Result<()>;

    /// Encoded size of the fixed body plus attributes.
    fn body_len(&self) -> usize;

    /// Append the fixed body and attributes to `buf`.
    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<()>;
}

/// Decode one message of a known kind.
///
/// The object is taken from the kind's pool and goes back to it if decoding
/// fails part way.
pub fn decode_as<T: NetlinkMessage>(bytes: &[u8], nsid: i32) -> Result<Pooled<T>> {
    let header = NlMsgHdr::read(bytes)?;
    let len = header.nlmsg_len as usize;
    if len > bytes.len() {
        return Err(Error::Truncated {
            expected: len,
            actual: bytes.len(),
        });
    }
    let min = NLMSG_HDRLEN + T::BODY_SIZE;
    if len < min {
        return Err(Error::Truncated {
            expected: min,
            actual: len,
        });
    }

    let mut msg = Pooled::<T>::acquire();
    *msg.header_mut() = header;
    msg.set_nsid(nsid);
    match msg.decode_body(&bytes[NLMSG_HDRLEN..len]) {
        Ok(()) => Ok(msg),
        Err(e) => {
            msg.release();
            Err(e)
        }
    }
}

/// Encode one message; the header length is set to the aligned total.
pub fn encode_as<T: NetlinkMessage>(msg: &T) -> Result<Vec<u8>> {
    let total = nlmsg_align(NLMSG_HDRLEN + msg.body_len());
    let mut header = *msg.header();
    header.nlmsg_len = u32::try_from(total)
        .map_err(|_| Error::InvalidMessage(format!("message too large: {} bytes", total)))?;

    let mut buf = Vec::with_capacity(total);
    buf.extend_from_slice(header.as_bytes());
    msg.encode_body(&mut buf)?;
    buf.resize(total, 0);
    Ok(buf)
}

/// A decoded or to-be-sent netlink message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Noop(Pooled<HeaderMessage>),
    Done(Pooled<HeaderMessage>),
    Error(Pooled<ErrorMessage>),
    Generic(Pooled<GenMessage>),
    Link(Pooled<LinkMessage>),
    Address(Pooled<AddressMessage>),
    Route(Pooled<RouteMessage>),
    Neighbor(Pooled<NeighborMessage>),
    Netns(Pooled<NetnsMessage>),
}

macro_rules! each_message {
    ($msg:expr, $m:ident => $body:expr) => {
        match $msg {
            Message::Noop($m) | Message::Done($m) => $body,
            Message::Error($m) => $body,
            Message::Generic($m) => $body,
            Message::Link($m) => $body,
            Message::Address($m) => $body,
            Message::Route($m) => $body,
            Message::Neighbor($m) => $body,
            Message::Netns($m) => $body,
        }
    };
}

/// Whether a GET request carries only an rtgenmsg body.
fn is_generic_request(header: &NlMsgHdr) -> bool {
    matches!(
        header.nlmsg_type,
        NlMsgType::RTM_GETLINK
            | NlMsgType::RTM_GETADDR
            | NlMsgType::RTM_GETROUTE
            | NlMsgType::RTM_GETNEIGH
    ) && header.nlmsg_flags & NLM_F_REQUEST != 0
        && header.nlmsg_len as usize == NLMSG_HDRLEN + RtGenMsg::SIZE
}

impl Message {
    /// Decode the message at the front of `bytes`, tagging it with `nsid`.
    ///
    /// Types without a decoder yield [`Error::UnsupportedMessage`].
    pub fn decode(bytes: &[u8], nsid: i32) -> Result<Self> {
        let header = NlMsgHdr::read(bytes)?;
        if is_generic_request(&header) {
            return decode_as(bytes, nsid).map(Self::Generic);
        }
        match MessageKind::from_type(header.nlmsg_type) {
            Some(MessageKind::Noop) => decode_as(bytes, nsid).map(Self::Noop),
            Some(MessageKind::Done) => decode_as(bytes, nsid).map(Self::Done),
            Some(MessageKind::Error) => decode_as(bytes, nsid).map(Self::Error),
            Some(MessageKind::Generic) => decode_as(bytes, nsid).map(Self::Generic),
            Some(MessageKind::Link) => decode_as(bytes, nsid).map(Self::Link),
            Some(MessageKind::Address) => decode_as(bytes, nsid).map(Self::Address),
            Some(MessageKind::Route) => decode_as(bytes, nsid).map(Self::Route),
            Some(MessageKind::Neighbor) => decode_as(bytes, nsid).map(Self::Neighbor),
            Some(MessageKind::Netns) => decode_as(bytes, nsid).map(Self::Netns),
            None => Err(Error::UnsupportedMessage(header.nlmsg_type)),
        }
    }

    /// Encode to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        each_message!(self, m => encode_as(&**m))
    }

    /// A dump request (`NLM_F_REQUEST | NLM_F_DUMP`) for `msg_type`.
    pub fn dump_request(msg_type: u16, family: u8) -> Self {
        let mut msg = Pooled::<GenMessage>::acquire();
        msg.header = NlMsgHdr::new(msg_type, NLM_F_REQUEST | NLM_F_DUMP);
        msg.body = RtGenMsg::with_family(family);
        Self::Generic(msg)
    }

    /// Kind of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Noop(_) => MessageKind::Noop,
            Self::Done(_) => MessageKind::Done,
            Self::Error(_) => MessageKind::Error,
            Self::Generic(_) => MessageKind::Generic,
            Self::Link(_) => MessageKind::Link,
            Self::Address(_) => MessageKind::Address,
            Self::Route(_) => MessageKind::Route,
            Self::Neighbor(_) => MessageKind::Neighbor,
            Self::Netns(_) => MessageKind::Netns,
        }
    }

    /// Netlink header.
    pub fn header(&self) -> &NlMsgHdr {
        each_message!(self, m => m.header())
    }

    /// Mutable netlink header.
    pub fn header_mut(&mut self) -> &mut NlMsgHdr {
        each_message!(self, m => m.header_mut())
    }

    /// Originating namespace id.
    pub fn nsid(&self) -> i32 {
        each_message!(self, m => m.nsid())
    }

    /// Tag the message with a namespace id.
    pub fn set_nsid(&mut self, nsid: i32) {
        each_message!(self, m => m.set_nsid(nsid))
    }

    /// Whether this message ends a multipart dump.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// Return the message to its pool.
    pub fn release(self) {
        each_message!(self, m => m.release())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        each_message!(self, m => fmt::Display::fmt(&**m, f))
    }
}

macro_rules! message_from {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<Pooled<$ty>> for Message {
                fn from(msg: Pooled<$ty>) -> Self {
                    Self::$variant(msg)
                }
            }
        )*
    };
}

message_from! {
    Error => ErrorMessage,
    Generic => GenMessage,
    Link => LinkMessage,
    Address => AddressMessage,
    Route => RouteMessage,
    Neighbor => NeighborMessage,
    Netns => NetnsMessage,
}

/// Indented `name: value` writer behind every message's `Display`.
pub(crate) struct Block<'a, 'b> {
    f: &'a mut fmt::Formatter<'b>,
    depth: usize,
}

impl<'a, 'b> Block<'a, 'b> {
    /// Write the `title:` line and indent what follows.
    pub(crate) fn open(f: &'a mut fmt::Formatter<'b>, title: &str) -> std::result::Result<Self, fmt::Error> {
        writeln!(f, "{}:", title)?;
        Ok(Self { f, depth: 1 })
    }

    pub(crate) fn field(&mut self, name: &str, value: impl fmt::Display) -> fmt::Result {
        writeln!(self.f, "{:width$}{}: {}", "", name, value, width = self.depth * 4)
    }

    pub(crate) fn indent(&mut self) {
        self.depth += 1;
    }

    pub(crate) fn dedent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Namespace id (unless unscoped) and the header fields.
    pub(crate) fn header(&mut self, nsid: i32, header: &NlMsgHdr) -> fmt::Result {
        if nsid != NSID_NONE {
            self.field("nsid", nsid)?;
        }
        self.field("len", header.nlmsg_len)?;
        self.field("seq", header.nlmsg_seq)?;
        self.field("pid", header.nlmsg_pid)?;
        if header.nlmsg_flags != 0 {
            self.field("flags", flag_names(header.nlmsg_flags))?;
        }
        Ok(())
    }

    /// Every populated attribute as `name: value`.
    pub(crate) fn attrs<K: AttrKind>(&mut self, attrs: &AttrSet<K>) -> fmt::Result {
        for (id, value) in attrs.iter() {
            self.field(&AttrSet::<K>::name_of(id), value)?;
        }
        Ok(())
    }
}
