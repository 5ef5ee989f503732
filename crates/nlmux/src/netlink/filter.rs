//! Message-kind selection.
//!
//! ```ignore
//! use nlmux::netlink::filter::MessageFilter;
//!
//! let filter = MessageFilter::from_names(["link", "addr"])?;
//! if filter.matches(&msg) {
//!     println!("{}", msg);
//! }
//! ```

use std::collections::BTreeSet;

use super::error::Result;
use super::messages::{Message, MessageKind};

/// A set of message kinds to keep. An empty set keeps everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFilter {
    kinds: BTreeSet<MessageKind>,
}

impl MessageFilter {
    /// A filter that keeps every message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse kind names such as `link` or `addr`.
    ///
    /// An unknown name is an error.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let kinds = names
            .into_iter()
            .map(|name| name.as_ref().parse())
            .collect::<Result<_>>()?;
        Ok(Self { kinds })
    }

    /// Also keep messages of `kind`.
    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kinds.insert(kind);
        self
    }

    /// Whether no kind has been selected.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Whether messages of `kind` are kept.
    pub fn includes(&self, kind: MessageKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }

    /// Whether `msg` is kept.
    pub fn matches(&self, msg: &Message) -> bool {
        self.includes(msg.kind())
    }

    /// Selected kinds, in declaration order.
    pub fn kinds(&self) -> impl Iterator<Item = MessageKind> + '_ {
        self.kinds.iter().copied()
    }
}

impl FromIterator<MessageKind> for MessageFilter {
    fn from_iter<I: IntoIterator<Item = MessageKind>>(iter: I) -> Self {
        Self {
            kinds: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::message::NlMsgType;
    use crate::netlink::messages::NSID_NONE;

    #[test]
    fn test_empty_filter_keeps_everything() {
        let filter = MessageFilter::new();
        assert!(filter.is_empty());
        for kind in MessageKind::ALL {
            assert!(filter.includes(kind));
        }
    }

    #[test]
    fn test_from_names() {
        let filter = MessageFilter::from_names(["route", "link", "link"]).unwrap();
        assert_eq!(
            filter.kinds().collect::<Vec<_>>(),
            vec![MessageKind::Link, MessageKind::Route]
        );
        assert!(filter.includes(MessageKind::Route));
        assert!(!filter.includes(MessageKind::Neighbor));
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let err = MessageFilter::from_names(["link", "qdisc"]).unwrap_err();
        assert!(err.to_string().contains("qdisc"));
    }

    #[test]
    fn test_matches_message() {
        let filter = MessageFilter::new().with_kind(MessageKind::Generic);
        let request = Message::dump_request(NlMsgType::RTM_GETLINK, 0);
        assert!(filter.matches(&request));
        assert_eq!(request.nsid(), NSID_NONE);
        request.release();

        let filter: MessageFilter = [MessageKind::Done].into_iter().collect();
        let request = Message::dump_request(NlMsgType::RTM_GETADDR, 0);
        assert!(!filter.matches(&request));
        request.release();
    }
}
