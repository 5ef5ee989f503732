//! Async rtnetlink codec and socket multiplexer for Linux.
//!
//! The layers, bottom up:
//!
//! - [`message`] and [`types`]: the fixed wire layouts.
//! - [`attr`] and [`value`]: the TLV attribute codec and typed values.
//! - [`messages`]: typed message kinds behind the [`Message`] enum.
//! - [`pool`]: recycled message storage.
//! - [`socket`], [`namespace`] and [`mux`]: kernel sockets, named network
//!   namespaces and the multiplexer that merges them onto one channel.
//!
//! # Quick Start
//!
//! ```ignore
//! use nlmux::netlink::{MessageFilter, MuxConfig, Multiplexer};
//!
//! let mut mux = Multiplexer::new(MuxConfig::new().with_dump_on_listen(true))?;
//! let filter = MessageFilter::from_names(["link", "addr"])?;
//!
//! let mut rx = mux.listen()?;
//! while let Some(msg) = rx.recv().await {
//!     if filter.matches(&msg) {
//!         print!("{}", msg);
//!     }
//!     msg.release();
//! }
//! ```

pub mod attr;
mod error;
pub mod filter;
pub mod message;
pub mod messages;
pub mod mux;
pub mod namespace;
pub mod pool;
pub mod socket;
pub mod types;
pub mod value;

pub use attr::{AttrKind, AttrSet};
pub use error::{Error, Result};
pub use filter::MessageFilter;
pub use message::{MessageIter, NLMSG_HDRLEN, NlMsgHdr, NlMsgType};
pub use messages::{Message, MessageKind, NSID_NONE};
pub use mux::{MuxConfig, Multiplexer, Receiver, SocketState};
pub use pool::Pooled;
pub use socket::{NetlinkSocket, Transport, rtnetlink_groups};
pub use value::AttrValue;
