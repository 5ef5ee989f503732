//! Typed rtnetlink codec and namespace-aware socket multiplexer.
//!
//! `nlmux` decodes and encodes Linux rtnetlink messages (links, addresses,
//! routes, neighbors and namespace ids) into typed, pooled values, and
//! merges the multicast streams of several network namespaces into one
//! ordered channel.
//!
//! # Example
//!
//! ```ignore
//! use nlmux::netlink::{MuxConfig, Multiplexer};
//!
//! #[tokio::main]
//! async fn main() -> nlmux::Result<()> {
//!     let mut mux = Multiplexer::new(MuxConfig::new())?;
//!     mux.join_all_namespaces().await?;
//!
//!     let mut rx = mux.listen()?;
//!     while let Some(msg) = rx.recv().await {
//!         print!("{}", msg);
//!         msg.release();
//!     }
//!
//!     mux.join().await
//! }
//! ```

pub mod netlink;
pub mod util;

pub use netlink::{Error, Message, Multiplexer, Result};
