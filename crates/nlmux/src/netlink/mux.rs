//! Namespace-aware socket multiplexer.
//!
//! A [`Multiplexer`] owns one transport for the current network namespace
//! and, after [`join_all_namespaces`](Multiplexer::join_all_namespaces),
//! one more per named namespace. [`listen`](Multiplexer::listen) starts a
//! reader task per transport; every reader decodes the datagrams it
//! receives, tags each message with its transport's namespace id and
//! publishes it on one bounded channel.
//!
//! Messages from one reader arrive in kernel order. Messages from different
//! readers interleave arbitrarily. A full channel stalls every reader.
//!
//! # Example
//!
//! ```ignore
//! use nlmux::netlink::mux::{MuxConfig, Multiplexer};
//!
//! let mut mux = Multiplexer::new(MuxConfig::new().with_dump_on_listen(true))?;
//! mux.join_all_namespaces().await?;
//! let mut rx = mux.listen()?;
//! while let Some(msg) = rx.recv().await {
//!     println!("{}", msg);
//!     msg.release();
//! }
//! mux.join().await?;
//! ```

use std::collections::VecDeque;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tracing::{debug, trace, warn};

use super::error::{Error, Result};
use super::message::{MessageIter, NlMsgType};
use super::messages::{Message, NSID_NONE, NetnsMessage};
use super::namespace::{self, NETNS_RUN_DIR};
use super::socket::{DEFAULT_RECV_BUFFER, NetlinkSocket, Transport, rtnetlink_groups};
use super::types::nsid::NETNSA_NSID_NOT_ASSIGNED;

/// Default channel capacity.
pub const DEFAULT_CAPACITY: usize = 64;

/// Multiplexer configuration.
#[derive(Debug, Clone)]
pub struct MuxConfig {
    groups: Vec<u32>,
    capacity: usize,
    recv_buffer: usize,
    netns_dir: PathBuf,
    dump_on_listen: bool,
}

impl Default for MuxConfig {
    fn default() -> Self {
        use rtnetlink_groups::*;
        Self {
            groups: vec![
                RTNLGRP_LINK,
                RTNLGRP_NOTIFY,
                RTNLGRP_NEIGH,
                RTNLGRP_IPV4_IFADDR,
                RTNLGRP_IPV4_ROUTE,
                RTNLGRP_IPV6_IFADDR,
                RTNLGRP_IPV6_ROUTE,
                RTNLGRP_NSID,
            ],
            capacity: DEFAULT_CAPACITY,
            recv_buffer: DEFAULT_RECV_BUFFER,
            netns_dir: PathBuf::from(NETNS_RUN_DIR),
            dump_on_listen: false,
        }
    }
}

impl MuxConfig {
    /// Create a configuration with the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the multicast groups each socket joins.
    pub fn with_groups(mut self, groups: impl IntoIterator<Item = u32>) -> Self {
        self.groups = groups.into_iter().collect();
        self
    }

    /// Set the channel capacity; zero is raised to one.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Set the per-socket receive buffer size.
    pub fn with_recv_buffer(mut self, size: usize) -> Self {
        self.recv_buffer = size;
        self
    }

    /// Set the directory holding named namespaces.
    pub fn with_netns_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.netns_dir = dir.into();
        self
    }

    /// Dump links, addresses, routes and neighbors when listening starts.
    pub fn with_dump_on_listen(mut self, dump: bool) -> Self {
        self.dump_on_listen = dump;
        self
    }

    /// Multicast groups.
    pub fn groups(&self) -> &[u32] {
        &self.groups
    }

    /// Channel capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Per-socket receive buffer size.
    pub fn recv_buffer(&self) -> usize {
        self.recv_buffer
    }

    /// Directory holding named namespaces.
    pub fn netns_dir(&self) -> &Path {
        &self.netns_dir
    }

    /// Whether listening starts with dump requests.
    pub fn dump_on_listen(&self) -> bool {
        self.dump_on_listen
    }
}

/// Lifecycle of a [`Multiplexer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    /// Closed; nothing more can be sent or received.
    Closed,
    /// The current-namespace transport is open.
    Bound,
    /// Transports for named namespaces are open as well.
    JoinedNamespaces,
    /// Reader tasks are running.
    Listening,
}

impl SocketState {
    /// State name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Bound => "bound",
            Self::JoinedNamespaces => "joined-namespaces",
            Self::Listening => "listening",
        }
    }
}

struct Member<T> {
    nsid: i32,
    transport: Weak<T>,
}

/// Multi-namespace netlink multiplexer.
pub struct Multiplexer<T: Transport = NetlinkSocket> {
    config: MuxConfig,
    state: SocketState,
    members: Vec<Member<T>>,
    // Strong handles until `listen` moves each one into its reader.
    owned: Vec<Arc<T>>,
    readers: Vec<JoinHandle<Result<()>>>,
    shutdown: watch::Sender<bool>,
}

impl Multiplexer<NetlinkSocket> {
    /// Open a socket in the current namespace and join the configured
    /// multicast groups.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: MuxConfig) -> Result<Self> {
        let mut socket = NetlinkSocket::new()?.with_recv_buffer(config.recv_buffer);
        for &group in &config.groups {
            socket.add_membership(group)?;
        }
        Ok(Self::from_transports(config, vec![(NSID_NONE, socket)]))
    }

    /// Open a socket in every named namespace.
    ///
    /// Each namespace's id is looked up with `RTM_GETNSID`, and assigned
    /// with `RTM_NEWNSID` if it has none yet. Returns the number of
    /// namespaces joined.
    pub async fn join_all_namespaces(&mut self) -> Result<usize> {
        self.expect_state(SocketState::Bound)?;
        let ctl = NetlinkSocket::new()?;
        let mut joined = 0;
        for (name, ns) in namespace::open_all(&self.config.netns_dir)? {
            let nsid = resolve_nsid(&ctl, ns.as_raw_fd()).await?;
            let mut socket = NetlinkSocket::new_in_namespace(ns.as_raw_fd())?
                .with_recv_buffer(self.config.recv_buffer);
            for &group in &self.config.groups {
                socket.add_membership(group)?;
            }
            debug!(namespace = %name, nsid, "joined namespace");
            self.push_member(nsid, socket);
            joined += 1;
        }
        self.state = SocketState::JoinedNamespaces;
        Ok(joined)
    }
}

impl<T: Transport> Multiplexer<T> {
    /// Build a multiplexer over already-open transports, each paired with
    /// the namespace id its messages are tagged with.
    pub fn from_transports(config: MuxConfig, transports: Vec<(i32, T)>) -> Self {
        let state = if transports.len() > 1 {
            SocketState::JoinedNamespaces
        } else {
            SocketState::Bound
        };
        let (shutdown, _) = watch::channel(false);
        let mut mux = Self {
            config,
            state,
            members: Vec::new(),
            owned: Vec::new(),
            readers: Vec::new(),
            shutdown,
        };
        for (nsid, transport) in transports {
            mux.push_member(nsid, transport);
        }
        mux
    }

    fn push_member(&mut self, nsid: i32, transport: T) {
        let transport = Arc::new(transport);
        self.members.push(Member {
            nsid,
            transport: Arc::downgrade(&transport),
        });
        self.owned.push(transport);
    }

    /// Current state.
    pub fn state(&self) -> SocketState {
        self.state
    }

    /// Configuration in use.
    pub fn config(&self) -> &MuxConfig {
        &self.config
    }

    /// Namespace id of each open transport, current namespace first.
    ///
    /// A transport is closed once its reader fails, and drops out of this
    /// list.
    pub fn nsids(&self) -> Vec<i32> {
        self.members
            .iter()
            .filter(|m| m.transport.strong_count() > 0)
            .map(|m| m.nsid)
            .collect()
    }

    fn expect_state(&self, expected: SocketState) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState {
                expected: expected.name(),
                actual: self.state.name(),
            });
        }
        Ok(())
    }

    /// Start one reader task per transport and return the shared channel.
    pub fn listen(&mut self) -> Result<Receiver> {
        if !matches!(
            self.state,
            SocketState::Bound | SocketState::JoinedNamespaces
        ) {
            return Err(Error::InvalidState {
                expected: "bound or joined-namespaces",
                actual: self.state.name(),
            });
        }

        let (tx, rx) = mpsc::channel(self.config.capacity);
        for (member, transport) in self.members.iter().zip(self.owned.drain(..)) {
            let dumps = if self.config.dump_on_listen {
                dump_requests()
            } else {
                VecDeque::new()
            };
            let reader = read_loop(
                transport,
                member.nsid,
                tx.clone(),
                self.shutdown.subscribe(),
                dumps,
            );
            self.readers.push(tokio::spawn(reader));
        }
        self.state = SocketState::Listening;
        Ok(Receiver { rx })
    }

    /// Send a request through the current-namespace transport.
    ///
    /// The message is stamped with the next sequence number, encoded and
    /// released. Returns the sequence number. Fails with
    /// [`Error::ChannelClosed`] once that transport's reader has failed.
    pub async fn send(&self, msg: Message) -> Result<u32> {
        let transport = match self.members.first() {
            Some(m) if self.state != SocketState::Closed => m.transport.upgrade(),
            _ => {
                msg.release();
                return Err(Error::InvalidState {
                    expected: "open",
                    actual: self.state.name(),
                });
            }
        };
        let Some(transport) = transport else {
            msg.release();
            return Err(Error::ChannelClosed);
        };
        send_request(&*transport, msg).await
    }

    /// Stop every reader at its next wakeup and drop the transports.
    pub fn close(&mut self) {
        self.shutdown.send_replace(true);
        self.members.clear();
        self.owned.clear();
        self.state = SocketState::Closed;
    }

    /// Wait for every reader to finish.
    ///
    /// Returns the first reader failure, if any.
    pub async fn join(&mut self) -> Result<()> {
        let mut first = Ok(());
        for reader in self.readers.drain(..) {
            let result = match reader.await {
                Ok(result) => result,
                Err(e) => Err(Error::Io(std::io::Error::other(e))),
            };
            if let Err(e) = result {
                if first.is_ok() {
                    first = Err(e);
                }
            }
        }
        first
    }
}

impl<T: Transport> Drop for Multiplexer<T> {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

/// Consumer end of the multiplexer channel.
pub struct Receiver {
    rx: mpsc::Receiver<Message>,
}

impl Receiver {
    /// Next message; `None` once every reader has stopped.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }
}

impl Stream for Receiver {
    type Item = Message;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Message>> {
        self.rx.poll_recv(cx)
    }
}

fn dump_requests() -> VecDeque<Message> {
    [
        NlMsgType::RTM_GETLINK,
        NlMsgType::RTM_GETADDR,
        NlMsgType::RTM_GETROUTE,
        NlMsgType::RTM_GETNEIGH,
    ]
    .into_iter()
    .map(|ty| Message::dump_request(ty, libc::AF_UNSPEC as u8))
    .collect()
}

async fn send_request<T: Transport>(transport: &T, mut msg: Message) -> Result<u32> {
    let seq = transport.next_seq();
    msg.header_mut().nlmsg_seq = seq;
    let bytes = msg.encode();
    msg.release();
    transport.send(&bytes?).await?;
    Ok(seq)
}

/// Send the next queued dump request, returning its sequence number.
async fn send_next_dump<T: Transport>(
    transport: &T,
    dumps: &mut VecDeque<Message>,
) -> Result<Option<u32>> {
    match dumps.pop_front() {
        Some(req) => send_request(transport, req).await.map(Some),
        None => Ok(None),
    }
}

/// Whether `msg` ends the dump sent with sequence number `pending`.
fn ends_dump(msg: &Message, pending: Option<u32>) -> bool {
    match msg {
        Message::Done(_) => true,
        Message::Error(_) => pending == Some(msg.header().nlmsg_seq),
        _ => false,
    }
}

async fn read_loop<T: Transport>(
    transport: Arc<T>,
    nsid: i32,
    tx: mpsc::Sender<Message>,
    mut shutdown: watch::Receiver<bool>,
    mut dumps: VecDeque<Message>,
) -> Result<()> {
    debug!(nsid, "reader started");
    let result = read_datagrams(&*transport, nsid, &tx, &mut shutdown, &mut dumps).await;
    for req in dumps {
        req.release();
    }
    match &result {
        Ok(()) => debug!(nsid, "reader stopped"),
        Err(e) => warn!(nsid, error = %e, "reader failed, closing transport"),
    }
    // The reader holds the last strong handle; dropping it closes the socket.
    drop(transport);
    result
}

async fn read_datagrams<T: Transport>(
    transport: &T,
    nsid: i32,
    tx: &mpsc::Sender<Message>,
    shutdown: &mut watch::Receiver<bool>,
    dumps: &mut VecDeque<Message>,
) -> Result<()> {
    let mut pending = send_next_dump(transport, dumps).await?;
    loop {
        if *shutdown.borrow() {
            return Ok(());
        }
        // Shutdown cancels a receive still in progress. A datagram already
        // received is always decoded and published in full.
        let datagram = tokio::select! {
            _ = shutdown.changed() => return Ok(()),
            datagram = transport.recv() => datagram?,
        };
        if datagram.is_empty() {
            return Ok(());
        }

        for span in MessageIter::new(&datagram) {
            let msg = match Message::decode(span?, nsid) {
                Ok(msg) => msg,
                Err(Error::UnsupportedMessage(ty)) => {
                    debug!(nsid, msg_type = ty, "skipping unsupported message");
                    continue;
                }
                Err(e) => return Err(e),
            };
            trace!(nsid, kind = %msg.kind(), seq = msg.header().nlmsg_seq, "decoded");
            let finished = ends_dump(&msg, pending);
            if let (true, Message::Error(err)) = (finished, &msg) {
                debug!(nsid, errno = err.error.error, "dump refused, sending next");
            }
            if let Err(mpsc::error::SendError(msg)) = tx.send(msg).await {
                msg.release();
                return Err(Error::ChannelClosed);
            }
            if finished {
                pending = send_next_dump(transport, dumps).await?;
            }
        }
    }
}

/// Send `msg` on `ctl` and wait for the reply carrying its sequence number.
///
/// Returns `None` for an acknowledgement. A kernel error reply becomes
/// [`Error::Kernel`].
async fn transact<T: Transport>(ctl: &T, msg: Message) -> Result<Option<Message>> {
    let seq = send_request(ctl, msg).await?;
    loop {
        let datagram = ctl.recv().await?;
        if datagram.is_empty() {
            return Err(Error::ChannelClosed);
        }
        for span in MessageIter::new(&datagram) {
            let reply = match Message::decode(span?, NSID_NONE) {
                Ok(reply) => reply,
                Err(Error::UnsupportedMessage(_)) => continue,
                Err(e) => return Err(e),
            };
            if reply.header().nlmsg_seq != seq {
                reply.release();
                continue;
            }
            if let Message::Error(err) = &reply {
                let errno = err.error.error;
                reply.release();
                return if errno == 0 {
                    Ok(None)
                } else {
                    Err(Error::from_errno(errno))
                };
            }
            return Ok(Some(reply));
        }
    }
}

async fn query_nsid<T: Transport>(ctl: &T, fd: RawFd) -> Result<i32> {
    match transact(ctl, NetnsMessage::query_fd(fd).into()).await? {
        Some(Message::Netns(reply)) => {
            let nsid = reply.ns_id();
            reply.release();
            Ok(nsid)
        }
        Some(other) => {
            let kind = other.kind();
            other.release();
            Err(Error::InvalidMessage(format!(
                "unexpected {} reply to nsid query",
                kind
            )))
        }
        None => Err(Error::InvalidMessage("nsid query was only acknowledged".into())),
    }
}

/// Id the namespace behind `fd` has in the namespace of `ctl`, assigning
/// one if it has none.
pub async fn resolve_nsid<T: Transport>(ctl: &T, fd: RawFd) -> Result<i32> {
    let nsid = query_nsid(ctl, fd).await?;
    if nsid >= 0 {
        return Ok(nsid);
    }

    if let Some(reply) = transact(ctl, NetnsMessage::assign_fd(fd, NETNSA_NSID_NOT_ASSIGNED).into()).await? {
        reply.release();
    }
    let nsid = query_nsid(ctl, fd).await?;
    if nsid < 0 {
        return Err(Error::InvalidMessage(format!(
            "no nsid assigned to namespace fd {}",
            fd
        )));
    }
    Ok(nsid)
}
