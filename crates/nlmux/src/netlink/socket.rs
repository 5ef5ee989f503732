//! Low-level async rtnetlink socket operations.

use std::fs::File;
use std::future::Future;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use bytes::BytesMut;
use netlink_sys::{Socket, SocketAddr, protocols};
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;

use super::error::{Error, Result};

/// Default receive buffer size in bytes.
pub const DEFAULT_RECV_BUFFER: usize = 32 * 1024;

/// A datagram channel to the kernel.
///
/// [`Multiplexer`](super::mux::Multiplexer) only talks to sockets through
/// this trait, so it can be driven by something other than a real socket.
pub trait Transport: Send + Sync + 'static {
    /// Receive one datagram, which may hold several netlink messages.
    ///
    /// An empty datagram means the peer has gone away.
    fn recv(&self) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Send one datagram.
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Next request sequence number.
    fn next_seq(&self) -> u32;
}

/// Async NETLINK_ROUTE socket.
pub struct NetlinkSocket {
    /// The underlying async file descriptor.
    fd: AsyncFd<Socket>,
    /// Sequence number counter.
    seq: AtomicU32,
    /// Local port ID (assigned by kernel).
    pid: u32,
    /// Receive buffer capacity.
    recv_buffer: usize,
}

impl NetlinkSocket {
    /// Create a new socket in the current network namespace.
    pub fn new() -> Result<Self> {
        Self::create_socket()
    }

    /// Create a socket that operates in the network namespace behind `ns_fd`.
    ///
    /// The calling thread switches into the target namespace, creates the
    /// socket and switches back. The socket stays bound to the target
    /// namespace for its whole life.
    pub fn new_in_namespace(ns_fd: RawFd) -> Result<Self> {
        let current_ns = File::open("/proc/self/ns/net")
            .map_err(|e| Error::InvalidMessage(format!("cannot open current namespace: {}", e)))?;
        let current_ns_fd = current_ns.as_raw_fd();

        // SAFETY: libc::setns switches to the namespace specified by ns_fd.
        // ns_fd is a valid file descriptor to a namespace file.
        let ret = unsafe { libc::setns(ns_fd, libc::CLONE_NEWNET) };
        if ret < 0 {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }

        let result = Self::create_socket();

        // SAFETY: current_ns_fd was opened from /proc/self/ns/net above and
        // is still open.
        let restore_ret = unsafe { libc::setns(current_ns_fd, libc::CLONE_NEWNET) };
        if restore_ret < 0 {
            tracing::warn!(
                error = %std::io::Error::last_os_error(),
                "failed to restore original network namespace"
            );
        }

        result
    }

    /// Create a socket in the network namespace at `ns_path`.
    pub fn new_in_namespace_path<P: AsRef<Path>>(ns_path: P) -> Result<Self> {
        let ns_file = File::open(ns_path.as_ref()).map_err(|e| {
            Error::InvalidMessage(format!(
                "cannot open namespace '{}': {}",
                ns_path.as_ref().display(),
                e
            ))
        })?;
        Self::new_in_namespace(ns_file.as_raw_fd())
    }

    fn create_socket() -> Result<Self> {
        let mut socket = Socket::new(protocols::NETLINK_ROUTE)?;
        socket.set_non_blocking(true)?;

        let mut addr = SocketAddr::new(0, 0);
        socket.bind(&addr)?;
        socket.get_address(&mut addr)?;
        let pid = addr.port_number();

        // Not every kernel supports extended ACKs.
        socket.set_ext_ack(true).ok();

        let fd = AsyncFd::new(socket)?;

        Ok(Self {
            fd,
            seq: AtomicU32::new(1),
            pid,
            recv_buffer: DEFAULT_RECV_BUFFER,
        })
    }

    /// Set the receive buffer capacity.
    pub fn with_recv_buffer(mut self, size: usize) -> Self {
        self.recv_buffer = size;
        self
    }

    /// Get the next sequence number.
    pub fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Get the local port ID.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Subscribe to a multicast group.
    pub fn add_membership(&mut self, group: u32) -> Result<()> {
        self.fd.get_mut().add_membership(group)?;
        Ok(())
    }

    /// Unsubscribe from a multicast group.
    pub fn drop_membership(&mut self, group: u32) -> Result<()> {
        self.fd.get_mut().drop_membership(group)?;
        Ok(())
    }

    /// Send a message.
    pub async fn send(&self, msg: &[u8]) -> Result<()> {
        loop {
            let mut guard = self.fd.ready(Interest::WRITABLE).await?;

            match guard.try_io(|inner| inner.get_ref().send(msg, 0)) {
                Ok(result) => {
                    result?;
                    return Ok(());
                }
                Err(_would_block) => continue,
            }
        }
    }

    /// Receive one datagram.
    pub async fn recv_msg(&self) -> Result<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(self.recv_buffer);

        loop {
            let mut guard = self.fd.ready(Interest::READABLE).await?;

            match guard.try_io(|inner| inner.get_ref().recv(&mut buf, 0)) {
                Ok(result) => {
                    let _n = result?;
                    return Ok(buf.to_vec());
                }
                Err(_would_block) => continue,
            }
        }
    }
}

impl Transport for NetlinkSocket {
    fn recv(&self) -> impl Future<Output = Result<Vec<u8>>> + Send {
        self.recv_msg()
    }

    fn send(&self, data: &[u8]) -> impl Future<Output = Result<()>> + Send {
        NetlinkSocket::send(self, data)
    }

    fn next_seq(&self) -> u32 {
        NetlinkSocket::next_seq(self)
    }
}

impl AsRawFd for NetlinkSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.get_ref().as_raw_fd()
    }
}

/// Multicast groups for NETLINK_ROUTE.
pub mod rtnetlink_groups {
    pub const RTNLGRP_LINK: u32 = 1;
    pub const RTNLGRP_NOTIFY: u32 = 2;
    pub const RTNLGRP_NEIGH: u32 = 3;
    pub const RTNLGRP_TC: u32 = 4;
    pub const RTNLGRP_IPV4_IFADDR: u32 = 5;
    pub const RTNLGRP_IPV4_MROUTE: u32 = 6;
    pub const RTNLGRP_IPV4_ROUTE: u32 = 7;
    pub const RTNLGRP_IPV4_RULE: u32 = 8;
    pub const RTNLGRP_IPV6_IFADDR: u32 = 9;
    pub const RTNLGRP_IPV6_MROUTE: u32 = 10;
    pub const RTNLGRP_IPV6_ROUTE: u32 = 11;
    pub const RTNLGRP_IPV6_IFINFO: u32 = 12;
    pub const RTNLGRP_IPV6_PREFIX: u32 = 18;
    pub const RTNLGRP_IPV6_RULE: u32 = 19;
    pub const RTNLGRP_NSID: u32 = 28;
}
