//! Multiplexer tests against real namespaces.

use std::net::{IpAddr, Ipv4Addr};
use std::os::unix::io::AsRawFd;
use std::time::Duration;

use nlmux::Result;
use nlmux::netlink::mux::resolve_nsid;
use nlmux::netlink::namespace;
use nlmux::netlink::{Message, MuxConfig, Multiplexer, NetlinkSocket, Receiver};

use crate::common::TestNamespace;

/// Pull messages until `stop` returns true or two seconds pass.
async fn collect_until(
    rx: &mut Receiver,
    mut stop: impl FnMut(&Message) -> bool,
) -> Vec<Message> {
    let mut out = Vec::new();
    loop {
        match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Some(msg)) => {
                let last = stop(&msg);
                out.push(msg);
                if last {
                    return out;
                }
            }
            _ => return out,
        }
    }
}

#[tokio::test]
async fn test_dump_inside_namespace() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("dump")?;
    ns.add_dummy("dummy0")?;
    ns.link_up("dummy0")?;
    ns.add_addr("dummy0", "10.99.0.1/24")?;

    let fd = namespace::open_path(ns.path())?;
    let nsid = resolve_nsid(&NetlinkSocket::new()?, fd.as_raw_fd()).await?;
    assert!(nsid >= 0);

    let socket = NetlinkSocket::new_in_namespace(fd.as_raw_fd())?;
    let mut mux = Multiplexer::from_transports(
        MuxConfig::new().with_dump_on_listen(true),
        vec![(nsid, socket)],
    );
    let mut rx = mux.listen()?;

    let mut done = 0;
    let msgs = collect_until(&mut rx, |msg| {
        if msg.is_done() {
            done += 1;
        }
        done == 4
    })
    .await;

    assert!(msgs.iter().all(|m| m.nsid() == nsid));
    let dummy = msgs.iter().any(|m| match m {
        Message::Link(link) => link.name() == Some("dummy0"),
        _ => false,
    });
    assert!(dummy, "dummy0 missing from link dump");
    let addr = msgs.iter().any(|m| match m {
        Message::Address(a) => a.address() == Some(IpAddr::V4(Ipv4Addr::new(10, 99, 0, 1))),
        _ => false,
    });
    assert!(addr, "10.99.0.1 missing from address dump");

    for msg in msgs {
        msg.release();
    }
    mux.close();
    mux.join().await
}

#[tokio::test]
async fn test_events_from_joined_namespace() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("events")?;
    let fd = namespace::open_path(ns.path())?;
    let nsid = resolve_nsid(&NetlinkSocket::new()?, fd.as_raw_fd()).await?;

    let mut mux = Multiplexer::new(MuxConfig::new())?;
    let joined = mux.join_all_namespaces().await?;
    assert!(joined >= 1);
    assert!(mux.nsids().contains(&nsid), "{} not in {:?}", ns.name(), mux.nsids());

    let mut rx = mux.listen()?;
    ns.add_dummy("nlmux0")?;

    let msgs = collect_until(&mut rx, |msg| match msg {
        Message::Link(link) => link.name() == Some("nlmux0") && msg.nsid() == nsid,
        _ => false,
    })
    .await;
    let seen = msgs
        .last()
        .is_some_and(|m| matches!(m, Message::Link(l) if l.name() == Some("nlmux0")));
    assert!(seen, "no RTM_NEWLINK for nlmux0 tagged with nsid {}", nsid);

    for msg in msgs {
        msg.release();
    }
    mux.close();
    mux.join().await
}
