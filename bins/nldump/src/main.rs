//! nldump - print rtnetlink messages as the kernel sends them.
//!
//! Listens on the rtnetlink multicast groups of the current network
//! namespace (and, with `--all-nsid`, of every named namespace) and prints
//! each message of the selected kinds until interrupted.

use std::io::Write;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use nlmux::netlink::{MessageFilter, MessageKind, MuxConfig, Multiplexer};

/// Message kinds that can be selected on the command line.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum Kind {
    /// NLMSG_NOOP.
    Noop,
    /// Kernel errors and acknowledgements.
    Error,
    /// End of a multipart dump.
    Done,
    /// Interfaces.
    Link,
    /// Interface addresses.
    Addr,
    /// Routes.
    Route,
    /// ARP/NDP and FDB entries.
    Neighbor,
    /// Namespace id assignments.
    Netns,
}

impl Kind {
    fn to_kind(self) -> MessageKind {
        match self {
            Kind::Noop => MessageKind::Noop,
            Kind::Error => MessageKind::Error,
            Kind::Done => MessageKind::Done,
            Kind::Link => MessageKind::Link,
            Kind::Addr => MessageKind::Address,
            Kind::Route => MessageKind::Route,
            Kind::Neighbor => MessageKind::Neighbor,
            Kind::Netns => MessageKind::Netns,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "nldump",
    version,
    about = "Print rtnetlink messages as the kernel sends them"
)]
struct Cli {
    /// Also listen in every named network namespace.
    #[arg(long)]
    all_nsid: bool,

    /// Request link, address, route and neighbor dumps on start.
    #[arg(short, long)]
    dump: bool,

    /// Message kinds to print (default: all).
    #[arg(value_enum)]
    kinds: Vec<Kind>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let filter: MessageFilter = cli.kinds.iter().map(|k| k.to_kind()).collect();

    let config = MuxConfig::new().with_dump_on_listen(cli.dump);
    let mut mux = Multiplexer::new(config).context("cannot open rtnetlink socket")?;
    if cli.all_nsid {
        let joined = mux
            .join_all_namespaces()
            .await
            .context("cannot join named network namespaces")?;
        tracing::info!(joined, "listening in named namespaces");
    }

    let mut rx = mux.listen()?;
    let mut stdout = std::io::stdout().lock();
    let mut closing = false;

    loop {
        tokio::select! {
            msg = rx.recv() => {
                let Some(msg) = msg else { break };
                let written = if filter.matches(&msg) {
                    write!(stdout, "{}", msg).and_then(|_| stdout.flush())
                } else {
                    Ok(())
                };
                msg.release();
                written.context("cannot write to stdout")?;
            }
            _ = tokio::signal::ctrl_c(), if !closing => {
                closing = true;
                mux.close();
            }
        }
    }

    mux.join().await.context("netlink reader failed")?;
    Ok(())
}
