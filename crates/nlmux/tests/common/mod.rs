//! Common test utilities for integration tests.
//!
//! Provides `TestNamespace`, a named network namespace removed on drop, and
//! the `require_root!` guard.

use std::io;
use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicU32, Ordering};

use nlmux::Result;
use nlmux::netlink::namespace::NETNS_RUN_DIR;

static NAMESPACE_COUNTER: AtomicU32 = AtomicU32::new(0);

fn unique_ns_name(prefix: &str) -> String {
    let id = NAMESPACE_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("nlmux-test-{}-{}-{}", prefix, std::process::id(), id)
}

/// A named network namespace, deleted when dropped.
pub struct TestNamespace {
    name: String,
}

impl TestNamespace {
    /// Create a namespace with a unique name derived from `prefix`.
    pub fn new(prefix: &str) -> Result<Self> {
        let name = unique_ns_name(prefix);
        let status = Command::new("ip")
            .args(["netns", "add", &name])
            .status()
            .map_err(|e| nlmux::Error::Io(io::Error::from(e.kind())))?;
        if !status.success() {
            return Err(nlmux::Error::InvalidMessage(format!(
                "failed to create namespace: {}",
                name
            )));
        }
        Ok(Self { name })
    }

    /// Namespace name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the namespace file.
    pub fn path(&self) -> PathBuf {
        PathBuf::from(NETNS_RUN_DIR).join(&self.name)
    }

    /// Run a command inside the namespace.
    pub fn exec(&self, cmd: &str, args: &[&str]) -> Result<String> {
        let output = Command::new("ip")
            .args(["netns", "exec", &self.name, cmd])
            .args(args)
            .output()
            .map_err(|e| nlmux::Error::Io(io::Error::from(e.kind())))?;
        if !output.status.success() {
            return Err(nlmux::Error::InvalidMessage(format!(
                "command failed: {} {:?}: {}",
                cmd,
                args,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Add a dummy interface.
    pub fn add_dummy(&self, name: &str) -> Result<()> {
        self.exec("ip", &["link", "add", name, "type", "dummy"])?;
        Ok(())
    }

    /// Bring an interface up.
    pub fn link_up(&self, name: &str) -> Result<()> {
        self.exec("ip", &["link", "set", name, "up"])?;
        Ok(())
    }

    /// Add an address to an interface.
    pub fn add_addr(&self, dev: &str, addr: &str) -> Result<()> {
        self.exec("ip", &["addr", "add", addr, "dev", dev])?;
        Ok(())
    }
}

impl Drop for TestNamespace {
    fn drop(&mut self) {
        let _ = Command::new("ip").args(["netns", "del", &self.name]).status();
    }
}

/// Check if running as root.
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions.
    unsafe { libc::geteuid() == 0 }
}

/// Skip the test if not running as root.
#[macro_export]
macro_rules! require_root {
    () => {
        if !crate::common::is_root() {
            eprintln!("Skipping test: requires root");
            return Ok(());
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_ns_name() {
        let name1 = unique_ns_name("test");
        let name2 = unique_ns_name("test");
        assert_ne!(name1, name2);
        assert!(name1.starts_with("nlmux-test-test-"));
    }
}
