//! Named network namespaces.
//!
//! Named namespaces are the bind-mounted namespace files that
//! `ip netns add <name>` leaves under `/var/run/netns`.

use std::fs::File;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use super::error::{Error, Result};

/// The runtime directory where named network namespaces are stored.
pub const NETNS_RUN_DIR: &str = "/var/run/netns";

/// List the named namespaces in `dir`, sorted by name.
///
/// A missing directory means there are no named namespaces.
pub fn list_in<P: AsRef<Path>>(dir: P) -> Result<Vec<String>> {
    let entries = match std::fs::read_dir(dir.as_ref()) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::Io(e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(Error::Io)?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name != "." && name != ".." {
            names.push(name);
        }
    }

    names.sort();
    Ok(names)
}

/// List the named namespaces in [`NETNS_RUN_DIR`].
pub fn list() -> Result<Vec<String>> {
    list_in(NETNS_RUN_DIR)
}

/// Open the named namespace `name` in `dir`.
pub fn open_in<P: AsRef<Path>>(dir: P, name: &str) -> Result<NamespaceFd> {
    let path = dir.as_ref().join(name);
    if !path.exists() {
        return Err(Error::NamespaceNotFound {
            name: name.to_string(),
        });
    }
    open_path(&path)
}

/// Open a namespace file by path.
pub fn open_path<P: AsRef<Path>>(path: P) -> Result<NamespaceFd> {
    let file = File::open(path.as_ref()).map_err(|e| {
        Error::InvalidMessage(format!(
            "cannot open namespace '{}': {}",
            path.as_ref().display(),
            e
        ))
    })?;
    Ok(NamespaceFd {
        path: path.as_ref().to_path_buf(),
        file,
    })
}

/// Open every named namespace in `dir`.
///
/// Entries that vanish or cannot be opened between listing and opening
/// are skipped with a warning.
pub fn open_all<P: AsRef<Path>>(dir: P) -> Result<Vec<(String, NamespaceFd)>> {
    let dir = dir.as_ref();
    let mut out = Vec::new();
    for name in list_in(dir)? {
        match open_in(dir, &name) {
            Ok(fd) => out.push((name, fd)),
            Err(e) => tracing::warn!(namespace = %name, error = %e, "skipping namespace"),
        }
    }
    Ok(out)
}

/// A handle to an open namespace file.
#[derive(Debug)]
pub struct NamespaceFd {
    path: PathBuf,
    file: File,
}

impl NamespaceFd {
    /// Path the namespace was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsRawFd for NamespaceFd {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("nlmux-netns-{}-{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_netns_run_dir() {
        assert_eq!(NETNS_RUN_DIR, "/var/run/netns");
    }

    #[test]
    fn test_missing_dir_lists_nothing() {
        let dir = std::env::temp_dir().join("nlmux-netns-definitely-missing");
        assert!(list_in(&dir).unwrap().is_empty());
        assert!(open_all(&dir).unwrap().is_empty());
    }

    #[test]
    fn test_list_sorted() {
        let dir = scratch_dir("list");
        for name in ["red", "blue", "green"] {
            File::create(dir.join(name)).unwrap();
        }
        assert_eq!(list_in(&dir).unwrap(), vec!["blue", "green", "red"]);

        let opened = open_all(&dir).unwrap();
        assert_eq!(opened.len(), 3);
        assert_eq!(opened[0].1.path(), dir.join("blue"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_open_unknown_name() {
        let dir = scratch_dir("unknown");
        let err = open_in(&dir, "nope").unwrap_err();
        assert!(err.is_not_found());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
