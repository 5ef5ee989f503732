//! Error types for netlink operations.

use std::io;

/// Result type for netlink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding, encoding or transporting netlink
/// messages.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Kernel returned an error code.
    #[error("kernel error: {message} (errno {errno})")]
    Kernel {
        /// The errno value from the kernel (positive).
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// Message or attribute was shorter than its declared or fixed layout.
    #[error("message truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Expected length.
        expected: usize,
        /// Actual bytes available.
        actual: usize,
    },

    /// Invalid message format.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Invalid attribute format.
    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),

    /// Attribute kind at or above the declared maximum for its message kind.
    ///
    /// The wire schema has advanced past what this codec understands, so
    /// nothing after this attribute can be trusted.
    #[error("{message}: attribute kind {kind} out of range (max {max})")]
    AttrOutOfRange {
        /// Message kind name.
        message: &'static str,
        /// Offending attribute kind.
        kind: u16,
        /// Declared maximum (exclusive).
        max: u16,
    },

    /// Message type with no decoder.
    #[error("unsupported message type {0}")]
    UnsupportedMessage(u16),

    /// The consumer side of the message channel has gone away.
    #[error("message channel closed")]
    ChannelClosed,

    /// Operation attempted in the wrong socket state.
    #[error("invalid socket state: expected {expected}, got {actual}")]
    InvalidState {
        /// State the operation requires.
        expected: &'static str,
        /// State the multiplexer was in.
        actual: &'static str,
    },

    /// Namespace not found.
    #[error("namespace not found: {name}")]
    NamespaceNotFound {
        /// The namespace name that was not found.
        name: String,
    },
}

impl Error {
    /// Create a kernel error from a (negative) errno value.
    pub fn from_errno(errno: i32) -> Self {
        let message = io::Error::from_raw_os_error(-errno).to_string();
        Self::Kernel {
            errno: -errno,
            message,
        }
    }

    /// Whether the socket that produced this error can no longer be trusted.
    ///
    /// Malformed wire data and protocol-version mismatches are fatal; I/O
    /// failures, kernel errors and unsupported message types are not.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Truncated { .. }
                | Self::InvalidMessage(_)
                | Self::InvalidAttribute(_)
                | Self::AttrOutOfRange { .. }
        )
    }

    /// Check if this is a "not found" error (ENOENT, ENODEV, etc.).
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Kernel { errno, .. } => matches!(*errno, libc::ENOENT | libc::ENODEV),
            Self::NamespaceNotFound { .. } => true,
            _ => false,
        }
    }

    /// Check if this is a permission error (EPERM, EACCES).
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::Kernel { errno, .. } => matches!(*errno, libc::EPERM | libc::EACCES),
            Self::Io(e) => e.kind() == io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }

    /// Get the errno value if this is a kernel error.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Kernel { errno, .. } => Some(*errno),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_errno() {
        let err = Error::from_errno(-1); // EPERM
        assert!(err.is_permission_denied());
        assert_eq!(err.errno(), Some(1));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::from_errno(-2).is_not_found()); // ENOENT
        assert!(Error::from_errno(-19).is_not_found()); // ENODEV
        assert!(
            Error::NamespaceNotFound {
                name: "test".into()
            }
            .is_not_found()
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(
            Error::Truncated {
                expected: 16,
                actual: 3
            }
            .is_fatal()
        );
        assert!(
            Error::AttrOutOfRange {
                message: "link",
                kind: 200,
                max: 70
            }
            .is_fatal()
        );
        assert!(!Error::UnsupportedMessage(36).is_fatal());
        assert!(!Error::ChannelClosed.is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::AttrOutOfRange {
            message: "route",
            kind: 40,
            max: 32,
        };
        assert_eq!(
            err.to_string(),
            "route: attribute kind 40 out of range (max 32)"
        );

        let err = Error::NamespaceNotFound {
            name: "myns".into(),
        };
        assert_eq!(err.to_string(), "namespace not found: myns");
    }
}
