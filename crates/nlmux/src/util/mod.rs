//! Shared utilities for nlmux.

pub mod errno;
pub mod names;

pub use errno::{errno_name, format_errno};
pub use names::{family_name, protocol_name, route_type_name, scope_name, table_name};
