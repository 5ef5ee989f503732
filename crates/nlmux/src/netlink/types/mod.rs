//! Kernel ABI structures: fixed message bodies and structured attribute
//! records.
//!
//! Every structure here is `#[repr(C)]` and mirrors its kernel counterpart
//! byte for byte. Reads always copy through zerocopy's validated
//! conversions; nothing is reinterpreted in place.

pub mod addr;
pub mod link;
pub mod neigh;
pub mod nsid;
pub mod route;

use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use super::error::{Error, Result};

/// Copy a fixed message body out of the front of `data`.
///
/// Fails when `data` is shorter than `T`.
pub fn read_body<T: FromBytes>(data: &[u8]) -> Result<T> {
    T::read_from_prefix(data)
        .map(|(body, _)| body)
        .map_err(|_| Error::Truncated {
            expected: std::mem::size_of::<T>(),
            actual: data.len(),
        })
}

/// Copy a structured attribute record out of `data`.
///
/// Kernels grow these records over time: a shorter payload is zero-extended
/// and a longer one is cut to the layout known here.
pub fn read_record<T: FromBytes + IntoBytes + KnownLayout + Immutable>(data: &[u8]) -> T {
    let mut record = T::new_zeroed();
    let dst = record.as_mut_bytes();
    let n = dst.len().min(data.len());
    dst[..n].copy_from_slice(&data[..n]);
    record
}
