//! Netlink attribute (rtattr/nlattr) framing.
//!
//! Decoding is a strict linear walk: every TLV header is validated against
//! the bytes that remain, and the first violation ends the walk with a
//! fatal error. Encoding goes through [`AttrSet`], a fixed slot array
//! indexed by an attribute-kind enumeration and written in ascending kind
//! order.

use std::fmt;
use std::marker::PhantomData;

use winnow::binary::{Endianness, u16 as nla_u16};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take;

use super::error::{Error, Result};
use super::value::AttrValue;

/// Netlink attribute alignment.
pub const NLA_ALIGNTO: usize = 4;

/// Align a length to NLA_ALIGNTO boundary.
#[inline]
pub const fn nla_align(len: usize) -> usize {
    (len + NLA_ALIGNTO - 1) & !(NLA_ALIGNTO - 1)
}

/// Size of the attribute header.
pub const NLA_HDRLEN: usize = 4;

/// Attribute type flags.
pub const NLA_F_NESTED: u16 = 1 << 15;
pub const NLA_F_NET_BYTEORDER: u16 = 1 << 14;
pub const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);

type PResult<T> = core::result::Result<T, ErrMode<ContextError>>;

/// Total on-wire size of an attribute with `payload_len` value bytes.
#[inline]
pub const fn nla_size(payload_len: usize) -> usize {
    nla_align(NLA_HDRLEN + payload_len)
}

/// Split one TLV off the front of `data`.
///
/// Returns the masked kind, the value bytes (padding excluded) and the
/// remainder after the padded boundary.
fn split_attr(data: &[u8]) -> Result<(u16, &[u8], &[u8])> {
    let mut input = data;
    let header: PResult<(u16, u16)> = (
        nla_u16(Endianness::Native),
        nla_u16(Endianness::Native),
    )
        .parse_next(&mut input);
    let (len, kind) = header.map_err(|_| Error::Truncated {
        expected: NLA_HDRLEN,
        actual: data.len(),
    })?;

    let len = len as usize;
    if len < NLA_HDRLEN {
        return Err(Error::InvalidAttribute(format!(
            "attribute {} declares length {} below header size",
            kind & NLA_TYPE_MASK,
            len
        )));
    }
    if len > data.len() {
        return Err(Error::Truncated {
            expected: len,
            actual: data.len(),
        });
    }

    let payload: PResult<&[u8]> = take(len - NLA_HDRLEN).parse_next(&mut input);
    let payload = payload.map_err(|_| Error::Truncated {
        expected: len,
        actual: data.len(),
    })?;

    // The last attribute may omit its padding.
    let pad = nla_align(len) - len;
    let rest = input.get(pad..).unwrap_or(&[]);

    Ok((kind & NLA_TYPE_MASK, payload, rest))
}

/// Iterator over netlink attributes in a buffer.
///
/// Yields `(kind, value)` pairs; a malformed entry yields one error and
/// ends the iteration.
pub struct AttrIter<'a> {
    data: &'a [u8],
}

impl<'a> AttrIter<'a> {
    /// Create a new attribute iterator.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Check if there are no more attributes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<'a> Iterator for AttrIter<'a> {
    type Item = Result<(u16, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.is_empty() {
            return None;
        }
        match split_attr(self.data) {
            Ok((kind, payload, rest)) => {
                self.data = rest;
                Some(Ok((kind, payload)))
            }
            Err(e) => {
                self.data = &[];
                Some(Err(e))
            }
        }
    }
}

/// Walk the attributes in `data`.
pub fn decode_attrs(data: &[u8]) -> AttrIter<'_> {
    AttrIter::new(data)
}

/// Append one attribute (header, value, zero padding) to `buf`.
pub fn write_attr(buf: &mut Vec<u8>, kind: u16, value: &AttrValue) -> Result<()> {
    let len = NLA_HDRLEN + value.payload_len();
    let nla_len = u16::try_from(len).map_err(|_| {
        Error::InvalidAttribute(format!("attribute {} too large: {} bytes", kind, len))
    })?;
    let start = buf.len();
    buf.extend_from_slice(&nla_len.to_ne_bytes());
    buf.extend_from_slice(&kind.to_ne_bytes());
    value.write_payload(buf)?;
    debug_assert_eq!(buf.len() - start, len);
    buf.resize(start + nla_align(len), 0);
    Ok(())
}

/// An attribute-kind enumeration for one message kind.
pub trait AttrKind: Copy + Into<u16> + TryFrom<u16> + fmt::Debug + 'static {
    /// One past the highest attribute id this codec understands.
    const MAX: u16;

    /// Message kind the enumeration belongs to, for error reporting.
    const MESSAGE: &'static str;

    /// Display name of an attribute id.
    fn name(id: u16) -> Option<&'static str>;
}

/// Declare an attribute-kind enumeration with its maximum and names.
macro_rules! attr_kinds {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident ($message:literal, max = $max:literal) {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal => $label:literal, )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant = $value, )*
        }

        impl From<$name> for u16 {
            fn from(kind: $name) -> u16 {
                kind as u16
            }
        }

        impl TryFrom<u16> for $name {
            type Error = u16;

            fn try_from(id: u16) -> std::result::Result<Self, u16> {
                match id {
                    $( $value => Ok(Self::$variant), )*
                    other => Err(other),
                }
            }
        }

        impl $crate::netlink::attr::AttrKind for $name {
            const MAX: u16 = $max;
            const MESSAGE: &'static str = $message;

            fn name(id: u16) -> Option<&'static str> {
                match id {
                    $( $value => Some($label), )*
                    _ => None,
                }
            }
        }
    };
}

pub(crate) use attr_kinds;

/// Fixed-length attribute slot array for one message kind.
///
/// Slot `i` holds the attribute with kind id `i`; at most one value per
/// kind. The array is always `K::MAX` long.
pub struct AttrSet<K: AttrKind> {
    slots: Box<[Option<AttrValue>]>,
    _kind: PhantomData<K>,
}

impl<K: AttrKind> AttrSet<K> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            slots: (0..K::MAX).map(|_| None).collect(),
            _kind: PhantomData,
        }
    }

    /// Get the attribute of the given kind.
    pub fn get(&self, kind: K) -> Option<&AttrValue> {
        self.get_raw(kind.into())
    }

    /// Get the attribute with the given raw id.
    pub fn get_raw(&self, id: u16) -> Option<&AttrValue> {
        self.slots.get(id as usize)?.as_ref()
    }

    /// Store an attribute, returning the previous occupant.
    pub fn set(&mut self, kind: K, value: AttrValue) -> Option<AttrValue> {
        self.slots[Into::<u16>::into(kind) as usize].replace(value)
    }

    /// Store an attribute by raw id.
    ///
    /// Ids at or above `K::MAX` are a protocol-version mismatch.
    pub fn set_raw(&mut self, id: u16, value: AttrValue) -> Result<Option<AttrValue>> {
        let slot = self
            .slots
            .get_mut(id as usize)
            .ok_or(Error::AttrOutOfRange {
                message: K::MESSAGE,
                kind: id,
                max: K::MAX,
            })?;
        Ok(slot.replace(value))
    }

    /// Take the attribute out of its slot, leaving it empty.
    pub fn take(&mut self, kind: K) -> Option<AttrValue> {
        self.slots[Into::<u16>::into(kind) as usize].take()
    }

    /// Clear one slot, releasing any heap-backed value.
    pub fn remove(&mut self, kind: K) {
        if let Some(value) = self.take(kind) {
            value.recycle();
        }
    }

    /// Clear every slot, releasing heap-backed values to their pools.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Some(value) = slot.take() {
                value.recycle();
            }
        }
    }

    /// Populated attributes in ascending kind order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &AttrValue)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|v| (id as u16, v)))
    }

    /// Number of populated slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Whether every slot is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }

    /// Total encoded size of all populated slots, padding included.
    pub fn encoded_len(&self) -> usize {
        self.iter().map(|(_, v)| nla_size(v.payload_len())).sum()
    }

    /// Append every populated slot to `buf` in ascending kind order.
    pub fn encode_into(&self, buf: &mut Vec<u8>) -> Result<()> {
        for (id, value) in self.iter() {
            write_attr(buf, id, value)?;
        }
        Ok(())
    }

    /// Fill the set from the TLVs in `data`.
    ///
    /// `decode` picks the value shape for each known kind. Ids below
    /// `K::MAX` without a kind are kept as opaque bytes; ids at or above it
    /// fail the whole decode. A repeated id replaces the earlier value.
    pub fn decode_with<F>(&mut self, data: &[u8], mut decode: F) -> Result<()>
    where
        F: FnMut(K, &[u8]) -> Result<AttrValue>,
    {
        for attr in AttrIter::new(data) {
            let (id, payload) = attr?;
            if id >= K::MAX {
                return Err(Error::AttrOutOfRange {
                    message: K::MESSAGE,
                    kind: id,
                    max: K::MAX,
                });
            }
            let value = match K::try_from(id) {
                Ok(kind) => decode(kind, payload)?,
                Err(_) => AttrValue::bytes(payload),
            };
            if let Some(old) = self.set_raw(id, value)? {
                old.recycle();
            }
        }
        Ok(())
    }

    /// Display name for a slot id, falling back to the number.
    pub fn name_of(id: u16) -> String {
        K::name(id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("attr{}", id))
    }
}

impl<K: AttrKind> Default for AttrSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: AttrKind> Clone for AttrSet<K> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K: AttrKind> PartialEq for AttrSet<K> {
    fn eq(&self, other: &Self) -> bool {
        self.slots == other.slots
    }
}

impl<K: AttrKind> fmt::Debug for AttrSet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(id, v)| (Self::name_of(id), v)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    attr_kinds! {
        enum Sample ("sample", max = 4) {
            Unspec = 0 => "unspec",
            Name = 1 => "name",
            Mtu = 2 => "mtu",
            Flag = 3 => "flag",
        }
    }

    fn raw_attr(kind: u16, payload: &[u8]) -> Vec<u8> {
        let len = (NLA_HDRLEN + payload.len()) as u16;
        let mut buf = Vec::new();
        buf.extend_from_slice(&len.to_ne_bytes());
        buf.extend_from_slice(&kind.to_ne_bytes());
        buf.extend_from_slice(payload);
        buf.resize(nla_align(buf.len()), 0);
        buf
    }

    #[test]
    fn test_walk_skips_padding() {
        let mut data = raw_attr(1, b"lo\0");
        data.extend(raw_attr(2, &1500u32.to_ne_bytes()));

        let attrs: Vec<_> = decode_attrs(&data).collect::<Result<_>>().unwrap();
        assert_eq!(attrs, vec![(1, &b"lo\0"[..]), (2, &1500u32.to_ne_bytes()[..])]);
    }

    #[test]
    fn test_walk_masks_type_flags() {
        let data = raw_attr(26 | NLA_F_NESTED, &[]);
        let (kind, payload) = decode_attrs(&data).next().unwrap().unwrap();
        assert_eq!(kind, 26);
        assert!(payload.is_empty());
    }

    #[test]
    fn test_walk_rejects_short_length() {
        let data = [2u8, 0, 1, 0, 0, 0, 0, 0];
        let mut iter = decode_attrs(&data);
        assert!(matches!(iter.next(), Some(Err(Error::InvalidAttribute(_)))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_walk_rejects_overlong_length() {
        let mut data = raw_attr(2, &1500u32.to_ne_bytes());
        data[0] = 12;
        let err = decode_attrs(&data).next().unwrap().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_walk_rejects_stray_tail() {
        let mut data = raw_attr(2, &1500u32.to_ne_bytes());
        data.extend_from_slice(&[0, 0]);
        let results: Vec<_> = decode_attrs(&data).collect();
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::Truncated { .. })));
    }

    #[test]
    fn test_encode_ascending_and_aligned() {
        let mut set = AttrSet::<Sample>::new();
        set.set(Sample::Mtu, AttrValue::U32(9000));
        set.set(Sample::Name, AttrValue::Str("eth10".into()));
        set.set(Sample::Flag, AttrValue::Flag);

        let mut buf = Vec::new();
        set.encode_into(&mut buf).unwrap();
        assert_eq!(buf.len(), set.encoded_len());
        assert_eq!(buf.len() % NLA_ALIGNTO, 0);

        let kinds: Vec<u16> = decode_attrs(&buf).map(|a| a.unwrap().0).collect();
        assert_eq!(kinds, vec![1, 2, 3]);
    }

    #[test]
    fn test_set_raw_out_of_range() {
        let mut set = AttrSet::<Sample>::new();
        assert!(set.set_raw(3, AttrValue::Flag).is_ok());
        let err = set.set_raw(4, AttrValue::Flag).unwrap_err();
        assert!(matches!(
            err,
            Error::AttrOutOfRange {
                message: "sample",
                kind: 4,
                max: 4
            }
        ));
    }

    #[test]
    fn test_clear_empties_all_slots() {
        let mut set = AttrSet::<Sample>::new();
        set.set(Sample::Name, AttrValue::Bytes(vec![1, 2, 3]));
        set.set(Sample::Mtu, AttrValue::U32(1));
        assert_eq!(set.len(), 2);
        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.encoded_len(), 0);
    }

    #[test]
    fn test_decode_with_keeps_order_and_rejects_new_kinds() {
        let mut data = raw_attr(2, &1500u32.to_ne_bytes());
        data.extend(raw_attr(1, b"eth0\0"));
        let mut set = AttrSet::<Sample>::new();
        set.decode_with(&data, |kind, payload| match kind {
            Sample::Name => Ok(AttrValue::string(payload)),
            Sample::Mtu => AttrValue::u32(payload),
            _ => Ok(AttrValue::bytes(payload)),
        })
        .unwrap();
        assert_eq!(set.get(Sample::Name), Some(&AttrValue::Str("eth0".into())));
        assert_eq!(set.get(Sample::Mtu), Some(&AttrValue::U32(1500)));

        let ids: Vec<u16> = set.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![1, 2]);

        let err = set
            .decode_with(&raw_attr(9, &[]), |_, p| Ok(AttrValue::bytes(p)))
            .unwrap_err();
        assert!(matches!(err, Error::AttrOutOfRange { kind: 9, .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Sample::name(2), Some("mtu"));
        assert_eq!(AttrSet::<Sample>::name_of(3), "flag");
        assert_eq!(Sample::try_from(7u16), Err(7));
    }
}
