//! Request and response values in their wire representation.

use byteorder::{BigEndian, ByteOrder};

use super::{Coil, RawData, Word};
use crate::{error::ProtocolError, util::*};

/// Coils or discrete inputs, eight per byte with the first value in the
/// least significant bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coils<'c> {
    bytes: RawData<'c>,
    count: usize,
}

impl<'c> Coils<'c> {
    /// Pack `bools` into `target`.
    pub fn from_bools(bools: &[Coil], target: &'c mut [u8]) -> Result<Self, ProtocolError> {
        let packed_len = pack_coils(bools, target)?;
        let bytes: &'c [u8] = target;
        Ok(Self {
            bytes: &bytes[..packed_len],
            count: bools.len(),
        })
    }

    /// `bytes` must hold at least `count` bits.
    pub(crate) const fn from_packed(bytes: &'c [u8], count: usize) -> Self {
        Self { bytes, count }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of bytes on the wire.
    #[must_use]
    pub const fn packed_len(&self) -> usize {
        packed_coils_len(self.count)
    }

    #[must_use]
    pub fn get(&self, idx: usize) -> Option<Coil> {
        if idx >= self.count {
            return None;
        }
        Some(self.bytes[idx / 8] & (1 << (idx % 8)) != 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = Coil> + 'c {
        let Self { bytes, count } = *self;
        (0..count).map(move |idx| bytes[idx / 8] & (1 << (idx % 8)) != 0)
    }

    pub(crate) fn write_to(&self, buf: &mut [u8]) {
        let len = self.packed_len();
        buf[..len].copy_from_slice(&self.bytes[..len]);
    }
}

/// Register values, big endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Words<'w> {
    bytes: RawData<'w>,
    count: usize,
}

impl<'w> Words<'w> {
    /// Serialize `words` into `target`.
    pub fn from_words(words: &[Word], target: &'w mut [u8]) -> Result<Self, ProtocolError> {
        let len = words.len() * 2;
        if len > target.len() {
            return Err(ProtocolError::BufferSize);
        }
        BigEndian::write_u16_into(words, &mut target[..len]);
        let bytes: &'w [u8] = target;
        Ok(Self {
            bytes: &bytes[..len],
            count: words.len(),
        })
    }

    /// `bytes` must hold at least `count` words.
    pub(crate) const fn from_packed(bytes: &'w [u8], count: usize) -> Self {
        Self { bytes, count }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[must_use]
    pub fn get(&self, idx: usize) -> Option<Word> {
        (idx < self.count).then(|| BigEndian::read_u16(&self.bytes[idx * 2..]))
    }

    pub fn iter(&self) -> impl Iterator<Item = Word> + 'w {
        self.as_bytes().chunks_exact(2).map(BigEndian::read_u16)
    }

    /// The serialized words.
    #[must_use]
    pub fn as_bytes(&self) -> &'w [u8] {
        let bytes = self.bytes;
        &bytes[..self.count * 2]
    }

    pub(crate) fn write_to(&self, buf: &mut [u8]) {
        let len = self.count * 2;
        buf[..len].copy_from_slice(&self.bytes[..len]);
    }
}
