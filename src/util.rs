//! Common helpers

use byteorder::{BigEndian, ByteOrder};

use crate::{
    error::ProtocolError,
    frame::{Coil, Word},
};

/// Turn a bool into a u16 coil value
#[must_use]
pub const fn bool_to_u16_coil(state: bool) -> u16 {
    if state { 0xFF00 } else { 0x0000 }
}

/// Turn a u16 coil value into a boolean value.
pub const fn u16_coil_to_bool(coil: u16) -> Result<bool, ProtocolError> {
    match coil {
        0xFF00 => Ok(true),
        0x0000 => Ok(false),
        _ => Err(ProtocolError::CoilValue(coil)),
    }
}

/// Calculate the number of bytes required for a given number of coils.
#[must_use]
pub const fn packed_coils_len(bitcount: usize) -> usize {
    bitcount.div_ceil(8)
}

/// Pack up to eight coils into one byte, the first coil in the least significant bit.
pub fn bools_to_byte(coils: &[Coil]) -> Result<u8, ProtocolError> {
    if coils.len() > 8 {
        return Err(ProtocolError::BufferSize);
    }
    Ok(coils
        .iter()
        .enumerate()
        .fold(0, |byte, (i, c)| byte | (u8::from(*c) << i)))
}

///  Pack coils into a byte array.
///
///  It returns the number of bytes used to pack the coils.
pub fn pack_coils(coils: &[Coil], bytes: &mut [u8]) -> Result<usize, ProtocolError> {
    let packed_size = packed_coils_len(coils.len());
    if bytes.len() < packed_size {
        return Err(ProtocolError::BufferSize);
    }
    for (chunk, byte) in coils.chunks(8).zip(bytes.iter_mut()) {
        *byte = bools_to_byte(chunk)?;
    }
    Ok(packed_size)
}

///  Unpack `count` coils from a byte array.
pub fn unpack_coils(bytes: &[u8], count: usize) -> Result<Vec<Coil>, ProtocolError> {
    if bytes.len() < packed_coils_len(count) {
        return Err(ProtocolError::BufferSize);
    }
    Ok((0..count)
        .map(|i| (bytes[i / 8] >> (i % 8)) & 0b1 > 0)
        .collect())
}

/// Serialize registers as big-endian words.
#[must_use]
pub fn registers_to_bytes(words: &[Word]) -> Vec<u8> {
    let mut bytes = vec![0; words.len() * 2];
    BigEndian::write_u16_into(words, &mut bytes);
    bytes
}

/// Deserialize big-endian words.
pub fn bytes_to_registers(bytes: &[u8]) -> Result<Vec<Word>, ProtocolError> {
    if bytes.len() % 2 != 0 {
        return Err(ProtocolError::BufferSize);
    }
    let mut words = vec![0; bytes.len() / 2];
    BigEndian::read_u16_into(bytes, &mut words);
    Ok(words)
}
