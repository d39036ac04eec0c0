// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP

use super::*;

pub mod client;
pub mod server;

pub type TransactionId = u16;

/// MBAP header fields that identify a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub transaction_id: TransactionId,
    pub unit_id: UnitId,
}

/// Size of the MBAP header including the unit id.
pub const HEADER_LEN: usize = 7;

// [MODBUS MESSAGING ON TCP/IP IMPLEMENTATION GUIDE V1.0b](http://modbus.org/docs/Modbus_Messaging_Implementation_Guide_V1_0b.pdf), page 18
// "a MODBUS request needs a maximum of 256 bytes + the MBAP header size"
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_PDU_LEN;

/// An extracted TCP PDU frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame<'a> {
    pub transaction_id: TransactionId,
    pub unit_id: UnitId,
    pub pdu: &'a [u8],
}

/// Total ADU length announced by the MBAP header.
///
/// Returns `None` as long as the length field has not been received.
#[must_use]
pub fn adu_len(buf: &[u8]) -> Option<usize> {
    if buf.len() < 6 {
        return None;
    }
    Some(6 + BigEndian::read_u16(&buf[4..6]) as usize)
}

/// Extract a PDU frame out of a buffer.
///
/// On success the frame and the number of consumed bytes are returned.
/// Header errors are reported as soon as the header is complete.
pub fn extract_frame(buf: &[u8]) -> Result<Option<(DecodedFrame<'_>, usize)>> {
    if buf.len() < HEADER_LEN {
        // Incomplete frame
        return Ok(None);
    }
    let protocol_id = BigEndian::read_u16(&buf[2..4]);
    if protocol_id != 0 {
        return Err(ProtocolError::ProtocolNotModbus(protocol_id));
    }
    let length = BigEndian::read_u16(&buf[4..6]);
    // unit id plus at least a function code
    if length < 2 || length as usize > MAX_PDU_LEN + 1 {
        return Err(ProtocolError::LengthField(length));
    }
    match adu_len(buf) {
        Some(len) if buf.len() >= len => unpack_mbap(&buf[..len]).map(|frame| Some((frame, len))),
        // Incomplete frame
        _ => Ok(None),
    }
}

/// Split a complete ADU into its MBAP header fields and the PDU.
pub fn unpack_mbap(adu: &[u8]) -> Result<DecodedFrame<'_>> {
    if adu.len() < HEADER_LEN {
        return Err(ProtocolError::BufferSize);
    }
    let protocol_id = BigEndian::read_u16(&adu[2..4]);
    if protocol_id != 0 {
        return Err(ProtocolError::ProtocolNotModbus(protocol_id));
    }
    let length_field = BigEndian::read_u16(&adu[4..6]) as usize;
    if length_field != adu.len() - 6 {
        return Err(ProtocolError::LengthMismatch {
            length_field,
            pdu_len: adu.len() - 6,
        });
    }
    Ok(DecodedFrame {
        transaction_id: BigEndian::read_u16(&adu[0..2]),
        unit_id: adu[6],
        pdu: &adu[HEADER_LEN..],
    })
}

/// Prefix a PDU with the MBAP header.
#[must_use]
pub fn pack_mbap(unit_id: UnitId, transaction_id: TransactionId, pdu: &[u8]) -> Vec<u8> {
    let mut adu = vec![0; HEADER_LEN + pdu.len()];
    BigEndian::write_u16(&mut adu[0..2], transaction_id);
    BigEndian::write_u16(&mut adu[4..6], (pdu.len() + 1) as u16);
    adu[6] = unit_id;
    adu[HEADER_LEN..].copy_from_slice(pdu);
    adu
}
