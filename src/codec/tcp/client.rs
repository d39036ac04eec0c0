// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP client (master) specific functions.
use super::*;

/// Decode the TCP response to the request identified by `expected`.
///
/// It returns the response PDU and the number of consumed bytes.
pub fn decode_response<'a>(
    buf: &'a [u8],
    expected: Header,
) -> Result<Option<(&'a [u8], usize)>> {
    let Some((frame, consumed)) = extract_frame(buf)? else {
        return Ok(None);
    };
    if frame.transaction_id != expected.transaction_id {
        return Err(ProtocolError::TransactionMismatch {
            request: expected.transaction_id,
            response: frame.transaction_id,
        });
    }
    if frame.unit_id != expected.unit_id {
        return Err(ProtocolError::UnitMismatch {
            request: expected.unit_id,
            response: frame.unit_id,
        });
    }
    Ok(Some((frame.pdu, consumed)))
}
