// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP server (slave) specific functions.
use super::*;

/// Decode a TCP request.
///
/// It returns the request frame and the number of consumed bytes.
pub fn decode_request(buf: &[u8]) -> Result<Option<(DecodedFrame<'_>, usize)>> {
    if buf.is_empty() {
        return Ok(None);
    }
    extract_frame(buf).inspect_err(|err| {
        log::warn!("Failed to decode request frame: {err}");
    })
}
