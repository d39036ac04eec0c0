// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU server (slave) specific functions.
use super::*;

/// Decode an RTU request.
///
/// Requests of user defined functions are accepted as soon as the
/// received bytes carry a valid checksum.
pub fn decode_request(buf: &[u8]) -> Result<Option<(DecodedFrame<'_>, FrameLocation)>> {
    if buf.len() < 2 {
        return Ok(None);
    }
    decode(DecoderType::Request, buf)
}
