// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU

use super::*;
use byteorder::LittleEndian;

pub mod client;
pub mod server;

// [MODBUS over Serial Line Specification and Implementation Guide V1.02](http://modbus.org/docs/Modbus_over_serial_line_V1_02.pdf), page 13
// "The maximum size of a MODBUS RTU frame is 256 bytes."
pub const MAX_FRAME_LEN: usize = 256;

/// Unit id plus CRC.
const FRAME_OVERHEAD: usize = 3;

/// An extracted RTU PDU frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame<'a> {
    pub unit_id: UnitId,
    pub pdu: &'a [u8],
}

/// The location of all bytes that belong to the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLocation {
    /// The index where the frame starts
    pub start: usize,
    /// Number of bytes that belong to the frame
    pub size: usize,
}

/// Decode RTU PDU frames from a buffer.
///
/// Leading bytes that do not form a valid frame are skipped. A frame with
/// a function code of unknown length is accepted if the rest of the buffer
/// carries a valid checksum.
pub fn decode(
    decoder_type: DecoderType,
    buf: &[u8],
) -> Result<Option<(DecodedFrame<'_>, FrameLocation)>> {
    use DecoderType::{Request, Response};
    let mut drop_cnt = 0;

    if buf.is_empty() {
        return Err(ProtocolError::BufferSize);
    }

    loop {
        if drop_cnt + 1 >= buf.len() {
            return Ok(None);
        }
        let raw_frame = &buf[drop_cnt..];
        let res = match decoder_type {
            Request => request_pdu_len(raw_frame),
            Response => response_pdu_len(raw_frame),
        }
        .and_then(|pdu_len| {
            let Some(pdu_len) = pdu_len else {
                // Incomplete frame
                return Ok(None);
            };
            extract_frame(raw_frame, pdu_len).map(|frame| {
                frame.map(|frame| {
                    let location = FrameLocation {
                        start: drop_cnt,
                        size: pdu_len + FRAME_OVERHEAD,
                    };
                    (frame, location)
                })
            })
        });

        let err = match res {
            Ok(frame) => return Ok(frame),
            Err(err @ ProtocolError::FnCode(_)) => {
                if let Some(frame) = decode_unframed(raw_frame, drop_cnt) {
                    return Ok(Some(frame));
                }
                err
            }
            Err(err) => {
                log::warn!(
                    "Failed to decode {} frame: {err}",
                    match decoder_type {
                        Request => "request",
                        Response => "response",
                    }
                );
                err
            }
        };
        if drop_cnt + 1 >= MAX_FRAME_LEN {
            log::error!(
                "Giving up to decode frame after dropping {drop_cnt} byte(s): {:X?}",
                &buf[0..drop_cnt]
            );
            return Err(err);
        }
        drop_cnt += 1;
    }
}

/// Extract a PDU frame out of a buffer.
pub fn extract_frame(buf: &[u8], pdu_len: usize) -> Result<Option<DecodedFrame<'_>>> {
    if buf.is_empty() {
        return Err(ProtocolError::BufferSize);
    }
    let adu_len = 1 + pdu_len;
    if buf.len() < adu_len + 2 {
        // Incomplete frame
        return Ok(None);
    }
    unwrap_rtu(&buf[..adu_len + 2]).map(Some)
}

/// Verify the trailing CRC of a complete ADU and split it.
pub fn unwrap_rtu(adu: &[u8]) -> Result<DecodedFrame<'_>> {
    // unit id, function code and CRC
    if adu.len() < 4 {
        return Err(ProtocolError::BufferSize);
    }
    let (adu_buf, crc_buf) = adu.split_at(adu.len() - 2);
    let expected = LittleEndian::read_u16(crc_buf);
    let actual = crc16(adu_buf);
    if expected != actual {
        return Err(ProtocolError::Crc { expected, actual });
    }
    Ok(DecodedFrame {
        unit_id: adu_buf[0],
        pdu: &adu_buf[1..],
    })
}

/// Prefix a PDU with the unit id and append the CRC, low byte first.
#[must_use]
pub fn wrap_rtu(unit_id: UnitId, pdu: &[u8]) -> Vec<u8> {
    let mut adu = Vec::with_capacity(pdu.len() + FRAME_OVERHEAD);
    adu.push(unit_id);
    adu.extend_from_slice(pdu);
    let crc = crc16(&adu);
    adu.extend_from_slice(&crc.to_le_bytes());
    adu
}

/// Calculate the CRC (Cyclic Redundancy Check) sum.
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0xFFFF;
    for x in data {
        crc ^= u16::from(*x);
        for _ in 0..8 {
            crc = if (crc & 0x0001) != 0 {
                (crc >> 1) ^ 0xA001
            } else {
                crc >> 1
            };
        }
    }
    crc
}

/// Extract the PDU length out of the ADU request buffer.
pub const fn request_pdu_len(adu_buf: &[u8]) -> Result<Option<usize>> {
    if adu_buf.len() < 2 {
        return Ok(None);
    }
    let fn_code = adu_buf[1];
    let len = match fn_code {
        0x01..=0x06 => Some(5),
        0x0F | 0x10 => {
            if adu_buf.len() > 6 {
                Some(6 + adu_buf[6] as usize)
            } else {
                // incomplete frame
                None
            }
        }
        0x15 => {
            if adu_buf.len() > 2 {
                Some(2 + adu_buf[2] as usize)
            } else {
                // incomplete frame
                None
            }
        }
        _ => {
            return Err(ProtocolError::FnCode(fn_code));
        }
    };
    Ok(len)
}

/// Extract the PDU length out of the ADU response buffer.
pub const fn response_pdu_len(adu_buf: &[u8]) -> Result<Option<usize>> {
    if adu_buf.len() < 2 {
        return Ok(None);
    }
    let fn_code = adu_buf[1];
    let len = match fn_code {
        0x01..=0x04 | 0x15 => {
            if adu_buf.len() > 2 {
                Some(2 + adu_buf[2] as usize)
            } else {
                // incomplete frame
                None
            }
        }
        0x05 | 0x06 | 0x0F | 0x10 => Some(5),
        0x81..=0xFF => Some(2),
        _ => return Err(ProtocolError::FnCode(fn_code)),
    };
    Ok(len)
}

/// Frames with a user defined function code can only be delimited by
/// their checksum, so the rest of the buffer has to form the frame.
fn decode_unframed(buf: &[u8], start: usize) -> Option<(DecodedFrame<'_>, FrameLocation)> {
    unwrap_rtu(buf).ok().map(|frame| {
        let location = FrameLocation {
            start,
            size: buf.len(),
        };
        (frame, location)
    })
}
