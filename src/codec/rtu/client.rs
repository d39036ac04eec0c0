// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU client (master) specific functions.
use super::*;

/// Decode an RTU response.
///
/// Responses of user defined functions are accepted as soon as the
/// received bytes carry a valid checksum.
pub fn decode_response(buf: &[u8]) -> Result<Option<(DecodedFrame<'_>, FrameLocation)>> {
    if buf.len() < 2 {
        return Ok(None);
    }
    decode(DecoderType::Response, buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_empty_response() {
        assert!(decode_response(&[]).unwrap().is_none());
    }

    #[test]
    fn decode_partly_received_response() {
        let buf = &[
            0x12, // slave address
            0x06, // function code
            0x22, // addr
        ];
        assert!(decode_response(buf).unwrap().is_none());
    }

    #[test]
    fn encode_write_single_register_request() {
        let mut buf = [0u8; MAX_PDU_LEN];
        let len = Request::WriteSingleRegister(0x2222, 0xABCD)
            .encode(&mut buf)
            .unwrap();
        let req = wrap_rtu(0x12, &buf[..len]);
        assert_eq!(
            req,
            [
                0x12, // slave address
                0x06, // function code
                0x22, // addr
                0x22, // addr
                0xAB, // value
                0xCD, // value
                0x9F, // crc
                0xBE, // crc
            ]
        );
    }

    #[test]
    fn decode_read_holding_registers_response() {
        let buf = &[
            0x01, 0x03, 0x06, 0x00, 0x64, 0x00, 0x65, 0x00, 0x66, 0xC0, 0x88,
        ];
        let (frame, location) = decode_response(buf).unwrap().unwrap();
        assert_eq!(frame.unit_id, 0x01);
        assert_eq!(frame.pdu, &buf[1..9]);
        assert_eq!(location.size, buf.len());
    }

    #[test]
    fn decode_exception_response() {
        let buf = &[0x01, 0x83, 0x02, 0xC0, 0xF1];
        let (frame, _) = decode_response(buf).unwrap().unwrap();
        assert_eq!(frame.pdu, &[0x83, 0x02]);
    }

    #[test]
    fn decode_bad_crc_write_single_register_response() {
        let rsp = &[0x12, 0x06, 0x22, 0x22, 0xAB, 0xCD, 0x5F, 0xBE];
        assert!(matches!(decode_response(rsp), Ok(None)));
    }

    #[test]
    fn decode_response_after_line_noise() {
        let mut buf = vec![0x00];
        buf.extend_from_slice(&wrap_rtu(0x11, &[0x03, 0x02, 0x00, 0x05]));
        let (frame, location) = decode_response(&buf).unwrap().unwrap();
        assert_eq!(frame.unit_id, 0x11);
        assert_eq!(frame.pdu, &[0x03, 0x02, 0x00, 0x05]);
        assert_eq!(location.start + location.size, buf.len());
    }

    #[test]
    fn decode_custom_function_response() {
        let rsp = &[0x01, 0x41, 0xCC, 0x88, 0x04, 0xAA];
        let (frame, _) = decode_response(rsp).unwrap().unwrap();
        assert_eq!(frame.pdu, &[0x41, 0xCC, 0x88]);
        assert!(decode_response(&rsp[..4]).unwrap().is_none());
    }
}
