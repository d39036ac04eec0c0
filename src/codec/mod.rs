// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use byteorder::{BigEndian, ByteOrder};

use crate::{error::ProtocolError, frame::*, util::*};

#[cfg(feature = "rtu")]
pub mod rtu;
#[cfg(feature = "tcp")]
pub mod tcp;

/// The type of decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderType {
    Request,
    Response,
}

type Result<T> = core::result::Result<T, ProtocolError>;

impl TryFrom<u8> for Exception {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self> {
        use crate::frame::Exception::*;
        let ex = match code {
            0x01 => IllegalFunction,
            0x02 => IllegalDataAddress,
            0x03 => IllegalDataValue,
            0x04 => ServerDeviceFailure,
            0x05 => Acknowledge,
            0x06 => ServerDeviceBusy,
            0x08 => MemoryParityError,
            0x0A => GatewayPathUnavailable,
            0x0B => GatewayTargetDevice,
            _ => {
                return Err(ProtocolError::ExceptionCode(code));
            }
        };
        Ok(ex)
    }
}

impl From<ExceptionResponse> for [u8; 2] {
    fn from(ex: ExceptionResponse) -> [u8; 2] {
        let fn_code: u8 = ex.function.into();
        [fn_code | 0x80, ex.exception.code()]
    }
}

impl TryFrom<&[u8]> for ExceptionResponse {
    type Error = ProtocolError;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(ProtocolError::BufferSize);
        }
        let fn_err_code = bytes[0];
        if fn_err_code < 0x80 {
            return Err(ProtocolError::ExceptionFnCode(fn_err_code));
        }
        let function = (fn_err_code - 0x80).into();
        let exception = Exception::try_from(bytes[1])?;
        Ok(ExceptionResponse {
            function,
            exception,
        })
    }
}

impl<'r> TryFrom<&'r [u8]> for Request<'r> {
    type Error = ProtocolError;

    fn try_from(bytes: &'r [u8]) -> Result<Self> {
        let Some(&fn_code) = bytes.first() else {
            return Err(ProtocolError::BufferSize);
        };
        let function = FunctionCode::new(fn_code);
        if bytes.len() < min_request_pdu_len(function) {
            return Err(ProtocolError::BufferSize);
        }
        let req = match function {
            FunctionCode::ReadCoils => {
                let (address, count) = fixed_fields(bytes)?;
                Self::ReadCoils(address, count)
            }
            FunctionCode::ReadDiscreteInputs => {
                let (address, count) = fixed_fields(bytes)?;
                Self::ReadDiscreteInputs(address, count)
            }
            FunctionCode::ReadHoldingRegisters => {
                let (address, count) = fixed_fields(bytes)?;
                Self::ReadHoldingRegisters(address, count)
            }
            FunctionCode::ReadInputRegisters => {
                let (address, count) = fixed_fields(bytes)?;
                Self::ReadInputRegisters(address, count)
            }
            FunctionCode::WriteSingleCoil => {
                let (address, value) = fixed_fields(bytes)?;
                Self::WriteSingleCoil(address, u16_coil_to_bool(value)?)
            }
            FunctionCode::WriteSingleRegister => {
                let (address, word) = fixed_fields(bytes)?;
                Self::WriteSingleRegister(address, word)
            }
            FunctionCode::WriteMultipleCoils => {
                let (address, count, values) = multiple_fields(bytes, packed_coils_len)?;
                Self::WriteMultipleCoils(address, Coils::from_packed(values, count))
            }
            FunctionCode::WriteMultipleRegisters => {
                let (address, count, values) = multiple_fields(bytes, |count| count * 2)?;
                Self::WriteMultipleRegisters(address, Words::from_packed(values, count))
            }
            FunctionCode::WriteFileRecord => Self::WriteFileRecord(file_record(bytes)?),
            FunctionCode::Custom(code) if code < 0x80 => Self::Custom(function, &bytes[1..]),
            FunctionCode::Custom(code) => return Err(ProtocolError::FnCode(code)),
        };
        Ok(req)
    }
}

impl<'r> TryFrom<&'r [u8]> for Response<'r> {
    type Error = ProtocolError;

    /// Decode a successful response.
    ///
    /// Read responses do not tell the requested quantity, so all bits of
    /// the received bytes are taken as coils.
    fn try_from(bytes: &'r [u8]) -> Result<Self> {
        let Some(&fn_code) = bytes.first() else {
            return Err(ProtocolError::BufferSize);
        };
        let function = FunctionCode::new(fn_code);
        if bytes.len() < min_response_pdu_len(function) {
            return Err(ProtocolError::BufferSize);
        }
        let rsp = match function {
            FunctionCode::ReadCoils => {
                let values = counted_values(bytes)?;
                Self::ReadCoils(Coils::from_packed(values, values.len() * 8))
            }
            FunctionCode::ReadDiscreteInputs => {
                let values = counted_values(bytes)?;
                Self::ReadDiscreteInputs(Coils::from_packed(values, values.len() * 8))
            }
            FunctionCode::ReadHoldingRegisters => {
                Self::ReadHoldingRegisters(counted_words(bytes)?)
            }
            FunctionCode::ReadInputRegisters => Self::ReadInputRegisters(counted_words(bytes)?),
            FunctionCode::WriteSingleCoil => {
                let (address, value) = fixed_fields(bytes)?;
                Self::WriteSingleCoil(address, u16_coil_to_bool(value)?)
            }
            FunctionCode::WriteSingleRegister => {
                let (address, word) = fixed_fields(bytes)?;
                Self::WriteSingleRegister(address, word)
            }
            FunctionCode::WriteMultipleCoils => {
                let (address, count) = fixed_fields(bytes)?;
                Self::WriteMultipleCoils(address, count)
            }
            FunctionCode::WriteMultipleRegisters => {
                let (address, count) = fixed_fields(bytes)?;
                Self::WriteMultipleRegisters(address, count)
            }
            FunctionCode::WriteFileRecord => Self::WriteFileRecord(file_record(bytes)?),
            FunctionCode::Custom(code) if code < 0x80 => Self::Custom(function, &bytes[1..]),
            FunctionCode::Custom(code) => return Err(ProtocolError::FnCode(code)),
        };
        Ok(rsp)
    }
}

const fn min_request_pdu_len(function: FunctionCode) -> usize {
    match function {
        FunctionCode::WriteMultipleCoils | FunctionCode::WriteMultipleRegisters => 6,
        FunctionCode::WriteFileRecord => 9,
        FunctionCode::Custom(_) => 1,
        _ => 5,
    }
}

const fn min_response_pdu_len(function: FunctionCode) -> usize {
    match function {
        FunctionCode::ReadCoils
        | FunctionCode::ReadDiscreteInputs
        | FunctionCode::ReadHoldingRegisters
        | FunctionCode::ReadInputRegisters => 2,
        FunctionCode::WriteFileRecord => 9,
        FunctionCode::Custom(_) => 1,
        _ => 5,
    }
}

/// The values following the byte count of a read response.
fn counted_values(bytes: &[u8]) -> Result<&[u8]> {
    let byte_count = bytes[1];
    let values = &bytes[2..];
    if values.len() != usize::from(byte_count) {
        return Err(ProtocolError::ByteCount(byte_count));
    }
    Ok(values)
}

fn counted_words(bytes: &[u8]) -> Result<Words<'_>> {
    let values = counted_values(bytes)?;
    if values.len() % 2 != 0 {
        return Err(ProtocolError::ByteCount(bytes[1]));
    }
    Ok(Words::from_packed(values, values.len() / 2))
}

/// Address and value (or quantity) of a PDU that has exactly these two fields.
fn fixed_fields(bytes: &[u8]) -> Result<(Address, u16)> {
    if bytes.len() != 5 {
        return Err(ProtocolError::BufferSize);
    }
    Ok((
        BigEndian::read_u16(&bytes[1..3]),
        BigEndian::read_u16(&bytes[3..5]),
    ))
}

/// Address, quantity and values of a write multiple request.
///
/// The byte count must match both the quantity and the received values.
fn multiple_fields(
    bytes: &[u8],
    values_len: impl Fn(usize) -> usize,
) -> Result<(Address, usize, &[u8])> {
    let address = BigEndian::read_u16(&bytes[1..3]);
    let count = usize::from(BigEndian::read_u16(&bytes[3..5]));
    let byte_count = bytes[5];
    let values = &bytes[6..];
    if values.len() != usize::from(byte_count) || values.len() != values_len(count) {
        return Err(ProtocolError::ByteCount(byte_count));
    }
    Ok((address, count, values))
}

fn file_record(bytes: &[u8]) -> Result<FileRecord<'_>> {
    let request_len = bytes[1];
    if bytes.len() != 2 + usize::from(request_len) {
        return Err(ProtocolError::ByteCount(request_len));
    }
    if bytes[2] != FILE_REFERENCE_TYPE {
        return Err(ProtocolError::BufferSize);
    }
    let record_len = usize::from(BigEndian::read_u16(&bytes[7..9]));
    let data = &bytes[9..];
    if data.len() != record_len * 2 {
        return Err(ProtocolError::ByteCount(request_len));
    }
    Ok(FileRecord {
        file_number: BigEndian::read_u16(&bytes[3..5]),
        record_number: BigEndian::read_u16(&bytes[5..7]),
        data,
    })
}

impl Request<'_> {
    /// Serialize the PDU into `buf`.
    ///
    /// It returns the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let len = self.pdu_len();
        if buf.len() < len {
            return Err(ProtocolError::BufferSize);
        }
        buf[0] = FunctionCode::from(*self).value();
        match *self {
            Self::ReadCoils(address, quantity)
            | Self::ReadDiscreteInputs(address, quantity)
            | Self::ReadInputRegisters(address, quantity)
            | Self::ReadHoldingRegisters(address, quantity) => {
                BigEndian::write_u16(&mut buf[1..3], address);
                BigEndian::write_u16(&mut buf[3..5], quantity);
            }
            Self::WriteSingleCoil(address, state) => {
                BigEndian::write_u16(&mut buf[1..3], address);
                BigEndian::write_u16(&mut buf[3..5], bool_to_u16_coil(state));
            }
            Self::WriteSingleRegister(address, word) => {
                BigEndian::write_u16(&mut buf[1..3], address);
                BigEndian::write_u16(&mut buf[3..5], word);
            }
            Self::WriteMultipleCoils(address, coils) => {
                BigEndian::write_u16(&mut buf[1..3], address);
                BigEndian::write_u16(&mut buf[3..5], coils.len() as u16);
                buf[5] = coils.packed_len() as u8;
                coils.write_to(&mut buf[6..]);
            }
            Self::WriteMultipleRegisters(address, words) => {
                BigEndian::write_u16(&mut buf[1..3], address);
                BigEndian::write_u16(&mut buf[3..5], words.len() as u16);
                buf[5] = (words.len() * 2) as u8;
                words.write_to(&mut buf[6..]);
            }
            Self::WriteFileRecord(record) => encode_file_record(record, len, buf),
            Self::Custom(_, data) => buf[1..len].copy_from_slice(data),
        }
        Ok(len)
    }
}

impl Response<'_> {
    /// Serialize the PDU into `buf`.
    ///
    /// It returns the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let len = self.pdu_len();
        if buf.len() < len {
            return Err(ProtocolError::BufferSize);
        }
        buf[0] = FunctionCode::from(*self).value();
        match *self {
            Self::ReadCoils(coils) | Self::ReadDiscreteInputs(coils) => {
                buf[1] = coils.packed_len() as u8;
                coils.write_to(&mut buf[2..]);
            }
            Self::ReadInputRegisters(words) | Self::ReadHoldingRegisters(words) => {
                buf[1] = (words.len() * 2) as u8;
                words.write_to(&mut buf[2..]);
            }
            Self::WriteSingleCoil(address, state) => {
                BigEndian::write_u16(&mut buf[1..3], address);
                BigEndian::write_u16(&mut buf[3..5], bool_to_u16_coil(state));
            }
            Self::WriteMultipleCoils(address, payload)
            | Self::WriteSingleRegister(address, payload)
            | Self::WriteMultipleRegisters(address, payload) => {
                BigEndian::write_u16(&mut buf[1..3], address);
                BigEndian::write_u16(&mut buf[3..5], payload);
            }
            Self::WriteFileRecord(record) => encode_file_record(record, len, buf),
            Self::Custom(_, data) => buf[1..len].copy_from_slice(data),
        }
        Ok(len)
    }
}

fn encode_file_record(record: FileRecord<'_>, pdu_len: usize, buf: &mut [u8]) {
    buf[1] = (pdu_len - 2) as u8;
    buf[2] = FILE_REFERENCE_TYPE;
    BigEndian::write_u16(&mut buf[3..5], record.file_number);
    BigEndian::write_u16(&mut buf[5..7], record.record_number);
    BigEndian::write_u16(&mut buf[7..9], record.record_len());
    buf[9..pdu_len].copy_from_slice(record.data);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_response_into_bytes() {
        let bytes: [u8; 2] = ExceptionResponse {
            function: 0x03.into(),
            exception: Exception::IllegalDataAddress,
        }
        .into();
        assert_eq!(bytes[0], 0x83);
        assert_eq!(bytes[1], 0x02);
    }

    #[test]
    fn exception_response_from_bytes() {
        let data: &[u8] = &[0x79, 0x02];
        assert!(ExceptionResponse::try_from(data).is_err());

        let data: &[u8] = &[0x83];
        assert_eq!(
            ExceptionResponse::try_from(data).err().unwrap(),
            ProtocolError::BufferSize
        );

        let data: &[u8] = &[0x83, 0x07];
        assert_eq!(
            ExceptionResponse::try_from(data).err().unwrap(),
            ProtocolError::ExceptionCode(0x07)
        );

        let bytes: &[u8] = &[0x83, 0x02];
        let rsp = ExceptionResponse::try_from(bytes).unwrap();
        assert_eq!(
            rsp,
            ExceptionResponse {
                function: 0x03.into(),
                exception: Exception::IllegalDataAddress,
            }
        );
    }

    #[test]
    fn test_min_request_pdu_len() {
        use FunctionCode::*;

        assert_eq!(min_request_pdu_len(ReadCoils), 5);
        assert_eq!(min_request_pdu_len(WriteSingleRegister), 5);
        assert_eq!(min_request_pdu_len(WriteMultipleCoils), 6);
        assert_eq!(min_request_pdu_len(WriteMultipleRegisters), 6);
        assert_eq!(min_request_pdu_len(WriteFileRecord), 9);
        assert_eq!(min_request_pdu_len(Custom(0x41)), 1);
    }

    mod serialize_requests {
        use super::*;

        fn encode(req: Request<'_>) -> Vec<u8> {
            let mut buf = [0; MAX_PDU_LEN];
            let len = req.encode(&mut buf).unwrap();
            buf[..len].to_vec()
        }

        #[test]
        fn read_holding_registers() {
            assert_eq!(
                encode(Request::ReadHoldingRegisters(0x0064, 3)),
                [0x03, 0x00, 0x64, 0x00, 0x03]
            );
        }

        #[test]
        fn write_single_coil() {
            assert_eq!(
                encode(Request::WriteSingleCoil(0x0005, true)),
                [0x05, 0x00, 0x05, 0xFF, 0x00]
            );
            assert_eq!(
                encode(Request::WriteSingleCoil(0x0005, false)),
                [0x05, 0x00, 0x05, 0x00, 0x00]
            );
        }

        #[test]
        fn write_multiple_coils() {
            let buf = &mut [0; 2];
            let coils = Coils::from_bools(&[true, false, true, true, false, false, true, true, true, false], buf).unwrap();
            assert_eq!(
                encode(Request::WriteMultipleCoils(0x0013, coils)),
                [0x0F, 0x00, 0x13, 0x00, 0x0A, 0x02, 0xCD, 0x01]
            );
        }

        #[test]
        fn write_multiple_registers() {
            let buf = &mut [0; 4];
            let words = Words::from_words(&[0x000A, 0x0102], buf).unwrap();
            assert_eq!(
                encode(Request::WriteMultipleRegisters(0x0001, words)),
                [0x10, 0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02]
            );
        }

        #[test]
        fn write_file_record() {
            let record = FileRecord {
                file_number: 0x0004,
                record_number: 0x0007,
                data: &[0x06, 0xAF, 0x04, 0xBE, 0x10, 0x0D],
            };
            assert_eq!(
                encode(Request::WriteFileRecord(record)),
                [
                    0x15, 0x0D, 0x06, 0x00, 0x04, 0x00, 0x07, 0x00, 0x03, 0x06, 0xAF, 0x04, 0xBE,
                    0x10, 0x0D
                ]
            );
        }

        #[test]
        fn custom() {
            assert_eq!(
                encode(Request::Custom(FunctionCode::Custom(0x41), &[0xCC, 0x88])),
                [0x41, 0xCC, 0x88]
            );
        }

        #[test]
        fn buffer_too_small() {
            let buf = &mut [0; 4];
            assert_eq!(
                Request::ReadCoils(0, 1).encode(buf).err().unwrap(),
                ProtocolError::BufferSize
            );
        }
    }

    mod deserialize_requests {
        use super::*;

        #[test]
        fn empty_request() {
            let data: &[u8] = &[];
            assert!(Request::try_from(data).is_err());
        }

        #[test]
        fn read_coils() {
            let data: &[u8] = &[0x01];
            assert!(Request::try_from(data).is_err());
            let data: &[u8] = &[0x01, 0x0, 0x0, 0x22];
            assert!(Request::try_from(data).is_err());
            let data: &[u8] = &[0x01, 0x00, 0x12, 0x0, 0x4, 0x00];
            assert!(Request::try_from(data).is_err());

            let data: &[u8] = &[0x01, 0x00, 0x12, 0x0, 0x4];
            let req = Request::try_from(data).unwrap();
            assert_eq!(req, Request::ReadCoils(0x12, 4));
        }

        #[test]
        fn read_discrete_inputs() {
            let data: &[u8] = &[2, 0x00, 0x03, 0x00, 19];
            let req = Request::try_from(data).unwrap();
            assert_eq!(req, Request::ReadDiscreteInputs(0x03, 19));
        }

        #[test]
        fn write_single_coil() {
            let bytes: &[u8] = &[5, 0x12, 0x34, 0xFF, 0x00];
            let req = Request::try_from(bytes).unwrap();
            assert_eq!(req, Request::WriteSingleCoil(0x1234, true));

            let bytes: &[u8] = &[5, 0x12, 0x34, 0x00, 0x01];
            assert_eq!(
                Request::try_from(bytes).err().unwrap(),
                ProtocolError::CoilValue(0x0001)
            );
        }

        #[test]
        fn write_multiple_coils() {
            let data: &[u8] = &[0x0F, 0x33, 0x11, 0x00, 0x04, 0x02, 0b_0000_1101];
            assert!(Request::try_from(data).is_err());

            // quantity needs one byte
            let data: &[u8] = &[0x0F, 0x33, 0x11, 0x00, 0x04, 0x00];
            assert!(Request::try_from(data).is_err());

            let bytes: &[u8] = &[0x0F, 0x33, 0x11, 0x00, 0x04, 0x01, 0b_0000_1101];
            let req = Request::try_from(bytes).unwrap();
            assert_eq!(
                req,
                Request::WriteMultipleCoils(
                    0x3311,
                    Coils::from_packed(&[0b1101], 4)
                )
            );
        }

        #[test]
        fn read_input_registers() {
            let bytes: &[u8] = &[4, 0x00, 0x09, 0x00, 0x4D];
            let req = Request::try_from(bytes).unwrap();
            assert_eq!(req, Request::ReadInputRegisters(0x09, 77));
        }

        #[test]
        fn read_holding_registers() {
            let bytes: &[u8] = &[3, 0x00, 0x09, 0x00, 0x4D];
            let req = Request::try_from(bytes).unwrap();
            assert_eq!(req, Request::ReadHoldingRegisters(0x09, 77));
        }

        #[test]
        fn write_single_register() {
            let bytes: &[u8] = &[6, 0x00, 0x07, 0xAB, 0xCD];
            let req = Request::try_from(bytes).unwrap();
            assert_eq!(req, Request::WriteSingleRegister(0x07, 0xABCD));
        }

        #[test]
        fn write_multiple_registers() {
            let data: &[u8] = &[0x10, 0x00, 0x06, 0x00, 0x02, 0x05, 0xAB, 0xCD, 0xEF, 0x12];
            assert!(Request::try_from(data).is_err());

            let bytes: &[u8] = &[0x10, 0x00, 0x06, 0x00, 0x02, 0x04, 0xAB, 0xCD, 0xEF, 0x12];
            let req = Request::try_from(bytes).unwrap();
            assert_eq!(
                req,
                Request::WriteMultipleRegisters(
                    0x06,
                    Words::from_packed(&[0xAB, 0xCD, 0xEF, 0x12], 2)
                )
            );
            if let Request::WriteMultipleRegisters(_, data) = req {
                assert_eq!(data.get(0), Some(0xABCD));
                assert_eq!(data.get(1), Some(0xEF12));
            } else {
                unreachable!()
            };
        }

        #[test]
        fn write_file_record() {
            let bytes: &[u8] = &[
                0x15, 0x09, 0x06, 0x00, 0x04, 0x00, 0x07, 0x00, 0x01, 0x06, 0xAF,
            ];
            let req = Request::try_from(bytes).unwrap();
            assert_eq!(
                req,
                Request::WriteFileRecord(FileRecord {
                    file_number: 4,
                    record_number: 7,
                    data: &[0x06, 0xAF],
                })
            );

            // record length does not match the data
            let bytes: &[u8] = &[
                0x15, 0x09, 0x06, 0x00, 0x04, 0x00, 0x07, 0x00, 0x02, 0x06, 0xAF,
            ];
            assert!(Request::try_from(bytes).is_err());
        }

        #[test]
        fn custom() {
            let bytes: &[u8] = &[0x55, 0xCC, 0x88, 0xAA, 0xFF];
            let req = Request::try_from(bytes).unwrap();
            assert_eq!(
                req,
                Request::Custom(FunctionCode::Custom(0x55), &[0xCC, 0x88, 0xAA, 0xFF])
            );
        }

        #[test]
        fn exception_bit_in_request() {
            let bytes: &[u8] = &[0x83, 0x02];
            assert_eq!(
                Request::try_from(bytes).err().unwrap(),
                ProtocolError::FnCode(0x83)
            );
        }
    }

    #[test]
    fn test_min_response_pdu_len() {
        use FunctionCode::*;

        assert_eq!(min_response_pdu_len(ReadCoils), 2);
        assert_eq!(min_response_pdu_len(ReadInputRegisters), 2);
        assert_eq!(min_response_pdu_len(WriteSingleCoil), 5);
        assert_eq!(min_response_pdu_len(WriteMultipleRegisters), 5);
        assert_eq!(min_response_pdu_len(WriteFileRecord), 9);
        assert_eq!(min_response_pdu_len(Custom(0x41)), 1);
    }

    mod deserialize_responses {
        use super::*;

        #[test]
        fn empty_response() {
            let data: &[u8] = &[];
            assert_eq!(
                Response::try_from(data).err().unwrap(),
                ProtocolError::BufferSize
            );
        }

        #[test]
        fn read_coils() {
            let bytes: &[u8] = &[0x01, 0x01, 0b_0000_1001];
            let rsp = Response::try_from(bytes).unwrap();
            assert_eq!(rsp, Response::ReadCoils(Coils::from_packed(&[0b_0000_1001], 8)));

            let bytes: &[u8] = &[0x02, 0x02, 0x01];
            assert_eq!(
                Response::try_from(bytes).err().unwrap(),
                ProtocolError::ByteCount(2)
            );
        }

        #[test]
        fn read_holding_registers() {
            let bytes: &[u8] = &[0x03, 0x04, 0x89, 0x02, 0x42, 0xC7];
            let Response::ReadHoldingRegisters(words) = Response::try_from(bytes).unwrap() else {
                unreachable!()
            };
            assert_eq!(words.iter().collect::<Vec<_>>(), [0x8902, 0x42C7]);

            // odd number of bytes
            let bytes: &[u8] = &[0x04, 0x03, 0x89, 0x02, 0x42];
            assert_eq!(
                Response::try_from(bytes).err().unwrap(),
                ProtocolError::ByteCount(3)
            );
            let bytes: &[u8] = &[0x04];
            assert_eq!(
                Response::try_from(bytes).err().unwrap(),
                ProtocolError::BufferSize
            );
        }

        #[test]
        fn write_echoes() {
            let bytes: &[u8] = &[0x05, 0x00, 0x05, 0xFF, 0x00];
            assert_eq!(
                Response::try_from(bytes).unwrap(),
                Response::WriteSingleCoil(5, true)
            );
            let bytes: &[u8] = &[0x05, 0x00, 0x05, 0x12, 0x34];
            assert_eq!(
                Response::try_from(bytes).err().unwrap(),
                ProtocolError::CoilValue(0x1234)
            );
            let bytes: &[u8] = &[0x06, 0x00, 0x02, 0xAB, 0xCD];
            assert_eq!(
                Response::try_from(bytes).unwrap(),
                Response::WriteSingleRegister(2, 0xABCD)
            );
            let bytes: &[u8] = &[0x0F, 0x00, 0x13, 0x00, 0x0A];
            assert_eq!(
                Response::try_from(bytes).unwrap(),
                Response::WriteMultipleCoils(0x13, 10)
            );
            let bytes: &[u8] = &[0x10, 0x00, 0x01, 0x00, 0x02, 0x00];
            assert_eq!(
                Response::try_from(bytes).err().unwrap(),
                ProtocolError::BufferSize
            );
        }

        #[test]
        fn write_file_record() {
            let bytes: &[u8] = &[
                0x15, 0x09, 0x06, 0x00, 0x04, 0x00, 0x07, 0x00, 0x01, 0x06, 0xAF,
            ];
            assert_eq!(
                Response::try_from(bytes).unwrap(),
                Response::WriteFileRecord(FileRecord {
                    file_number: 4,
                    record_number: 7,
                    data: &[0x06, 0xAF],
                })
            );
        }

        #[test]
        fn custom() {
            let bytes: &[u8] = &[0x41, 0x01, 0x02];
            assert_eq!(
                Response::try_from(bytes).unwrap(),
                Response::Custom(FunctionCode::Custom(0x41), &[0x01, 0x02])
            );
            let bytes: &[u8] = &[0x83, 0x02];
            assert_eq!(
                Response::try_from(bytes).err().unwrap(),
                ProtocolError::FnCode(0x83)
            );
        }
    }

    mod serialize_responses {
        use super::*;

        fn encode(rsp: Response<'_>) -> Vec<u8> {
            let mut buf = [0; MAX_PDU_LEN];
            let len = rsp.encode(&mut buf).unwrap();
            buf[..len].to_vec()
        }

        #[test]
        fn read_coils() {
            let buf = &mut [0; 1];
            let coils = Coils::from_bools(&[true, false, false, true], buf).unwrap();
            assert_eq!(
                encode(Response::ReadCoils(coils)),
                [0x01, 0x01, 0b_0000_1001]
            );
        }

        #[test]
        fn read_holding_registers() {
            let buf = &mut [0; 6];
            let words = Words::from_words(&[100, 101, 102], buf).unwrap();
            assert_eq!(
                encode(Response::ReadHoldingRegisters(words)),
                [0x03, 0x06, 0x00, 0x64, 0x00, 0x65, 0x00, 0x66]
            );
        }

        #[test]
        fn write_multiple_coils() {
            assert_eq!(
                encode(Response::WriteMultipleCoils(0x3311, 5)),
                [0x0F, 0x33, 0x11, 0x00, 0x05]
            );
        }

        #[test]
        fn exception() {
            let ex = ExceptionResponse {
                function: FunctionCode::ReadHoldingRegisters,
                exception: Exception::IllegalDataAddress,
            };
            let bytes: [u8; 2] = ex.into();
            assert_eq!(bytes, [0x83, 0x02]);
        }
    }
}
