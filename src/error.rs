// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io;

use crate::frame::{Exception, FunctionCode};

/// The result of every fallible public operation.
pub type Result<T> = core::result::Result<T, Error>;

/// modbus-engine Error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The caller passed arguments that can not be put on the wire.
    #[error("Invalid argument: {0}")]
    Argument(#[from] ArgumentError),

    /// Malformed or inconsistent wire data.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A well formed exception response of the remote device.
    #[error("Modbus exception: {0}")]
    Exception(Exception),

    /// The connection failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<Exception> for Error {
    fn from(exception: Exception) -> Self {
        Self::Exception(exception)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Transport(TransportError::Io(err))
    }
}

/// Caller input rejected before any I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    /// Quantity outside of `1..=max`
    #[error("Quantity {quantity} out of range 1..={max}")]
    QuantityOutOfRange { quantity: usize, max: usize },
    /// No values to write
    #[error("No values to write")]
    NoValues,
    /// Function code reserved for exception responses or zero
    #[error("Invalid function code: 0x{0:0>2X}")]
    InvalidFnCode(u8),
    /// File without content
    #[error("File is empty")]
    EmptyFile,
    /// Record size outside of `1..=244`
    #[error("Invalid record size: {0}")]
    InvalidRecordSize(u8),
    /// Record lies behind the end of the file
    #[error("Record {record_number} (size {record_size}) lies after the end of the file ({file_len} bytes)")]
    RecordOutOfFile {
        record_number: u16,
        record_size: u8,
        file_len: usize,
    },
}

/// Malformed or inconsistent wire data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Invalid coil value
    #[error("Invalid coil value: 0x{0:0>4X}")]
    CoilValue(u16),
    /// Invalid buffer size
    #[error("Invalid buffer size")]
    BufferSize,
    /// Invalid function code
    #[error("Invalid function code: 0x{0:0>2X}")]
    FnCode(u8),
    /// Invalid exception code
    #[error("Invalid exception code: 0x{0:0>2X}")]
    ExceptionCode(u8),
    /// Invalid exception function code
    #[error("Invalid exception function code: 0x{0:0>2X}")]
    ExceptionFnCode(u8),
    /// Invalid CRC
    #[error("Invalid CRC: expected = 0x{expected:0>4X}, actual = 0x{actual:0>4X}")]
    Crc { expected: u16, actual: u16 },
    /// Invalid byte count
    #[error("Invalid byte count: {0}")]
    ByteCount(u8),
    /// Length Mismatch
    #[error("Length Mismatch: Length Field: {length_field}, PDU Len + 1: {pdu_len}")]
    LengthMismatch { length_field: usize, pdu_len: usize },
    /// MBAP length field announces an impossible PDU
    #[error("Invalid length field: {0}")]
    LengthField(u16),
    /// Protocol not Modbus
    #[error("Protocol not Modbus(0), received {0} instead")]
    ProtocolNotModbus(u16),
    /// The response answers another function
    #[error("Function code in response (0x{response:0>2X}) differs from request ({request})")]
    FnCodeMismatch {
        request: FunctionCode,
        response: u8,
    },
    /// The byte count of a read response does not fit the request
    #[error("Byte count {declared} differs from expected {expected} (payload {payload} bytes)")]
    ByteCountMismatch {
        declared: u8,
        expected: usize,
        payload: usize,
    },
    /// Echoed address differs from the request
    #[error("Address in response (0x{response:0>4X}) differs from request (0x{request:0>4X})")]
    AddressMismatch { request: u16, response: u16 },
    /// Echoed value or quantity differs from the request
    #[error("Value in response (0x{response:0>4X}) differs from request (0x{request:0>4X})")]
    ValueMismatch { request: u16, response: u16 },
    /// The response belongs to another transaction
    #[error("Transaction id in response ({response}) differs from request ({request})")]
    TransactionMismatch { request: u16, response: u16 },
    /// The response comes from another unit
    #[error("Unit id in response ({response}) differs from request ({request})")]
    UnitMismatch { request: u8, response: u8 },
    /// Response is not a byte-identical echo of the request
    #[error("Response differs from request")]
    EchoMismatch,
}

/// Connection level failures.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Not connected")]
    NotConnected,
    #[error("Timeout")]
    Timeout,
    #[error("Connection closed by peer")]
    Disconnected,
    #[error(transparent)]
    Io(#[from] io::Error),
}
