// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;

mod file;
mod packed;

pub use self::{file::*, packed::*};

/// Maximum number of coils or discrete inputs a master reads in one request.
pub const MAX_READ_BITS: usize = 2000;

/// Maximum number of coils or discrete inputs a slave serves in one response (`0x07D0`).
pub const MAX_SERVE_BITS: usize = 0x07D0;

/// Maximum number of registers a master reads in one request.
pub const MAX_READ_REGISTERS: usize = 123;

/// Maximum number of registers a slave serves in one response (`0x007D`).
pub const MAX_SERVE_REGISTERS: usize = 0x007D;

/// Maximum number of coils in a write multiple coils request (`0x07B0`).
pub const MAX_WRITE_COILS: usize = 0x07B0;

/// Maximum number of registers in a write multiple registers request (`0x007B`).
pub const MAX_WRITE_REGISTERS: usize = 0x007B;

/// Maximum size of a write file record.
pub const MAX_RECORD_SIZE: u8 = 244;

/// Maximum size of a PDU.
pub const MAX_PDU_LEN: usize = 253;

/// A Modbus function code.
///
/// Codes outside of the supported catalogue are kept as [`FunctionCode::Custom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCode {
    /// `0x01`
    ReadCoils,
    /// `0x02`
    ReadDiscreteInputs,
    /// `0x03`
    ReadHoldingRegisters,
    /// `0x04`
    ReadInputRegisters,
    /// `0x05`
    WriteSingleCoil,
    /// `0x06`
    WriteSingleRegister,
    /// `0x0F`
    WriteMultipleCoils,
    /// `0x10`
    WriteMultipleRegisters,
    /// `0x15`
    WriteFileRecord,
    Custom(u8),
}

impl FunctionCode {
    #[must_use]
    pub const fn new(value: u8) -> Self {
        use FunctionCode as F;
        match value {
            0x01 => F::ReadCoils,
            0x02 => F::ReadDiscreteInputs,
            0x03 => F::ReadHoldingRegisters,
            0x04 => F::ReadInputRegisters,
            0x05 => F::WriteSingleCoil,
            0x06 => F::WriteSingleRegister,
            0x0F => F::WriteMultipleCoils,
            0x10 => F::WriteMultipleRegisters,
            0x15 => F::WriteFileRecord,
            other => F::Custom(other),
        }
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        use FunctionCode as F;
        match self {
            F::ReadCoils => 0x01,
            F::ReadDiscreteInputs => 0x02,
            F::ReadHoldingRegisters => 0x03,
            F::ReadInputRegisters => 0x04,
            F::WriteSingleCoil => 0x05,
            F::WriteSingleRegister => 0x06,
            F::WriteMultipleCoils => 0x0F,
            F::WriteMultipleRegisters => 0x10,
            F::WriteFileRecord => 0x15,
            F::Custom(other) => other,
        }
    }
}

impl From<u8> for FunctionCode {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

impl From<FunctionCode> for u8 {
    fn from(code: FunctionCode) -> Self {
        code.value()
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:0>2X}", self.value())
    }
}

/// Register or coil address, `0` to `65535`.
pub type Address = u16;

/// A single bit: `true` is `ON` (`0xFF00` on the wire), `false` is `OFF` (`0x0000`).
pub type Coil = bool;

/// Register value.
pub type Word = u16;

/// Number of coils or registers.
pub type Quantity = u16;

/// Addressed sub-device, carried by both framings.
pub type UnitId = u8;

type RawData<'r> = &'r [u8];

/// A request PDU sent by the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'r> {
    ReadCoils(Address, Quantity),
    ReadDiscreteInputs(Address, Quantity),
    ReadHoldingRegisters(Address, Quantity),
    ReadInputRegisters(Address, Quantity),
    WriteSingleCoil(Address, Coil),
    WriteSingleRegister(Address, Word),
    WriteMultipleCoils(Address, Coils<'r>),
    WriteMultipleRegisters(Address, Words<'r>),
    WriteFileRecord(FileRecord<'r>),
    /// Function code and the raw data following it.
    Custom(FunctionCode, &'r [u8]),
}

impl Request<'_> {
    #[must_use]
    pub const fn function(&self) -> FunctionCode {
        use FunctionCode as F;
        match *self {
            Self::ReadCoils(..) => F::ReadCoils,
            Self::ReadDiscreteInputs(..) => F::ReadDiscreteInputs,
            Self::ReadHoldingRegisters(..) => F::ReadHoldingRegisters,
            Self::ReadInputRegisters(..) => F::ReadInputRegisters,
            Self::WriteSingleCoil(..) => F::WriteSingleCoil,
            Self::WriteSingleRegister(..) => F::WriteSingleRegister,
            Self::WriteMultipleCoils(..) => F::WriteMultipleCoils,
            Self::WriteMultipleRegisters(..) => F::WriteMultipleRegisters,
            Self::WriteFileRecord(_) => F::WriteFileRecord,
            Self::Custom(function, _) => function,
        }
    }

    /// Size of the encoded PDU.
    #[must_use]
    pub const fn pdu_len(&self) -> usize {
        match *self {
            Self::ReadCoils(..)
            | Self::ReadDiscreteInputs(..)
            | Self::ReadHoldingRegisters(..)
            | Self::ReadInputRegisters(..)
            | Self::WriteSingleCoil(..)
            | Self::WriteSingleRegister(..) => 5,
            Self::WriteMultipleCoils(_, coils) => 6 + coils.packed_len(),
            Self::WriteMultipleRegisters(_, words) => 6 + words.len() * 2,
            Self::WriteFileRecord(record) => 9 + record.data.len(),
            Self::Custom(_, data) => 1 + data.len(),
        }
    }
}

/// A successful response PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response<'r> {
    ReadCoils(Coils<'r>),
    ReadDiscreteInputs(Coils<'r>),
    ReadHoldingRegisters(Words<'r>),
    ReadInputRegisters(Words<'r>),
    WriteSingleCoil(Address, Coil),
    WriteSingleRegister(Address, Word),
    WriteMultipleCoils(Address, Quantity),
    WriteMultipleRegisters(Address, Quantity),
    WriteFileRecord(FileRecord<'r>),
    Custom(FunctionCode, &'r [u8]),
}

impl Response<'_> {
    #[must_use]
    pub const fn function(&self) -> FunctionCode {
        use FunctionCode as F;
        match *self {
            Self::ReadCoils(_) => F::ReadCoils,
            Self::ReadDiscreteInputs(_) => F::ReadDiscreteInputs,
            Self::ReadHoldingRegisters(_) => F::ReadHoldingRegisters,
            Self::ReadInputRegisters(_) => F::ReadInputRegisters,
            Self::WriteSingleCoil(..) => F::WriteSingleCoil,
            Self::WriteSingleRegister(..) => F::WriteSingleRegister,
            Self::WriteMultipleCoils(..) => F::WriteMultipleCoils,
            Self::WriteMultipleRegisters(..) => F::WriteMultipleRegisters,
            Self::WriteFileRecord(_) => F::WriteFileRecord,
            Self::Custom(function, _) => function,
        }
    }

    /// Size of the encoded PDU.
    #[must_use]
    pub const fn pdu_len(&self) -> usize {
        match *self {
            Self::ReadCoils(coils) | Self::ReadDiscreteInputs(coils) => 2 + coils.packed_len(),
            Self::ReadHoldingRegisters(words) | Self::ReadInputRegisters(words) => {
                2 + words.len() * 2
            }
            Self::WriteSingleCoil(..)
            | Self::WriteSingleRegister(..)
            | Self::WriteMultipleCoils(..)
            | Self::WriteMultipleRegisters(..) => 5,
            Self::WriteFileRecord(record) => 9 + record.data.len(),
            Self::Custom(_, data) => 1 + data.len(),
        }
    }
}

impl From<Request<'_>> for FunctionCode {
    fn from(req: Request<'_>) -> Self {
        req.function()
    }
}

impl From<Response<'_>> for FunctionCode {
    fn from(rsp: Response<'_>) -> Self {
        rsp.function()
    }
}

/// Exception code of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exception {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
    /// Also known as slave device failure.
    ServerDeviceFailure = 0x04,
    Acknowledge = 0x05,
    ServerDeviceBusy = 0x06,
    MemoryParityError = 0x08,
    GatewayPathUnavailable = 0x0A,
    GatewayTargetDevice = 0x0B,
}

impl Exception {
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::IllegalFunction => "Illegal function",
            Self::IllegalDataAddress => "Illegal data address",
            Self::IllegalDataValue => "Illegal data value",
            Self::ServerDeviceFailure => "Server device failure",
            Self::Acknowledge => "Acknowledge",
            Self::ServerDeviceBusy => "Server device busy",
            Self::MemoryParityError => "Memory parity error",
            Self::GatewayPathUnavailable => "Gateway path unavailable",
            Self::GatewayTargetDevice => "Gateway target device failed to respond",
        })
    }
}

/// An exception response PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionResponse {
    pub function: FunctionCode,
    pub exception: Exception,
}
