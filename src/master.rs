// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus master (client)

use crate::{
    error::{ArgumentError, Error, ProtocolError, Result},
    frame::*,
    transport::Transport,
    util::*,
};

/// Sends requests to remote devices and validates their responses.
///
/// Every operation takes `&mut self`, so there is never more than one
/// outstanding transaction per master.
#[derive(Debug)]
pub struct Master<T> {
    transport: T,
}

impl<T: Transport> Master<T> {
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Connect the underlying transport.
    pub async fn open(&mut self) -> Result<()> {
        self.transport.connect().await
    }

    pub fn close(&mut self) {
        self.transport.close();
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Read `count` coils starting at `address`.
    pub async fn read_coils(
        &mut self,
        unit_id: UnitId,
        address: Address,
        count: Quantity,
    ) -> Result<Vec<Coil>> {
        self.read_bits(unit_id, Request::ReadCoils(address, count), count)
            .await
    }

    /// Read `count` discrete inputs starting at `address`.
    pub async fn read_discrete_inputs(
        &mut self,
        unit_id: UnitId,
        address: Address,
        count: Quantity,
    ) -> Result<Vec<Coil>> {
        self.read_bits(unit_id, Request::ReadDiscreteInputs(address, count), count)
            .await
    }

    /// Read `count` holding registers starting at `address`.
    pub async fn read_holding_registers(
        &mut self,
        unit_id: UnitId,
        address: Address,
        count: Quantity,
    ) -> Result<Vec<Word>> {
        self.read_words(unit_id, Request::ReadHoldingRegisters(address, count), count)
            .await
    }

    /// Read `count` input registers starting at `address`.
    pub async fn read_input_registers(
        &mut self,
        unit_id: UnitId,
        address: Address,
        count: Quantity,
    ) -> Result<Vec<Word>> {
        self.read_words(unit_id, Request::ReadInputRegisters(address, count), count)
            .await
    }

    /// Write coils starting at `address`.
    ///
    /// A single value is sent as write single coil (`0x05`),
    /// more values as write multiple coils (`0x0F`).
    pub async fn write_coils(
        &mut self,
        unit_id: UnitId,
        address: Address,
        coils: &[Coil],
    ) -> Result<()> {
        match coils {
            [] => Err(ArgumentError::NoValues.into()),
            [coil] => {
                let rsp = self
                    .call(unit_id, Request::WriteSingleCoil(address, *coil))
                    .await?;
                check_echo(&rsp, address, bool_to_u16_coil(*coil))
            }
            _ => {
                check_quantity(coils.len(), MAX_WRITE_COILS)?;
                let mut buf = [0; packed_coils_len(MAX_WRITE_COILS)];
                let packed = Coils::from_bools(coils, &mut buf)?;
                let rsp = self
                    .call(unit_id, Request::WriteMultipleCoils(address, packed))
                    .await?;
                check_echo(&rsp, address, coils.len() as u16)
            }
        }
    }

    /// Write holding registers starting at `address`.
    ///
    /// A single value is sent as write single register (`0x06`),
    /// more values as write multiple registers (`0x10`).
    pub async fn write_holding_registers(
        &mut self,
        unit_id: UnitId,
        address: Address,
        words: &[Word],
    ) -> Result<()> {
        match words {
            [] => Err(ArgumentError::NoValues.into()),
            [word] => {
                let rsp = self
                    .call(unit_id, Request::WriteSingleRegister(address, *word))
                    .await?;
                check_echo(&rsp, address, *word)
            }
            _ => {
                check_quantity(words.len(), MAX_WRITE_REGISTERS)?;
                let mut buf = [0; MAX_WRITE_REGISTERS * 2];
                let data = Words::from_words(words, &mut buf)?;
                let rsp = self
                    .call(unit_id, Request::WriteMultipleRegisters(address, data))
                    .await?;
                check_echo(&rsp, address, words.len() as u16)
            }
        }
    }

    /// Write one record of `file` with write file record (`0x15`).
    ///
    /// The file is split into records of `record_size` bytes; the last
    /// record may be shorter. A record with an odd length is padded with
    /// a zero byte.
    pub async fn write_file(
        &mut self,
        unit_id: UnitId,
        file_number: u16,
        record_size: u8,
        record_number: u16,
        file: &[u8],
    ) -> Result<()> {
        let window = file_record(file, record_size, record_number)?;
        let mut data = [0; MAX_RECORD_SIZE as usize + 1];
        data[..window.len()].copy_from_slice(window);
        let padded_len = window.len() + window.len() % 2;
        let record = FileRecord {
            file_number,
            record_number,
            data: &data[..padded_len],
        };
        let rsp = self.call(unit_id, Request::WriteFileRecord(record)).await?;
        match Response::try_from(rsp.as_slice())? {
            Response::WriteFileRecord(echo) if echo == record => Ok(()),
            Response::WriteFileRecord(_) => Err(ProtocolError::EchoMismatch.into()),
            other => Err(unexpected(other)),
        }
    }

    /// Send a request with a user defined function code.
    ///
    /// Only the function code of the response is checked. The response
    /// data following the function code is returned.
    pub async fn send_user_function(
        &mut self,
        unit_id: UnitId,
        function_code: u8,
        data: &[u8],
    ) -> Result<Vec<u8>> {
        if function_code == 0 || function_code >= 0x80 {
            return Err(ArgumentError::InvalidFnCode(function_code).into());
        }
        if data.len() >= MAX_PDU_LEN {
            return Err(ArgumentError::QuantityOutOfRange {
                quantity: data.len(),
                max: MAX_PDU_LEN - 1,
            }
            .into());
        }
        let function = FunctionCode::new(function_code);
        let rsp = self.call(unit_id, Request::Custom(function, data)).await?;
        Ok(rsp[1..].to_vec())
    }

    async fn read_bits(
        &mut self,
        unit_id: UnitId,
        req: Request<'_>,
        count: Quantity,
    ) -> Result<Vec<Coil>> {
        let count = usize::from(count);
        check_quantity(count, MAX_READ_BITS)?;
        let rsp = self.call(unit_id, req).await?;
        match read_response(&rsp, packed_coils_len(count))? {
            Response::ReadCoils(coils) | Response::ReadDiscreteInputs(coils) => {
                Ok(coils.iter().take(count).collect())
            }
            other => Err(unexpected(other)),
        }
    }

    async fn read_words(
        &mut self,
        unit_id: UnitId,
        req: Request<'_>,
        count: Quantity,
    ) -> Result<Vec<Word>> {
        let count = usize::from(count);
        check_quantity(count, MAX_READ_REGISTERS)?;
        let rsp = self.call(unit_id, req).await?;
        match read_response(&rsp, count * 2)? {
            Response::ReadHoldingRegisters(words) | Response::ReadInputRegisters(words) => {
                Ok(words.iter().collect())
            }
            other => Err(unexpected(other)),
        }
    }

    async fn call(&mut self, unit_id: UnitId, req: Request<'_>) -> Result<Vec<u8>> {
        let mut buf = [0; MAX_PDU_LEN];
        let len = req.encode(&mut buf)?;
        self.transact(unit_id, &buf[..len]).await
    }

    /// One request/response cycle, returning the validated response PDU.
    async fn transact(&mut self, unit_id: UnitId, pdu: &[u8]) -> Result<Vec<u8>> {
        log::trace!("Request to unit {unit_id}: {pdu:X?}");
        self.transport.send(unit_id, pdu).await?;
        let rsp = self.transport.receive(unit_id).await?;
        log::trace!("Response from unit {unit_id}: {rsp:X?}");
        check_function(FunctionCode::new(pdu[0]), &rsp)?;
        Ok(rsp)
    }
}

const fn check_quantity(quantity: usize, max: usize) -> core::result::Result<(), ArgumentError> {
    if quantity == 0 || quantity > max {
        return Err(ArgumentError::QuantityOutOfRange { quantity, max });
    }
    Ok(())
}

/// Select the window of `record_number` within `file`.
fn file_record(
    file: &[u8],
    record_size: u8,
    record_number: u16,
) -> core::result::Result<&[u8], ArgumentError> {
    if file.is_empty() {
        return Err(ArgumentError::EmptyFile);
    }
    if record_size == 0 || record_size > MAX_RECORD_SIZE {
        return Err(ArgumentError::InvalidRecordSize(record_size));
    }
    let start = usize::from(record_size) * usize::from(record_number);
    if start >= file.len() {
        return Err(ArgumentError::RecordOutOfFile {
            record_number,
            record_size,
            file_len: file.len(),
        });
    }
    let end = file.len().min(start + usize::from(record_size));
    Ok(&file[start..end])
}

/// The response must answer `request`, exception responses are turned
/// into [`Error::Exception`].
fn check_function(request: FunctionCode, rsp: &[u8]) -> Result<()> {
    let Some(&fn_code) = rsp.first() else {
        return Err(ProtocolError::BufferSize.into());
    };
    if fn_code & 0x7F != request.value() {
        return Err(ProtocolError::FnCodeMismatch {
            request,
            response: fn_code,
        }
        .into());
    }
    if fn_code & 0x80 != 0 {
        let ExceptionResponse { exception, .. } = ExceptionResponse::try_from(rsp)?;
        log::debug!("Exception response to function {request}: {exception}");
        return Err(Error::Exception(exception));
    }
    Ok(())
}

/// Decode a read response whose values must take `expected` bytes.
fn read_response(rsp: &[u8], expected: usize) -> Result<Response<'_>> {
    let payload = rsp.len().saturating_sub(2);
    let declared = match Response::try_from(rsp) {
        Ok(decoded) if payload == expected => return Ok(decoded),
        Ok(_) => rsp[1],
        Err(ProtocolError::ByteCount(declared)) => declared,
        Err(err) => return Err(err.into()),
    };
    Err(ProtocolError::ByteCountMismatch {
        declared,
        expected,
        payload,
    }
    .into())
}

/// Writes are confirmed by echoing the address and the value or quantity.
fn check_echo(rsp: &[u8], address: Address, value: u16) -> Result<()> {
    let (echoed_address, echoed_value) = match Response::try_from(rsp)? {
        Response::WriteSingleCoil(echoed, coil) => (echoed, bool_to_u16_coil(coil)),
        Response::WriteSingleRegister(echoed, payload)
        | Response::WriteMultipleCoils(echoed, payload)
        | Response::WriteMultipleRegisters(echoed, payload) => (echoed, payload),
        other => return Err(unexpected(other)),
    };
    if echoed_address != address {
        return Err(ProtocolError::AddressMismatch {
            request: address,
            response: echoed_address,
        }
        .into());
    }
    if echoed_value != value {
        return Err(ProtocolError::ValueMismatch {
            request: value,
            response: echoed_value,
        }
        .into());
    }
    Ok(())
}

/// A response of a type the request cannot be answered with.
fn unexpected(rsp: Response<'_>) -> Error {
    ProtocolError::FnCode(rsp.function().value()).into()
}
