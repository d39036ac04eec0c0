// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus slave (server)
//!
//! A [`Service`] answers the decoded requests. [`process_request`] does the
//! framing independent part: it validates a request PDU, calls the service
//! and assembles the response or exception PDU.

use std::{
    collections::HashMap,
    fmt,
    panic::{self, AssertUnwindSafe},
};

use crate::frame::*;

#[cfg(feature = "rtu")]
mod rtu;
#[cfg(feature = "tcp")]
mod tcp;

#[cfg(feature = "rtu")]
pub use self::rtu::RtuSlave;
#[cfg(feature = "tcp")]
pub use self::tcp::{ConnectionState, Session, SessionId, SlaveConfig, TcpSlave};

/// The data model of a slave device.
///
/// Every function that is not implemented answers with
/// [`Exception::IllegalFunction`]. Calls may happen concurrently from
/// several connections.
#[allow(unused_variables)]
pub trait Service: Send + Sync + 'static {
    /// Whether `function` is served at all.
    ///
    /// Requests of unsupported functions are answered with
    /// [`Exception::IllegalFunction`] before they are validated.
    fn supports(&self, function: FunctionCode) -> bool {
        true
    }

    fn read_coils(
        &self,
        unit_id: UnitId,
        address: Address,
        count: Quantity,
    ) -> Result<Vec<Coil>, Exception> {
        Err(Exception::IllegalFunction)
    }

    fn read_discrete_inputs(
        &self,
        unit_id: UnitId,
        address: Address,
        count: Quantity,
    ) -> Result<Vec<Coil>, Exception> {
        Err(Exception::IllegalFunction)
    }

    fn read_holding_registers(
        &self,
        unit_id: UnitId,
        address: Address,
        count: Quantity,
    ) -> Result<Vec<Word>, Exception> {
        Err(Exception::IllegalFunction)
    }

    fn read_input_registers(
        &self,
        unit_id: UnitId,
        address: Address,
        count: Quantity,
    ) -> Result<Vec<Word>, Exception> {
        Err(Exception::IllegalFunction)
    }

    fn write_coils(
        &self,
        unit_id: UnitId,
        address: Address,
        coils: &[Coil],
    ) -> Result<(), Exception> {
        Err(Exception::IllegalFunction)
    }

    fn write_holding_registers(
        &self,
        unit_id: UnitId,
        address: Address,
        words: &[Word],
    ) -> Result<(), Exception> {
        Err(Exception::IllegalFunction)
    }

    /// Any other function, e.g. write file record (`0x15`) or a vendor
    /// specific code.
    ///
    /// `data` is the request PDU without the function code, the returned
    /// data becomes the response PDU after the function code. `None`
    /// means the function is not supported. Write file record requests
    /// only arrive here once their structure is valid.
    fn call_function(
        &self,
        unit_id: UnitId,
        function_code: u8,
        data: &[u8],
    ) -> Option<Result<Vec<u8>, Exception>> {
        None
    }
}

type ReadBits = Box<dyn Fn(UnitId, Address, Quantity) -> Result<Vec<Coil>, Exception> + Send + Sync>;
type ReadWords = Box<dyn Fn(UnitId, Address, Quantity) -> Result<Vec<Word>, Exception> + Send + Sync>;
type WriteBits = Box<dyn Fn(UnitId, Address, &[Coil]) -> Result<(), Exception> + Send + Sync>;
type WriteWords = Box<dyn Fn(UnitId, Address, &[Word]) -> Result<(), Exception> + Send + Sync>;
type UserFunction = Box<dyn Fn(UnitId, &[u8]) -> Result<Vec<u8>, Exception> + Send + Sync>;

/// A [`Service`] assembled from closures.
///
/// ```
/// use modbus_engine::{Exception, slave::Handlers};
///
/// let handlers = Handlers::default()
///     .on_read_input_registers(|_unit, address, count| {
///         if address != 0 {
///             return Err(Exception::IllegalDataAddress);
///         }
///         Ok(vec![0; count.into()])
///     })
///     .register_function(0x41, |_unit, data| Ok(data.to_vec()));
/// ```
#[derive(Default)]
pub struct Handlers {
    read_coils: Option<ReadBits>,
    read_discrete_inputs: Option<ReadBits>,
    read_holding_registers: Option<ReadWords>,
    read_input_registers: Option<ReadWords>,
    write_coils: Option<WriteBits>,
    write_holding_registers: Option<WriteWords>,
    functions: HashMap<u8, UserFunction>,
}

impl Handlers {
    #[must_use]
    pub fn on_read_coils<F>(mut self, f: F) -> Self
    where
        F: Fn(UnitId, Address, Quantity) -> Result<Vec<Coil>, Exception> + Send + Sync + 'static,
    {
        self.read_coils = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_read_discrete_inputs<F>(mut self, f: F) -> Self
    where
        F: Fn(UnitId, Address, Quantity) -> Result<Vec<Coil>, Exception> + Send + Sync + 'static,
    {
        self.read_discrete_inputs = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_read_holding_registers<F>(mut self, f: F) -> Self
    where
        F: Fn(UnitId, Address, Quantity) -> Result<Vec<Word>, Exception> + Send + Sync + 'static,
    {
        self.read_holding_registers = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_read_input_registers<F>(mut self, f: F) -> Self
    where
        F: Fn(UnitId, Address, Quantity) -> Result<Vec<Word>, Exception> + Send + Sync + 'static,
    {
        self.read_input_registers = Some(Box::new(f));
        self
    }

    /// Called for write single coil and write multiple coils.
    #[must_use]
    pub fn on_write_coils<F>(mut self, f: F) -> Self
    where
        F: Fn(UnitId, Address, &[Coil]) -> Result<(), Exception> + Send + Sync + 'static,
    {
        self.write_coils = Some(Box::new(f));
        self
    }

    /// Called for write single register and write multiple registers.
    #[must_use]
    pub fn on_write_holding_registers<F>(mut self, f: F) -> Self
    where
        F: Fn(UnitId, Address, &[Word]) -> Result<(), Exception> + Send + Sync + 'static,
    {
        self.write_holding_registers = Some(Box::new(f));
        self
    }

    /// Register a handler for any other function code.
    ///
    /// The standard read and write functions are always dispatched to
    /// their typed handlers, registering them here has no effect.
    #[must_use]
    pub fn register_function<F>(mut self, function_code: u8, f: F) -> Self
    where
        F: Fn(UnitId, &[u8]) -> Result<Vec<u8>, Exception> + Send + Sync + 'static,
    {
        self.functions.insert(function_code, Box::new(f));
        self
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut codes: Vec<_> = self.functions.keys().collect();
        codes.sort_unstable();
        f.debug_struct("Handlers")
            .field("read_coils", &self.read_coils.is_some())
            .field("read_discrete_inputs", &self.read_discrete_inputs.is_some())
            .field("read_holding_registers", &self.read_holding_registers.is_some())
            .field("read_input_registers", &self.read_input_registers.is_some())
            .field("write_coils", &self.write_coils.is_some())
            .field("write_holding_registers", &self.write_holding_registers.is_some())
            .field("functions", &codes)
            .finish()
    }
}

impl Service for Handlers {
    fn supports(&self, function: FunctionCode) -> bool {
        use FunctionCode as F;
        match function {
            F::ReadCoils => self.read_coils.is_some(),
            F::ReadDiscreteInputs => self.read_discrete_inputs.is_some(),
            F::ReadHoldingRegisters => self.read_holding_registers.is_some(),
            F::ReadInputRegisters => self.read_input_registers.is_some(),
            F::WriteSingleCoil | F::WriteMultipleCoils => self.write_coils.is_some(),
            F::WriteSingleRegister | F::WriteMultipleRegisters => {
                self.write_holding_registers.is_some()
            }
            F::WriteFileRecord | F::Custom(_) => self.functions.contains_key(&function.value()),
        }
    }

    fn read_coils(
        &self,
        unit_id: UnitId,
        address: Address,
        count: Quantity,
    ) -> Result<Vec<Coil>, Exception> {
        self.read_coils
            .as_ref()
            .map_or(Err(Exception::IllegalFunction), |f| f(unit_id, address, count))
    }

    fn read_discrete_inputs(
        &self,
        unit_id: UnitId,
        address: Address,
        count: Quantity,
    ) -> Result<Vec<Coil>, Exception> {
        self.read_discrete_inputs
            .as_ref()
            .map_or(Err(Exception::IllegalFunction), |f| f(unit_id, address, count))
    }

    fn read_holding_registers(
        &self,
        unit_id: UnitId,
        address: Address,
        count: Quantity,
    ) -> Result<Vec<Word>, Exception> {
        self.read_holding_registers
            .as_ref()
            .map_or(Err(Exception::IllegalFunction), |f| f(unit_id, address, count))
    }

    fn read_input_registers(
        &self,
        unit_id: UnitId,
        address: Address,
        count: Quantity,
    ) -> Result<Vec<Word>, Exception> {
        self.read_input_registers
            .as_ref()
            .map_or(Err(Exception::IllegalFunction), |f| f(unit_id, address, count))
    }

    fn write_coils(
        &self,
        unit_id: UnitId,
        address: Address,
        coils: &[Coil],
    ) -> Result<(), Exception> {
        self.write_coils
            .as_ref()
            .map_or(Err(Exception::IllegalFunction), |f| f(unit_id, address, coils))
    }

    fn write_holding_registers(
        &self,
        unit_id: UnitId,
        address: Address,
        words: &[Word],
    ) -> Result<(), Exception> {
        self.write_holding_registers
            .as_ref()
            .map_or(Err(Exception::IllegalFunction), |f| f(unit_id, address, words))
    }

    fn call_function(
        &self,
        unit_id: UnitId,
        function_code: u8,
        data: &[u8],
    ) -> Option<Result<Vec<u8>, Exception>> {
        self.functions
            .get(&function_code)
            .map(|f| f(unit_id, data))
    }
}

/// Answer a request PDU.
///
/// Returns the response PDU, which is an exception response if the request
/// is invalid or the service fails. Nothing is returned for an empty PDU or
/// a PDU with the exception bit set, since those are no requests.
///
/// A panicking service is answered with [`Exception::ServerDeviceFailure`].
pub fn process_request<S>(service: &S, unit_id: UnitId, pdu: &[u8]) -> Option<Vec<u8>>
where
    S: Service + ?Sized,
{
    let Some(&fn_code) = pdu.first() else {
        log::warn!("Ignoring empty request from unit {unit_id}");
        return None;
    };
    if fn_code >= 0x80 {
        log::warn!("Ignoring request with function code 0x{fn_code:0>2X}");
        return None;
    }
    let function = FunctionCode::new(fn_code);
    let result = panic::catch_unwind(AssertUnwindSafe(|| dispatch(service, unit_id, function, pdu)))
        .unwrap_or_else(|_| {
            log::warn!("Handler of function {function} for unit {unit_id} panicked");
            Err(Exception::ServerDeviceFailure)
        });
    let rsp = result.unwrap_or_else(|exception| {
        log::debug!("Function {function} for unit {unit_id} failed: {exception}");
        let rsp: [u8; 2] = ExceptionResponse {
            function,
            exception,
        }
        .into();
        rsp.to_vec()
    });
    Some(rsp)
}

fn dispatch<S>(
    service: &S,
    unit_id: UnitId,
    function: FunctionCode,
    pdu: &[u8],
) -> Result<Vec<u8>, Exception>
where
    S: Service + ?Sized,
{
    if !service.supports(function) {
        return Err(Exception::IllegalFunction);
    }
    let req = Request::try_from(pdu).map_err(|err| {
        log::warn!("Invalid request for function {function}: {err}");
        Exception::IllegalDataValue
    })?;
    let mut buf = [0; MAX_PDU_LEN];

    match req {
        Request::ReadCoils(address, count) => {
            check_range(address, count, MAX_SERVE_BITS)?;
            let coils = service.read_coils(unit_id, address, count)?;
            check_len(coils.len(), count)?;
            let coils = Coils::from_bools(&coils, &mut buf).map_err(device_failure)?;
            encode(Response::ReadCoils(coils))
        }
        Request::ReadDiscreteInputs(address, count) => {
            check_range(address, count, MAX_SERVE_BITS)?;
            let inputs = service.read_discrete_inputs(unit_id, address, count)?;
            check_len(inputs.len(), count)?;
            let inputs = Coils::from_bools(&inputs, &mut buf).map_err(device_failure)?;
            encode(Response::ReadDiscreteInputs(inputs))
        }
        Request::ReadHoldingRegisters(address, count) => {
            check_range(address, count, MAX_SERVE_REGISTERS)?;
            let words = service.read_holding_registers(unit_id, address, count)?;
            check_len(words.len(), count)?;
            let words = Words::from_words(&words, &mut buf).map_err(device_failure)?;
            encode(Response::ReadHoldingRegisters(words))
        }
        Request::ReadInputRegisters(address, count) => {
            check_range(address, count, MAX_SERVE_REGISTERS)?;
            let words = service.read_input_registers(unit_id, address, count)?;
            check_len(words.len(), count)?;
            let words = Words::from_words(&words, &mut buf).map_err(device_failure)?;
            encode(Response::ReadInputRegisters(words))
        }
        Request::WriteSingleCoil(address, coil) => {
            service.write_coils(unit_id, address, &[coil])?;
            encode(Response::WriteSingleCoil(address, coil))
        }
        Request::WriteMultipleCoils(address, coils) => {
            let count = coils.len() as Quantity;
            check_range(address, count, MAX_WRITE_COILS)?;
            let coils: Vec<_> = coils.iter().collect();
            service.write_coils(unit_id, address, &coils)?;
            encode(Response::WriteMultipleCoils(address, count))
        }
        Request::WriteSingleRegister(address, word) => {
            service.write_holding_registers(unit_id, address, &[word])?;
            encode(Response::WriteSingleRegister(address, word))
        }
        Request::WriteMultipleRegisters(address, words) => {
            let count = words.len() as Quantity;
            check_range(address, count, MAX_WRITE_REGISTERS)?;
            let words: Vec<_> = words.iter().collect();
            service.write_holding_registers(unit_id, address, &words)?;
            encode(Response::WriteMultipleRegisters(address, count))
        }
        Request::WriteFileRecord(_) | Request::Custom(..) => {
            let data = service
                .call_function(unit_id, function.value(), &pdu[1..])
                .unwrap_or(Err(Exception::IllegalFunction))?;
            encode(Response::Custom(function, &data))
        }
    }
}

/// `count` must be in `1..=max` and the addressed block must end
/// within the address space.
fn check_range(address: Address, count: Quantity, max: usize) -> Result<(), Exception> {
    let count = usize::from(count);
    if count == 0 || count > max {
        return Err(Exception::IllegalDataValue);
    }
    if usize::from(address) + count > 0x1_0000 {
        return Err(Exception::IllegalDataAddress);
    }
    Ok(())
}

fn check_len(len: usize, count: Quantity) -> Result<(), Exception> {
    if len != usize::from(count) {
        log::warn!("Handler returned {len} instead of {count} value(s)");
        return Err(Exception::ServerDeviceFailure);
    }
    Ok(())
}

fn encode(rsp: Response<'_>) -> Result<Vec<u8>, Exception> {
    let mut buf = [0; MAX_PDU_LEN];
    let len = rsp.encode(&mut buf).map_err(device_failure)?;
    Ok(buf[..len].to_vec())
}

fn device_failure<E: fmt::Display>(err: E) -> Exception {
    log::warn!("Unable to encode response: {err}");
    Exception::ServerDeviceFailure
}
