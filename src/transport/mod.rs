//! Byte transports that carry PDUs between a master and a remote device.
//!
//! A [`Transport`] owns the connection and the framing; the master only
//! hands over PDUs and gets PDUs back.

use async_trait::async_trait;

use crate::{error::Result, frame::UnitId};

#[cfg(feature = "rtu")]
mod rtu;
#[cfg(feature = "tcp")]
mod tcp;

#[cfg(feature = "rtu")]
pub use self::rtu::{Opener, RtuConfig, RtuTransport, TcpOpener};
#[cfg(feature = "tcp")]
pub use self::tcp::TcpTransport;

/// A connection to a remote device.
///
/// Only one request is outstanding at any time: every `send` is followed by
/// exactly one `receive`.
#[async_trait]
pub trait Transport: Send {
    /// (Re)establish the connection.
    async fn connect(&mut self) -> Result<()>;

    /// Frame `pdu` for `unit_id` and write it.
    async fn send(&mut self, unit_id: UnitId, pdu: &[u8]) -> Result<()>;

    /// Wait for the response of `expected_unit_id` and return its PDU.
    async fn receive(&mut self, expected_unit_id: UnitId) -> Result<Vec<u8>>;

    fn is_connected(&self) -> bool;

    /// Drop the connection. Closing twice is a no-op.
    fn close(&mut self);
}
