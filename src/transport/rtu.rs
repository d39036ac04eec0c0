use std::{io, net::SocketAddr, time::Duration};

use async_trait::async_trait;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    time,
};

use super::Transport;
use crate::{
    codec::rtu::{MAX_FRAME_LEN, client, wrap_rtu},
    error::{Error, ProtocolError, Result, TransportError},
    frame::UnitId,
};

/// Opens the byte stream of a serial line.
///
/// Serial port settings (baud rate, parity, stop bits) are the business
/// of the implementor.
#[async_trait]
pub trait Opener: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    async fn open(&self) -> io::Result<Self::Stream>;
}

/// RTU frames tunneled through a TCP connection, e.g. to a serial device server.
#[derive(Debug, Clone, Copy)]
pub struct TcpOpener(pub SocketAddr);

#[async_trait]
impl Opener for TcpOpener {
    type Stream = TcpStream;

    async fn open(&self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(self.0).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// Timing of an [`RtuTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtuConfig {
    /// Upper bound for opening the line.
    pub connect_timeout: Duration,
    /// Upper bound for writing a request and for waiting for its response.
    pub response_timeout: Duration,
}

impl Default for RtuConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(100),
            response_timeout: Duration::from_secs(1),
        }
    }
}

/// Modbus RTU transport.
pub struct RtuTransport<O: Opener> {
    opener: O,
    config: RtuConfig,
    stream: Option<O::Stream>,
}

impl<O: Opener> RtuTransport<O> {
    #[must_use]
    pub fn new(opener: O) -> Self {
        Self::with_config(opener, RtuConfig::default())
    }

    #[must_use]
    pub const fn with_config(opener: O, config: RtuConfig) -> Self {
        Self {
            opener,
            config,
            stream: None,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &RtuConfig {
        &self.config
    }

    fn fail(&mut self, err: TransportError) -> Error {
        log::debug!("Closing serial line: {err}");
        self.stream = None;
        err.into()
    }
}

/// Drop the bytes of late responses that are already buffered.
///
/// Returns `false` if the line has been closed.
async fn discard_pending<S>(stream: &mut S) -> io::Result<bool>
where
    S: AsyncRead + Unpin,
{
    let mut chunk = [0; MAX_FRAME_LEN];
    loop {
        match time::timeout(Duration::ZERO, stream.read(&mut chunk)).await {
            Ok(Ok(0)) => return Ok(false),
            Ok(Ok(n)) => log::warn!("Discarding {n} stale byte(s)"),
            Ok(Err(err)) => return Err(err),
            Err(_) => return Ok(true),
        }
    }
}

async fn read_response<S>(stream: &mut S, expected_unit_id: UnitId) -> Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(MAX_FRAME_LEN);
    let mut chunk = [0; MAX_FRAME_LEN];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(TransportError::Disconnected.into());
        }
        buf.extend_from_slice(&chunk[..n]);
        log::trace!("Received {n} byte(s), {} buffered", buf.len());
        let Some((frame, location)) = client::decode_response(&buf)? else {
            continue;
        };
        if location.start > 0 {
            log::warn!("Skipped {} leading byte(s)", location.start);
        }
        if frame.unit_id != expected_unit_id {
            return Err(ProtocolError::UnitMismatch {
                request: expected_unit_id,
                response: frame.unit_id,
            }
            .into());
        }
        return Ok(frame.pdu.to_vec());
    }
}

#[async_trait]
impl<O> Transport for RtuTransport<O>
where
    O: Opener,
{
    async fn connect(&mut self) -> Result<()> {
        self.close();
        let stream = time::timeout(self.config.connect_timeout, self.opener.open())
            .await
            .map_err(|_| TransportError::Timeout)??;
        log::debug!("Serial line opened");
        self.stream = Some(stream);
        Ok(())
    }

    async fn send(&mut self, unit_id: UnitId, pdu: &[u8]) -> Result<()> {
        let timeout = self.config.response_timeout;
        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::NotConnected.into());
        };
        match discard_pending(stream).await {
            Ok(true) => {}
            Ok(false) => return Err(self.fail(TransportError::Disconnected)),
            Err(err) => return Err(self.fail(err.into())),
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::NotConnected.into());
        };
        let adu = wrap_rtu(unit_id, pdu);
        log::trace!("Sending {adu:X?}");
        let write = async {
            stream.write_all(&adu).await?;
            stream.flush().await
        };
        match time::timeout(timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(self.fail(err.into())),
            Err(_) => Err(self.fail(TransportError::Timeout)),
        }
    }

    async fn receive(&mut self, expected_unit_id: UnitId) -> Result<Vec<u8>> {
        let timeout = self.config.response_timeout;
        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::NotConnected.into());
        };
        match time::timeout(timeout, read_response(stream, expected_unit_id)).await {
            Ok(Ok(pdu)) => Ok(pdu),
            Ok(Err(Error::Transport(err))) => Err(self.fail(err)),
            Ok(Err(err)) => {
                log::warn!("Dropping response: {err}");
                Err(err)
            }
            // The line stays open, a late response is discarded by the next send.
            Err(_) => Err(TransportError::Timeout.into()),
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            log::debug!("Serial line closed");
        }
    }
}
