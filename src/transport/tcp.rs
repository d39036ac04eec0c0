use std::{io, net::SocketAddr, time::Duration};

use async_trait::async_trait;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time,
};

use super::Transport;
use crate::{
    codec::tcp::{Header, MAX_FRAME_LEN, TransactionId, client, pack_mbap},
    error::{Error, Result, TransportError},
    frame::UnitId,
};

/// Modbus TCP transport.
///
/// Transaction ids start at `0` and wrap around after `0xFFFF`.
#[derive(Debug)]
pub struct TcpTransport {
    addr: SocketAddr,
    timeout: Duration,
    stream: Option<TcpStream>,
    transaction_id: TransactionId,
}

impl TcpTransport {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self::with_timeout(addr, Self::DEFAULT_TIMEOUT)
    }

    /// `timeout` bounds connecting, sending and waiting for a response.
    #[must_use]
    pub const fn with_timeout(addr: SocketAddr, timeout: Duration) -> Self {
        Self {
            addr,
            timeout,
            stream: None,
            transaction_id: 0,
        }
    }

    #[must_use]
    pub const fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Transaction id of the next request.
    #[must_use]
    pub const fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    fn fail(&mut self, err: TransportError) -> Error {
        log::debug!("Closing connection to {}: {err}", self.addr);
        self.stream = None;
        err.into()
    }
}

/// Discard everything that is readable right now.
///
/// Returns `false` if the peer has closed the connection.
fn discard_pending(stream: &TcpStream) -> io::Result<bool> {
    let mut buf = [0; MAX_FRAME_LEN];
    loop {
        match stream.try_read(&mut buf) {
            Ok(0) => return Ok(false),
            Ok(n) => log::warn!("Discarding {n} unexpected byte(s): {:X?}", &buf[..n]),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(true),
            Err(err) => return Err(err),
        }
    }
}

async fn read_response(stream: &mut TcpStream, expected: Header) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(MAX_FRAME_LEN);
    let mut chunk = [0; MAX_FRAME_LEN];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(TransportError::Disconnected.into());
        }
        buf.extend_from_slice(&chunk[..n]);
        log::trace!("Received {n} byte(s), {} buffered", buf.len());
        let Some((pdu, consumed)) = client::decode_response(&buf, expected)? else {
            continue;
        };
        if consumed < buf.len() {
            log::warn!("Discarding {} trailing byte(s)", buf.len() - consumed);
        }
        let pdu = pdu.to_vec();
        if !discard_pending(stream)? {
            log::debug!("Peer closed the connection after responding");
        }
        return Ok(pdu);
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&mut self) -> Result<()> {
        self.close();
        log::debug!("Connecting to {}", self.addr);
        let stream = time::timeout(self.timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|_| TransportError::Timeout)??;
        stream.set_nodelay(true)?;
        self.stream = Some(stream);
        Ok(())
    }

    async fn send(&mut self, unit_id: UnitId, pdu: &[u8]) -> Result<()> {
        let Some(stream) = self.stream.as_ref() else {
            return Err(TransportError::NotConnected.into());
        };
        match discard_pending(stream) {
            Ok(true) => {}
            Ok(false) => return Err(self.fail(TransportError::Disconnected)),
            Err(err) => return Err(self.fail(err.into())),
        }
        let adu = pack_mbap(unit_id, self.transaction_id, pdu);
        log::trace!("Sending {adu:X?}");
        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::NotConnected.into());
        };
        match time::timeout(self.timeout, stream.write_all(&adu)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(self.fail(err.into())),
            Err(_) => Err(self.fail(TransportError::Timeout)),
        }
    }

    async fn receive(&mut self, expected_unit_id: UnitId) -> Result<Vec<u8>> {
        let expected = Header {
            transaction_id: self.transaction_id,
            unit_id: expected_unit_id,
        };
        self.transaction_id = self.transaction_id.wrapping_add(1);
        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::NotConnected.into());
        };
        match time::timeout(self.timeout, read_response(stream, expected)).await {
            Ok(Ok(pdu)) => Ok(pdu),
            Ok(Err(Error::Transport(err))) => Err(self.fail(err)),
            Ok(Err(err)) => {
                log::warn!("Dropping response: {err}");
                Err(err)
            }
            Err(_) => Err(self.fail(TransportError::Timeout)),
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            log::debug!("Disconnected from {}", self.addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;
    use crate::error::ProtocolError;

    async fn connected_pair() -> (TcpTransport, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut transport = TcpTransport::with_timeout(
            listener.local_addr().unwrap(),
            Duration::from_millis(500),
        );
        let (connected, accepted) = tokio::join!(transport.connect(), listener.accept());
        connected.unwrap();
        (transport, accepted.unwrap().0)
    }

    #[tokio::test]
    async fn send_without_connection() {
        let mut transport = TcpTransport::new("127.0.0.1:502".parse().unwrap());
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.send(1, &[0x03, 0x00, 0x00, 0x00, 0x01]).await,
            Err(Error::Transport(TransportError::NotConnected))
        ));
    }

    #[tokio::test]
    async fn request_and_response() {
        let (mut transport, mut peer) = connected_pair().await;
        transport.send(0x11, &[0x03, 0x00, 0x6B, 0x00, 0x01]).await.unwrap();

        let mut req = [0; 12];
        peer.read_exact(&mut req).await.unwrap();
        assert_eq!(
            req,
            [0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x11, 0x03, 0x00, 0x6B, 0x00, 0x01]
        );
        peer.write_all(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x05, 0x11, 0x03, 0x02, 0x12, 0x34])
            .await
            .unwrap();

        let pdu = transport.receive(0x11).await.unwrap();
        assert_eq!(pdu, [0x03, 0x02, 0x12, 0x34]);
        assert_eq!(transport.transaction_id(), 1);
    }

    #[tokio::test]
    async fn response_split_across_segments() {
        let (mut transport, mut peer) = connected_pair().await;
        transport.send(0x01, &[0x06, 0x00, 0x01, 0x00, 0x03]).await.unwrap();
        let mut req = [0; 12];
        peer.read_exact(&mut req).await.unwrap();

        let rsp = [0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x01, 0x06, 0x00, 0x01, 0x00, 0x03];
        let writer = async move {
            peer.write_all(&rsp[..4]).await.unwrap();
            time::sleep(Duration::from_millis(20)).await;
            peer.write_all(&rsp[4..]).await.unwrap();
            peer
        };
        let (pdu, _peer) = tokio::join!(transport.receive(0x01), writer);
        assert_eq!(pdu.unwrap(), [0x06, 0x00, 0x01, 0x00, 0x03]);
    }

    #[tokio::test]
    async fn mismatching_transaction_id() {
        let (mut transport, mut peer) = connected_pair().await;
        transport.send(0x01, &[0x06, 0x00, 0x01, 0x00, 0x03]).await.unwrap();
        let mut req = [0; 12];
        peer.read_exact(&mut req).await.unwrap();
        peer.write_all(&[0x00, 0x07, 0x00, 0x00, 0x00, 0x06, 0x01, 0x06, 0x00, 0x01, 0x00, 0x03])
            .await
            .unwrap();

        let err = transport.receive(0x01).await.err().unwrap();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::TransactionMismatch {
                request: 0,
                response: 7
            })
        ));
        // the counter moves on even though the response was dropped
        assert_eq!(transport.transaction_id(), 1);
        assert!(transport.is_connected());
    }

    #[tokio::test]
    async fn receive_timeout_closes_the_connection() {
        let (mut transport, _peer) = connected_pair().await;
        transport.send(0x01, &[0x03, 0x00, 0x00, 0x00, 0x01]).await.unwrap();
        assert!(matches!(
            transport.receive(0x01).await,
            Err(Error::Transport(TransportError::Timeout))
        ));
        assert!(!transport.is_connected());
        assert_eq!(transport.transaction_id(), 1);
    }

    #[tokio::test]
    async fn send_detects_a_closed_peer() {
        let (mut transport, peer) = connected_pair().await;
        drop(peer);
        time::sleep(Duration::from_millis(50)).await;
        assert!(matches!(
            transport.send(0x01, &[0x03, 0x00, 0x00, 0x00, 0x01]).await,
            Err(Error::Transport(TransportError::Disconnected))
        ));
        assert!(!transport.is_connected());
    }
}
