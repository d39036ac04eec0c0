use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{Service, process_request};
use crate::{
    codec::rtu::{MAX_FRAME_LEN, server, wrap_rtu},
    error::Result,
    frame::UnitId,
};

/// Unit id of a request that all slaves execute without answering.
const BROADCAST_UNIT_ID: UnitId = 0;

/// Modbus RTU slave on a serial line.
///
/// Only requests for its own unit id and broadcasts are processed.
pub struct RtuSlave<S> {
    unit_id: UnitId,
    service: Arc<S>,
}

impl<S> Clone for RtuSlave<S> {
    fn clone(&self) -> Self {
        Self {
            unit_id: self.unit_id,
            service: Arc::clone(&self.service),
        }
    }
}

impl<S: Service> RtuSlave<S> {
    #[must_use]
    pub fn new(unit_id: UnitId, service: S) -> Self {
        Self {
            unit_id,
            service: Arc::new(service),
        }
    }

    #[must_use]
    pub const fn unit_id(&self) -> UnitId {
        self.unit_id
    }

    /// Serve requests from `line` until it is closed.
    pub async fn serve<T>(&self, mut line: T) -> Result<()>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buf = Vec::with_capacity(MAX_FRAME_LEN);
        let mut chunk = [0; MAX_FRAME_LEN];
        loop {
            let n = line.read(&mut chunk).await?;
            if n == 0 {
                log::debug!("Serial line of unit {} closed", self.unit_id);
                return Ok(());
            }
            buf.extend_from_slice(&chunk[..n]);

            loop {
                let (rsp, end) = match server::decode_request(&buf) {
                    Ok(Some((frame, location))) => {
                        let end = location.start + location.size;
                        (self.answer(frame.unit_id, frame.pdu), end)
                    }
                    Ok(None) => break,
                    Err(_) => {
                        buf.clear();
                        break;
                    }
                };
                buf.drain(..end);
                if let Some(rsp) = rsp {
                    line.write_all(&rsp).await?;
                    line.flush().await?;
                }
            }
        }
    }

    fn answer(&self, unit_id: UnitId, pdu: &[u8]) -> Option<Vec<u8>> {
        if unit_id == BROADCAST_UNIT_ID {
            process_request(self.service.as_ref(), unit_id, pdu);
            return None;
        }
        if unit_id != self.unit_id {
            log::trace!("Ignoring request for unit {unit_id}");
            return None;
        }
        process_request(self.service.as_ref(), unit_id, pdu).map(|pdu| wrap_rtu(unit_id, &pdu))
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use tokio::{io::duplex, time};

    use super::*;
    use crate::slave::Handlers;

    fn start(written: Arc<Mutex<Vec<(UnitId, Vec<bool>)>>>) -> tokio::io::DuplexStream {
        let handlers = Handlers::default()
            .on_read_holding_registers(|_unit, address, count| Ok((address..address + count).collect()))
            .on_write_coils(move |unit, _address, coils| {
                written.lock().unwrap().push((unit, coils.to_vec()));
                Ok(())
            });
        let slave = RtuSlave::new(0x01, handlers);
        let (line, master) = duplex(MAX_FRAME_LEN);
        tokio::spawn(async move { slave.serve(line).await });
        master
    }

    #[tokio::test]
    async fn answer_own_unit() {
        let mut master = start(Arc::default());
        master
            .write_all(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x02, 0xC4, 0x0B])
            .await
            .unwrap();
        let mut rsp = [0; 9];
        master.read_exact(&mut rsp).await.unwrap();
        assert_eq!(rsp, *wrap_rtu(0x01, &[0x03, 0x04, 0x00, 0x00, 0x00, 0x01]));
    }

    #[tokio::test]
    async fn ignore_other_units() {
        let mut master = start(Arc::default());
        master
            .write_all(&wrap_rtu(0x02, &[0x03, 0x00, 0x00, 0x00, 0x02]))
            .await
            .unwrap();
        master
            .write_all(&wrap_rtu(0x01, &[0x03, 0x00, 0x05, 0x00, 0x01]))
            .await
            .unwrap();
        let mut rsp = [0; 7];
        master.read_exact(&mut rsp).await.unwrap();
        assert_eq!(rsp, *wrap_rtu(0x01, &[0x03, 0x02, 0x00, 0x05]));
    }

    #[tokio::test]
    async fn execute_broadcast_silently() {
        let written = Arc::default();
        let mut master = start(Arc::clone(&written));
        master
            .write_all(&wrap_rtu(0x00, &[0x05, 0x00, 0x03, 0xFF, 0x00]))
            .await
            .unwrap();
        let mut rsp = [0; 1];
        assert!(
            time::timeout(Duration::from_millis(100), master.read(&mut rsp))
                .await
                .is_err()
        );
        assert_eq!(*written.lock().unwrap(), [(0x00, vec![true])]);
    }

    #[tokio::test]
    async fn skip_corrupted_bytes() {
        let mut master = start(Arc::default());
        let mut req = vec![0xFF];
        req.extend(wrap_rtu(0x01, &[0x03, 0x00, 0x00, 0x00, 0x01]));
        master.write_all(&req).await.unwrap();
        let mut rsp = [0; 7];
        master.read_exact(&mut rsp).await.unwrap();
        assert_eq!(rsp, *wrap_rtu(0x01, &[0x03, 0x02, 0x00, 0x00]));
    }

    #[tokio::test]
    async fn answer_request_behind_noise() {
        let handlers = Handlers::default()
            .on_read_holding_registers(|_unit, address, count| Ok((address..address + count).collect()));
        let slave = RtuSlave::new(0x11, handlers);
        let (line, mut master) = duplex(MAX_FRAME_LEN);
        tokio::spawn(async move { slave.serve(line).await });

        let mut req = vec![0x00];
        req.extend(wrap_rtu(0x11, &[0x03, 0x00, 0x04, 0x00, 0x01]));
        master.write_all(&req).await.unwrap();
        let mut rsp = [0; 7];
        time::timeout(Duration::from_secs(1), master.read_exact(&mut rsp))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rsp, *wrap_rtu(0x11, &[0x03, 0x02, 0x00, 0x04]));
    }

    #[tokio::test]
    async fn stop_when_the_line_is_closed() {
        let slave = RtuSlave::new(0x01, Handlers::default());
        let (line, master) = duplex(MAX_FRAME_LEN);
        drop(master);
        assert!(slave.serve(line).await.is_ok());
    }
}
