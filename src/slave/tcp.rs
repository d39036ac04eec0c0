use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream, ToSocketAddrs},
    task::AbortHandle,
    time,
};

use super::{Service, process_request};
use crate::{
    codec::tcp::{MAX_FRAME_LEN, adu_len, pack_mbap, server},
    error::{ProtocolError, Result},
};

/// Settings of a [`TcpSlave`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaveConfig {
    /// A connection without any request for this long is closed.
    pub idle_timeout: Duration,
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(120),
        }
    }
}

pub type SessionId = u64;

/// Where a connection is in its request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for a request.
    Idle,
    /// Part of a request has been received.
    Reading,
    Dispatching,
    Writing,
    Closed,
}

/// Snapshot of a connected master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub peer: SocketAddr,
    pub state: ConnectionState,
    pub last_activity: Instant,
}

#[derive(Debug)]
struct Entry {
    session: Session,
    abort: AbortHandle,
}

type Registry = Mutex<HashMap<SessionId, Entry>>;

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<SessionId, Entry>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

fn set_state(registry: &Registry, id: SessionId, state: ConnectionState) {
    if let Some(entry) = lock(registry).get_mut(&id) {
        log::trace!(
            "Session {id} ({}): {:?} -> {state:?}",
            entry.session.peer,
            entry.session.state
        );
        entry.session.state = state;
        if state != ConnectionState::Closed {
            entry.session.last_activity = Instant::now();
        }
    }
}

/// Modbus TCP slave.
///
/// Every connection is served by its own task. Clones share the service
/// and the sessions.
pub struct TcpSlave<S> {
    service: Arc<S>,
    config: SlaveConfig,
    sessions: Arc<Registry>,
    next_id: Arc<AtomicU64>,
}

impl<S> Clone for TcpSlave<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            config: self.config,
            sessions: Arc::clone(&self.sessions),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<S: Service> TcpSlave<S> {
    #[must_use]
    pub fn new(service: S) -> Self {
        Self::with_config(service, SlaveConfig::default())
    }

    #[must_use]
    pub fn with_config(service: S, config: SlaveConfig) -> Self {
        Self {
            service: Arc::new(service),
            config,
            sessions: Arc::default(),
            next_id: Arc::default(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &SlaveConfig {
        &self.config
    }

    /// Bind to `addr` and serve forever.
    pub async fn listen(&self, addr: impl ToSocketAddrs) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Accept connections from `listener` and serve forever.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            log::debug!("Serving Modbus TCP on {addr}");
        }
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => self.spawn_session(stream, peer),
                Err(err) => log::error!("Failed to accept connection: {err}"),
            }
        }
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        log::debug!("Session {id}: {peer} connected");
        let service = Arc::clone(&self.service);
        let sessions = Arc::clone(&self.sessions);
        let idle_timeout = self.config.idle_timeout;

        // The task deregisters itself, which must not happen before it is registered.
        let mut registry = lock(&self.sessions);
        let task = tokio::spawn(async move {
            serve_connection(id, stream, service.as_ref(), &sessions, idle_timeout).await;
            set_state(&sessions, id, ConnectionState::Closed);
            lock(&sessions).remove(&id);
            log::debug!("Session {id}: {peer} disconnected");
        });
        registry.insert(
            id,
            Entry {
                session: Session {
                    id,
                    peer,
                    state: ConnectionState::Idle,
                    last_activity: Instant::now(),
                },
                abort: task.abort_handle(),
            },
        );
    }

    /// The currently open connections.
    #[must_use]
    pub fn sessions(&self) -> Vec<Session> {
        let mut sessions: Vec<_> = lock(&self.sessions)
            .values()
            .map(|entry| entry.session.clone())
            .collect();
        sessions.sort_by_key(|session| session.id);
        sessions
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }

    /// Close all open connections.
    pub fn close_all(&self) {
        for (id, entry) in lock(&self.sessions).drain() {
            log::debug!("Session {id}: closing {}", entry.session.peer);
            entry.abort.abort();
        }
    }
}

async fn serve_connection<S: Service>(
    id: SessionId,
    mut stream: TcpStream,
    service: &S,
    sessions: &Registry,
    idle_timeout: Duration,
) {
    let mut buf = Vec::with_capacity(MAX_FRAME_LEN);
    let mut chunk = [0; MAX_FRAME_LEN];
    // Bytes of a foreign frame that have not been received yet.
    let mut discard = 0;
    loop {
        let n = match time::timeout(idle_timeout, stream.read(&mut chunk)).await {
            Ok(Ok(0)) => return,
            Ok(Ok(n)) => n,
            Ok(Err(err)) => {
                log::debug!("Session {id}: {err}");
                return;
            }
            Err(_) => {
                log::debug!("Session {id}: idle for {idle_timeout:?}");
                return;
            }
        };
        let skipped = discard.min(n);
        discard -= skipped;
        buf.extend_from_slice(&chunk[skipped..n]);
        set_state(sessions, id, ConnectionState::Reading);

        loop {
            let (rsp, consumed) = match server::decode_request(&buf) {
                Ok(Some((frame, consumed))) => {
                    set_state(sessions, id, ConnectionState::Dispatching);
                    let rsp = process_request(service, frame.unit_id, frame.pdu)
                        .map(|pdu| pack_mbap(frame.unit_id, frame.transaction_id, &pdu));
                    (rsp, consumed)
                }
                Ok(None) => break,
                Err(ProtocolError::ProtocolNotModbus(_)) => {
                    // The length field still delimits the frame, skip it unanswered.
                    let len = adu_len(&buf).unwrap_or(buf.len());
                    let dropped = len.min(buf.len());
                    discard = len - dropped;
                    (None, dropped)
                }
                Err(_) => {
                    // No answer to garbage, but the connection stays open.
                    buf.clear();
                    break;
                }
            };
            buf.drain(..consumed);
            let Some(rsp) = rsp else {
                continue;
            };
            set_state(sessions, id, ConnectionState::Writing);
            match time::timeout(idle_timeout, stream.write_all(&rsp)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    log::debug!("Session {id}: {err}");
                    return;
                }
                Err(_) => {
                    log::debug!("Session {id}: response not taken within {idle_timeout:?}");
                    return;
                }
            }
        }

        let state = if buf.is_empty() {
            ConnectionState::Idle
        } else {
            ConnectionState::Reading
        };
        set_state(sessions, id, state);
    }
}
