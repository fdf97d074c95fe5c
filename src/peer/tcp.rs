//! Peer transport over TCP.
//!
//! Every connection starts with the accepting side writing a hello line.
//! A discovery probe reads it and hangs up; an inviter answers with an
//! invite line and keeps the stream as its session. After the handshake
//! each line is one message.
//!
//! ```text
//! server → {"hello":"monitor"}
//! client → {"invite":"app"}          (probes close here instead)
//! ...    ↔ {"action":"disconnect"} / payload objects, one per line
//! ```

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LinesCodec};

use super::{PeerId, PeerTransport, TransportError, TransportEvent};

const MAX_LINE: usize = 8 * 1024 * 1024;
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpConfig {
    pub display_name: String,
    /// Address to accept sessions on; `None` only dials out.
    pub listen: Option<SocketAddr>,
    /// Addresses probed during discovery.
    pub peers: Vec<SocketAddr>,
    pub discovery_interval: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Handshake {
    Hello(String),
    Invite(String),
}

type Lines = Framed<TcpStream, LinesCodec>;

struct Session {
    id: u64,
    peer: PeerId,
    outbound: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

struct Inner {
    config: TcpConfig,
    events: mpsc::UnboundedSender<TransportEvent>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
    known: Mutex<HashMap<PeerId, SocketAddr>>,
    reported: Mutex<HashSet<PeerId>>,
    session: Mutex<Option<Session>>,
    next_session: AtomicU64,
    discovery: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    fn hello(&self) -> Result<String, TransportError> {
        encode(&Handshake::Hello(self.config.display_name.clone()))
    }

    /// Register `lines` as the live session unless one already exists.
    fn install(self: &Arc<Self>, peer: PeerId, lines: Lines) -> Result<(), TransportError> {
        let mut slot = self.session.lock();
        if let Some(current) = slot.as_ref() {
            return Err(TransportError::Busy(current.peer.clone()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        self.emit(TransportEvent::Connected { peer: peer.clone() });
        let task = tokio::spawn(run_session(Arc::clone(self), id, peer.clone(), lines, rx));
        *slot = Some(Session {
            id,
            peer,
            outbound: tx,
            task,
        });
        Ok(())
    }
}

/// TCP implementation of [`PeerTransport`].
pub struct TcpTransport {
    inner: Arc<Inner>,
    listener: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl TcpTransport {
    /// Bind the listener (when configured) and return the transport.
    pub async fn bind(config: TcpConfig) -> Result<Self, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let listen = config.listen;
        let inner = Arc::new(Inner {
            config,
            events: tx,
            receiver: Mutex::new(Some(rx)),
            known: Mutex::new(HashMap::new()),
            reported: Mutex::new(HashSet::new()),
            session: Mutex::new(None),
            next_session: AtomicU64::new(0),
            discovery: Mutex::new(None),
        });

        let (listener, local_addr) = match listen {
            Some(addr) => {
                let listener = TcpListener::bind(addr).await?;
                let local_addr = listener.local_addr()?;
                tracing::info!(addr = %local_addr, "Listening for peers");
                let task = tokio::spawn(accept_loop(Arc::clone(&inner), listener));
                (Some(task), Some(local_addr))
            }
            None => (None, None),
        };

        Ok(Self {
            inner,
            listener,
            local_addr,
        })
    }

    /// Address actually bound, if listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        if let Some(discovery) = self.inner.discovery.lock().take() {
            discovery.abort();
        }
        if let Some(session) = self.inner.session.lock().take() {
            session.task.abort();
        }
    }
}

#[async_trait]
impl PeerTransport for TcpTransport {
    fn display_name(&self) -> &str {
        &self.inner.config.display_name
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        self.inner.receiver.lock().take()
    }

    async fn start_discovery(&self) -> Result<(), TransportError> {
        self.inner.reported.lock().clear();
        let mut discovery = self.inner.discovery.lock();
        if discovery.as_ref().is_some_and(|task| !task.is_finished()) {
            return Ok(());
        }
        *discovery = Some(tokio::spawn(discovery_loop(Arc::clone(&self.inner))));
        Ok(())
    }

    async fn invite(&self, peer: &PeerId) -> Result<(), TransportError> {
        let addr = self
            .inner
            .known
            .lock()
            .get(peer)
            .copied()
            .ok_or_else(|| TransportError::UnknownPeer(peer.clone()))?;
        if let Some(current) = self.inner.session.lock().as_ref() {
            return Err(TransportError::Busy(current.peer.clone()));
        }

        self.inner.emit(TransportEvent::Connecting { peer: peer.clone() });
        let result = match dial(&self.inner.config.display_name, addr, peer).await {
            Ok(lines) => self.inner.install(peer.clone(), lines),
            Err(err) => Err(err),
        };
        if let Err(err) = &result {
            tracing::warn!(peer = %peer, addr = %addr, error = %err, "Invite failed");
            self.inner.emit(TransportEvent::Disconnected { peer: peer.clone() });
        }
        result
    }

    async fn send(&self, peer: &PeerId, data: Vec<u8>) -> Result<(), TransportError> {
        let line = String::from_utf8(data)
            .map_err(|e| TransportError::Protocol(format!("message is not UTF-8: {e}")))?;
        let session = self.inner.session.lock();
        match session.as_ref() {
            Some(session) if &session.peer == peer => session
                .outbound
                .send(line)
                .map_err(|_| TransportError::Closed),
            _ => Err(TransportError::NotConnected(peer.clone())),
        }
    }

    fn session_peer(&self) -> Option<PeerId> {
        self.inner
            .session
            .lock()
            .as_ref()
            .map(|session| session.peer.clone())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let session = self.inner.session.lock().take();
        if let Some(session) = session {
            tracing::debug!(peer = %session.peer, "Closing session");
            self.inner.emit(TransportEvent::Disconnected {
                peer: session.peer.clone(),
            });
            // Dropping the sender lets the session task flush queued lines and close.
            drop(session.outbound);
        }
        Ok(())
    }
}

fn encode(handshake: &Handshake) -> Result<String, TransportError> {
    serde_json::to_string(handshake).map_err(|e| TransportError::Protocol(e.to_string()))
}

async fn read_handshake<S>(lines: &mut S) -> Result<Handshake, TransportError>
where
    S: futures::Stream<Item = Result<String, tokio_util::codec::LinesCodecError>> + Unpin,
{
    let line = timeout(HANDSHAKE_TIMEOUT, lines.next())
        .await
        .map_err(|_| TransportError::Protocol("handshake timed out".to_string()))?
        .ok_or_else(|| TransportError::Protocol("connection closed during handshake".to_string()))??;
    serde_json::from_str(&line)
        .map_err(|e| TransportError::Protocol(format!("bad handshake `{line}`: {e}")))
}

async fn connect(addr: SocketAddr) -> Result<Lines, TransportError> {
    let stream = timeout(HANDSHAKE_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| TransportError::Protocol(format!("connecting to {addr} timed out")))??;
    Ok(Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE)))
}

/// Read a peer's hello and hang up.
async fn probe(addr: SocketAddr) -> Result<String, TransportError> {
    let mut lines = connect(addr).await?;
    match read_handshake(&mut lines).await? {
        Handshake::Hello(name) => Ok(name),
        Handshake::Invite(_) => Err(TransportError::Protocol("expected hello".to_string())),
    }
}

async fn dial(own_name: &str, addr: SocketAddr, peer: &PeerId) -> Result<Lines, TransportError> {
    let mut lines = connect(addr).await?;
    match read_handshake(&mut lines).await? {
        Handshake::Hello(name) if &PeerId::from_name(&name) == peer => {}
        Handshake::Hello(name) => {
            return Err(TransportError::Protocol(format!(
                "{addr} now answers as `{name}`"
            )))
        }
        Handshake::Invite(_) => {
            return Err(TransportError::Protocol("expected hello".to_string()))
        }
    }
    lines
        .send(encode(&Handshake::Invite(own_name.to_string()))?)
        .await?;
    Ok(lines)
}

async fn discovery_loop(inner: Arc<Inner>) {
    let mut interval = tokio::time::interval(inner.config.discovery_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        for &addr in &inner.config.peers {
            match probe(addr).await {
                Ok(name) => {
                    let peer = PeerId::from_name(&name);
                    inner.known.lock().insert(peer.clone(), addr);
                    if inner.reported.lock().insert(peer.clone()) {
                        tracing::debug!(peer = %peer, addr = %addr, "Found peer");
                        inner.emit(TransportEvent::Found { name, peer });
                    }
                }
                Err(err) => {
                    tracing::trace!(addr = %addr, error = %err, "Probe failed");
                }
            }
        }
    }
}

async fn accept_loop(inner: Arc<Inner>, listener: TcpListener) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let inner = Arc::clone(&inner);
                tokio::spawn(async move {
                    if let Err(err) = accept(inner, stream).await {
                        tracing::debug!(addr = %addr, error = %err, "Incoming connection dropped");
                    }
                });
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to accept connection");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

async fn accept(inner: Arc<Inner>, stream: TcpStream) -> Result<(), TransportError> {
    let mut lines = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE));
    lines.send(inner.hello()?).await?;

    let name = match timeout(HANDSHAKE_TIMEOUT, lines.next()).await {
        Ok(Some(Ok(line))) => match serde_json::from_str(&line) {
            Ok(Handshake::Invite(name)) => name,
            _ => return Err(TransportError::Protocol(format!("unexpected line `{line}`"))),
        },
        // Probes hang up without a reply.
        Ok(None) => return Ok(()),
        Ok(Some(Err(err))) => return Err(err.into()),
        Err(_) => return Err(TransportError::Protocol("handshake timed out".to_string())),
    };

    let peer = PeerId::from_name(&name);
    if let Err(err) = inner.install(peer.clone(), lines) {
        tracing::warn!(peer = %peer, error = %err, "Rejecting invite");
        return Err(err);
    }
    tracing::info!(peer = %peer, "Accepted session");
    Ok(())
}

async fn run_session(
    inner: Arc<Inner>,
    id: u64,
    peer: PeerId,
    mut lines: Lines,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    loop {
        tokio::select! {
            message = outbound.recv() => match message {
                Some(line) => {
                    if let Err(err) = lines.send(line).await {
                        tracing::warn!(peer = %peer, error = %err, "Failed to send to peer");
                        break;
                    }
                }
                None => break,
            },
            incoming = lines.next() => match incoming {
                Some(Ok(line)) => inner.emit(TransportEvent::Received {
                    data: line.into_bytes(),
                    peer: peer.clone(),
                }),
                Some(Err(err)) => {
                    tracing::warn!(peer = %peer, error = %err, "Session read failed");
                    break;
                }
                None => {
                    tracing::debug!(peer = %peer, "Peer closed the session");
                    break;
                }
            },
        }
    }
    if let Err(err) = SinkExt::<String>::close(&mut lines).await {
        tracing::debug!(peer = %peer, error = %err, "Failed to close session stream");
    }

    let ended = {
        let mut slot = inner.session.lock();
        if slot.as_ref().is_some_and(|session| session.id == id) {
            slot.take()
        } else {
            None
        }
    };
    if ended.is_some() {
        inner.emit(TransportEvent::Disconnected { peer });
    }
}
