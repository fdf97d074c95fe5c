use async_trait::async_trait;
use tokio::sync::mpsc;

use super::PeerId;

/// Network callbacks, delivered in order through a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Found { name: String, peer: PeerId },
    Connecting { peer: PeerId },
    Connected { peer: PeerId },
    Disconnected { peer: PeerId },
    Received { data: Vec<u8>, peer: PeerId },
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("framing error: {0}")]
    Codec(#[from] tokio_util::codec::LinesCodecError),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unknown peer {0}")]
    UnknownPeer(PeerId),

    #[error("not connected to {0}")]
    NotConnected(PeerId),

    #[error("a session with {0} is already live")]
    Busy(PeerId),

    #[error("transport is closed")]
    Closed,
}

/// Link to remote peers. At most one session is live at a time.
#[async_trait]
pub trait PeerTransport: Send + Sync + 'static {
    /// Name this side advertises.
    fn display_name(&self) -> &str;

    /// Take the event channel. Returns `None` once taken.
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>>;

    /// Start (or restart) looking for peers; each one is reported as `Found`.
    async fn start_discovery(&self) -> Result<(), TransportError>;

    /// Open a session with `peer`. Rejected while another session is live.
    async fn invite(&self, peer: &PeerId) -> Result<(), TransportError>;

    /// Send one message to the peer of the live session.
    async fn send(&self, peer: &PeerId, data: Vec<u8>) -> Result<(), TransportError>;

    /// Peer of the live session, if any.
    fn session_peer(&self) -> Option<PeerId>;

    /// Close the live session, if any.
    async fn disconnect(&self) -> Result<(), TransportError>;
}
