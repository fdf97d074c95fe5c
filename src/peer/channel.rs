use std::string::FromUtf8Error;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use super::{PeerId, PeerTransport, SyncPayload, TransportEvent, WireMessage};
use crate::describe::{payload, DecodeError, Describe, Node, Restore};
use crate::driver::{Driver, DriverKind};

/// Identity of an outbound message, used to avoid re-sending it every tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundKey {
    /// Cause of the moment at this timeline index.
    Event(usize),
    /// Effect text of the selected moment.
    Effect(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub key: OutboundKey,
    pub payload: SyncPayload,
}

/// What the peer link should look like.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerModel {
    /// Peer to hold a session with; `None` means keep discovering.
    pub target: Option<PeerId>,
    /// Whether the session with `target` is established.
    pub connected: bool,
    pub outbound: Option<Outbound>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerAction {
    DidFind { name: String, peer: PeerId },
    Connecting { peer: PeerId },
    Connected { peer: PeerId },
    Disconnected { peer: PeerId },
    Received { data: String, peer: PeerId },
}

impl TryFrom<TransportEvent> for PeerAction {
    type Error = FromUtf8Error;

    fn try_from(event: TransportEvent) -> Result<Self, Self::Error> {
        Ok(match event {
            TransportEvent::Found { name, peer } => PeerAction::DidFind { name, peer },
            TransportEvent::Connecting { peer } => PeerAction::Connecting { peer },
            TransportEvent::Connected { peer } => PeerAction::Connected { peer },
            TransportEvent::Disconnected { peer } => PeerAction::Disconnected { peer },
            TransportEvent::Received { data, peer } => PeerAction::Received {
                data: String::from_utf8(data)?,
                peer,
            },
        })
    }
}

/// The monitor's driver over a [`PeerTransport`].
///
/// Rendering a new target tears down the previous session (announcing the
/// disconnect when it was established) and invites the new one; no target
/// restarts discovery. Outbound payloads are sent once per key and session.
/// Messages that are not UTF-8 are logged and dropped.
pub struct PeerSyncChannel<T> {
    transport: T,
    /// `None` until the first render.
    rendered_target: Option<Option<PeerId>>,
    connected: bool,
    last_key: Option<OutboundKey>,
}

impl<T: PeerTransport> PeerSyncChannel<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            rendered_target: None,
            connected: false,
            last_key: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn leave(&self, peer: &PeerId, announce: bool) {
        // A failed invite leaves any other peer's session in place.
        if self.transport.session_peer().as_ref() != Some(peer) {
            tracing::debug!(peer = %peer, "No session with peer to close");
            return;
        }
        if announce {
            if let Err(err) = self
                .transport
                .send(peer, WireMessage::Disconnect.encode())
                .await
            {
                tracing::debug!(peer = %peer, error = %err, "Could not announce disconnect");
            }
        }
        if let Err(err) = self.transport.disconnect().await {
            tracing::warn!(peer = %peer, error = %err, "Failed to close session");
        }
    }

    async fn retarget(&mut self, target: Option<PeerId>) {
        let previous = self.rendered_target.replace(target.clone()).flatten();
        if let Some(previous) = previous {
            self.leave(&previous, self.connected).await;
            self.connected = false;
        }
        match target {
            Some(peer) => {
                if let Err(err) = self.transport.invite(&peer).await {
                    tracing::warn!(peer = %peer, error = %err, "Invite rejected");
                }
            }
            None => {
                if let Err(err) = self.transport.start_discovery().await {
                    tracing::warn!(error = %err, "Failed to start discovery");
                }
            }
        }
    }

    async fn send_outbound(&mut self, target: Option<&PeerId>, outbound: Option<Outbound>) {
        let Some(outbound) = outbound else {
            self.last_key = None;
            return;
        };
        if self.last_key.as_ref() == Some(&outbound.key) {
            return;
        }

        let Some(peer) = target.filter(|_| self.connected) else {
            tracing::debug!("No session, dropping outbound payload");
            return;
        };
        let data = match outbound.payload.encode() {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to encode outbound payload");
                return;
            }
        };
        match self.transport.send(peer, data).await {
            Ok(()) => self.last_key = Some(outbound.key),
            Err(err) => tracing::warn!(peer = %peer, error = %err, "Failed to send payload"),
        }
    }
}

#[async_trait]
impl<T: PeerTransport> Driver for PeerSyncChannel<T> {
    type Model = PeerModel;
    type Action = PeerAction;

    fn kind(&self) -> DriverKind {
        DriverKind::Peer
    }

    fn events(&mut self) -> BoxStream<'static, PeerAction> {
        match self.transport.take_events() {
            Some(rx) => stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|event| (event, rx))
            })
            .filter_map(|event| async move {
                match PeerAction::try_from(event) {
                    Ok(action) => Some(action),
                    Err(err) => {
                        tracing::warn!(error = %err, "Dropping peer message that is not UTF-8");
                        None
                    }
                }
            })
            .boxed(),
            None => stream::empty().boxed(),
        }
    }

    async fn render(&mut self, model: PeerModel) {
        if self.rendered_target.as_ref() != Some(&model.target) {
            self.retarget(model.target.clone()).await;
            self.last_key = None;
        }
        let connected = model.target.is_some() && model.connected;
        if connected != self.connected {
            self.last_key = None;
        }
        self.connected = connected;
        self.send_outbound(model.target.as_ref(), model.outbound).await;
    }

    async fn shutdown(&mut self) {
        if let Some(Some(peer)) = self.rendered_target.take() {
            self.leave(&peer, self.connected).await;
        }
        self.connected = false;
    }
}

impl Describe for PeerAction {
    fn describe(&self) -> Node {
        const TY: &str = "Peer";
        let peer_record = |name: &str, peer: &PeerId| Node::record(name).field("peer", peer).build();
        match self {
            PeerAction::DidFind { name, peer } => Node::variant_with(
                TY,
                "didFind",
                Node::record("Found")
                    .field("name", name)
                    .field("peer", peer)
                    .build(),
            ),
            PeerAction::Connecting { peer } => {
                Node::variant_with(TY, "connecting", peer_record("Session", peer))
            }
            PeerAction::Connected { peer } => {
                Node::variant_with(TY, "connected", peer_record("Session", peer))
            }
            PeerAction::Disconnected { peer } => {
                Node::variant_with(TY, "disconnected", peer_record("Session", peer))
            }
            PeerAction::Received { data, peer } => Node::variant_with(
                TY,
                "received",
                Node::record("Message")
                    .field("data", data)
                    .field("peer", peer)
                    .build(),
            ),
        }
    }
}

impl Restore for PeerAction {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        const TY: &str = "Peer";
        let (case, body) = node.as_variant(TY)?;
        let body = payload(TY, case, body)?;
        match case {
            "didFind" => {
                let fields = body.as_record("Found")?;
                Ok(PeerAction::DidFind {
                    name: fields.get("name")?,
                    peer: fields.get("peer")?,
                })
            }
            "connecting" | "connected" | "disconnected" => {
                let peer = body.as_record("Session")?.get("peer")?;
                Ok(match case {
                    "connecting" => PeerAction::Connecting { peer },
                    "connected" => PeerAction::Connected { peer },
                    _ => PeerAction::Disconnected { peer },
                })
            }
            "received" => {
                let fields = body.as_record("Message")?;
                Ok(PeerAction::Received {
                    data: fields.get("data")?,
                    peer: fields.get("peer")?,
                })
            }
            other => Err(DecodeError::unknown_case(TY, other)),
        }
    }
}
