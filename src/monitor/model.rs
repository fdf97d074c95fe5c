use crate::describe::{DecodeError, Describe, Node, Restore};
use crate::driver::{StorageOp, StorageRequest};
use crate::peer::{ConnectionState, DeviceRoster, PeerId};
use crate::timeline::Timeline;

use super::EventHandlingState;

/// File operation bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageState {
    /// Id of the most recently issued request.
    pub last_request: u64,
    /// Request still waiting for its result.
    pub pending: Option<StorageRequest>,
}

/// Aggregate state of the monitor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorModel {
    pub timeline: Timeline,
    pub devices: DeviceRoster,
    pub selected_peer: Option<PeerId>,
    pub mode: EventHandlingState,
    /// Invite the first discovered peer when no session is active.
    pub auto_connect: bool,
    /// Last message for the operator.
    pub status: Option<String>,
    pub storage: StorageState,
    pub terminating: bool,
}

impl MonitorModel {
    pub fn new(mode: EventHandlingState, auto_connect: bool) -> Self {
        Self {
            mode,
            auto_connect,
            ..Self::default()
        }
    }

    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = timeline;
        self
    }

    /// Connection state of the selected peer.
    pub fn connection(&self) -> ConnectionState {
        self.selected_peer
            .as_ref()
            .map(|peer| self.devices.connection(peer))
            .unwrap_or_default()
    }

    pub(super) fn request(&mut self, op: StorageOp) {
        self.storage.last_request += 1;
        self.storage.pending = Some(StorageRequest {
            id: self.storage.last_request,
            op,
        });
    }
}

impl Describe for StorageState {
    fn describe(&self) -> Node {
        Node::record("StorageState")
            .field("lastRequest", &self.last_request)
            .field("pending", &self.pending)
            .build()
    }
}

impl Restore for StorageState {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        let fields = node.as_record("StorageState")?;
        Ok(Self {
            last_request: fields.get("lastRequest")?,
            pending: fields.get("pending")?,
        })
    }
}

impl Describe for MonitorModel {
    fn describe(&self) -> Node {
        Node::record("Monitor")
            .field("timeline", &self.timeline)
            .field("devices", &self.devices)
            .field("selectedPeer", &self.selected_peer)
            .field("mode", &self.mode)
            .field("autoConnect", &self.auto_connect)
            .field("status", &self.status)
            .field("storage", &self.storage)
            .field("terminating", &self.terminating)
            .build()
    }
}

impl Restore for MonitorModel {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        let fields = node.as_record("Monitor")?;
        Ok(Self {
            timeline: fields.get("timeline")?,
            devices: fields.get("devices")?,
            selected_peer: fields.get("selectedPeer")?,
            mode: fields.get("mode")?,
            auto_connect: fields.get("autoConnect")?,
            status: fields.get("status")?,
            storage: fields.get("storage")?,
            terminating: fields.get("terminating")?,
        })
    }
}
