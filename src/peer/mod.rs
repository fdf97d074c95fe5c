//! Mirroring the event stream to a remote process.
//!
//! A [`PeerTransport`] moves opaque byte messages between this process and
//! exactly one remote peer at a time. [`PeerSyncChannel`] is the monitor's
//! driver over a transport; [`MomentLink`] is the monitored application's
//! side of the same link.

mod channel;
mod device;
mod link;
mod memory;
mod tcp;
mod transport;
mod wire;

pub use channel::{Outbound, OutboundKey, PeerAction, PeerModel, PeerSyncChannel};
pub use device::{ConnectionState, Device, DeviceRoster};
pub use link::{MomentLink, RemoteInput};
pub use memory::MemoryTransport;
pub use tcp::{TcpConfig, TcpTransport};
pub use transport::{PeerTransport, TransportError, TransportEvent};
pub use wire::{EffectPayload, SyncPayload, WireMessage};

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::describe::{DecodeError, Describe, Node, Restore};

/// Opaque identity of a remote peer, serialized as base64.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(Vec<u8>);

impl PeerId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Identity derived from a display name.
    pub fn from_name(name: &str) -> Self {
        Self(name.as_bytes().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, base64::DecodeError> {
        BASE64.decode(encoded).map(Self)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(text) if !text.is_empty() && !text.chars().any(char::is_control) => {
                f.write_str(text)
            }
            _ => write!(f, "0x{}", self.to_base64()),
        }
    }
}

impl Serialize for PeerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for PeerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        PeerId::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

impl Describe for PeerId {
    fn describe(&self) -> Node {
        Node::Leaf(self.to_base64())
    }
}

impl Restore for PeerId {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        let encoded = node.as_leaf()?;
        PeerId::from_base64(encoded).map_err(|e| DecodeError::invalid(encoded, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_id_serializes_as_base64() {
        let id = PeerId::from_name("phone");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"cGhvbmU=\"");
        assert_eq!(serde_json::from_str::<PeerId>("\"cGhvbmU=\"").unwrap(), id);
    }

    #[test]
    fn display_prefers_readable_names() {
        assert_eq!(PeerId::from_name("phone").to_string(), "phone");
        assert_eq!(PeerId::new(vec![0u8, 1]).to_string(), "0xAAE=");
    }

    #[test]
    fn peer_id_text_restores() {
        let id = PeerId::new(vec![0u8, 200, 3]);
        assert_eq!(PeerId::from_text(&id.to_text()).unwrap(), id);
    }
}
