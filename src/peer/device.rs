use serde::{Deserialize, Serialize};

use super::PeerId;
use crate::describe::{DecodeError, Describe, Node, Restore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    #[default]
    Idle,
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }

    /// Connecting or connected.
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub name: String,
    pub connection: ConnectionState,
    #[serde(rename = "peerID")]
    pub peer_id: PeerId,
}

/// Every peer seen so far. Entries are updated in place and never removed.
///
/// At most one device is connecting or connected at any time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceRoster {
    devices: Vec<Device>,
}

impl DeviceRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get(&self, peer: &PeerId) -> Option<&Device> {
        self.devices.iter().find(|device| &device.peer_id == peer)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|device| device.name == name)
    }

    /// The device currently connecting or connected, if any.
    pub fn active(&self) -> Option<&Device> {
        self.devices.iter().find(|device| device.connection.is_active())
    }

    pub fn connection(&self, peer: &PeerId) -> ConnectionState {
        self.get(peer)
            .map(|device| device.connection)
            .unwrap_or_default()
    }

    /// Add a newly discovered device as disconnected. Known devices are kept
    /// as they are. Returns whether the device was new.
    pub fn discover(&mut self, name: &str, peer: PeerId) -> bool {
        if self.get(&peer).is_some() {
            return false;
        }
        self.devices.push(Device {
            name: name.to_string(),
            connection: ConnectionState::Disconnected,
            peer_id: peer,
        });
        true
    }

    /// Update a device's connection state.
    ///
    /// Making a device active demotes any other active device to
    /// disconnected. A peer that was never discovered is added under its
    /// display form.
    pub fn set_connection(&mut self, peer: &PeerId, connection: ConnectionState) {
        if connection.is_active() {
            for device in &mut self.devices {
                if &device.peer_id != peer && device.connection.is_active() {
                    tracing::debug!(device = %device.name, "Demoting previously active device");
                    device.connection = ConnectionState::Disconnected;
                }
            }
        }
        match self.devices.iter_mut().find(|device| &device.peer_id == peer) {
            Some(device) => device.connection = connection,
            None => self.devices.push(Device {
                name: peer.to_string(),
                connection,
                peer_id: peer.clone(),
            }),
        }
    }
}

impl Describe for ConnectionState {
    fn describe(&self) -> Node {
        Node::variant("ConnectionState", self.as_str())
    }
}

impl Restore for ConnectionState {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        match node.as_variant("ConnectionState")? {
            ("idle", _) => Ok(ConnectionState::Idle),
            ("disconnected", _) => Ok(ConnectionState::Disconnected),
            ("connecting", _) => Ok(ConnectionState::Connecting),
            ("connected", _) => Ok(ConnectionState::Connected),
            (case, _) => Err(DecodeError::unknown_case("ConnectionState", case)),
        }
    }
}

impl Describe for Device {
    fn describe(&self) -> Node {
        Node::record("Device")
            .field("name", &self.name)
            .field("connection", &self.connection)
            .field("peerID", &self.peer_id)
            .build()
    }
}

impl Restore for Device {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        let fields = node.as_record("Device")?;
        Ok(Self {
            name: fields.get("name")?,
            connection: fields.get("connection")?,
            peer_id: fields.get("peerID")?,
        })
    }
}

impl Describe for DeviceRoster {
    fn describe(&self) -> Node {
        self.devices.describe()
    }
}

impl Restore for DeviceRoster {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        Ok(Self {
            devices: Vec::restore(node)?,
        })
    }
}
