//! Drivers: independently-owned subsystems that render a model and emit actions.
//!
//! A driver sees only its own slice of the application state (its `Model`)
//! and reports what happened through its `Action` stream. The
//! [`lens`](crate::lens) module wires drivers to the aggregate state.

mod channel;
mod console;
mod menu;
mod signal;
mod storage;

pub use channel::{ChannelDriver, ChannelRemote};
pub use console::{ConsoleCommand, ConsoleDriver, ConsoleView};
pub use menu::{menu_driver, MenuCommand, MenuView};
pub use signal::{SignalAction, SignalDriver};
pub use storage::{StorageAction, StorageDriver, StorageModel, StorageOp, StorageRequest};

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label identifying what kind of subsystem a driver is.
///
/// Supplied at construction and used as the `label` of every
/// [`DriverSnapshot`](crate::moment::DriverSnapshot) the driver appears in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum DriverKind {
    Screen,
    Peer,
    Storage,
    Menu,
    Console,
    Signal,
    Custom(String),
}

impl DriverKind {
    pub fn as_str(&self) -> &str {
        match self {
            DriverKind::Screen => "screen",
            DriverKind::Peer => "peer",
            DriverKind::Storage => "storage",
            DriverKind::Menu => "menu",
            DriverKind::Console => "console",
            DriverKind::Signal => "signal",
            DriverKind::Custom(label) => label,
        }
    }

    /// Parse a label; unknown labels become [`DriverKind::Custom`].
    pub fn parse(label: &str) -> Self {
        match label {
            "screen" => DriverKind::Screen,
            "peer" => DriverKind::Peer,
            "storage" => DriverKind::Storage,
            "menu" => DriverKind::Menu,
            "console" => DriverKind::Console,
            "signal" => DriverKind::Signal,
            other => DriverKind::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for DriverKind {
    fn from(label: String) -> Self {
        DriverKind::parse(&label)
    }
}

impl From<DriverKind> for String {
    fn from(kind: DriverKind) -> Self {
        kind.as_str().to_string()
    }
}

/// A subsystem that projects a model onto some surface and reports actions.
///
/// `render` must be idempotent: rendering a model equal to the last rendered
/// one has no visible effect. The stream returned by `events` preserves the
/// order in which actions happened and is expected to stay open for the
/// lifetime of the driver. Dropping it unsubscribes without affecting the
/// driver.
#[async_trait]
pub trait Driver: Send + 'static {
    type Model: Send + 'static;
    type Action: Send + 'static;

    fn kind(&self) -> DriverKind;

    /// Take the action stream. Later calls return an empty stream.
    fn events(&mut self) -> BoxStream<'static, Self::Action>;

    async fn render(&mut self, model: Self::Model);

    /// Release resources on teardown.
    async fn shutdown(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_round_trip() {
        for kind in [
            DriverKind::Screen,
            DriverKind::Peer,
            DriverKind::Storage,
            DriverKind::Menu,
            DriverKind::Console,
            DriverKind::Signal,
            DriverKind::Custom("camera".to_string()),
        ] {
            assert_eq!(DriverKind::parse(kind.as_str()), kind);
        }
    }

    #[test]
    fn kind_serializes_as_label() {
        let json = serde_json::to_string(&DriverKind::Peer).unwrap();
        assert_eq!(json, "\"peer\"");
    }
}
