pub mod cli;
pub mod config;
pub mod describe;
pub mod driver;
pub mod export;
pub mod lens;
pub mod moment;
pub mod monitor;
pub mod peer;
pub mod timeline;
pub mod util;

pub use config::Config;
pub use describe::{DecodeError, Describe, Node, Restore};
pub use driver::{Driver, DriverKind};
pub use export::{ExportError, Fixture};
pub use lens::{compose, compose_fallible, Composition, CompositionHandle, Lensed, ReduceError};
pub use moment::{DriverSnapshot, Moment, MomentRecorder, NonEmpty};
pub use monitor::{compose_monitor, EventHandlingState, MonitorDrivers, MonitorModel};
pub use peer::{MomentLink, PeerId, PeerTransport};
pub use timeline::{Timeline, TimelineError};
