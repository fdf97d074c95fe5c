//! The monitor application: aggregate state, reducers and composition root.

mod compose;
mod mode;
mod model;
mod reduce;

pub use compose::{compose_monitor, console_view, menu_view, peer_model, storage_model, MonitorDrivers};
pub use mode::EventHandlingState;
pub use model::{MonitorModel, StorageState};
pub use reduce::{reduce_console, reduce_menu, reduce_peer, reduce_signal, reduce_storage};
