//! Causal records of state transitions.

mod recorder;
mod types;

pub use recorder::MomentRecorder;
pub use types::{DriverSnapshot, EmptyListError, Moment, NonEmpty};
