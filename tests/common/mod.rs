//! Shared test utilities
//!
//! - A small counter app that describes and restores its state
//! - Helpers for waiting on a running composition

pub mod counter;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;

/// Upper bound for any single asynchronous step in a test.
pub const WAIT: Duration = Duration::from_secs(5);

/// Wait until the published state satisfies `predicate`.
pub async fn wait_for_state<S>(
    states: &mut watch::Receiver<Arc<S>>,
    mut predicate: impl FnMut(&S) -> bool,
) -> Arc<S> {
    let state = timeout(WAIT, states.wait_for(|state| predicate(state.as_ref())))
        .await
        .expect("timed out waiting for state")
        .expect("composition stopped");
    Arc::clone(&state)
}
