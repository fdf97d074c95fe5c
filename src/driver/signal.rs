use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::describe::{DecodeError, Describe, Node, Restore};

use super::{Driver, DriverKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    Interrupt,
}

/// Turns Ctrl-C into [`SignalAction::Interrupt`].
#[derive(Debug, Default)]
pub struct SignalDriver {
    taken: bool,
}

impl SignalDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Driver for SignalDriver {
    type Model = ();
    type Action = SignalAction;

    fn kind(&self) -> DriverKind {
        DriverKind::Signal
    }

    fn events(&mut self) -> BoxStream<'static, SignalAction> {
        if std::mem::replace(&mut self.taken, true) {
            return stream::empty().boxed();
        }
        stream::unfold((), |()| async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => Some((SignalAction::Interrupt, ())),
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to listen for Ctrl-C");
                    None
                }
            }
        })
        .boxed()
    }

    async fn render(&mut self, _model: ()) {}
}

impl Describe for SignalAction {
    fn describe(&self) -> Node {
        Node::variant("Signal", "interrupt")
    }
}

impl Restore for SignalAction {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        match node.as_variant("Signal")? {
            ("interrupt", _) => Ok(SignalAction::Interrupt),
            (case, _) => Err(DecodeError::unknown_case("Signal", case)),
        }
    }
}
