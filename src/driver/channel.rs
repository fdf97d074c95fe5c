use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::{mpsc, watch};

use super::{Driver, DriverKind};

/// Driver backed by channels, for collaborators living outside the crate.
///
/// Rendered models are published on a `watch` channel (unchanged models are
/// not republished). Actions are whatever the collaborator sends through its
/// [`ChannelRemote`].
pub struct ChannelDriver<M, A> {
    kind: DriverKind,
    view: watch::Sender<Option<M>>,
    actions: Option<mpsc::UnboundedReceiver<A>>,
}

/// The collaborator's end of a [`ChannelDriver`].
pub struct ChannelRemote<M, A> {
    view: watch::Receiver<Option<M>>,
    actions: mpsc::UnboundedSender<A>,
}

impl<M, A> ChannelDriver<M, A> {
    pub fn new(kind: DriverKind) -> (Self, ChannelRemote<M, A>) {
        let (view_tx, view_rx) = watch::channel(None);
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let driver = Self {
            kind,
            view: view_tx,
            actions: Some(action_rx),
        };
        let remote = ChannelRemote {
            view: view_rx,
            actions: action_tx,
        };
        (driver, remote)
    }
}

impl<M: Clone, A> ChannelRemote<M, A> {
    /// Emit an action. Returns false once the driver is gone.
    pub fn send(&self, action: A) -> bool {
        self.actions.send(action).is_ok()
    }

    /// Last rendered model, if any.
    pub fn current(&self) -> Option<M> {
        self.view.borrow().clone()
    }

    /// Wait for the next render that changed the model.
    pub async fn changed(&mut self) -> Option<M> {
        self.view.changed().await.ok()?;
        self.view.borrow_and_update().clone()
    }

    /// Whether a new model was rendered since the last [`changed`](Self::changed).
    pub fn has_changed(&self) -> bool {
        self.view.has_changed().unwrap_or(false)
    }

    /// Wait until the rendered model satisfies `predicate`.
    pub async fn wait_for(&mut self, mut predicate: impl FnMut(&M) -> bool) -> Option<M> {
        let model = self
            .view
            .wait_for(|model| model.as_ref().is_some_and(&mut predicate))
            .await
            .ok()?;
        model.clone()
    }
}

#[async_trait]
impl<M, A> Driver for ChannelDriver<M, A>
where
    M: PartialEq + Send + Sync + 'static,
    A: Send + 'static,
{
    type Model = M;
    type Action = A;

    fn kind(&self) -> DriverKind {
        self.kind.clone()
    }

    fn events(&mut self) -> BoxStream<'static, A> {
        match self.actions.take() {
            Some(rx) => stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|action| (action, rx))
            })
            .boxed(),
            None => stream::empty().boxed(),
        }
    }

    async fn render(&mut self, model: M) {
        self.view.send_if_modified(|current| {
            if current.as_ref() == Some(&model) {
                false
            } else {
                *current = Some(model);
                true
            }
        });
    }
}
