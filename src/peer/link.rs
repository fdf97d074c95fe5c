use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{PeerId, PeerTransport, SyncPayload, TransportError, TransportEvent, WireMessage};
use crate::moment::{DriverSnapshot, Moment};

/// Input pushed from the monitor into the monitored application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteInput {
    /// Replay the cause of a recorded moment.
    Event(DriverSnapshot),
    /// Jump to a recorded (possibly edited) state.
    Effect(String),
}

/// The monitored application's end of the peer link.
///
/// Forwards every recorded moment to the monitor holding the session and
/// surfaces the events and effects the monitor sends back.
pub struct MomentLink {
    inputs: mpsc::UnboundedReceiver<RemoteInput>,
    monitor: watch::Receiver<Option<PeerId>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl MomentLink {
    pub fn spawn<T: PeerTransport>(
        transport: T,
        moments: mpsc::UnboundedReceiver<Moment>,
    ) -> Result<Self, TransportError> {
        let events = transport.take_events().ok_or(TransportError::Closed)?;
        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
        let (monitor_tx, monitor_rx) = watch::channel(None);
        let cancel = CancellationToken::new();

        let link = Link {
            transport,
            inputs: inputs_tx,
            monitor: monitor_tx,
        };
        let task = tokio::spawn(link.run(events, moments, cancel.clone()));

        Ok(Self {
            inputs: inputs_rx,
            monitor: monitor_rx,
            cancel,
            task,
        })
    }

    pub async fn next_input(&mut self) -> Option<RemoteInput> {
        self.inputs.recv().await
    }

    /// Peer currently holding the session.
    pub fn monitor(&self) -> Option<PeerId> {
        self.monitor.borrow().clone()
    }

    /// Wait until a monitor holds the session.
    pub async fn connected(&mut self) -> Option<PeerId> {
        let monitor = self.monitor.wait_for(Option::is_some).await.ok()?;
        monitor.clone()
    }

    /// Announce the disconnect to the monitor and stop forwarding.
    pub async fn close(self) {
        self.cancel.cancel();
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "Moment link task failed");
        }
    }
}

struct Link<T> {
    transport: T,
    inputs: mpsc::UnboundedSender<RemoteInput>,
    monitor: watch::Sender<Option<PeerId>>,
}

impl<T: PeerTransport> Link<T> {
    async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        mut moments: mpsc::UnboundedReceiver<Moment>,
        cancel: CancellationToken,
    ) {
        let mut forwarding = true;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.on_event(event).await,
                    None => break,
                },
                moment = moments.recv(), if forwarding => match moment {
                    Some(moment) => self.forward(moment).await,
                    None => forwarding = false,
                },
            }
        }

        let monitor = self.monitor.borrow().clone();
        if let Some(peer) = monitor {
            if let Err(err) = self.transport.send(&peer, WireMessage::Disconnect.encode()).await {
                tracing::debug!(peer = %peer, error = %err, "Could not announce disconnect");
            }
            if let Err(err) = self.transport.disconnect().await {
                tracing::warn!(error = %err, "Failed to close session");
            }
        }
    }

    async fn forward(&self, moment: Moment) {
        let monitor = self.monitor.borrow().clone();
        let Some(peer) = monitor else {
            tracing::trace!("No monitor connected, dropping moment");
            return;
        };
        match SyncPayload::Moment(moment).encode() {
            Ok(data) => {
                if let Err(err) = self.transport.send(&peer, data).await {
                    tracing::warn!(peer = %peer, error = %err, "Failed to forward moment");
                }
            }
            Err(err) => tracing::warn!(error = %err, "Failed to encode moment"),
        }
    }

    async fn on_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected { peer } => {
                tracing::info!(peer = %peer, "Monitor connected");
                self.monitor.send_replace(Some(peer));
            }
            TransportEvent::Disconnected { peer } => {
                self.monitor.send_if_modified(|current| {
                    if current.as_ref() == Some(&peer) {
                        *current = None;
                        true
                    } else {
                        false
                    }
                });
            }
            TransportEvent::Received { data, peer } => {
                if self.monitor.borrow().as_ref() != Some(&peer) {
                    tracing::debug!(peer = %peer, "Ignoring message from peer without session");
                    return;
                }
                self.on_message(&data).await;
            }
            TransportEvent::Found { .. } | TransportEvent::Connecting { .. } => {}
        }
    }

    async fn on_message(&self, data: &[u8]) {
        let payload = match WireMessage::decode(data) {
            Ok(WireMessage::Disconnect) => {
                self.monitor.send_replace(None);
                if let Err(err) = self.transport.disconnect().await {
                    tracing::warn!(error = %err, "Failed to close session");
                }
                return;
            }
            Ok(WireMessage::Payload(value)) => SyncPayload::from_value(value),
            Err(err) => Err(err),
        };
        let input = match payload {
            Ok(SyncPayload::Event(snapshot)) => RemoteInput::Event(snapshot),
            Ok(SyncPayload::Effect(effect)) => RemoteInput::Effect(effect.effect),
            Ok(SyncPayload::Moment(_)) => {
                tracing::debug!("Ignoring moment sent to the monitored side");
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, "Malformed message from monitor");
                return;
            }
        };
        let _ = self.inputs.send(input);
    }
}
