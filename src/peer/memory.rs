use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{PeerId, PeerTransport, TransportError, TransportEvent};

struct Endpoint {
    name: String,
    id: PeerId,
    events: mpsc::UnboundedSender<TransportEvent>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
    session: Mutex<Option<PeerId>>,
}

impl Endpoint {
    fn new(name: &str) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            name: name.to_string(),
            id: PeerId::from_name(name),
            events: tx,
            receiver: Mutex::new(Some(rx)),
            session: Mutex::new(None),
        })
    }

    fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }
}

/// In-process transport connecting exactly two endpoints.
pub struct MemoryTransport {
    local: Arc<Endpoint>,
    remote: Arc<Endpoint>,
    /// Serializes session changes across both endpoints.
    link: Arc<Mutex<()>>,
}

impl MemoryTransport {
    /// Two transports that can only see each other.
    pub fn pair(first: &str, second: &str) -> (Self, Self) {
        let a = Endpoint::new(first);
        let b = Endpoint::new(second);
        let link = Arc::new(Mutex::new(()));
        (
            Self {
                local: Arc::clone(&a),
                remote: Arc::clone(&b),
                link: Arc::clone(&link),
            },
            Self {
                local: b,
                remote: a,
                link,
            },
        )
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.local.id
    }

    /// Simulate the remote side dropping the session.
    pub fn sever(&self) {
        let _link = self.link.lock();
        let peer = self.local.session.lock().take();
        if let Some(peer) = peer {
            self.remote.session.lock().take();
            self.local.emit(TransportEvent::Disconnected { peer });
            self.remote.emit(TransportEvent::Disconnected {
                peer: self.local.id.clone(),
            });
        }
    }
}

#[async_trait]
impl PeerTransport for MemoryTransport {
    fn display_name(&self) -> &str {
        &self.local.name
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        self.local.receiver.lock().take()
    }

    async fn start_discovery(&self) -> Result<(), TransportError> {
        self.local.emit(TransportEvent::Found {
            name: self.remote.name.clone(),
            peer: self.remote.id.clone(),
        });
        Ok(())
    }

    async fn invite(&self, peer: &PeerId) -> Result<(), TransportError> {
        if peer != &self.remote.id {
            return Err(TransportError::UnknownPeer(peer.clone()));
        }
        {
            let _link = self.link.lock();
            let mut local = self.local.session.lock();
            if let Some(current) = local.as_ref() {
                return Err(TransportError::Busy(current.clone()));
            }
            let mut remote = self.remote.session.lock();
            if let Some(current) = remote.as_ref() {
                return Err(TransportError::Busy(current.clone()));
            }
            self.local.emit(TransportEvent::Connecting { peer: peer.clone() });
            *local = Some(peer.clone());
            *remote = Some(self.local.id.clone());
        }
        self.local.emit(TransportEvent::Connected { peer: peer.clone() });
        self.remote.emit(TransportEvent::Connected {
            peer: self.local.id.clone(),
        });
        Ok(())
    }

    async fn send(&self, peer: &PeerId, data: Vec<u8>) -> Result<(), TransportError> {
        if self.local.session.lock().as_ref() != Some(peer) {
            return Err(TransportError::NotConnected(peer.clone()));
        }
        self.remote.emit(TransportEvent::Received {
            data,
            peer: self.local.id.clone(),
        });
        Ok(())
    }

    fn session_peer(&self) -> Option<PeerId> {
        self.local.session.lock().clone()
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.sever();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invite_connects_both_sides() {
        let (monitor, app) = MemoryTransport::pair("monitor", "app");
        let mut monitor_events = monitor.take_events().unwrap();
        let mut app_events = app.take_events().unwrap();

        monitor.start_discovery().await.unwrap();
        let app_id = PeerId::from_name("app");
        assert_eq!(
            monitor_events.recv().await,
            Some(TransportEvent::Found {
                name: "app".into(),
                peer: app_id.clone()
            })
        );

        monitor.invite(&app_id).await.unwrap();
        assert_eq!(
            monitor_events.recv().await,
            Some(TransportEvent::Connecting {
                peer: app_id.clone()
            })
        );
        assert_eq!(
            monitor_events.recv().await,
            Some(TransportEvent::Connected {
                peer: app_id.clone()
            })
        );
        assert_eq!(
            app_events.recv().await,
            Some(TransportEvent::Connected {
                peer: PeerId::from_name("monitor")
            })
        );
        assert!(monitor.take_events().is_none());
    }

    #[tokio::test]
    async fn second_invite_is_rejected_while_live() {
        let (monitor, _app) = MemoryTransport::pair("monitor", "app");
        let app_id = PeerId::from_name("app");
        monitor.invite(&app_id).await.unwrap();

        let err = monitor.invite(&app_id).await.unwrap_err();
        assert!(matches!(err, TransportError::Busy(_)));
    }

    #[tokio::test]
    async fn send_requires_a_session() {
        let (monitor, app) = MemoryTransport::pair("monitor", "app");
        let mut app_events = app.take_events().unwrap();
        let app_id = PeerId::from_name("app");

        let err = monitor.send(&app_id, b"{}".to_vec()).await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected(_)));

        monitor.invite(&app_id).await.unwrap();
        monitor.send(&app_id, b"{}".to_vec()).await.unwrap();
        app_events.recv().await;
        assert_eq!(
            app_events.recv().await,
            Some(TransportEvent::Received {
                data: b"{}".to_vec(),
                peer: PeerId::from_name("monitor")
            })
        );
    }

    #[tokio::test]
    async fn disconnect_notifies_both_sides() {
        let (monitor, app) = MemoryTransport::pair("monitor", "app");
        let mut app_events = app.take_events().unwrap();
        monitor.invite(&PeerId::from_name("app")).await.unwrap();
        app_events.recv().await;

        monitor.disconnect().await.unwrap();
        assert_eq!(
            app_events.recv().await,
            Some(TransportEvent::Disconnected {
                peer: PeerId::from_name("monitor")
            })
        );
        monitor.disconnect().await.unwrap();
    }
}
