use tokio::io::{Stdin, Stdout};

use crate::driver::{
    ChannelDriver, ConsoleCommand, ConsoleDriver, ConsoleView, Driver, MenuCommand, MenuView,
    SignalDriver, StorageDriver, StorageModel,
};
use crate::lens::{compose, compose_fallible, Composition, Lensed};
use crate::peer::{
    ConnectionState, EffectPayload, Outbound, OutboundKey, PeerModel, PeerSyncChannel,
    PeerTransport, SyncPayload,
};

use super::reduce::{reduce_console, reduce_menu, reduce_peer, reduce_signal, reduce_storage};
use super::{EventHandlingState, MonitorModel};

/// The drivers a monitor is assembled from.
pub struct MonitorDrivers<T, C = ConsoleDriver<Stdin, Stdout>> {
    pub peer: PeerSyncChannel<T>,
    pub storage: StorageDriver,
    pub console: Option<C>,
    pub menu: Option<ChannelDriver<MenuView, MenuCommand>>,
    pub signal: Option<SignalDriver>,
}

impl<T: PeerTransport> MonitorDrivers<T> {
    pub fn new(transport: T) -> Self {
        Self {
            peer: PeerSyncChannel::new(transport),
            storage: StorageDriver::new(),
            console: None,
            menu: None,
            signal: None,
        }
    }
}

impl<T: PeerTransport, C> MonitorDrivers<T, C> {
    pub fn with_console<C2>(self, console: C2) -> MonitorDrivers<T, C2> {
        MonitorDrivers {
            peer: self.peer,
            storage: self.storage,
            console: Some(console),
            menu: self.menu,
            signal: self.signal,
        }
    }

    pub fn with_menu(mut self, menu: ChannelDriver<MenuView, MenuCommand>) -> Self {
        self.menu = Some(menu);
        self
    }

    pub fn with_signal(mut self, signal: SignalDriver) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// Wire the monitor's drivers to its state.
///
/// The composition stops once the state is marked terminating.
pub fn compose_monitor<T, C>(initial: MonitorModel, drivers: MonitorDrivers<T, C>) -> Composition<MonitorModel>
where
    T: PeerTransport,
    C: Driver<Model = ConsoleView, Action = ConsoleCommand>,
{
    let MonitorDrivers {
        peer,
        storage,
        console,
        menu,
        signal,
    } = drivers;

    let mut lensed: Lensed<MonitorModel> = compose_fallible(peer_model, peer, reduce_peer)
        .zip(compose(storage_model, storage, reduce_storage));
    if let Some(console) = console {
        lensed = lensed.zip(compose(console_view, console, reduce_console));
    }
    if let Some(menu) = menu {
        lensed = lensed.zip(compose(menu_view, menu, reduce_menu));
    }
    if let Some(signal) = signal {
        lensed = lensed.zip(compose(|_: &MonitorModel| (), signal, reduce_signal));
    }

    lensed
        .prefixed(initial)
        .terminate_when(|state: &MonitorModel| state.terminating)
}

pub fn peer_model(state: &MonitorModel) -> PeerModel {
    PeerModel {
        target: state.selected_peer.clone(),
        connected: state.connection() == ConnectionState::Connected,
        outbound: outbound(state),
    }
}

/// Payload mirrored to the peer in the two sending modes.
fn outbound(state: &MonitorModel) -> Option<Outbound> {
    let index = state.timeline.selected_index()?;
    let moment = state.timeline.selected()?;
    match state.mode {
        EventHandlingState::PlayingSendingEvents => Some(Outbound {
            key: OutboundKey::Event(index),
            payload: SyncPayload::Event(moment.cause.clone()),
        }),
        EventHandlingState::PlayingSendingEffects => Some(Outbound {
            key: OutboundKey::Effect(moment.effect.clone()),
            payload: SyncPayload::Effect(EffectPayload {
                effect: moment.effect.clone(),
            }),
        }),
        EventHandlingState::Playing | EventHandlingState::Recording => None,
    }
}

pub fn storage_model(state: &MonitorModel) -> StorageModel {
    StorageModel {
        request: state.storage.pending.clone(),
    }
}

pub fn console_view(state: &MonitorModel) -> ConsoleView {
    let peer = state
        .selected_peer
        .as_ref()
        .map(|peer| match state.devices.get(peer) {
            Some(device) => device.name.clone(),
            None => peer.to_string(),
        });
    ConsoleView {
        mode: state.mode.to_string(),
        events: state.timeline.len(),
        selected: state.timeline.selected_index(),
        approved: state.timeline.approved_count(),
        peer,
        connection: state.connection().as_str().to_string(),
        status: state.status.clone(),
    }
}

pub fn menu_view(state: &MonitorModel) -> MenuView {
    MenuView {
        can_save: !state.timeline.is_empty(),
        can_export: state.timeline.approved_count() > 0,
        busy: state.storage.pending.is_some(),
    }
}
