//! Reducers: how each driver's actions change the monitor state.

use crate::driver::{ConsoleCommand, MenuCommand, SignalAction, StorageAction, StorageOp};
use crate::export::export_approved;
use crate::lens::ReduceError;
use crate::peer::{ConnectionState, PeerAction, PeerId, SyncPayload, WireMessage};

use super::{EventHandlingState, MonitorModel};

pub fn reduce_console(state: &MonitorModel, command: ConsoleCommand) -> MonitorModel {
    let mut next = state.clone();
    next.status = None;

    match command {
        ConsoleCommand::CycleMode => next.mode = next.mode.next(),
        ConsoleCommand::Record => next.mode = EventHandlingState::Recording,
        ConsoleCommand::Play => next.mode = EventHandlingState::Playing,
        ConsoleCommand::SendEvents => next.mode = EventHandlingState::PlayingSendingEvents,
        ConsoleCommand::SendEffects => next.mode = EventHandlingState::PlayingSendingEffects,
        ConsoleCommand::Select(index) => {
            next.timeline.scroll_to(index);
            if next.timeline.selected_index() != Some(index) {
                next.status = Some(format!("no event {index}"));
            }
        }
        ConsoleCommand::Next => next.timeline.select_next(),
        ConsoleCommand::Prev => next.timeline.select_prev(),
        ConsoleCommand::Approve(index) => set_approval(&mut next, index, true),
        ConsoleCommand::Disapprove(index) => set_approval(&mut next, index, false),
        ConsoleCommand::Edit(effect) => {
            if let Err(err) = next.timeline.edit_pending_effect(effect) {
                tracing::warn!(error = %err, "Cannot edit effect");
                next.status = Some(err.to_string());
            }
        }
        ConsoleCommand::Clear => next.timeline.clear_all(),
        ConsoleCommand::Connect(name) => match next.devices.find_by_name(&name) {
            Some(device) => {
                next.selected_peer = Some(device.peer_id.clone());
                next.auto_connect = true;
            }
            None => next.status = Some(format!("unknown device `{name}`")),
        },
        ConsoleCommand::Disconnect => {
            // Stay disconnected until the operator picks a device again.
            next.auto_connect = false;
            next.selected_peer = None;
        }
        ConsoleCommand::Menu(command) => return reduce_menu(&next, command),
        ConsoleCommand::Invalid(line) => next.status = Some(format!("unknown command `{line}`")),
    }
    next
}

fn set_approval(state: &mut MonitorModel, index: Option<usize>, approved: bool) {
    let Some(index) = index.or(state.timeline.selected_index()) else {
        state.status = Some("no event selected".to_string());
        return;
    };
    if let Err(err) = state.timeline.toggle_approval(index, approved) {
        tracing::warn!(index, error = %err, "Ignoring approval of missing event");
        state.status = Some(err.to_string());
    }
}

pub fn reduce_menu(state: &MonitorModel, command: MenuCommand) -> MonitorModel {
    let mut next = state.clone();
    match command {
        MenuCommand::OpenTimeline(path) => {
            next.status = Some(format!("opening {}", path.display()));
            next.request(StorageOp::Open(path));
        }
        MenuCommand::SaveTimeline(path) => {
            next.status = Some(format!("saving {}", path.display()));
            let timeline = next.timeline.clone();
            next.request(StorageOp::Save { path, timeline });
        }
        MenuCommand::ExportTests(path) => {
            let fixtures = export_approved(&next.timeline);
            next.status = Some(format!(
                "exporting {} fixtures to {}",
                fixtures.len(),
                path.display()
            ));
            next.request(StorageOp::Export { path, fixtures });
        }
        MenuCommand::Quit => next.terminating = true,
    }
    next
}

pub fn reduce_storage(state: &MonitorModel, action: StorageAction) -> MonitorModel {
    let mut next = state.clone();
    if next
        .storage
        .pending
        .as_ref()
        .is_some_and(|pending| pending.id == action.request())
    {
        next.storage.pending = None;
    }

    next.status = Some(match action {
        StorageAction::Opened { path, timeline, .. } => {
            let status = format!("opened {} events from {}", timeline.len(), path.display());
            next.timeline = timeline;
            status
        }
        StorageAction::Saved { path, .. } => format!("saved timeline to {}", path.display()),
        StorageAction::Exported { path, count, .. } => {
            format!("exported {count} fixtures to {}", path.display())
        }
        StorageAction::Failed { message, .. } => format!("error: {message}"),
    });
    next
}

pub fn reduce_signal(state: &MonitorModel, action: SignalAction) -> MonitorModel {
    let mut next = state.clone();
    match action {
        SignalAction::Interrupt => next.terminating = true,
    }
    next
}

pub fn reduce_peer(state: &MonitorModel, action: PeerAction) -> Result<MonitorModel, ReduceError> {
    let mut next = state.clone();
    match action {
        PeerAction::DidFind { name, peer } => {
            next.devices.discover(&name, peer.clone());
            if next.auto_connect && next.selected_peer.is_none() && next.devices.active().is_none()
            {
                tracing::info!(peer = %peer, "Connecting to discovered peer");
                next.selected_peer = Some(peer);
            }
        }
        PeerAction::Connecting { peer } => {
            if let Some(active) = next.devices.active().filter(|d| d.peer_id != peer) {
                return Err(ReduceError::Rejected(format!(
                    "cannot connect to {peer} while {} is {}",
                    active.name,
                    active.connection.as_str()
                )));
            }
            next.devices.set_connection(&peer, ConnectionState::Connecting);
        }
        PeerAction::Connected { peer } => {
            next.devices.set_connection(&peer, ConnectionState::Connected);
            if next.selected_peer.is_none() {
                next.selected_peer = Some(peer);
            }
        }
        PeerAction::Disconnected { peer } => {
            next.devices.set_connection(&peer, ConnectionState::Disconnected);
            if next.selected_peer.as_ref() == Some(&peer) {
                next.selected_peer = None;
            }
        }
        PeerAction::Received { data, peer } => receive(&mut next, &data, peer)?,
    }
    Ok(next)
}

fn receive(state: &mut MonitorModel, data: &str, peer: PeerId) -> Result<(), ReduceError> {
    if state.selected_peer.as_ref() != Some(&peer) {
        tracing::debug!(peer = %peer, "Dropping message from unselected peer");
        return Ok(());
    }

    let value = match WireMessage::decode(data.as_bytes())? {
        WireMessage::Disconnect => {
            tracing::info!(peer = %peer, "Peer ended the session");
            state.devices.set_connection(&peer, ConnectionState::Disconnected);
            state.selected_peer = None;
            return Ok(());
        }
        WireMessage::Payload(value) => value,
    };

    if !state.mode.is_recording() {
        tracing::trace!(mode = %state.mode, "Not recording, dropping payload");
        return Ok(());
    }

    match SyncPayload::from_value(value)? {
        SyncPayload::Moment(moment) => state.timeline.append(moment, true),
        SyncPayload::Event(_) | SyncPayload::Effect(_) => {
            tracing::debug!(peer = %peer, "Ignoring playback payload sent to the monitor");
        }
    }
    Ok(())
}
