//! End-to-end tests of a monitor mirroring a counter app over an in-process
//! transport.

use super::common::counter::{counter_app, reduce, Counter, Tap};
use super::common::{wait_for_state, WAIT};
use rewind::describe::{Describe, Restore};
use rewind::driver::{ChannelDriver, ChannelRemote, ConsoleCommand, ConsoleView, MenuCommand};
use rewind::export::read_fixtures;
use rewind::export::replay::verify_fixture;
use rewind::peer::{
    ConnectionState, MemoryTransport, PeerTransport, RemoteInput, TransportEvent, WireMessage,
};
use rewind::{
    compose_monitor, CompositionHandle, DriverKind, EventHandlingState, MomentLink,
    MonitorDrivers, MonitorModel, PeerId,
};
use tempfile::TempDir;
use tokio::time::timeout;

type Console = ChannelRemote<ConsoleView, ConsoleCommand>;

/// Start a counter app and a monitor connected over a memory transport.
fn start(
    mode: EventHandlingState,
    auto_connect: bool,
) -> (
    CompositionHandle<Counter>,
    ChannelRemote<Counter, Tap>,
    MomentLink,
    CompositionHandle<MonitorModel>,
    Console,
) {
    let (monitor_side, app_side) = MemoryTransport::pair("monitor", "counter");

    let (app, screen) = counter_app();
    let mut app = app.spawn();
    let moments = app.moments().expect("recording composition");
    let link = MomentLink::spawn(app_side, moments).expect("fresh transport");

    let (console, remote) = ChannelDriver::new(DriverKind::Console);
    let drivers = MonitorDrivers::new(monitor_side).with_console(console);
    let monitor = compose_monitor(MonitorModel::new(mode, auto_connect), drivers).spawn();

    (app, screen, link, monitor, remote)
}

#[tokio::test]
async fn recording_captures_moments_from_the_selected_peer() {
    let (app, screen, mut link, monitor, console) = start(EventHandlingState::Playing, true);
    let mut states = monitor.subscribe();

    assert_eq!(
        timeout(WAIT, link.connected()).await.unwrap(),
        Some(PeerId::from_name("monitor"))
    );
    let state = wait_for_state(&mut states, |s| s.connection() == ConnectionState::Connected).await;
    assert_eq!(state.selected_peer, Some(PeerId::from_name("counter")));
    assert!(state.timeline.is_empty());

    console.send(ConsoleCommand::Record);
    wait_for_state(&mut states, |s| s.mode == EventHandlingState::Recording).await;

    screen.send(Tap::Increment);
    let state = wait_for_state(&mut states, |s| s.timeline.len() == 1).await;

    assert_eq!(state.timeline.selected_index(), Some(0));
    let moment = &state.timeline.events()[0];
    assert_eq!(moment.cause.label, "screen");
    assert_eq!(moment.cause.action, Tap::Increment.to_text());
    assert_eq!(moment.drivers.len(), 1);
    assert!(!moment.approved);
    assert_eq!(Counter::from_text(&moment.context).unwrap(), Counter::default());
    assert_eq!(Counter::from_text(&moment.effect).unwrap().count, 1);

    console.send(ConsoleCommand::Menu(MenuCommand::Quit));
    monitor.join().await.unwrap();
    link.close().await;
    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn approved_moments_export_as_replayable_fixtures() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("fixtures.json");

    let (app, screen, mut link, monitor, console) = start(EventHandlingState::Recording, true);
    let mut states = monitor.subscribe();
    timeout(WAIT, link.connected()).await.unwrap();

    screen.send(Tap::Increment);
    screen.send(Tap::Rename("clicks".to_string()));
    wait_for_state(&mut states, |s| s.timeline.len() == 2).await;

    console.send(ConsoleCommand::Approve(Some(1)));
    wait_for_state(&mut states, |s| s.timeline.approved_count() == 1).await;

    console.send(ConsoleCommand::Menu(MenuCommand::ExportTests(out.clone())));
    let state = wait_for_state(&mut states, |s| {
        s.status.as_deref().is_some_and(|status| status.starts_with("exported"))
    })
    .await;
    assert!(state.storage.pending.is_none());

    let fixtures = read_fixtures(&out).unwrap();
    assert_eq!(fixtures.len(), 1);
    assert_eq!(fixtures[0].cause.action, Tap::Rename("clicks".into()).to_text());

    let replayed: Counter = verify_fixture::<Counter, Tap, _>(&fixtures[0], reduce).unwrap();
    assert_eq!(
        replayed,
        Counter {
            count: 1,
            label: "clicks".to_string()
        }
    );

    console.send(ConsoleCommand::Menu(MenuCommand::Quit));
    monitor.join().await.unwrap();
    link.close().await;
    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn sending_modes_mirror_the_selection_to_the_app() {
    let (app, screen, mut link, monitor, console) = start(EventHandlingState::Recording, true);
    let mut states = monitor.subscribe();
    timeout(WAIT, link.connected()).await.unwrap();

    screen.send(Tap::Increment);
    screen.send(Tap::Increment);
    wait_for_state(&mut states, |s| s.timeline.len() == 2).await;

    console.send(ConsoleCommand::Select(0));
    console.send(ConsoleCommand::SendEvents);
    let input = timeout(WAIT, link.next_input()).await.unwrap();
    let Some(RemoteInput::Event(cause)) = input else {
        panic!("expected an event, got {input:?}");
    };
    assert_eq!(Tap::from_text(&cause.action).unwrap(), Tap::Increment);

    console.send(ConsoleCommand::SendEffects);
    let input = timeout(WAIT, link.next_input()).await.unwrap();
    let Some(RemoteInput::Effect(effect)) = input else {
        panic!("expected an effect, got {input:?}");
    };
    assert_eq!(Counter::from_text(&effect).unwrap().count, 1);

    console.send(ConsoleCommand::Menu(MenuCommand::Quit));
    monitor.join().await.unwrap();
    link.close().await;
    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn app_disconnect_clears_the_selection() {
    let (app, _screen, mut link, monitor, console) = start(EventHandlingState::Recording, false);
    let mut states = monitor.subscribe();

    // Without auto-connect the peer is only listed until picked by name.
    wait_for_state(&mut states, |s| s.devices.len() == 1).await;
    assert_eq!(monitor.current().selected_peer, None);

    console.send(ConsoleCommand::Connect("counter".to_string()));
    timeout(WAIT, link.connected()).await.unwrap();
    wait_for_state(&mut states, |s| s.connection() == ConnectionState::Connected).await;

    link.close().await;
    let state = wait_for_state(&mut states, |s| s.selected_peer.is_none()).await;
    assert_eq!(
        state.devices.connection(&PeerId::from_name("counter")),
        ConnectionState::Disconnected
    );

    console.send(ConsoleCommand::Menu(MenuCommand::Quit));
    monitor.join().await.unwrap();
    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutting_down_the_monitor_ends_the_session() {
    let (monitor_side, app_side) = MemoryTransport::pair("monitor", "counter");
    let mut app_events = app_side.take_events().unwrap();
    let monitor = compose_monitor(
        MonitorModel::new(EventHandlingState::Playing, true),
        MonitorDrivers::new(monitor_side),
    )
    .spawn();
    let mut states = monitor.subscribe();

    assert_eq!(
        timeout(WAIT, app_events.recv()).await.unwrap(),
        Some(TransportEvent::Connected {
            peer: PeerId::from_name("monitor")
        })
    );
    wait_for_state(&mut states, |s| s.connection() == ConnectionState::Connected).await;

    monitor.shutdown().await.unwrap();

    match timeout(WAIT, app_events.recv()).await.unwrap() {
        Some(TransportEvent::Received { data, .. }) => {
            assert_eq!(data, br#"{"action":"disconnect"}"#.to_vec());
            assert_eq!(WireMessage::decode(&data).unwrap(), WireMessage::Disconnect);
        }
        other => panic!("expected the disconnect control, got {other:?}"),
    }
    assert_eq!(
        timeout(WAIT, app_events.recv()).await.unwrap(),
        Some(TransportEvent::Disconnected {
            peer: PeerId::from_name("monitor")
        })
    );
    assert_eq!(app_side.session_peer(), None);
}
