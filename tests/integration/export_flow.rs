//! Tests for saving timelines and exporting approved moments as fixtures.

use super::common::counter::{reduce, Counter, Tap};
use rewind::cli::{export_command, inspect_report};
use rewind::describe::Describe;
use rewind::export::replay::{verify_fixture, ReplayError};
use rewind::export::{read_fixtures, read_timeline, write_timeline};
use rewind::{DriverSnapshot, Moment, NonEmpty, Timeline};
use std::fs;
use tempfile::TempDir;

/// A moment of the counter app taking `tap` from `before`.
fn moment(before: &Counter, tap: Tap) -> Moment {
    let after = reduce(before, tap.clone());
    let cause = DriverSnapshot::new("screen", tap.to_text(), "0");
    Moment {
        drivers: NonEmpty::new(cause.clone(), Vec::new()),
        cause,
        context: before.to_text(),
        effect: after.to_text(),
        approved: false,
    }
}

fn recorded_session() -> Timeline {
    let mut timeline = Timeline::new();
    let mut state = Counter::default();
    for tap in [Tap::Increment, Tap::Rename("n".into()), Tap::Decrement] {
        timeline.append(moment(&state, tap.clone()), true);
        state = reduce(&state, tap);
    }
    timeline
}

#[test]
fn saved_timeline_reopens_unchanged() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.json");

    let mut timeline = recorded_session();
    timeline.toggle_approval(1, true).unwrap();
    write_timeline(&path, &timeline).unwrap();

    assert_eq!(read_timeline(&path).unwrap(), timeline);
}

#[test]
fn export_keeps_approved_moments_in_order() {
    let dir = TempDir::new().unwrap();
    let timeline_path = dir.path().join("session.json");
    let out = dir.path().join("nested").join("fixtures.json");

    let mut timeline = recorded_session();
    timeline.toggle_approval(2, true).unwrap();
    timeline.toggle_approval(0, true).unwrap();
    write_timeline(&timeline_path, &timeline).unwrap();

    assert_eq!(export_command(&timeline_path, &out).unwrap(), 2);

    let fixtures = read_fixtures(&out).unwrap();
    let actions: Vec<_> = fixtures.iter().map(|f| f.cause.action.clone()).collect();
    assert_eq!(actions, vec![Tap::Increment.to_text(), Tap::Decrement.to_text()]);

    for fixture in &fixtures {
        verify_fixture::<Counter, Tap, _>(fixture, reduce).unwrap();
    }

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert!(raw[0].get("isApproved").is_none());
}

#[test]
fn edited_effect_fails_replay() {
    let dir = TempDir::new().unwrap();
    let timeline_path = dir.path().join("session.json");
    let out = dir.path().join("fixtures.json");

    let mut timeline = recorded_session();
    timeline.scroll_to(0);
    let edited = Counter {
        count: 5,
        label: String::new(),
    };
    timeline.edit_pending_effect(edited.to_text()).unwrap();
    timeline.toggle_approval(0, true).unwrap();
    write_timeline(&timeline_path, &timeline).unwrap();

    export_command(&timeline_path, &out).unwrap();
    let fixtures = read_fixtures(&out).unwrap();

    let err = verify_fixture::<Counter, Tap, _>(&fixtures[0], reduce).unwrap_err();
    assert!(matches!(err, ReplayError::Mismatch { .. }));
}

#[test]
fn timeline_without_selection_loads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.json");
    let events = serde_json::to_value(recorded_session().events()).unwrap();
    let raw = serde_json::json!({ "selectedIndex": "", "events": events });
    fs::write(&path, raw.to_string()).unwrap();

    let timeline = read_timeline(&path).unwrap();
    assert_eq!(timeline.len(), 3);
    assert_eq!(timeline.selected_index(), None);

    let report = inspect_report(&timeline, None).unwrap();
    assert!(report.starts_with("3 events, 0 approved, selected none"));
}
