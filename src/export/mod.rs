//! Turning a timeline into regression fixtures and timeline files.

pub mod replay;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::describe::{DecodeError, Describe, Node, Restore};
use crate::moment::{DriverSnapshot, Moment, NonEmpty};
use crate::timeline::{Timeline, TimelineFile};

/// An approved moment, stripped of its approval flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    pub drivers: NonEmpty<DriverSnapshot>,
    pub cause: DriverSnapshot,
    pub context: String,
    pub effect: String,
}

impl From<&Moment> for Fixture {
    fn from(moment: &Moment) -> Self {
        Self {
            drivers: moment.drivers.clone(),
            cause: moment.cause.clone(),
            context: moment.context.clone(),
            effect: moment.effect.clone(),
        }
    }
}

impl Describe for Fixture {
    fn describe(&self) -> Node {
        Node::record("Fixture")
            .node(
                "drivers",
                Node::List(self.drivers.iter().map(Describe::describe).collect()),
            )
            .field("cause", &self.cause)
            .field("context", &self.context)
            .field("effect", &self.effect)
            .build()
    }
}

impl Restore for Fixture {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        let fields = node.as_record("Fixture")?;
        let drivers: Vec<DriverSnapshot> = fields.get("drivers")?;
        Ok(Self {
            drivers: NonEmpty::try_from(drivers)
                .map_err(|e| DecodeError::invalid("drivers", e.to_string()))?,
            cause: fields.get("cause")?,
            context: fields.get("context")?,
            effect: fields.get("effect")?,
        })
    }
}

/// Error type for export and import operations.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Failed to serialize: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to parse {path}: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        ExportError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Approved moments, in timeline order.
pub fn export_approved(timeline: &Timeline) -> Vec<Fixture> {
    timeline
        .events()
        .iter()
        .filter(|moment| moment.approved)
        .map(Fixture::from)
        .collect()
}

/// The whole timeline, approval flags and cursor included.
pub fn export_timeline(timeline: &Timeline) -> TimelineFile {
    TimelineFile::from(timeline)
}

/// Write fixtures as a pretty-printed JSON array.
pub fn write_fixtures(path: &Path, fixtures: &[Fixture]) -> Result<(), ExportError> {
    write_json(path, &fixtures)
}

pub fn read_fixtures(path: &Path) -> Result<Vec<Fixture>, ExportError> {
    read_json(path)
}

pub fn write_timeline(path: &Path, timeline: &Timeline) -> Result<(), ExportError> {
    write_json(path, &export_timeline(timeline))
}

pub fn read_timeline(path: &Path) -> Result<Timeline, ExportError> {
    read_json::<TimelineFile>(path).map(Timeline::from)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ExportError> {
    let json = serde_json::to_string_pretty(value).map_err(ExportError::Serialize)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ExportError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| ExportError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let write = |writer: &mut BufWriter<File>| -> std::io::Result<()> {
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()
    };
    write(&mut writer).map_err(|e| ExportError::io(path, e))?;

    tracing::debug!(path = %path.display(), bytes = json.len(), "Wrote export file");
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ExportError> {
    let file = File::open(path).map_err(|e| ExportError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| ExportError::Deserialize {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn moment(n: usize, approved: bool) -> Moment {
        let cause = DriverSnapshot::new("screen", format!("Tap.n{n}"), "0");
        Moment {
            drivers: NonEmpty::new(cause.clone(), vec![]),
            cause,
            context: format!("S(n: \"{n}\")"),
            effect: format!("S(n: \"{}\")", n + 1),
            approved,
        }
    }

    #[test]
    fn only_approved_moments_are_exported() {
        let timeline = Timeline::from_parts(
            vec![moment(0, true), moment(1, false), moment(2, true)],
            None,
        );
        let fixtures = export_approved(&timeline);
        let contexts: Vec<_> = fixtures.iter().map(|f| f.context.as_str()).collect();
        assert_eq!(contexts, vec!["S(n: \"0\")", "S(n: \"2\")"]);
    }

    #[test]
    fn fixtures_carry_no_approval_flag() {
        let fixture = Fixture::from(&moment(0, true));
        let value = serde_json::to_value(&fixture).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["cause", "context", "drivers", "effect"]);
    }

    #[test]
    fn timeline_file_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("timeline.json");
        let timeline = Timeline::from_parts(vec![moment(0, true), moment(1, false)], Some(1));

        write_timeline(&path, &timeline).unwrap();
        assert_eq!(read_timeline(&path).unwrap(), timeline);
    }

    #[test]
    fn missing_file_reports_its_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.json");
        match read_timeline(&path) {
            Err(ExportError::Io { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"selectedIndex": "", "events": "#).unwrap();
        assert!(matches!(
            read_timeline(&path),
            Err(ExportError::Deserialize { .. })
        ));
    }

    #[test]
    fn malformed_event_is_dropped_on_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.json");
        let good = serde_json::to_value(moment(0, false)).unwrap();
        let raw = serde_json::json!({"selectedIndex": "", "events": [{"drivers": []}, good]});
        std::fs::write(&path, raw.to_string()).unwrap();

        let timeline = read_timeline(&path).unwrap();
        assert_eq!(timeline.events(), &[moment(0, false)]);
    }
}
