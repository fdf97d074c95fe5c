use serde::{Deserialize, Serialize};

use super::Timeline;
use crate::moment::Moment;

/// On-disk form of a [`Timeline`]: `{"selectedIndex": int | "", "events": [...]}`.
///
/// Events that fail to decode are dropped with a warning; the selection is
/// shifted so it keeps pointing at the same surviving event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawTimelineFile")]
pub struct TimelineFile {
    #[serde(rename = "selectedIndex", with = "selected_index")]
    pub selected_index: Option<usize>,
    pub events: Vec<Moment>,
}

#[derive(Deserialize)]
struct RawTimelineFile {
    #[serde(rename = "selectedIndex", with = "selected_index", default)]
    selected_index: Option<usize>,
    #[serde(default)]
    events: Vec<serde_json::Value>,
}

impl From<RawTimelineFile> for TimelineFile {
    fn from(raw: RawTimelineFile) -> Self {
        let mut events = Vec::with_capacity(raw.events.len());
        let mut selected_index = raw.selected_index;

        for (index, value) in raw.events.into_iter().enumerate() {
            match serde_json::from_value::<Moment>(value) {
                Ok(moment) => events.push(moment),
                Err(err) => {
                    tracing::warn!(index, error = %err, "Dropping malformed event from timeline file");
                    selected_index = match raw.selected_index {
                        Some(selected) if selected == index => None,
                        Some(selected) if selected > index => selected_index.map(|s| s - 1),
                        _ => selected_index,
                    };
                }
            }
        }

        Self {
            selected_index,
            events,
        }
    }
}

impl From<&Timeline> for TimelineFile {
    fn from(timeline: &Timeline) -> Self {
        Self {
            selected_index: timeline.selected_index,
            events: timeline.events.clone(),
        }
    }
}

impl From<TimelineFile> for Timeline {
    fn from(file: TimelineFile) -> Self {
        if file.selected_index.is_some_and(|index| index >= file.events.len()) {
            tracing::warn!(
                index = ?file.selected_index,
                len = file.events.len(),
                "Dropping out-of-range selection from timeline file"
            );
        }
        Timeline::from_parts(file.events, file.selected_index)
    }
}

/// No selection is written as `""`; `null` and numeric strings are accepted.
mod selected_index {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<usize>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(index) => serializer.serialize_u64(*index as u64),
            None => serializer.serialize_str(""),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Index(usize),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<usize>, D::Error> {
        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Index(index)) => Ok(Some(index)),
            Some(Raw::Text(text)) if text.trim().is_empty() => Ok(None),
            Some(Raw::Text(text)) => text
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("invalid selectedIndex `{text}`"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event() -> serde_json::Value {
        json!({
            "drivers": [{"label": "peer", "action": "a", "id": "0"}],
            "cause": {"label": "peer", "action": "a", "id": "0"},
            "context": "S()",
            "effect": "S()",
            "isApproved": true
        })
    }

    #[test]
    fn empty_selection_is_written_as_empty_string() {
        let file = TimelineFile::default();
        let value = serde_json::to_value(&file).unwrap();
        assert_eq!(value, json!({"selectedIndex": "", "events": []}));
    }

    #[test]
    fn selection_accepts_int_string_and_null() {
        for (raw, expected) in [(json!(0), Some(0)), (json!(""), None), (json!(null), None)] {
            let file: TimelineFile =
                serde_json::from_value(json!({"selectedIndex": raw, "events": [event()]})).unwrap();
            assert_eq!(file.selected_index, expected);
        }
    }

    #[test]
    fn garbage_selection_is_rejected() {
        let result = serde_json::from_value::<TimelineFile>(json!({"selectedIndex": "x", "events": []}));
        assert!(result.is_err());
    }

    #[test]
    fn out_of_range_selection_is_dropped_on_load() {
        let file: TimelineFile =
            serde_json::from_value(json!({"selectedIndex": 4, "events": [event()]})).unwrap();
        let timeline = Timeline::from(file);
        assert_eq!(timeline.selected_index(), None);
        assert_eq!(timeline.len(), 1);
        assert!(timeline.events()[0].approved);
    }

    #[test]
    fn malformed_events_are_dropped_and_selection_follows() {
        let empty_roster = json!({
            "drivers": [],
            "cause": {"label": "peer", "action": "a", "id": "0"},
            "context": "S()",
            "effect": "S()"
        });
        let mut last = event();
        last["effect"] = json!("S(n: \"1\")");

        let file: TimelineFile = serde_json::from_value(json!({
            "selectedIndex": 2,
            "events": [event(), empty_roster, last.clone()]
        }))
        .unwrap();

        assert_eq!(file.events.len(), 2);
        assert_eq!(file.selected_index, Some(1));
        assert_eq!(file.events[1].effect, "S(n: \"1\")");
    }

    #[test]
    fn dropping_the_selected_event_clears_the_selection() {
        let file: TimelineFile = serde_json::from_value(json!({
            "selectedIndex": 0,
            "events": [{"cause": "nonsense"}, event()]
        }))
        .unwrap();

        assert_eq!(file.events.len(), 1);
        assert_eq!(file.selected_index, None);
    }

    #[test]
    fn timeline_survives_file_round_trip() {
        let file: TimelineFile =
            serde_json::from_value(json!({"selectedIndex": 0, "events": [event(), event()]})).unwrap();
        let timeline = Timeline::from(file.clone());
        assert_eq!(TimelineFile::from(&timeline), file);
    }
}
