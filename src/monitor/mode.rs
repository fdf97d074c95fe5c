use std::fmt;

use serde::{Deserialize, Serialize};

use crate::describe::{DecodeError, Describe, Node, Restore};

/// How the monitor treats inbound and outbound traffic.
///
/// Only `Recording` appends inbound moments; the two sending modes mirror
/// the selected moment back to the monitored application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventHandlingState {
    #[default]
    #[serde(alias = "play")]
    Playing,
    #[serde(alias = "events")]
    PlayingSendingEvents,
    #[serde(alias = "effects")]
    PlayingSendingEffects,
    #[serde(alias = "record")]
    Recording,
}

impl EventHandlingState {
    pub const ALL: [EventHandlingState; 4] = [
        EventHandlingState::Playing,
        EventHandlingState::PlayingSendingEvents,
        EventHandlingState::PlayingSendingEffects,
        EventHandlingState::Recording,
    ];

    /// Next mode in the cycle, wrapping around.
    pub fn next(self) -> Self {
        match self {
            EventHandlingState::Playing => EventHandlingState::PlayingSendingEvents,
            EventHandlingState::PlayingSendingEvents => EventHandlingState::PlayingSendingEffects,
            EventHandlingState::PlayingSendingEffects => EventHandlingState::Recording,
            EventHandlingState::Recording => EventHandlingState::Playing,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventHandlingState::Playing => "playing",
            EventHandlingState::PlayingSendingEvents => "playingSendingEvents",
            EventHandlingState::PlayingSendingEffects => "playingSendingEffects",
            EventHandlingState::Recording => "recording",
        }
    }

    /// Parse a mode name or its short alias.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "playing" | "play" => Some(EventHandlingState::Playing),
            "playingsendingevents" | "events" => Some(EventHandlingState::PlayingSendingEvents),
            "playingsendingeffects" | "effects" => Some(EventHandlingState::PlayingSendingEffects),
            "recording" | "record" => Some(EventHandlingState::Recording),
            _ => None,
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, EventHandlingState::Recording)
    }
}

impl fmt::Display for EventHandlingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Describe for EventHandlingState {
    fn describe(&self) -> Node {
        Node::variant("EventHandlingState", self.as_str())
    }
}

impl Restore for EventHandlingState {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        let (case, _) = node.as_variant("EventHandlingState")?;
        EventHandlingState::ALL
            .into_iter()
            .find(|mode| mode.as_str() == case)
            .ok_or_else(|| DecodeError::unknown_case("EventHandlingState", case))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_cycle_back_to_playing() {
        let mut mode = EventHandlingState::Playing;
        let mut seen = vec![mode];
        for _ in 0..4 {
            mode = mode.next();
            seen.push(mode);
        }
        assert_eq!(seen[..4], EventHandlingState::ALL);
        assert_eq!(seen[4], EventHandlingState::Playing);
    }

    #[test]
    fn parse_accepts_names_and_aliases() {
        for mode in EventHandlingState::ALL {
            assert_eq!(EventHandlingState::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(
            EventHandlingState::parse("Record"),
            Some(EventHandlingState::Recording)
        );
        assert_eq!(EventHandlingState::parse("pause"), None);
    }

    #[test]
    fn serde_uses_camel_case_names() {
        let json = serde_json::to_string(&EventHandlingState::PlayingSendingEffects).unwrap();
        assert_eq!(json, "\"playingSendingEffects\"");
        let mode: EventHandlingState = serde_json::from_str("\"record\"").unwrap();
        assert_eq!(mode, EventHandlingState::Recording);
    }
}
