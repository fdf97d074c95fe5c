use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::describe::{DecodeError, Describe, Node, Restore};
use crate::moment::{DriverSnapshot, Moment};

const CONTROL_KEY: &str = "action";
const DISCONNECT: &str = "disconnect";

/// One message on the peer link: a single JSON object.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    /// `{"action": "disconnect"}`: tear the session down.
    Disconnect,
    Payload(Value),
}

impl WireMessage {
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let object: Map<String, Value> = serde_json::from_slice(bytes)?;
        let is_disconnect = object.len() == 1
            && object.get(CONTROL_KEY).and_then(Value::as_str) == Some(DISCONNECT);
        if is_disconnect {
            Ok(WireMessage::Disconnect)
        } else {
            Ok(WireMessage::Payload(Value::Object(object)))
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let value = match self {
            WireMessage::Disconnect => json!({ CONTROL_KEY: DISCONNECT }),
            WireMessage::Payload(value) => value.clone(),
        };
        value.to_string().into_bytes()
    }
}

/// Payload carrying an edited or mirrored effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EffectPayload {
    pub effect: String,
}

/// Application payloads exchanged between monitor and monitored app.
///
/// Moments flow from the app to the monitor; events and effects flow back
/// while the monitor plays a timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SyncPayload {
    Moment(Moment),
    Event(DriverSnapshot),
    Effect(EffectPayload),
}

impl SyncPayload {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn to_message(&self) -> Result<WireMessage, serde_json::Error> {
        serde_json::to_value(self).map(WireMessage::Payload)
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl Describe for EffectPayload {
    fn describe(&self) -> Node {
        Node::record("EffectPayload")
            .field("effect", &self.effect)
            .build()
    }
}

impl Restore for EffectPayload {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        Ok(Self {
            effect: node.as_record("EffectPayload")?.get("effect")?,
        })
    }
}

impl Describe for SyncPayload {
    fn describe(&self) -> Node {
        match self {
            SyncPayload::Moment(moment) => Node::variant_with("Sync", "moment", moment.describe()),
            SyncPayload::Event(snapshot) => Node::variant_with("Sync", "event", snapshot.describe()),
            SyncPayload::Effect(effect) => Node::variant_with("Sync", "effect", effect.describe()),
        }
    }
}

impl Restore for SyncPayload {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        let (case, body) = node.as_variant("Sync")?;
        let body = crate::describe::payload("Sync", case, body)?;
        match case {
            "moment" => Moment::restore(body).map(SyncPayload::Moment),
            "event" => DriverSnapshot::restore(body).map(SyncPayload::Event),
            "effect" => EffectPayload::restore(body).map(SyncPayload::Effect),
            other => Err(DecodeError::unknown_case("Sync", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnect_control_is_recognized() {
        let message = WireMessage::decode(br#"{"action":"disconnect"}"#).unwrap();
        assert_eq!(message, WireMessage::Disconnect);
        assert_eq!(
            WireMessage::decode(&WireMessage::Disconnect.encode()).unwrap(),
            WireMessage::Disconnect
        );
    }

    #[test]
    fn other_objects_are_payloads() {
        let message = WireMessage::decode(br#"{"action":"disconnect","extra":1}"#).unwrap();
        assert!(matches!(message, WireMessage::Payload(_)));
    }

    #[test]
    fn non_objects_are_rejected() {
        assert!(WireMessage::decode(b"[1,2]").is_err());
        assert!(WireMessage::decode(b"not json").is_err());
    }

    #[test]
    fn payload_kind_is_inferred_from_shape() {
        let event = SyncPayload::from_value(json!({"label": "screen", "action": "Tap.a", "id": "0"}));
        assert!(matches!(event, Ok(SyncPayload::Event(_))));

        let effect = SyncPayload::from_value(json!({"effect": "S()"}));
        assert_eq!(
            effect.unwrap(),
            SyncPayload::Effect(EffectPayload {
                effect: "S()".to_string()
            })
        );
    }

    #[test]
    fn moment_with_empty_roster_matches_nothing() {
        let value = json!({
            "drivers": [],
            "cause": {"label": "screen", "action": "Tap.a", "id": "0"},
            "context": "S()",
            "effect": "S()"
        });
        assert!(SyncPayload::from_value(value).is_err());
    }
}
