use serde::{Deserialize, Serialize};

use crate::describe::{DecodeError, Describe, Node, Restore};

/// "Who did what": one driver's identity and its latest action, as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DriverSnapshot {
    /// Driver kind (e.g. `peer`, `console`)
    pub label: String,
    /// Textual rendering of the action
    pub action: String,
    /// Ordinal of the driver within its composition
    pub id: String,
}

impl DriverSnapshot {
    pub fn new(label: impl Into<String>, action: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: action.into(),
            id: id.into(),
        }
    }
}

/// Returned when a [`NonEmpty`] is built from an empty list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("list must contain at least one element")]
pub struct EmptyListError;

/// A list that always holds at least one element.
///
/// Decoding an empty JSON array into this type fails, which is what rejects
/// moments with an empty driver roster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<T>", into = "Vec<T>")]
#[serde(bound(
    serialize = "T: Serialize + Clone",
    deserialize = "T: Deserialize<'de>"
))]
pub struct NonEmpty<T>(Vec<T>);

impl<T> NonEmpty<T> {
    pub fn new(head: T, tail: Vec<T>) -> Self {
        let mut items = Vec::with_capacity(tail.len() + 1);
        items.push(head);
        items.extend(tail);
        Self(items)
    }

    pub fn first(&self) -> &T {
        &self.0[0]
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; present for API symmetry with `Vec`.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.0
    }
}

impl<T> TryFrom<Vec<T>> for NonEmpty<T> {
    type Error = EmptyListError;

    fn try_from(items: Vec<T>) -> Result<Self, Self::Error> {
        if items.is_empty() {
            Err(EmptyListError)
        } else {
            Ok(Self(items))
        }
    }
}

impl<T> From<NonEmpty<T>> for Vec<T> {
    fn from(list: NonEmpty<T>) -> Self {
        list.0
    }
}

impl<'a, T> IntoIterator for &'a NonEmpty<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Immutable causal record of one state transition.
///
/// `context` and `effect` hold the [`Describe`] text of the aggregate state
/// before and after the reduction triggered by `cause`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Moment {
    pub drivers: NonEmpty<DriverSnapshot>,
    pub cause: DriverSnapshot,
    pub context: String,
    pub effect: String,
    #[serde(rename = "isApproved", alias = "approved", default)]
    pub approved: bool,
}

impl Describe for DriverSnapshot {
    fn describe(&self) -> Node {
        Node::record("DriverSnapshot")
            .field("label", &self.label)
            .field("action", &self.action)
            .field("id", &self.id)
            .build()
    }
}

impl Restore for DriverSnapshot {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        let fields = node.as_record("DriverSnapshot")?;
        Ok(Self {
            label: fields.get("label")?,
            action: fields.get("action")?,
            id: fields.get("id")?,
        })
    }
}

impl Describe for Moment {
    fn describe(&self) -> Node {
        Node::record("Moment")
            .node(
                "drivers",
                Node::List(self.drivers.iter().map(Describe::describe).collect()),
            )
            .field("cause", &self.cause)
            .field("context", &self.context)
            .field("effect", &self.effect)
            .field("approved", &self.approved)
            .build()
    }
}

impl Restore for Moment {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        let fields = node.as_record("Moment")?;
        let drivers: Vec<DriverSnapshot> = fields.get("drivers")?;
        let drivers = NonEmpty::try_from(drivers).map_err(|e| DecodeError::InvalidLeaf {
            value: "drivers".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            drivers,
            cause: fields.get("cause")?,
            context: fields.get("context")?,
            effect: fields.get("effect")?,
            approved: fields.get("approved")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn moment_json() -> serde_json::Value {
        json!({
            "drivers": [{"label": "console", "action": "Cmd.next", "id": "0"}],
            "cause": {"label": "console", "action": "Cmd.next", "id": "0"},
            "context": "Model()",
            "effect": "Model()"
        })
    }

    #[test]
    fn approval_defaults_to_false() {
        let moment: Moment = serde_json::from_value(moment_json()).unwrap();
        assert!(!moment.approved);
    }

    #[test]
    fn legacy_approved_key_is_accepted() {
        let mut value = moment_json();
        value["approved"] = json!(true);
        let moment: Moment = serde_json::from_value(value).unwrap();
        assert!(moment.approved);
    }

    #[test]
    fn empty_roster_fails_to_decode() {
        let mut value = moment_json();
        value["drivers"] = json!([]);
        let err = serde_json::from_value::<Moment>(value).unwrap_err();
        assert!(err.to_string().contains("at least one element"));
    }

    #[test]
    fn approval_is_persisted_under_is_approved() {
        let mut moment: Moment = serde_json::from_value(moment_json()).unwrap();
        moment.approved = true;
        let value = serde_json::to_value(&moment).unwrap();
        assert_eq!(value["isApproved"], json!(true));
    }

    #[test]
    fn empty_roster_fails_to_restore() {
        let node = Node::record("Moment")
            .node("drivers", Node::List(vec![]))
            .field("cause", &DriverSnapshot::new("a", "b", "0"))
            .field("context", &String::new())
            .field("effect", &String::new())
            .field("approved", &false)
            .build();
        assert!(Moment::restore(&node).is_err());
    }
}
