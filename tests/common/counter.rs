//! A counter app used as the monitored side in integration tests.

use rewind::describe::{payload, DecodeError, Describe, Node, Restore};
use rewind::driver::{ChannelDriver, ChannelRemote};
use rewind::lens::{compose, Composition};
use rewind::DriverKind;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counter {
    pub count: i64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tap {
    Increment,
    Decrement,
    Rename(String),
}

pub fn reduce(state: &Counter, action: Tap) -> Counter {
    let mut next = state.clone();
    match action {
        Tap::Increment => next.count += 1,
        Tap::Decrement => next.count -= 1,
        Tap::Rename(label) => next.label = label,
    }
    next
}

/// A recording counter app driven through the returned remote.
pub fn counter_app() -> (Composition<Counter>, ChannelRemote<Counter, Tap>) {
    let (screen, remote) = ChannelDriver::new(DriverKind::Screen);
    let composition = compose(Counter::clone, screen, reduce)
        .prefixed(Counter::default())
        .recording();
    (composition, remote)
}

impl Describe for Counter {
    fn describe(&self) -> Node {
        Node::record("Counter")
            .field("count", &self.count)
            .field("label", &self.label)
            .build()
    }
}

impl Restore for Counter {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        let fields = node.as_record("Counter")?;
        Ok(Self {
            count: fields.get("count")?,
            label: fields.get("label")?,
        })
    }
}

impl Describe for Tap {
    fn describe(&self) -> Node {
        match self {
            Tap::Increment => Node::variant("Tap", "increment"),
            Tap::Decrement => Node::variant("Tap", "decrement"),
            Tap::Rename(label) => Node::variant_with("Tap", "rename", label.describe()),
        }
    }
}

impl Restore for Tap {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        match node.as_variant("Tap")? {
            ("increment", _) => Ok(Tap::Increment),
            ("decrement", _) => Ok(Tap::Decrement),
            ("rename", value) => Ok(Tap::Rename(String::restore(payload(
                "Tap", "rename", value,
            )?)?)),
            (case, _) => Err(DecodeError::unknown_case("Tap", case)),
        }
    }
}
