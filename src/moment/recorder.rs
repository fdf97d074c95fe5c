use crate::describe::{print, Node};
use crate::driver::DriverKind;
use crate::moment::{DriverSnapshot, Moment, NonEmpty};

/// Builds a [`Moment`] for every reduction of a composition.
///
/// The recorder remembers the latest action text of each driver so the roster
/// of every moment reflects what all drivers last did, not only the cause.
#[derive(Debug, Clone)]
pub struct MomentRecorder {
    roster: Vec<DriverKind>,
    last_actions: Vec<String>,
}

impl MomentRecorder {
    /// `roster` lists the composed drivers in ordinal order.
    pub fn new(roster: Vec<DriverKind>) -> Self {
        let idle = print(&Node::Nil);
        let last_actions = vec![idle; roster.len()];
        Self {
            roster,
            last_actions,
        }
    }

    pub fn len(&self) -> usize {
        self.roster.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    /// Record that driver `cause` produced `action` and moved the state from
    /// `context` to `effect`.
    ///
    /// Returns `None` when `cause` is not part of the roster.
    pub fn record(
        &mut self,
        cause: usize,
        action: String,
        context: String,
        effect: String,
    ) -> Option<Moment> {
        let Some(slot) = self.last_actions.get_mut(cause) else {
            tracing::warn!(cause, roster = self.roster.len(), "Action from unknown driver");
            return None;
        };
        *slot = action;

        let snapshots: Vec<DriverSnapshot> = self
            .roster
            .iter()
            .zip(&self.last_actions)
            .enumerate()
            .map(|(id, (kind, action))| DriverSnapshot::new(kind.as_str(), action, id.to_string()))
            .collect();
        let cause = snapshots.get(cause)?.clone();
        let drivers = NonEmpty::try_from(snapshots).ok()?;

        Some(Moment {
            drivers,
            cause,
            context,
            effect,
            approved: false,
        })
    }
}
