//! Ordered, scrubbable history of recorded moments.

mod file;

pub use file::TimelineFile;

use crate::describe::{DecodeError, Describe, Node, Restore};
use crate::moment::Moment;

/// Errors for timeline operations whose precondition did not hold.
///
/// Every such operation leaves the timeline untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimelineError {
    #[error("no event at index {index} (timeline has {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("no event is selected")]
    NoSelection,
}

/// Recorded moments plus the scrub cursor.
///
/// `selected_index` is always a valid index into `events` when present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    events: Vec<Moment>,
    selected_index: Option<usize>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a timeline, dropping a cursor that does not point at an event.
    pub fn from_parts(events: Vec<Moment>, selected_index: Option<usize>) -> Self {
        let selected_index = selected_index.filter(|&index| index < events.len());
        Self {
            events,
            selected_index,
        }
    }

    pub fn events(&self) -> &[Moment] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected_index
    }

    pub fn selected(&self) -> Option<&Moment> {
        self.selected_index.and_then(|index| self.events.get(index))
    }

    pub fn approved_count(&self) -> usize {
        self.events.iter().filter(|moment| moment.approved).count()
    }

    /// Push a moment. While `follow` is set (recording), the cursor jumps to it.
    pub fn append(&mut self, moment: Moment, follow: bool) {
        self.events.push(moment);
        if follow {
            self.selected_index = Some(self.events.len() - 1);
        }
    }

    /// Move the cursor. Out-of-range indices are ignored.
    pub fn scroll_to(&mut self, index: usize) {
        if index < self.events.len() {
            self.selected_index = Some(index);
        } else {
            tracing::debug!(index, len = self.events.len(), "Ignoring scroll past timeline end");
        }
    }

    pub fn select_next(&mut self) {
        match self.selected_index {
            Some(index) => self.scroll_to(index + 1),
            None => self.scroll_to(0),
        }
    }

    pub fn select_prev(&mut self) {
        match self.selected_index {
            Some(index) if index > 0 => self.scroll_to(index - 1),
            Some(_) => {}
            None if !self.events.is_empty() => self.scroll_to(self.events.len() - 1),
            None => {}
        }
    }

    /// Set the approval flag of one moment; nothing else changes.
    pub fn toggle_approval(&mut self, index: usize, approved: bool) -> Result<(), TimelineError> {
        let len = self.events.len();
        let moment = self
            .events
            .get_mut(index)
            .ok_or(TimelineError::IndexOutOfRange { index, len })?;
        moment.approved = approved;
        Ok(())
    }

    /// Replace the effect of the selected moment with an edited rendering.
    pub fn edit_pending_effect(&mut self, effect: String) -> Result<(), TimelineError> {
        let moment = self
            .selected_index
            .and_then(|index| self.events.get_mut(index))
            .ok_or(TimelineError::NoSelection)?;
        moment.effect = effect;
        Ok(())
    }

    pub fn clear_all(&mut self) {
        self.events.clear();
        self.selected_index = None;
    }
}

impl Describe for Timeline {
    fn describe(&self) -> Node {
        Node::record("Timeline")
            .field("events", &self.events)
            .field("selectedIndex", &self.selected_index)
            .build()
    }
}

impl Restore for Timeline {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        let fields = node.as_record("Timeline")?;
        Ok(Self::from_parts(
            fields.get("events")?,
            fields.get("selectedIndex")?,
        ))
    }
}
