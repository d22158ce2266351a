//! Ordered log of clinical events.
//!
//! Entries are kept newest-first: index 0 is the most recently logged event.
//! Records are only ever prepended or removed whole.

use crate::{EventId, EventKind, EventRecord};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct EventLog {
    entries: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recently logged event
    pub fn latest(&self) -> Option<&EventRecord> {
        self.entries.first()
    }

    pub fn latest_kind(&self) -> Option<EventKind> {
        self.latest().map(|e| e.kind)
    }

    pub fn get(&self, id: EventId) -> Option<&EventRecord> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: EventId) -> bool {
        self.get(id).is_some()
    }

    /// Newest-first iteration
    pub fn iter(&self) -> impl Iterator<Item = &EventRecord> {
        self.entries.iter()
    }

    /// Oldest-first iteration, the order folds run in
    pub fn iter_chronological(&self) -> impl Iterator<Item = &EventRecord> {
        self.entries.iter().rev()
    }

    pub fn push(&mut self, record: EventRecord) {
        self.entries.insert(0, record);
    }

    /// Remove the record with `id`, returning it if it was present
    pub fn remove(&mut self, id: EventId) -> Option<EventRecord> {
        let idx = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(idx))
    }

    /// Next id for an event logged at `now_millis`.
    ///
    /// Never collides with or sorts before an existing entry, even when the
    /// wall clock repeats a millisecond or steps backwards.
    pub fn next_id(&self, now_millis: i64) -> EventId {
        let clock = u64::try_from(now_millis).unwrap_or(0);
        match self.entries.iter().map(|e| e.id.0).max() {
            Some(max) if max >= clock => EventId(max + 1),
            _ => EventId(clock),
        }
    }

    pub fn to_vec(&self) -> Vec<EventRecord> {
        self.entries.clone()
    }
}

impl From<Vec<EventRecord>> for EventLog {
    fn from(entries: Vec<EventRecord>) -> Self {
        Self { entries }
    }
}
