//! Cache of already-observed event records for one waiter.

use std::collections::HashSet;

use converge_core::{EventId, EventRecord};

/// Ids of the event records a waiter has already seen.
///
/// Lives for one reconciliation pass and is never persisted. Inserts are
/// idempotent: a record whose id is known is ignored.
#[derive(Debug, Default, Clone)]
pub struct EventLedger {
    seen: HashSet<EventId>,
}

impl EventLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger pre-filled with the most recent page, oldest first.
    pub fn seeded(records: impl IntoIterator<Item = EventRecord>) -> Self {
        let mut ledger = Self::new();
        ledger.seed(records);
        ledger
    }

    pub fn seed(&mut self, records: impl IntoIterator<Item = EventRecord>) {
        for record in records {
            self.merge(&record);
        }
    }

    /// Record `record` as seen. Returns whether its id was new.
    pub fn merge(&mut self, record: &EventRecord) -> bool {
        self.seen.insert(record.id)
    }

    pub fn has_seen(&self, id: EventId) -> bool {
        self.seen.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
