//! Waiting on the remote event log.
//!
//! An [`EventWaiter`] watches one `(entity type, entity id, action)` tuple.
//! It seeds an [`EventLedger`] with whatever the log already holds, so the
//! first unseen record after a mutation is the event that mutation produced.

use std::time::Duration;

use converge_core::{
    Budget, ConvergeError, EntityId, EventAction, EventFilter, EventRecord, RemoteStore,
    ResourceKind, Settings,
};

use crate::ledger::EventLedger;
use crate::poll::PollCondition;

/// Poll intervals used by an [`EventWaiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitIntervals {
    /// Between event-log page fetches.
    pub event: Duration,
    /// Between single-event re-reads; shorter than a typical operation.
    pub terminal: Duration,
}

impl Default for WaitIntervals {
    fn default() -> Self {
        Self {
            event: Duration::from_secs(1),
            terminal: Duration::from_millis(500),
        }
    }
}

impl From<&Settings> for WaitIntervals {
    fn from(settings: &Settings) -> Self {
        Self {
            event: settings.event_poll_interval(),
            terminal: settings.terminal_poll_interval(),
        }
    }
}

/// How an awaited operation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOutcome {
    /// `finished` or `notification`.
    Completed(EventRecord),
    /// `failed`.
    Failed(EventRecord),
}

impl TerminalOutcome {
    pub fn record(&self) -> &EventRecord {
        match self {
            TerminalOutcome::Completed(r) | TerminalOutcome::Failed(r) => r,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TerminalOutcome::Completed(_))
    }

    /// `Failed` becomes [`ConvergeError::EventFailed`].
    pub fn into_result(self) -> Result<EventRecord, ConvergeError> {
        match self {
            TerminalOutcome::Completed(r) => Ok(r),
            TerminalOutcome::Failed(r) => Err(ConvergeError::EventFailed {
                event: r.id,
                action: r.action,
            }),
        }
    }
}

/// Waits for new events and for events to reach a terminal status.
pub struct EventWaiter<'a> {
    store: &'a dyn RemoteStore,
    filter: EventFilter,
    ledger: EventLedger,
    event_poll: PollCondition,
    terminal_poll: PollCondition,
}

impl<'a> EventWaiter<'a> {
    /// Build a waiter. When `entity_id` is known the ledger is seeded with the
    /// current first page of matching events; otherwise it starts empty and
    /// [`EventWaiter::set_entity_id`] binds the id once it exists.
    pub fn new(
        store: &'a dyn RemoteStore,
        entity_type: impl Into<ResourceKind>,
        entity_id: Option<EntityId>,
        action: impl Into<EventAction>,
        intervals: WaitIntervals,
    ) -> Result<Self, ConvergeError> {
        let filter = EventFilter::new(entity_type, entity_id, action);
        let ledger = match entity_id {
            Some(_) => EventLedger::seeded(store.list_events(&filter)?),
            None => EventLedger::new(),
        };
        tracing::debug!(
            "event waiter for {} {:?} seeded with {} record(s)",
            filter.action,
            filter.entity_id,
            ledger.len()
        );
        Ok(Self {
            store,
            filter,
            ledger,
            event_poll: PollCondition::new(intervals.event),
            terminal_poll: PollCondition::new(intervals.terminal),
        })
    }

    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    pub fn ledger(&self) -> &EventLedger {
        &self.ledger
    }

    /// Bind the entity id after the entity has been created.
    pub fn set_entity_id(&mut self, id: EntityId) {
        self.filter.entity_id = Some(id);
    }

    /// Fetch the filtered page once and return the first unseen record,
    /// merging it into the ledger.
    pub fn poll_once(&mut self) -> Result<Option<EventRecord>, ConvergeError> {
        let page = self.store.list_events(&self.filter)?;
        for record in page {
            if !self.filter.matches(&record) || self.ledger.has_seen(record.id) {
                continue;
            }
            self.ledger.merge(&record);
            return Ok(Some(record));
        }
        Ok(None)
    }

    /// Block until an event not yet in the ledger appears.
    pub fn wait_for_next_event(&mut self, budget: &Budget) -> Result<EventRecord, ConvergeError> {
        if self.filter.entity_id.is_none() {
            tracing::debug!("waiting for {} without an entity id", self.filter.action);
        }
        let poll = self.event_poll;
        let what = format!("next {} event", self.filter.action);
        let record = poll.until(budget, &what, || self.poll_once())?;
        tracing::debug!("observed event {} ({})", record.id, record.status);
        Ok(record)
    }

    /// Block until `event` reaches a terminal status.
    pub fn wait_for_terminal(
        &self,
        event: &EventRecord,
        budget: &Budget,
    ) -> Result<TerminalOutcome, ConvergeError> {
        let what = format!("event {} ({}) to finish", event.id, event.action);
        let record = self.terminal_poll.until(budget, &what, || {
            let current = self.store.get_event(event.id)?;
            Ok(current.filter(|r| r.status.is_terminal()))
        })?;
        if record.status.is_failure() {
            tracing::warn!("event {} ({}) failed", record.id, record.action);
            return Ok(TerminalOutcome::Failed(record));
        }
        Ok(TerminalOutcome::Completed(record))
    }

    /// Wait for the next event and then for it to finish, both drawing from
    /// the same budget.
    pub fn wait_for_next_event_finished(
        &mut self,
        budget: &Budget,
    ) -> Result<TerminalOutcome, ConvergeError> {
        let event = self.wait_for_next_event(budget)?;
        self.wait_for_terminal(&event, budget)
    }
}
