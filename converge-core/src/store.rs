//! Collaborator interfaces the reconciliation core consumes.
//!
//! Both traits take `&self`: a single pass hands the same store to the
//! reconcilers and the event waiter, so implementations keep their own
//! interior mutability.

use std::cell::RefCell;

use crate::error::StoreError;
use crate::types::{
    Attributes, Collection, EventFilter, EventId, EventRecord, RemoteObject, ResourceRef,
};

/// Synchronous access to the backing store of remote resources.
pub trait RemoteStore {
    /// Fetch one object; `Ok(None)` when it does not exist.
    fn get(&self, reference: &ResourceRef) -> Result<Option<RemoteObject>, StoreError>;

    /// Observed members of a collection, in the store's stable order.
    fn list(&self, collection: &Collection) -> Result<Vec<RemoteObject>, StoreError>;

    fn create(
        &self,
        collection: &Collection,
        payload: &Attributes,
    ) -> Result<RemoteObject, StoreError>;

    /// Apply only the given fields; everything else is left as is.
    fn update(
        &self,
        reference: &ResourceRef,
        fields: &Attributes,
    ) -> Result<RemoteObject, StoreError>;

    fn delete(&self, reference: &ResourceRef) -> Result<(), StoreError>;

    /// Most recent page of matching events, ordered oldest to newest.
    fn list_events(&self, filter: &EventFilter) -> Result<Vec<EventRecord>, StoreError>;

    /// Re-read a single event; `Ok(None)` when the log does not know it.
    fn get_event(&self, id: EventId) -> Result<Option<EventRecord>, StoreError>;
}

/// Sink for human-readable descriptions of applied mutations.
pub trait ActionLog {
    fn record(&self, description: &str);
}

/// [`ActionLog`] that keeps every entry, for reports and tests.
#[derive(Debug, Default)]
pub struct RecordedActions {
    entries: RefCell<Vec<String>>,
}

impl RecordedActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl ActionLog for RecordedActions {
    fn record(&self, description: &str) {
        tracing::info!("{description}");
        self.entries.borrow_mut().push(description.to_string());
    }
}

/// [`ActionLog`] that only emits tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingActionLog;

impl ActionLog for TracingActionLog {
    fn record(&self, description: &str) {
        tracing::info!("{description}");
    }
}
