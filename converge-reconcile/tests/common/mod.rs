#![allow(dead_code)]

use std::cell::Cell;
use std::time::Duration;

use serde_json::Value;

use converge_core::{
    Attributes, Collection, DesiredAttributeSet, EventFilter, EventId, EventRecord, RemoteObject,
    RemoteStore, ResourceRef, StoreError,
};
use converge_events::WaitIntervals;
use converge_store::MemoryStore;

pub fn attrs(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        _ => panic!("object literal expected"),
    }
}

pub fn desired(value: Value) -> DesiredAttributeSet {
    DesiredAttributeSet::try_from(value).expect("object literal expected")
}

pub fn fast() -> WaitIntervals {
    WaitIntervals {
        event: Duration::from_millis(5),
        terminal: Duration::from_millis(5),
    }
}

/// Store whose object reads fail once any update has been accepted.
pub struct UnreadableAfterUpdate<'a> {
    inner: &'a MemoryStore,
    updated: Cell<bool>,
}

impl<'a> UnreadableAfterUpdate<'a> {
    pub fn new(inner: &'a MemoryStore) -> Self {
        Self {
            inner,
            updated: Cell::new(false),
        }
    }
}

impl RemoteStore for UnreadableAfterUpdate<'_> {
    fn get(&self, reference: &ResourceRef) -> Result<Option<RemoteObject>, StoreError> {
        if self.updated.get() {
            return Err(StoreError::Transport("connection reset".to_string()));
        }
        self.inner.get(reference)
    }

    fn list(&self, collection: &Collection) -> Result<Vec<RemoteObject>, StoreError> {
        self.inner.list(collection)
    }

    fn create(
        &self,
        collection: &Collection,
        payload: &Attributes,
    ) -> Result<RemoteObject, StoreError> {
        self.inner.create(collection, payload)
    }

    fn update(
        &self,
        reference: &ResourceRef,
        fields: &Attributes,
    ) -> Result<RemoteObject, StoreError> {
        let updated = self.inner.update(reference, fields)?;
        self.updated.set(true);
        Ok(updated)
    }

    fn delete(&self, reference: &ResourceRef) -> Result<(), StoreError> {
        self.inner.delete(reference)
    }

    fn list_events(&self, filter: &EventFilter) -> Result<Vec<EventRecord>, StoreError> {
        self.inner.list_events(filter)
    }

    fn get_event(&self, id: EventId) -> Result<Option<EventRecord>, StoreError> {
        self.inner.get_event(id)
    }
}
