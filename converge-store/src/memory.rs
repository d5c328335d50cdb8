//! In-memory [`RemoteStore`].
//!
//! Behaves like a small remote API: it assigns ids, keeps objects in creation
//! order, and appends one event per mutation. Events can be held in a
//! non-terminal status for a number of reads, scripted through an explicit
//! status sequence, and individual operations can be made to fail. Every call
//! is recorded in a journal so callers can assert which requests ran.

use std::cell::RefCell;
use std::collections::VecDeque;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use converge_core::{
    Attributes, Collection, EntityId, EventAction, EventFilter, EventId, EventRecord,
    EventStatus, OperationKind, RemoteObject, RemoteStore, ResourceKind, ResourceRef,
    StoreError,
};

/// Maximum number of events returned by one `list_events` call.
pub const EVENT_PAGE_SIZE: usize = 25;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Everything the store holds. Serializable so [`crate::FileStore`] can
/// persist it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    next_event_id: u64,
    /// Single-event reads after which a new event reports `finished`.
    #[serde(default)]
    event_latency: u32,
    #[serde(default)]
    objects: Vec<RemoteObject>,
    #[serde(default)]
    events: Vec<StoredEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredEvent {
    record: EventRecord,
    /// Statuses reported by the next `get_event` reads, in order.
    #[serde(default, skip_serializing_if = "VecDeque::is_empty")]
    pending: VecDeque<EventStatus>,
}

impl StoreState {
    pub fn objects(&self) -> &[RemoteObject] {
        &self.objects
    }

    pub fn events(&self) -> impl Iterator<Item = &EventRecord> {
        self.events.iter().map(|e| &e.record)
    }

    fn allocate_id(&mut self) -> EntityId {
        self.next_id += 1;
        EntityId(self.next_id)
    }

    fn position(&self, reference: &ResourceRef) -> Option<usize> {
        self.objects.iter().position(|o| &o.reference == reference)
    }

    fn append_event(
        &mut self,
        entity_type: ResourceKind,
        entity_id: EntityId,
        action: EventAction,
        status: EventStatus,
        pending: VecDeque<EventStatus>,
    ) -> EventRecord {
        self.next_event_id += 1;
        let record = EventRecord {
            id: EventId(self.next_event_id),
            entity_type,
            entity_id,
            action,
            status,
            created_at: Utc::now(),
        };
        self.events.push(StoredEvent {
            record: record.clone(),
            pending,
        });
        record
    }

    fn mutation_event(&mut self, reference: &ResourceRef, op: OperationKind) -> EventRecord {
        let action = EventAction(format!("{}_{}", reference.kind, op.as_str()));
        let (status, pending) = if self.event_latency == 0 {
            (EventStatus::Finished, VecDeque::new())
        } else {
            let mut pending: VecDeque<EventStatus> =
                std::iter::repeat(EventStatus::Started)
                    .take(self.event_latency as usize - 1)
                    .collect();
            pending.push_back(EventStatus::Finished);
            (EventStatus::Started, pending)
        };
        self.append_event(reference.kind.clone(), reference.id, action, status, pending)
    }
}

// ---------------------------------------------------------------------------
// Journal and failure injection
// ---------------------------------------------------------------------------

/// One request received by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Get(ResourceRef),
    List(Collection),
    Create(Collection, Attributes),
    /// Reference and the names of the fields sent.
    Update(ResourceRef, Vec<String>),
    Delete(ResourceRef),
    ListEvents(EventFilter),
    GetEvent(EventId),
}

impl StoreCall {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            StoreCall::Create(..) | StoreCall::Update(..) | StoreCall::Delete(..)
        )
    }
}

/// Makes matching writes fail with a status error.
#[derive(Debug, Clone, PartialEq)]
pub struct InjectedFailure {
    pub op: OperationKind,
    pub kind: ResourceKind,
    /// Only objects (or create payloads) whose field equals this value.
    pub matching: Option<(String, Value)>,
    pub status: u16,
    pub message: String,
}

impl InjectedFailure {
    pub fn new(op: OperationKind, kind: impl Into<ResourceKind>) -> Self {
        Self {
            op,
            kind: kind.into(),
            matching: None,
            status: 400,
            message: "injected failure".to_string(),
        }
    }

    pub fn matching(mut self, field: impl Into<String>, value: Value) -> Self {
        self.matching = Some((field.into(), value));
        self
    }

    fn applies(&self, op: OperationKind, kind: &ResourceKind, attributes: &Attributes) -> bool {
        if self.op != op || &self.kind != kind {
            return false;
        }
        match &self.matching {
            Some((field, value)) => attributes.get(field) == Some(value),
            None => true,
        }
    }

    fn to_error(&self) -> StoreError {
        StoreError::Status {
            status: self.status,
            message: self.message.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory remote store with a call journal.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RefCell<StoreState>,
    journal: RefCell<Vec<StoreCall>>,
    failures: RefCell<Vec<InjectedFailure>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: StoreState) -> Self {
        Self {
            state: RefCell::new(state),
            ..Self::default()
        }
    }

    /// New mutation events report `started` until the `reads`-th
    /// single-event read, which reports `finished`.
    pub fn with_event_latency(self, reads: u32) -> Self {
        self.state.borrow_mut().event_latency = reads;
        self
    }

    pub fn state(&self) -> StoreState {
        self.state.borrow().clone()
    }

    // -- seeding (not journaled, no events) ---------------------------------

    /// Insert an object directly, as if it already existed remotely.
    pub fn seed(&self, collection: &Collection, attributes: Attributes) -> RemoteObject {
        let mut state = self.state.borrow_mut();
        let id = state.allocate_id();
        let object = build_object(collection, id, attributes);
        state.objects.push(object.clone());
        object
    }

    /// Append an event record directly.
    pub fn seed_event(
        &self,
        entity_type: impl Into<ResourceKind>,
        entity_id: EntityId,
        action: impl Into<EventAction>,
        status: EventStatus,
    ) -> EventRecord {
        self.state.borrow_mut().append_event(
            entity_type.into(),
            entity_id,
            action.into(),
            status,
            VecDeque::new(),
        )
    }

    /// Statuses the next `get_event` reads of `id` will report, in order.
    pub fn script_event(&self, id: EventId, statuses: impl IntoIterator<Item = EventStatus>) {
        let mut state = self.state.borrow_mut();
        if let Some(event) = state.events.iter_mut().find(|e| e.record.id == id) {
            event.pending = statuses.into_iter().collect();
        }
    }

    pub fn fail(&self, failure: InjectedFailure) {
        self.failures.borrow_mut().push(failure);
    }

    pub fn clear_failures(&self) {
        self.failures.borrow_mut().clear();
    }

    // -- journal ------------------------------------------------------------

    pub fn calls(&self) -> Vec<StoreCall> {
        self.journal.borrow().clone()
    }

    pub fn count_calls(&self, predicate: impl Fn(&StoreCall) -> bool) -> usize {
        self.journal.borrow().iter().filter(|c| predicate(c)).count()
    }

    pub fn update_calls(&self) -> usize {
        self.count_calls(|c| matches!(c, StoreCall::Update(..)))
    }

    pub fn mutation_calls(&self) -> usize {
        self.count_calls(StoreCall::is_mutation)
    }

    pub fn clear_calls(&self) {
        self.journal.borrow_mut().clear();
    }

    fn log(&self, call: StoreCall) {
        self.journal.borrow_mut().push(call);
    }

    fn injected(
        &self,
        op: OperationKind,
        kind: &ResourceKind,
        attributes: &Attributes,
    ) -> Option<StoreError> {
        self.failures
            .borrow()
            .iter()
            .find(|f| f.applies(op, kind, attributes))
            .map(InjectedFailure::to_error)
    }
}

fn build_object(collection: &Collection, id: EntityId, mut attributes: Attributes) -> RemoteObject {
    attributes.insert("id".to_string(), Value::from(id.0));
    let reference = ResourceRef {
        kind: collection.kind.clone(),
        id,
        parent: collection.parent.clone().map(Box::new),
    };
    RemoteObject::new(reference, attributes)
}

fn not_found(reference: &ResourceRef) -> StoreError {
    StoreError::NotFound {
        reference: reference.to_string(),
    }
}

impl RemoteStore for MemoryStore {
    fn get(&self, reference: &ResourceRef) -> Result<Option<RemoteObject>, StoreError> {
        self.log(StoreCall::Get(reference.clone()));
        let state = self.state.borrow();
        Ok(state.objects.iter().find(|o| &o.reference == reference).cloned())
    }

    fn list(&self, collection: &Collection) -> Result<Vec<RemoteObject>, StoreError> {
        self.log(StoreCall::List(collection.clone()));
        let state = self.state.borrow();
        Ok(state
            .objects
            .iter()
            .filter(|o| collection.contains(&o.reference))
            .cloned()
            .collect())
    }

    fn create(
        &self,
        collection: &Collection,
        payload: &Attributes,
    ) -> Result<RemoteObject, StoreError> {
        self.log(StoreCall::Create(collection.clone(), payload.clone()));
        if let Some(err) = self.injected(OperationKind::Create, &collection.kind, payload) {
            return Err(err);
        }
        let mut state = self.state.borrow_mut();
        if let Some(parent) = &collection.parent {
            if state.position(parent).is_none() {
                return Err(not_found(parent));
            }
        }
        let id = state.allocate_id();
        let object = build_object(collection, id, payload.clone());
        state.objects.push(object.clone());
        state.mutation_event(&object.reference, OperationKind::Create);
        tracing::debug!("memory store: created {}", object.reference);
        Ok(object)
    }

    fn update(
        &self,
        reference: &ResourceRef,
        fields: &Attributes,
    ) -> Result<RemoteObject, StoreError> {
        self.log(StoreCall::Update(reference.clone(), fields.keys().cloned().collect()));
        let mut state = self.state.borrow_mut();
        let index = state.position(reference).ok_or_else(|| not_found(reference))?;
        if let Some(err) = self.injected(
            OperationKind::Update,
            &reference.kind,
            &state.objects[index].attributes,
        ) {
            return Err(err);
        }
        let object = &mut state.objects[index];
        for (key, value) in fields {
            object.attributes.insert(key.clone(), value.clone());
        }
        let updated = object.clone();
        state.mutation_event(reference, OperationKind::Update);
        Ok(updated)
    }

    fn delete(&self, reference: &ResourceRef) -> Result<(), StoreError> {
        self.log(StoreCall::Delete(reference.clone()));
        let mut state = self.state.borrow_mut();
        let index = state.position(reference).ok_or_else(|| not_found(reference))?;
        if let Some(err) = self.injected(
            OperationKind::Delete,
            &reference.kind,
            &state.objects[index].attributes,
        ) {
            return Err(err);
        }
        state
            .objects
            .retain(|o| &o.reference != reference && !o.reference.is_descendant_of(reference));
        state.mutation_event(reference, OperationKind::Delete);
        Ok(())
    }

    fn list_events(&self, filter: &EventFilter) -> Result<Vec<EventRecord>, StoreError> {
        self.log(StoreCall::ListEvents(filter.clone()));
        let state = self.state.borrow();
        let mut matching: Vec<EventRecord> = state
            .events
            .iter()
            .map(|e| &e.record)
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        matching.sort_by_key(|r| (r.created_at, r.id));
        let skip = matching.len().saturating_sub(EVENT_PAGE_SIZE);
        Ok(matching.split_off(skip))
    }

    fn get_event(&self, id: EventId) -> Result<Option<EventRecord>, StoreError> {
        self.log(StoreCall::GetEvent(id));
        let mut state = self.state.borrow_mut();
        let Some(event) = state.events.iter_mut().find(|e| e.record.id == id) else {
            return Ok(None);
        };
        if let Some(next) = event.pending.pop_front() {
            event.record.status = next;
        }
        Ok(Some(event.record.clone()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
