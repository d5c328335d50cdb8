//! Domain types shared by every converge crate.
//!
//! Attribute values are plain `serde_json::Value`s; the closed set of fields a
//! resource understands lives in [`crate::schema`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attribute map of a remote object, a desired set, or an update request.
pub type Attributes = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Resource type name, e.g. `lke_cluster` or `firewall_rule`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKind(pub String);

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ResourceKind {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ResourceKind {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Server-assigned numeric id of a remote entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Id of a record in the remote event log.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for EventId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Event action name, e.g. `lke_node_pool_create`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventAction(pub String);

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for EventAction {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EventAction {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

/// Address of a single remote object. Sub-resources carry their parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<ResourceRef>>,
}

impl ResourceRef {
    pub fn new(kind: impl Into<ResourceKind>, id: impl Into<EntityId>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            parent: None,
        }
    }

    pub fn child(&self, kind: impl Into<ResourceKind>, id: impl Into<EntityId>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            parent: Some(Box::new(self.clone())),
        }
    }

    /// True when `ancestor` appears anywhere in this reference's parent chain.
    pub fn is_descendant_of(&self, ancestor: &ResourceRef) -> bool {
        let mut cursor = self.parent.as_deref();
        while let Some(parent) = cursor {
            if parent == ancestor {
                return true;
            }
            cursor = parent.parent.as_deref();
        }
        false
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = &self.parent {
            write!(f, "{parent}/")?;
        }
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// A list of sub-resources of one kind, optionally nested under a parent.
///
/// Top-level resources are created into a collection without a parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Collection {
    pub kind: ResourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ResourceRef>,
}

impl Collection {
    pub fn top_level(kind: impl Into<ResourceKind>) -> Self {
        Self {
            kind: kind.into(),
            parent: None,
        }
    }

    pub fn under(parent: &ResourceRef, kind: impl Into<ResourceKind>) -> Self {
        Self {
            kind: kind.into(),
            parent: Some(parent.clone()),
        }
    }

    pub fn contains(&self, reference: &ResourceRef) -> bool {
        reference.kind == self.kind && reference.parent.as_deref() == self.parent.as_ref()
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent {
            Some(parent) => write!(f, "{parent}/{}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

// ---------------------------------------------------------------------------
// Remote state
// ---------------------------------------------------------------------------

/// Live server-side representation of one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub reference: ResourceRef,
    #[serde(default)]
    pub attributes: Attributes,
}

impl RemoteObject {
    pub fn new(reference: ResourceRef, attributes: Attributes) -> Self {
        Self {
            reference,
            attributes,
        }
    }

    pub fn id(&self) -> EntityId {
        self.reference.id
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }
}

/// A single staged attribute change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    /// `None` when the remote object did not report the field at all.
    pub old: Option<Value>,
    pub new: Value,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.old {
            Some(old) => write!(f, "{}: {} -> {}", self.field, old, self.new),
            None => write!(f, "{}: (unset) -> {}", self.field, self.new),
        }
    }
}

/// Kind of mutation issued against the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Lifecycle status of an asynchronous remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Scheduled,
    Started,
    Finished,
    Failed,
    Notification,
}

impl EventStatus {
    /// No further transition is expected after a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventStatus::Finished | EventStatus::Notification | EventStatus::Failed
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, EventStatus::Failed)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStatus::Scheduled => write!(f, "scheduled"),
            EventStatus::Started => write!(f, "started"),
            EventStatus::Finished => write!(f, "finished"),
            EventStatus::Failed => write!(f, "failed"),
            EventStatus::Notification => write!(f, "notification"),
        }
    }
}

/// One entry of the remote append-only event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EventId,
    pub entity_type: ResourceKind,
    pub entity_id: EntityId,
    pub action: EventAction,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
}

/// Exact-equality filter over the event log.
///
/// Stores must answer with the most recent page of matches ordered ascending
/// by `created_at`, so the first unseen record is the next new event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    pub entity_type: ResourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
    pub action: EventAction,
}

impl EventFilter {
    pub fn new(
        entity_type: impl Into<ResourceKind>,
        entity_id: Option<EntityId>,
        action: impl Into<EventAction>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id,
            action: action.into(),
        }
    }

    pub fn matches(&self, record: &EventRecord) -> bool {
        record.entity_type == self.entity_type
            && record.action == self.action
            && self.entity_id.map_or(true, |id| record.entity_id == id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
