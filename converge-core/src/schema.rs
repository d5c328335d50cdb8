//! Typed field-descriptor tables.
//!
//! Every resource the reconciler manages is described by a static
//! [`ResourceSchema`]: the closed set of fields it understands, the kind of
//! value each field holds, whether it may change after creation, and which
//! fields identify a sub-resource inside its parent's collection.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConvergeError;
use crate::types::{Attributes, EventAction, OperationKind, RemoteObject, ResourceKind};
use crate::value::{render, values_equal};

// ---------------------------------------------------------------------------
// Field descriptors
// ---------------------------------------------------------------------------

/// Semantic type of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Boolean,
    Object,
    List,
}

impl FieldKind {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Object => value.is_object(),
            FieldKind::List => value.is_array(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Object => "object",
            FieldKind::List => "list",
        }
    }
}

/// One entry of a resource's field table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// May be changed after creation.
    pub mutable: bool,
    /// An explicit desired `null` clears the field.
    pub nullable: bool,
    /// Used to pair desired and observed sub-resources.
    pub identity: bool,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            mutable: false,
            nullable: false,
            identity: false,
        }
    }

    pub const fn mutable(mut self) -> Self {
        self.mutable = true;
        self
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    /// Read accessor: the observed value of this field.
    pub fn read<'a>(&self, object: &'a RemoteObject) -> Option<&'a Value> {
        object.get(self.name)
    }

    /// Write accessor: stage `value` for this field in an update request.
    pub fn write(
        &self,
        resource: &str,
        request: &mut Attributes,
        value: Value,
    ) -> Result<(), ConvergeError> {
        self.check(resource, &value)?;
        request.insert(self.name.to_string(), value);
        Ok(())
    }

    /// Validate a desired value against the descriptor.
    pub fn check(&self, resource: &str, value: &Value) -> Result<(), ConvergeError> {
        if value.is_null() {
            if self.nullable {
                return Ok(());
            }
            return Err(ConvergeError::InvalidValue {
                resource: resource.to_string(),
                field: self.name.to_string(),
                reason: "field cannot be cleared".to_string(),
            });
        }
        if !self.kind.accepts(value) {
            return Err(ConvergeError::InvalidValue {
                resource: resource.to_string(),
                field: self.name.to_string(),
                reason: format!("expected {}, got {}", self.kind.name(), render(value)),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Slot conflicts
// ---------------------------------------------------------------------------

/// How creates in a collection depend on deletes in the same pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPolicy {
    /// Creates never wait on deletes.
    Independent,
    /// A create conflicts with a delete when these fields hold equal values.
    SharedSlot(&'static [&'static str]),
    /// Every create needs every delete to succeed first (quota-bound).
    Exclusive,
}

// ---------------------------------------------------------------------------
// Resource schema
// ---------------------------------------------------------------------------

/// Static description of one resource type.
#[derive(Debug)]
pub struct ResourceSchema {
    pub kind: &'static str,
    pub fields: &'static [FieldSpec],
    pub slots: SlotPolicy,
    /// Sub-resource kinds managed as collections under this resource.
    pub children: &'static [&'static str],
}

impl ResourceSchema {
    pub fn resource_kind(&self) -> ResourceKind {
        ResourceKind::from(self.kind)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn identity_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.identity)
    }

    pub fn has_child(&self, kind: &str) -> bool {
        self.children.contains(&kind)
    }

    /// Fields that may change after creation.
    pub fn mutability_policy(&self) -> MutabilityPolicy {
        self.fields
            .iter()
            .filter(|f| f.mutable)
            .map(|f| f.name.to_string())
            .collect()
    }

    /// Event action emitted by the remote for `op` on this resource type.
    pub fn event_action(&self, op: OperationKind) -> EventAction {
        EventAction(format!("{}_{}", self.kind, op.as_str()))
    }

    /// Type-check every recognised key of a desired set.
    pub fn validate(&self, desired: &DesiredAttributeSet) -> Result<(), ConvergeError> {
        for (key, value) in desired.iter() {
            let Some(spec) = self.field(key) else {
                continue;
            };
            if value.is_null() && !spec.nullable {
                continue;
            }
            spec.check(self.kind, value)?;
        }
        Ok(())
    }

    /// Split a desired entry into identity and payload fields.
    ///
    /// Every non-nullable identity field must be present and non-null; a
    /// missing nullable identity field matches an unset remote value. Keys the
    /// schema does not know are dropped.
    pub fn descriptor(
        &self,
        desired: DesiredAttributeSet,
    ) -> Result<SubResourceDescriptor, ConvergeError> {
        self.validate(&desired)?;
        let mut identity = Attributes::new();
        let mut payload = Attributes::new();
        for (key, value) in desired.into_inner() {
            match self.field(&key) {
                Some(spec) if spec.identity => {
                    identity.insert(key, value);
                }
                Some(_) => {
                    payload.insert(key, value);
                }
                None => tracing::debug!("{}: ignoring unknown field '{key}'", self.kind),
            }
        }
        for spec in self.identity_fields() {
            let present = identity.get(spec.name).is_some_and(|v| !v.is_null());
            if !present && spec.nullable {
                identity.insert(spec.name.to_string(), Value::Null);
                continue;
            }
            if !present {
                return Err(ConvergeError::InvalidValue {
                    resource: self.kind.to_string(),
                    field: spec.name.to_string(),
                    reason: "identity field is required".to_string(),
                });
            }
        }
        Ok(SubResourceDescriptor { identity, payload })
    }

    /// `kind[field=value,...]` label of an observed object's identity.
    pub fn identity_of(&self, object: &RemoteObject) -> String {
        let parts: Vec<String> = self
            .identity_fields()
            .map(|spec| {
                let value = spec.read(object).map(render).unwrap_or_default();
                format!("{}={value}", spec.name)
            })
            .collect();
        if parts.is_empty() {
            return object.reference.to_string();
        }
        format!("{}[{}]", self.kind, parts.join(","))
    }

    /// `kind[field=value,...]` label of a desired entry's identity.
    pub fn identity_label(&self, descriptor: &SubResourceDescriptor) -> String {
        format!("{}[{}]", self.kind, descriptor.identity_key())
    }

    /// Values of the slot fields on an observed object.
    pub fn slot_of_object(&self, object: &RemoteObject) -> Option<Vec<Value>> {
        match self.slots {
            SlotPolicy::SharedSlot(fields) => Some(
                fields
                    .iter()
                    .map(|f| object.get(f).cloned().unwrap_or(Value::Null))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Values of the slot fields on a desired entry.
    pub fn slot_of_descriptor(&self, descriptor: &SubResourceDescriptor) -> Option<Vec<Value>> {
        match self.slots {
            SlotPolicy::SharedSlot(fields) => Some(
                fields
                    .iter()
                    .map(|f| descriptor.get(f).cloned().unwrap_or(Value::Null))
                    .collect(),
            ),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Mutability policy
// ---------------------------------------------------------------------------

/// Set of field names permitted to change after creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutabilityPolicy(BTreeSet<String>);

impl MutabilityPolicy {
    pub fn allows(&self, field: &str) -> bool {
        self.0.contains(field)
    }
}

impl FromIterator<String> for MutabilityPolicy {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for MutabilityPolicy {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_owned).collect())
    }
}

// ---------------------------------------------------------------------------
// Desired state
// ---------------------------------------------------------------------------

/// Caller-declared target attributes. Omitted keys are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesiredAttributeSet(Attributes);

impl DesiredAttributeSet {
    pub fn new(attributes: Attributes) -> Self {
        Self(attributes)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_attributes(&self) -> &Attributes {
        &self.0
    }

    pub fn into_inner(self) -> Attributes {
        self.0
    }
}

impl From<Attributes> for DesiredAttributeSet {
    fn from(attributes: Attributes) -> Self {
        Self(attributes)
    }
}

impl TryFrom<Value> for DesiredAttributeSet {
    type Error = ConvergeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(ConvergeError::InvalidValue {
                resource: "desired state".to_string(),
                field: String::new(),
                reason: format!("expected an object, got {other}"),
            }),
        }
    }
}

/// A desired sub-resource split into matching keys and updatable fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubResourceDescriptor {
    pub identity: Attributes,
    pub payload: Attributes,
}

impl SubResourceDescriptor {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.identity.get(field).or_else(|| self.payload.get(field))
    }

    /// True when every identity field equals the observed value.
    pub fn matches(&self, remote: &RemoteObject) -> bool {
        self.identity.iter().all(|(field, want)| {
            let have = remote.get(field).unwrap_or(&Value::Null);
            values_equal(want, have)
        })
    }

    /// `field=value,...` rendering of the identity fields.
    pub fn identity_key(&self) -> String {
        self.identity
            .iter()
            .map(|(k, v)| format!("{k}={}", render(v)))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Payload fields as a desired set, for attribute reconciliation.
    pub fn payload_set(&self) -> DesiredAttributeSet {
        DesiredAttributeSet(self.payload.clone())
    }

    /// Full create body: identity and payload, without explicit nulls.
    pub fn create_payload(&self) -> Attributes {
        self.identity
            .iter()
            .chain(self.payload.iter())
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FIREWALL_RULE, LKE_NODE_POOL};
    use crate::types::ResourceRef;
    use serde_json::json;

    fn desired(value: Value) -> DesiredAttributeSet {
        DesiredAttributeSet::try_from(value).expect("object")
    }

    fn object(value: Value) -> RemoteObject {
        let Value::Object(attributes) = value else {
            panic!("object literal expected");
        };
        RemoteObject::new(ResourceRef::new("lke_node_pool", 1), attributes)
    }

    #[test]
    fn descriptor_splits_identity_and_payload() {
        let d = LKE_NODE_POOL
            .descriptor(desired(json!({"type": "g6-standard-1", "count": 3})))
            .expect("descriptor");
        assert_eq!(d.identity.get("type"), Some(&json!("g6-standard-1")));
        assert_eq!(d.payload.get("count"), Some(&json!(3)));
        assert_eq!(d.identity_key(), "type=g6-standard-1");
    }

    #[test]
    fn descriptor_requires_identity_fields() {
        let err = LKE_NODE_POOL
            .descriptor(desired(json!({"count": 3})))
            .unwrap_err();
        assert!(matches!(err, ConvergeError::InvalidValue { ref field, .. } if field == "type"));
    }

    #[test]
    fn descriptor_drops_unknown_fields() {
        let d = FIREWALL_RULE
            .descriptor(desired(json!({"label": "ssh", "colour": "blue"})))
            .expect("descriptor");
        assert!(d.get("colour").is_none());
    }

    #[test]
    fn descriptor_rejects_wrong_kind() {
        let err = LKE_NODE_POOL
            .descriptor(desired(json!({"type": "g6-standard-1", "count": "three"})))
            .unwrap_err();
        assert!(matches!(err, ConvergeError::InvalidValue { ref field, .. } if field == "count"));
    }

    #[test]
    fn matches_compares_identity_only() {
        let d = LKE_NODE_POOL
            .descriptor(desired(json!({"type": "g6-standard-1", "count": 5})))
            .expect("descriptor");
        assert!(d.matches(&object(json!({"type": "g6-standard-1", "count": 3}))));
        assert!(!d.matches(&object(json!({"type": "g6-standard-2", "count": 5}))));
        assert!(!d.matches(&object(json!({"count": 5}))));
    }

    #[test]
    fn policy_comes_from_mutable_fields() {
        let policy = LKE_NODE_POOL.mutability_policy();
        assert!(policy.allows("count"));
        assert!(!policy.allows("type"));
    }

    #[test]
    fn event_action_naming() {
        assert_eq!(
            LKE_NODE_POOL.event_action(OperationKind::Create),
            EventAction::from("lke_node_pool_create")
        );
    }

    #[test]
    fn create_payload_skips_nulls() {
        let d = FIREWALL_RULE
            .descriptor(desired(json!({"label": "ssh", "description": null})))
            .expect("descriptor");
        let payload = d.create_payload();
        assert_eq!(payload.get("label"), Some(&json!("ssh")));
        assert!(!payload.contains_key("description"));
    }
}
