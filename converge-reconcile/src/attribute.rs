//! Attribute-level reconciliation of one live object.
//!
//! [`diff`] compares a desired attribute set against an observed object and
//! returns the field changes an update must carry. It never touches the
//! store. [`AttributeReconciler::apply`] sends those changes as a single
//! update and re-reads the object.

use serde_json::Value;

use converge_core::value::values_equal;
use converge_core::{
    ActionLog, Attributes, ConvergeError, DesiredAttributeSet, FieldChange, MutabilityPolicy,
    OperationKind, RemoteObject, RemoteStore, ResourceSchema,
};

/// Field changes needed to bring `remote` to `desired`.
///
/// Keys the schema does not know are skipped. An explicit `null` clears a
/// nullable field and is ignored on any other. The first differing field
/// outside `policy` fails the whole diff.
pub fn diff(
    schema: &ResourceSchema,
    remote: &RemoteObject,
    desired: &DesiredAttributeSet,
    policy: &MutabilityPolicy,
) -> Result<Vec<FieldChange>, ConvergeError> {
    let resource = remote.reference.to_string();
    let mut changes = Vec::new();

    for (key, want) in desired.iter() {
        let Some(spec) = schema.field(key) else {
            tracing::debug!("{resource}: skipping unknown field '{key}'");
            continue;
        };
        if want.is_null() && !spec.nullable {
            continue;
        }
        spec.check(&resource, want)?;

        let have = spec.read(remote);
        if values_equal(want, have.unwrap_or(&Value::Null)) {
            continue;
        }
        if !policy.allows(key) {
            return Err(ConvergeError::NonMutableField {
                resource,
                field: key.clone(),
            });
        }
        changes.push(FieldChange {
            field: key.clone(),
            old: have.cloned(),
            new: want.clone(),
        });
    }

    Ok(changes)
}

/// Result of reconciling one object's attributes.
///
/// `changes` were accepted by the remote. A failed re-read does not undo them.
#[derive(Debug)]
pub struct AttributeOutcome {
    pub changes: Vec<FieldChange>,
    /// The object as re-read after the update, or as observed if unchanged.
    pub refetch: Result<RemoteObject, ConvergeError>,
}

impl AttributeOutcome {
    pub fn object(&self) -> Option<&RemoteObject> {
        self.refetch.as_ref().ok()
    }
}

/// Diffs and updates the attributes of objects of one resource type.
pub struct AttributeReconciler<'a> {
    store: &'a dyn RemoteStore,
    log: &'a dyn ActionLog,
    schema: &'static ResourceSchema,
}

impl<'a> AttributeReconciler<'a> {
    pub fn new(
        store: &'a dyn RemoteStore,
        log: &'a dyn ActionLog,
        schema: &'static ResourceSchema,
    ) -> Self {
        Self { store, log, schema }
    }

    pub fn schema(&self) -> &'static ResourceSchema {
        self.schema
    }

    /// [`diff`] against this reconciler's schema.
    pub fn diff(
        &self,
        remote: &RemoteObject,
        desired: &DesiredAttributeSet,
        policy: &MutabilityPolicy,
    ) -> Result<Vec<FieldChange>, ConvergeError> {
        diff(self.schema, remote, desired, policy)
    }

    /// Send `changes` as one update and re-fetch the object.
    ///
    /// No request is made when `changes` is empty. `Err` means nothing was
    /// written; once the update is accepted the outcome is `Ok` and a failed
    /// re-read is carried in [`AttributeOutcome::refetch`].
    pub fn apply(
        &self,
        remote: &RemoteObject,
        changes: &[FieldChange],
    ) -> Result<AttributeOutcome, ConvergeError> {
        if changes.is_empty() {
            tracing::debug!("{}: attributes already converged", remote.reference);
            return Ok(AttributeOutcome {
                changes: Vec::new(),
                refetch: Ok(remote.clone()),
            });
        }

        let identity = self.schema.identity_of(remote);
        let mut request = Attributes::new();
        for change in changes {
            match self.schema.field(&change.field) {
                Some(spec) => spec.write(self.schema.kind, &mut request, change.new.clone())?,
                None => {
                    request.insert(change.field.clone(), change.new.clone());
                }
            }
        }

        self.store
            .update(&remote.reference, &request)
            .map_err(|source| ConvergeError::OperationFailed {
                kind: OperationKind::Update,
                resource: self.schema.kind.to_string(),
                identity: identity.clone(),
                source,
            })?;
        for change in changes {
            self.log.record(&format!("update {identity}: {change}"));
        }

        let refetch = match self.store.get(&remote.reference) {
            Ok(Some(object)) => Ok(object),
            Ok(None) => Err(ConvergeError::Vanished {
                reference: remote.reference.to_string(),
            }),
            Err(err) => Err(err.into()),
        };
        Ok(AttributeOutcome {
            changes: changes.to_vec(),
            refetch,
        })
    }

    /// Diff under the schema's own policy, then apply.
    pub fn reconcile(
        &self,
        remote: &RemoteObject,
        desired: &DesiredAttributeSet,
    ) -> Result<AttributeOutcome, ConvergeError> {
        let changes = self.diff(remote, desired, &self.schema.mutability_policy())?;
        self.apply(remote, &changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_core::catalog::{FIREWALL_RULE, LKE_CLUSTER};
    use converge_core::ResourceRef;
    use serde_json::json;

    fn cluster(value: Value) -> RemoteObject {
        let Value::Object(attributes) = value else {
            panic!("object literal expected");
        };
        RemoteObject::new(ResourceRef::new("lke_cluster", 12), attributes)
    }

    fn desired(value: Value) -> DesiredAttributeSet {
        DesiredAttributeSet::try_from(value).expect("object")
    }

    #[test]
    fn equal_values_yield_no_changes() {
        let remote = cluster(json!({"label": "prod", "region": "us-east", "tags": ["a", "b"]}));
        let changes = diff(
            &LKE_CLUSTER,
            &remote,
            &desired(json!({"label": "prod", "tags": ["a", "b"]})),
            &LKE_CLUSTER.mutability_policy(),
        )
        .expect("diff");
        assert!(changes.is_empty());
    }

    #[test]
    fn nested_values_compare_structurally() {
        let remote = cluster(json!({"control_plane": {"high_availability": false}}));
        let changes = diff(
            &LKE_CLUSTER,
            &remote,
            &desired(json!({"control_plane": {"high_availability": true}})),
            &LKE_CLUSTER.mutability_policy(),
        )
        .expect("diff");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].old, Some(json!({"high_availability": false})));
    }

    #[test]
    fn omitted_fields_are_left_alone() {
        let remote = cluster(json!({"label": "prod", "k8s_version": "1.29"}));
        let changes = diff(
            &LKE_CLUSTER,
            &remote,
            &desired(json!({"label": "prod"})),
            &LKE_CLUSTER.mutability_policy(),
        )
        .expect("diff");
        assert!(changes.is_empty());
    }

    #[test]
    fn explicit_null_clears_nullable_field() {
        let Value::Object(attributes) = json!({"label": "ssh", "description": "old"}) else {
            unreachable!()
        };
        let remote = RemoteObject::new(ResourceRef::new("firewall_rule", 3), attributes);
        let changes = diff(
            &FIREWALL_RULE,
            &remote,
            &desired(json!({"description": null})),
            &FIREWALL_RULE.mutability_policy(),
        )
        .expect("diff");
        assert_eq!(
            changes,
            vec![FieldChange {
                field: "description".to_string(),
                old: Some(json!("old")),
                new: Value::Null,
            }]
        );
    }

    #[test]
    fn null_on_required_field_is_ignored() {
        let remote = cluster(json!({"label": "prod"}));
        let changes = diff(
            &LKE_CLUSTER,
            &remote,
            &desired(json!({"label": null})),
            &LKE_CLUSTER.mutability_policy(),
        )
        .expect("diff");
        assert!(changes.is_empty());
    }

    #[test]
    fn explicit_policy_overrides_schema() {
        let remote = cluster(json!({"label": "prod", "region": "us-east"}));
        let policy: MutabilityPolicy = ["region"].into_iter().collect();
        let changes = diff(
            &LKE_CLUSTER,
            &remote,
            &desired(json!({"region": "eu-west"})),
            &policy,
        )
        .expect("diff");
        assert_eq!(changes[0].field, "region");

        let err = diff(
            &LKE_CLUSTER,
            &remote,
            &desired(json!({"label": "staging"})),
            &policy,
        )
        .unwrap_err();
        assert!(matches!(err, ConvergeError::NonMutableField { ref field, .. } if field == "label"));
    }
}
