//! Read-only result of the Fetch and Diff steps.

use serde_json::Value;
use similar::TextDiff;

use converge_core::{Attributes, FieldChange, RemoteObject, ResourceSchema};

use crate::subresource::OperationSet;

/// What the top-level resource needs.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceAction {
    /// Not found remotely; will be created from this body.
    Create { payload: Attributes },
    /// Exists; `changes` may be empty.
    Update {
        remote: RemoteObject,
        changes: Vec<FieldChange>,
    },
}

/// Operations planned for one child collection.
#[derive(Debug, Clone)]
pub struct CollectionPlan {
    pub schema: &'static ResourceSchema,
    pub operations: OperationSet,
}

/// Everything a converge pass would do, computed without mutating anything.
#[derive(Debug, Clone)]
pub struct ConvergencePlan {
    pub schema: &'static ResourceSchema,
    pub action: ResourceAction,
    pub collections: Vec<CollectionPlan>,
}

impl ConvergencePlan {
    /// `kind/id` when the resource exists, `kind` otherwise.
    pub fn resource_label(&self) -> String {
        match &self.action {
            ResourceAction::Create { .. } => self.schema.kind.to_string(),
            ResourceAction::Update { remote, .. } => remote.reference.to_string(),
        }
    }

    pub fn field_changes(&self) -> &[FieldChange] {
        match &self.action {
            ResourceAction::Create { .. } => &[],
            ResourceAction::Update { changes, .. } => changes,
        }
    }

    /// True when a converge pass would issue no mutation.
    pub fn is_converged(&self) -> bool {
        let top = match &self.action {
            ResourceAction::Create { .. } => false,
            ResourceAction::Update { changes, .. } => changes.is_empty(),
        };
        top && self.collections.iter().all(|c| c.operations.is_converged())
    }

    /// Unified diff of the top-level attributes, as pretty-printed JSON.
    ///
    /// Empty when nothing changes.
    pub fn unified_diff(&self) -> String {
        let (before, after, old_header) = match &self.action {
            ResourceAction::Create { payload } => {
                (Attributes::new(), payload.clone(), "/dev/null".to_string())
            }
            ResourceAction::Update { remote, changes } => {
                if changes.is_empty() {
                    return String::new();
                }
                let mut after = remote.attributes.clone();
                for change in changes {
                    after.insert(change.field.clone(), change.new.clone());
                }
                (
                    remote.attributes.clone(),
                    after,
                    format!("a/{}", remote.reference),
                )
            }
        };
        let new_header = format!("b/{}", self.resource_label());
        let before = pretty(before);
        let after = pretty(after);
        TextDiff::from_lines(&before, &after)
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string()
    }
}

fn pretty(attributes: Attributes) -> String {
    let mut rendered = serde_json::to_string_pretty(&Value::Object(attributes)).unwrap_or_default();
    rendered.push('\n');
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_core::catalog::LKE_CLUSTER;
    use converge_core::ResourceRef;
    use serde_json::json;

    #[test]
    fn diff_shows_changed_line_only() {
        let Value::Object(attributes) = json!({"label": "prod", "region": "us-east"}) else {
            unreachable!()
        };
        let plan = ConvergencePlan {
            schema: &LKE_CLUSTER,
            action: ResourceAction::Update {
                remote: RemoteObject::new(ResourceRef::new("lke_cluster", 4), attributes),
                changes: vec![FieldChange {
                    field: "label".to_string(),
                    old: Some(json!("prod")),
                    new: json!("staging"),
                }],
            },
            collections: vec![],
        };
        let diff = plan.unified_diff();
        assert!(diff.contains("--- a/lke_cluster/4"));
        assert!(diff.contains("-  \"label\": \"prod\","));
        assert!(diff.contains("+  \"label\": \"staging\","));
        assert!(!diff.contains("-  \"region\""));
        assert!(!plan.is_converged());
    }
}
