//! YAML manifests describing one resource and its sub-resource collections.
//!
//! ```yaml
//! kind: firewall
//! id: 3                 # omit to create
//! attributes:
//!   label: edge
//! collections:
//!   firewall_rule:
//!     - label: ssh
//!       protocol: TCP
//!       ports: "22"
//! wait: true            # optional, overrides config.yaml
//! timeout_secs: 120     # optional, overrides config.yaml
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use converge_core::{catalog, DesiredAttributeSet, ResourceRef, Settings};
use converge_reconcile::{ConvergenceRequest, WaitMode};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub kind: String,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub attributes: DesiredAttributeSet,
    #[serde(default)]
    pub collections: BTreeMap<String, Vec<DesiredAttributeSet>>,
    #[serde(default)]
    pub wait: Option<bool>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub strict_identity: Option<bool>,
    /// Event to await instead of the resource's own create/update event.
    #[serde(default)]
    pub await_action: Option<String>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse manifest {}", path.display()))
    }

    /// Build a request; manifest values override `settings`.
    pub fn into_request(self, settings: &Settings) -> Result<ConvergenceRequest> {
        let Some(schema) = catalog::schema(&self.kind) else {
            bail!("unknown resource kind '{}'", self.kind);
        };

        let mut request = match self.id {
            Some(id) => ConvergenceRequest::existing(
                schema,
                ResourceRef::new(schema.kind, id),
                self.attributes,
            ),
            None => ConvergenceRequest::create(schema, self.attributes),
        }
        .with_settings(settings);

        for (kind, entries) in self.collections {
            let Some(child) = catalog::schema(&kind) else {
                bail!("unknown sub-resource kind '{kind}' under {}", schema.kind);
            };
            request = request.with_collection(child, entries);
        }

        if let Some(wait) = self.wait {
            request.wait = if wait { WaitMode::Block } else { WaitMode::NoWait };
        }
        if let Some(secs) = self.timeout_secs {
            request.timeout = Duration::from_secs(secs);
        }
        if let Some(strict) = self.strict_identity {
            request.strict_identity = strict;
        }
        if let Some(action) = self.await_action {
            request = request.await_action(action);
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(yaml: &str) -> Manifest {
        serde_yaml::from_str(yaml).expect("manifest")
    }

    #[test]
    fn manifest_values_override_settings() {
        let manifest = parse(
            "kind: lke_cluster\nid: 12\nattributes:\n  label: prod\nwait: false\ntimeout_secs: 30\n",
        );
        let request = manifest.into_request(&Settings::default()).expect("request");
        assert_eq!(request.wait, WaitMode::NoWait);
        assert_eq!(request.timeout, Duration::from_secs(30));
        assert_eq!(request.desired.get("label"), Some(&json!("prod")));
    }

    #[test]
    fn collections_resolve_to_child_schemas() {
        let manifest = parse(
            "kind: lke_cluster\ncollections:\n  lke_node_pool:\n    - type: g6-standard-1\n      count: 3\n",
        );
        let request = manifest.into_request(&Settings::default()).expect("request");
        assert_eq!(request.collections.len(), 1);
        assert_eq!(request.collections[0].schema.kind, "lke_node_pool");
        assert_eq!(request.collections[0].entries[0].get("count"), Some(&json!(3)));
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let err = parse("kind: bucket\n")
            .into_request(&Settings::default())
            .unwrap_err();
        assert!(err.to_string().contains("unknown resource kind 'bucket'"));
    }
}
