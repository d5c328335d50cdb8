//! Sub-resource list reconciliation.
//!
//! [`reconcile`] pairs desired descriptors with observed objects by identity
//! fields and classifies everything into an [`OperationSet`]. Matching is
//! greedy and order-preserving: each desired entry, in the caller's order,
//! takes the first unmatched remote object with equal identity values.
//! Remote objects left over are deleted.
//!
//! [`SubResourceReconciler::apply`] executes the set: deletes, then creates,
//! then updates. A failure does not stop the remaining operations, except
//! that a create whose slot was held by an object that failed to delete is
//! skipped.

use serde_json::Value;

use converge_core::value::values_equal;
use converge_core::{
    ActionLog, Collection, ConvergeError, DesiredAttributeSet, FieldChange, OperationKind,
    RemoteObject, RemoteStore, ResourceSchema, SlotPolicy, SubResourceDescriptor,
};

use crate::attribute::{self, AttributeReconciler};
use crate::report::{AppliedChange, ApplyOutcome};

// ---------------------------------------------------------------------------
// Operation set
// ---------------------------------------------------------------------------

/// A matched `(remote, desired)` pair and the payload changes it needs.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedPair {
    pub remote: RemoteObject,
    pub desired: SubResourceDescriptor,
    /// Empty when the pair is already converged.
    pub changes: Vec<FieldChange>,
}

/// Every observed object lands in exactly one of `to_update`/`to_delete`;
/// every desired descriptor in exactly one of `to_create`/`to_update`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationSet {
    pub to_create: Vec<SubResourceDescriptor>,
    pub to_update: Vec<MatchedPair>,
    pub to_delete: Vec<RemoteObject>,
}

impl OperationSet {
    /// Matched pairs whose payload differs.
    pub fn pending_updates(&self) -> impl Iterator<Item = &MatchedPair> {
        self.to_update.iter().filter(|p| !p.changes.is_empty())
    }

    /// True when applying the set would issue no request.
    pub fn is_converged(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty() && self.pending_updates().next().is_none()
    }

    /// Number of requests applying the set would issue.
    pub fn request_count(&self) -> usize {
        self.to_create.len() + self.to_delete.len() + self.pending_updates().count()
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Split desired entries into identity and payload fields.
pub fn descriptors(
    schema: &ResourceSchema,
    entries: Vec<DesiredAttributeSet>,
) -> Result<Vec<SubResourceDescriptor>, ConvergeError> {
    entries.into_iter().map(|e| schema.descriptor(e)).collect()
}

/// Classify `desired` against `remote` into an [`OperationSet`].
///
/// Matched pairs are diffed against the schema's mutability policy, so a
/// payload change on an immutable field fails here, before anything is
/// applied. With `strict`, a desired identity that matches more than one
/// unmatched remote object is an [`ConvergeError::AmbiguousMatch`].
pub fn reconcile(
    schema: &ResourceSchema,
    remote: Vec<RemoteObject>,
    desired: Vec<SubResourceDescriptor>,
    strict: bool,
) -> Result<OperationSet, ConvergeError> {
    let policy = schema.mutability_policy();
    let mut pool: Vec<Option<RemoteObject>> = remote.into_iter().map(Some).collect();
    let mut ops = OperationSet::default();

    for entry in desired {
        let mut candidates = pool
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().filter(|r| entry.matches(r)).map(|_| i));
        let first = candidates.next();
        if strict {
            let extra = candidates.count();
            if extra > 0 {
                return Err(ConvergeError::AmbiguousMatch {
                    resource: schema.kind.to_string(),
                    identity: schema.identity_label(&entry),
                    candidates: extra + 1,
                });
            }
        }

        match first.and_then(|i| pool[i].take()) {
            Some(matched) => {
                let changes = attribute::diff(schema, &matched, &entry.payload_set(), &policy)?;
                ops.to_update.push(MatchedPair {
                    remote: matched,
                    desired: entry,
                    changes,
                });
            }
            None => ops.to_create.push(entry),
        }
    }

    ops.to_delete = pool.into_iter().flatten().collect();
    tracing::debug!(
        "{}: {} create(s), {} matched, {} delete(s)",
        schema.kind,
        ops.to_create.len(),
        ops.to_update.len(),
        ops.to_delete.len()
    );
    Ok(ops)
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

/// A delete that failed, and the slot it still holds.
struct HeldSlot {
    identity: String,
    slot: Option<Vec<Value>>,
}

/// Applies operation sets for one sub-resource type.
pub struct SubResourceReconciler<'a> {
    store: &'a dyn RemoteStore,
    log: &'a dyn ActionLog,
    schema: &'static ResourceSchema,
}

impl<'a> SubResourceReconciler<'a> {
    pub fn new(
        store: &'a dyn RemoteStore,
        log: &'a dyn ActionLog,
        schema: &'static ResourceSchema,
    ) -> Self {
        Self { store, log, schema }
    }

    /// [`reconcile`] against this reconciler's schema.
    pub fn reconcile(
        &self,
        remote: Vec<RemoteObject>,
        desired: Vec<SubResourceDescriptor>,
        strict: bool,
    ) -> Result<OperationSet, ConvergeError> {
        reconcile(self.schema, remote, desired, strict)
    }

    /// Fetch the observed collection and classify `entries` against it.
    pub fn plan(
        &self,
        collection: &Collection,
        entries: Vec<DesiredAttributeSet>,
        strict: bool,
    ) -> Result<OperationSet, ConvergeError> {
        let desired = descriptors(self.schema, entries)?;
        let remote = self.store.list(collection)?;
        self.reconcile(remote, desired, strict)
    }

    /// Execute `ops` against `collection`: deletes, creates, then updates.
    pub fn apply(&self, collection: &Collection, ops: OperationSet) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();
        let mut held = Vec::new();

        for remote in ops.to_delete {
            let identity = self.schema.identity_of(&remote);
            match self.store.delete(&remote.reference) {
                Ok(()) => {
                    self.log.record(&format!("delete {identity}"));
                    outcome.applied.push(AppliedChange::Deleted {
                        identity,
                        reference: remote.reference,
                    });
                }
                Err(source) => {
                    tracing::warn!("delete {identity} failed: {source}");
                    held.push(HeldSlot {
                        identity: identity.clone(),
                        slot: self.schema.slot_of_object(&remote),
                    });
                    outcome.errors.push(self.failed(OperationKind::Delete, identity, source));
                }
            }
        }

        for desired in ops.to_create {
            let identity = self.schema.identity_label(&desired);
            if let Some(blocker) = self.blocking_delete(&held, &desired) {
                tracing::warn!("skipping create {identity}: delete of {blocker} failed");
                outcome.errors.push(ConvergeError::DependentSkipped {
                    resource: self.schema.kind.to_string(),
                    identity,
                    blocked_by: blocker.to_string(),
                });
                continue;
            }
            match self.store.create(collection, &desired.create_payload()) {
                Ok(created) => {
                    self.log.record(&format!("create {identity}"));
                    outcome.applied.push(AppliedChange::Created {
                        identity,
                        reference: created.reference,
                    });
                }
                Err(source) => {
                    tracing::warn!("create {identity} failed: {source}");
                    outcome.errors.push(self.failed(OperationKind::Create, identity, source));
                }
            }
        }

        let attributes = AttributeReconciler::new(self.store, self.log, self.schema);
        for pair in ops.to_update {
            if pair.changes.is_empty() {
                continue;
            }
            let identity = self.schema.identity_of(&pair.remote);
            match attributes.apply(&pair.remote, &pair.changes) {
                Ok(result) => {
                    let reference = match result.refetch {
                        Ok(updated) => updated.reference,
                        Err(err) => {
                            tracing::warn!("re-read of {identity} failed: {err}");
                            outcome.errors.push(err);
                            pair.remote.reference
                        }
                    };
                    outcome.applied.push(AppliedChange::Updated {
                        identity,
                        reference,
                        changes: result.changes,
                    });
                }
                Err(err) => {
                    tracing::warn!("update {identity} failed: {err}");
                    outcome.errors.push(err);
                }
            }
        }

        outcome
    }

    fn blocking_delete<'h>(
        &self,
        held: &'h [HeldSlot],
        desired: &SubResourceDescriptor,
    ) -> Option<&'h str> {
        let blocker = match self.schema.slots {
            SlotPolicy::Independent => None,
            SlotPolicy::Exclusive => held.first(),
            SlotPolicy::SharedSlot(_) => {
                let wanted = self.schema.slot_of_descriptor(desired)?;
                held.iter().find(|h| {
                    h.slot.as_ref().is_some_and(|slot| {
                        slot.len() == wanted.len()
                            && slot.iter().zip(&wanted).all(|(a, b)| values_equal(a, b))
                    })
                })
            }
        };
        blocker.map(|h| h.identity.as_str())
    }

    fn failed(
        &self,
        kind: OperationKind,
        identity: String,
        source: converge_core::StoreError,
    ) -> ConvergeError {
        ConvergeError::OperationFailed {
            kind,
            resource: self.schema.kind.to_string(),
            identity,
            source,
        }
    }
}
