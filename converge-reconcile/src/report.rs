//! Outcome types returned by apply and converge passes.

use std::fmt;

use converge_core::{ConvergeError, EventRecord, FieldChange, RemoteObject, ResourceRef};

// ---------------------------------------------------------------------------
// Applied changes
// ---------------------------------------------------------------------------

/// One mutation that the remote store accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum AppliedChange {
    Created {
        identity: String,
        reference: ResourceRef,
    },
    Updated {
        identity: String,
        reference: ResourceRef,
        changes: Vec<FieldChange>,
    },
    Deleted {
        identity: String,
        reference: ResourceRef,
    },
}

impl AppliedChange {
    pub fn is_create(&self) -> bool {
        matches!(self, AppliedChange::Created { .. })
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, AppliedChange::Deleted { .. })
    }
}

impl fmt::Display for AppliedChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppliedChange::Created { identity, reference } => {
                write!(f, "created {identity} ({reference})")
            }
            AppliedChange::Updated {
                identity, changes, ..
            } => {
                let fields: Vec<&str> = changes.iter().map(|c| c.field.as_str()).collect();
                write!(f, "updated {identity} [{}]", fields.join(", "))
            }
            AppliedChange::Deleted { identity, reference } => {
                write!(f, "deleted {identity} ({reference})")
            }
        }
    }
}

/// Accepted mutations and collected failures of one apply step.
///
/// Failures never roll back what was already applied.
#[derive(Debug, Default)]
pub struct ApplyOutcome {
    pub applied: Vec<AppliedChange>,
    pub errors: Vec<ConvergeError>,
}

impl ApplyOutcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ApplyOutcome) {
        self.applied.extend(other.applied);
        self.errors.extend(other.errors);
    }
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// What the pass learned about the remote background operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Nothing was mutated that emits an awaited event.
    NotRequired,
    /// Waited until the event finished.
    Completed(EventRecord),
    /// The event ended in `failed`.
    Failed(EventRecord),
    /// The wait ran out of budget.
    TimedOut,
    /// No-wait mode: the event was seen once, in whatever status it had.
    Observed(EventRecord),
    /// No-wait mode: the event was not available yet.
    Pending,
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::NotRequired => write!(f, "no remote operation to await"),
            Completion::Completed(r) => write!(f, "{} {} (event {})", r.action, r.status, r.id),
            Completion::Failed(r) => write!(f, "{} failed (event {})", r.action, r.id),
            Completion::TimedOut => write!(f, "timed out waiting for completion"),
            Completion::Observed(r) => {
                write!(f, "{} {} (event {}, not awaited)", r.action, r.status, r.id)
            }
            Completion::Pending => write!(f, "pending (not awaited)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Final result of a convergence pass: everything applied plus every error.
#[derive(Debug)]
pub struct ConvergenceReport {
    /// `kind/id` of the top-level resource, or `kind` if it was never created.
    pub resource: String,
    pub created: bool,
    pub applied: Vec<AppliedChange>,
    pub errors: Vec<ConvergeError>,
    pub completion: Completion,
    /// The top-level object as re-fetched at the end of the pass.
    pub object: Option<RemoteObject>,
}

impl ConvergenceReport {
    pub(crate) fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            created: false,
            applied: Vec::new(),
            errors: Vec::new(),
            completion: Completion::NotRequired,
            object: None,
        }
    }

    pub(crate) fn absorb(&mut self, outcome: ApplyOutcome) {
        self.applied.extend(outcome.applied);
        self.errors.extend(outcome.errors);
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// One-line summary. Only a pass with nothing applied and nothing failed
    /// reports "no changes".
    pub fn summary(&self) -> String {
        match (self.applied.len(), self.errors.len()) {
            (0, 0) => format!("{}: no changes", self.resource),
            (applied, 0) => format!("{}: {applied} change(s) applied", self.resource),
            (applied, errors) => format!(
                "{}: {applied} change(s) applied, {errors} error(s)",
                self.resource
            ),
        }
    }
}
