//! One convergence pass: Fetch → Diff → Apply → AwaitCompletion → Refetch.
//!
//! Diff-time failures (type errors, immutable fields, ambiguous matches)
//! abort the pass before the first mutation and come back as `Err`. Once
//! Apply has started, failures are collected into the
//! [`ConvergenceReport`] next to everything that did get applied.

use std::time::Duration;

use converge_core::{
    ActionLog, Attributes, Budget, Collection, ConvergeError, DesiredAttributeSet, EventAction,
    OperationKind, RemoteStore, ResourceRef, ResourceSchema, Settings,
};
use converge_events::{EventWaiter, TerminalOutcome, WaitIntervals};

use crate::attribute::{self, AttributeReconciler};
use crate::plan::{CollectionPlan, ConvergencePlan, ResourceAction};
use crate::report::{AppliedChange, Completion, ConvergenceReport};
use crate::subresource::{self, SubResourceReconciler};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Which top-level object a pass converges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Converge this object; created under the same parent if it is gone.
    Existing(ResourceRef),
    /// Create a new object, optionally nested under `parent`.
    New { parent: Option<ResourceRef> },
}

/// Desired entries of one child collection.
#[derive(Debug, Clone)]
pub struct DesiredCollection {
    pub schema: &'static ResourceSchema,
    pub entries: Vec<DesiredAttributeSet>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// Block until the awaited event reaches a terminal status.
    Block,
    /// Read the completion status once and move on.
    NoWait,
}

/// Input of [`ConvergenceController::converge`].
#[derive(Debug, Clone)]
pub struct ConvergenceRequest {
    pub schema: &'static ResourceSchema,
    pub target: Target,
    pub desired: DesiredAttributeSet,
    pub collections: Vec<DesiredCollection>,
    pub wait: WaitMode,
    /// Overall budget for every wait in the pass.
    pub timeout: Duration,
    pub strict_identity: bool,
    /// Event to await instead of the top-level create/update event.
    pub await_action: Option<EventAction>,
}

impl ConvergenceRequest {
    pub fn existing(
        schema: &'static ResourceSchema,
        reference: ResourceRef,
        desired: DesiredAttributeSet,
    ) -> Self {
        Self::with_target(schema, Target::Existing(reference), desired)
    }

    pub fn create(schema: &'static ResourceSchema, desired: DesiredAttributeSet) -> Self {
        Self::with_target(schema, Target::New { parent: None }, desired)
    }

    fn with_target(
        schema: &'static ResourceSchema,
        target: Target,
        desired: DesiredAttributeSet,
    ) -> Self {
        let defaults = Settings::default();
        Self {
            schema,
            target,
            desired,
            collections: Vec::new(),
            wait: WaitMode::Block,
            timeout: defaults.timeout(),
            strict_identity: defaults.strict_identity,
            await_action: None,
        }
    }

    pub fn with_collection(
        mut self,
        schema: &'static ResourceSchema,
        entries: Vec<DesiredAttributeSet>,
    ) -> Self {
        self.collections.push(DesiredCollection { schema, entries });
        self
    }

    /// Take timeout, wait mode and strictness from user settings.
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.timeout = settings.timeout();
        self.strict_identity = settings.strict_identity;
        self.wait = if settings.wait {
            WaitMode::Block
        } else {
            WaitMode::NoWait
        };
        self
    }

    pub fn no_wait(mut self) -> Self {
        self.wait = WaitMode::NoWait;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict_identity = strict;
        self
    }

    pub fn await_action(mut self, action: impl Into<EventAction>) -> Self {
        self.await_action = Some(action.into());
        self
    }

    fn parent(&self) -> Option<ResourceRef> {
        match &self.target {
            Target::Existing(reference) => reference.parent.as_deref().cloned(),
            Target::New { parent } => parent.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Runs convergence passes against an injected store and action log.
pub struct ConvergenceController<'a> {
    store: &'a dyn RemoteStore,
    log: &'a dyn ActionLog,
    intervals: WaitIntervals,
}

impl<'a> ConvergenceController<'a> {
    pub fn new(store: &'a dyn RemoteStore, log: &'a dyn ActionLog) -> Self {
        Self {
            store,
            log,
            intervals: WaitIntervals::default(),
        }
    }

    pub fn with_intervals(mut self, intervals: WaitIntervals) -> Self {
        self.intervals = intervals;
        self
    }

    /// Fetch and Diff only. Never mutates the store.
    pub fn plan(&self, request: &ConvergenceRequest) -> Result<ConvergencePlan, ConvergeError> {
        let schema = request.schema;
        for desired in &request.collections {
            if !schema.has_child(desired.schema.kind) {
                return Err(ConvergeError::InvalidValue {
                    resource: schema.kind.to_string(),
                    field: desired.schema.kind.to_string(),
                    reason: format!("not a sub-resource of {}", schema.kind),
                });
            }
        }

        let remote = match &request.target {
            Target::Existing(reference) => self.store.get(reference)?,
            Target::New { .. } => None,
        };

        let action = match remote {
            Some(remote) => {
                let changes = attribute::diff(
                    schema,
                    &remote,
                    &request.desired,
                    &schema.mutability_policy(),
                )?;
                ResourceAction::Update { remote, changes }
            }
            None => {
                schema.validate(&request.desired)?;
                ResourceAction::Create {
                    payload: create_body(schema, &request.desired),
                }
            }
        };

        let mut collections = Vec::with_capacity(request.collections.len());
        for desired in &request.collections {
            let entries = subresource::descriptors(desired.schema, desired.entries.clone())?;
            let observed = match &action {
                ResourceAction::Update { remote, .. } => self
                    .store
                    .list(&Collection::under(&remote.reference, desired.schema.kind))?,
                ResourceAction::Create { .. } => Vec::new(),
            };
            let operations =
                subresource::reconcile(desired.schema, observed, entries, request.strict_identity)?;
            collections.push(CollectionPlan {
                schema: desired.schema,
                operations,
            });
        }

        Ok(ConvergencePlan {
            schema,
            action,
            collections,
        })
    }

    /// Run a full pass.
    pub fn converge(&self, request: ConvergenceRequest) -> Result<ConvergenceReport, ConvergeError> {
        let budget = Budget::new(request.timeout);
        let schema = request.schema;
        let plan = self.plan(&request)?;
        let mut report = ConvergenceReport::new(plan.resource_label());

        // The waiter must exist before the mutation so its ledger does not
        // already contain the event the mutation produces.
        let awaited = request
            .await_action
            .clone()
            .or_else(|| default_await_action(&plan));
        let mut waiter = match (&awaited, &plan.action) {
            (Some(action), ResourceAction::Update { remote, .. }) => Some(EventWaiter::new(
                self.store,
                schema.kind,
                Some(remote.id()),
                action.clone(),
                self.intervals,
            )?),
            (Some(action), ResourceAction::Create { .. }) => Some(EventWaiter::new(
                self.store,
                schema.kind,
                None,
                action.clone(),
                self.intervals,
            )?),
            (None, _) => None,
        };

        // Apply: the top-level object first, then each child collection.
        let (object, top_mutated) = match plan.action {
            ResourceAction::Create { payload } => {
                let collection = match request.parent() {
                    Some(parent) => Collection::under(&parent, schema.kind),
                    None => Collection::top_level(schema.kind),
                };
                match self.store.create(&collection, &payload) {
                    Ok(created) => {
                        self.log.record(&format!("create {}", created.reference));
                        report.created = true;
                        report.resource = created.reference.to_string();
                        report.applied.push(AppliedChange::Created {
                            identity: schema.kind.to_string(),
                            reference: created.reference.clone(),
                        });
                        if let Some(waiter) = waiter.as_mut() {
                            waiter.set_entity_id(created.id());
                        }
                        (created, true)
                    }
                    Err(source) => {
                        tracing::warn!("create {} failed: {source}", schema.kind);
                        report.errors.push(ConvergeError::OperationFailed {
                            kind: OperationKind::Create,
                            resource: schema.kind.to_string(),
                            identity: schema.kind.to_string(),
                            source,
                        });
                        return Ok(report);
                    }
                }
            }
            ResourceAction::Update { remote, changes } => {
                let attributes = AttributeReconciler::new(self.store, self.log, schema);
                match attributes.apply(&remote, &changes) {
                    Ok(outcome) => {
                        let mutated = !outcome.changes.is_empty();
                        let object = match outcome.refetch {
                            Ok(updated) => updated,
                            Err(err) => {
                                tracing::warn!("re-read of {} failed: {err}", remote.reference);
                                report.errors.push(err);
                                remote
                            }
                        };
                        if mutated {
                            report.applied.push(AppliedChange::Updated {
                                identity: schema.identity_of(&object),
                                reference: object.reference.clone(),
                                changes: outcome.changes,
                            });
                        }
                        (object, mutated)
                    }
                    Err(err) => {
                        tracing::warn!("update {} failed: {err}", remote.reference);
                        report.errors.push(err);
                        (remote, false)
                    }
                }
            }
        };

        for planned in plan.collections {
            let collection = Collection::under(&object.reference, planned.schema.kind);
            let children = SubResourceReconciler::new(self.store, self.log, planned.schema);
            report.absorb(children.apply(&collection, planned.operations));
        }

        // AwaitCompletion: only when something was sent that emits the event,
        // or the caller named the event explicitly.
        if let Some(mut waiter) = waiter {
            if top_mutated || request.await_action.is_some() {
                report.completion =
                    self.await_completion(&mut waiter, request.wait, &budget, &mut report.errors);
                if report.completion == Completion::TimedOut {
                    tracing::warn!("{}", report.summary());
                    return Ok(report);
                }
            }
        }

        match self.store.get(&object.reference) {
            Ok(Some(fresh)) => report.object = Some(fresh),
            Ok(None) => report.errors.push(ConvergeError::Vanished {
                reference: object.reference.to_string(),
            }),
            Err(err) => report.errors.push(err.into()),
        }

        if report.is_success() {
            tracing::info!("{}", report.summary());
        } else {
            tracing::warn!("{}", report.summary());
        }
        Ok(report)
    }

    fn await_completion(
        &self,
        waiter: &mut EventWaiter<'_>,
        mode: WaitMode,
        budget: &Budget,
        errors: &mut Vec<ConvergeError>,
    ) -> Completion {
        match mode {
            WaitMode::Block => match waiter.wait_for_next_event_finished(budget) {
                Ok(TerminalOutcome::Completed(record)) => Completion::Completed(record),
                Ok(TerminalOutcome::Failed(record)) => {
                    errors.push(ConvergeError::EventFailed {
                        event: record.id,
                        action: record.action.clone(),
                    });
                    Completion::Failed(record)
                }
                Err(err) => {
                    let timed_out = err.is_timeout();
                    errors.push(err);
                    if timed_out {
                        Completion::TimedOut
                    } else {
                        Completion::Pending
                    }
                }
            },
            WaitMode::NoWait => match waiter.poll_once() {
                Ok(Some(record)) => Completion::Observed(record),
                Ok(None) => {
                    tracing::debug!("{} not available yet", waiter.filter().action);
                    Completion::Pending
                }
                Err(err) => {
                    errors.push(err);
                    Completion::Pending
                }
            },
        }
    }
}

/// Event the pass waits for when the caller does not name one.
fn default_await_action(plan: &ConvergencePlan) -> Option<EventAction> {
    match &plan.action {
        ResourceAction::Create { .. } => Some(plan.schema.event_action(OperationKind::Create)),
        ResourceAction::Update { changes, .. } if !changes.is_empty() => {
            Some(plan.schema.event_action(OperationKind::Update))
        }
        ResourceAction::Update { .. } => None,
    }
}

/// Create body: every known, non-null desired field.
fn create_body(schema: &ResourceSchema, desired: &DesiredAttributeSet) -> Attributes {
    desired
        .iter()
        .filter(|(key, value)| schema.field(key).is_some() && !value.is_null())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
