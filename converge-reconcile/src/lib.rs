//! # converge-reconcile
//!
//! Attribute and sub-resource reconciliation, and the controller that drives
//! a full convergence pass.
//!
//! - [`attribute`]: diff one object's attributes under a mutability policy
//! - [`subresource`]: match desired entries to observed ones, apply the
//!   resulting [`OperationSet`]
//! - [`controller`]: [`ConvergenceController`]
//! - [`plan`] / [`report`]: what a pass would do, and what it did

pub mod attribute;
pub mod controller;
pub mod plan;
pub mod report;
pub mod subresource;

pub use attribute::{diff, AttributeOutcome, AttributeReconciler};
pub use controller::{
    ConvergenceController, ConvergenceRequest, DesiredCollection, Target, WaitMode,
};
pub use plan::{CollectionPlan, ConvergencePlan, ResourceAction};
pub use report::{AppliedChange, ApplyOutcome, Completion, ConvergenceReport};
pub use subresource::{reconcile, MatchedPair, OperationSet, SubResourceReconciler};
