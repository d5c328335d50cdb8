//! `converge plan <manifest>`: Fetch and Diff, print what apply would do.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use converge_core::TracingActionLog;
use converge_reconcile::{ConvergenceController, ConvergencePlan, OperationSet};

use super::StateArgs;
use crate::manifest::Manifest;

/// Arguments for `converge plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Path to the YAML manifest.
    pub manifest: PathBuf,

    #[command(flatten)]
    pub state: StateArgs,
}

#[derive(Tabled)]
struct OperationRow {
    #[tabled(rename = "op")]
    op: String,
    #[tabled(rename = "identity")]
    identity: String,
    #[tabled(rename = "detail")]
    detail: String,
}

impl PlanArgs {
    pub fn run(self) -> Result<()> {
        let workspace = self.state.open()?;
        let request = Manifest::load(&self.manifest)?.into_request(&workspace.settings)?;

        let log = TracingActionLog;
        let controller = ConvergenceController::new(&workspace.store, &log);
        let plan = controller
            .plan(&request)
            .with_context(|| format!("plan failed for {}", self.manifest.display()))?;

        print_plan(&plan);
        Ok(())
    }
}

fn print_plan(plan: &ConvergencePlan) {
    if plan.is_converged() {
        println!("No changes for {}.", plan.resource_label());
        return;
    }

    let diff = plan.unified_diff();
    if !diff.is_empty() {
        for line in diff.lines() {
            if line.starts_with('+') && !line.starts_with("+++") {
                println!("{}", line.green());
            } else if line.starts_with('-') && !line.starts_with("---") {
                println!("{}", line.red());
            } else {
                println!("{line}");
            }
        }
    }

    for collection in &plan.collections {
        let rows = operation_rows(collection.schema, &collection.operations);
        if rows.is_empty() {
            continue;
        }
        println!("{}", collection.schema.kind.bold());
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }
}

fn operation_rows(
    schema: &converge_core::ResourceSchema,
    ops: &OperationSet,
) -> Vec<OperationRow> {
    let mut rows = Vec::new();
    for remote in &ops.to_delete {
        rows.push(OperationRow {
            op: "delete".to_string(),
            identity: schema.identity_of(remote),
            detail: remote.reference.to_string(),
        });
    }
    for desired in &ops.to_create {
        rows.push(OperationRow {
            op: "create".to_string(),
            identity: schema.identity_label(desired),
            detail: serde_json::Value::Object(desired.create_payload()).to_string(),
        });
    }
    for pair in ops.pending_updates() {
        let detail: Vec<String> = pair.changes.iter().map(ToString::to_string).collect();
        rows.push(OperationRow {
            op: "update".to_string(),
            identity: schema.identity_of(&pair.remote),
            detail: detail.join("; "),
        });
    }
    rows
}
