//! `converge apply <manifest>`: run a full convergence pass.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use converge_core::TracingActionLog;
use converge_events::WaitIntervals;
use converge_reconcile::{
    AppliedChange, Completion, ConvergenceController, ConvergenceReport, WaitMode,
};

use super::StateArgs;
use crate::manifest::Manifest;

/// Arguments for `converge apply`.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Path to the YAML manifest.
    pub manifest: PathBuf,

    /// Read completion status once instead of waiting for it.
    #[arg(long)]
    pub no_wait: bool,

    /// Overall timeout in seconds for every wait in the pass.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Fail when a desired identity matches more than one remote object.
    #[arg(long)]
    pub strict: bool,

    #[command(flatten)]
    pub state: StateArgs,
}

impl ApplyArgs {
    pub fn run(self) -> Result<()> {
        let workspace = self.state.open()?;
        let mut request = Manifest::load(&self.manifest)?.into_request(&workspace.settings)?;
        if self.no_wait {
            request.wait = WaitMode::NoWait;
        }
        if let Some(secs) = self.timeout {
            request.timeout = Duration::from_secs(secs);
        }
        if self.strict {
            request.strict_identity = true;
        }

        let log = TracingActionLog;
        let controller = ConvergenceController::new(&workspace.store, &log)
            .with_intervals(WaitIntervals::from(&workspace.settings));
        let report = controller
            .converge(request)
            .with_context(|| format!("apply failed for {}", self.manifest.display()))?;

        print_report(&report);
        if !report.is_success() {
            bail!("{}", report.summary());
        }
        Ok(())
    }
}

fn print_report(report: &ConvergenceReport) {
    for change in &report.applied {
        let line = change.to_string();
        match change {
            AppliedChange::Created { .. } => println!("{} {}", "+".green(), line),
            AppliedChange::Updated { changes, .. } => {
                println!("{} {}", "~".yellow(), line);
                for field in changes {
                    println!("    {field}");
                }
            }
            AppliedChange::Deleted { .. } => println!("{} {}", "-".red(), line),
        }
    }
    for error in &report.errors {
        println!("{} {}", "!".red().bold(), error);
    }
    if report.completion != Completion::NotRequired {
        println!("completion: {}", report.completion);
    }
    println!("{}", report.summary());
}
