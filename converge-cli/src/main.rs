//! converge: declarative reconciliation of managed cloud resources.
//!
//! # Usage
//!
//! ```text
//! converge plan <manifest> [--state <name>]
//! converge apply <manifest> [--no-wait] [--timeout <secs>] [--strict] [--state <name>]
//! converge show <kind> <id> [--state <name>]
//! converge events <kind> <id> [--action <action>] [--json] [--state <name>]
//! ```

mod commands;
mod manifest;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{apply::ApplyArgs, events::EventsArgs, plan::PlanArgs, show::ShowArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "converge",
    version,
    about = "Converge remote resources to a declared desired state",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show what apply would change, without changing anything.
    Plan(PlanArgs),

    /// Converge the resource described by a manifest.
    Apply(ApplyArgs),

    /// Print a stored object as JSON.
    Show(ShowArgs),

    /// List the events recorded for an object.
    Events(EventsArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Plan(args) => args.run(),
        Commands::Apply(args) => args.run(),
        Commands::Show(args) => args.run(),
        Commands::Events(args) => args.run(),
    }
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
