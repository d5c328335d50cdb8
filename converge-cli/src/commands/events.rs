//! `converge events <kind> <id>`: event log of one object.

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use converge_core::{EventRecord, EventStatus};

use super::StateArgs;

/// Arguments for `converge events`.
#[derive(Args, Debug)]
pub struct EventsArgs {
    /// Entity type, e.g. `lke_cluster`.
    pub kind: String,

    /// Entity id.
    pub id: u64,

    /// Only events with this action.
    #[arg(long)]
    pub action: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub state: StateArgs,
}

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "id")]
    id: u64,
    #[tabled(rename = "action")]
    action: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "created")]
    created: String,
}

impl EventsArgs {
    pub fn run(self) -> Result<()> {
        let workspace = self.state.open()?;
        let records: Vec<EventRecord> = workspace
            .store
            .inner()
            .state()
            .events()
            .filter(|r| r.entity_type.0 == self.kind && r.entity_id.0 == self.id)
            .filter(|r| self.action.as_ref().map_or(true, |a| &r.action.0 == a))
            .cloned()
            .collect();

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&records).context("failed to serialize events JSON")?
            );
            return Ok(());
        }

        if records.is_empty() {
            println!("No events for {} {}.", self.kind, self.id);
            return Ok(());
        }

        let rows: Vec<EventRow> = records
            .into_iter()
            .map(|r| EventRow {
                id: r.id.0,
                action: r.action.0,
                status: status_label(r.status),
                created: r.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

fn status_label(status: EventStatus) -> String {
    use colored::Colorize;

    match status {
        EventStatus::Finished | EventStatus::Notification => status.to_string().green().to_string(),
        EventStatus::Failed => status.to_string().red().to_string(),
        EventStatus::Scheduled | EventStatus::Started => status.to_string().yellow().to_string(),
    }
}
