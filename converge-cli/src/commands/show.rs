//! `converge show <kind> <id>`: print a stored object.

use anyhow::{Context, Result};
use clap::Args;

use super::{find_object, StateArgs};

/// Arguments for `converge show`.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Resource kind, e.g. `firewall_rule`.
    pub kind: String,

    /// Object id.
    pub id: u64,

    #[command(flatten)]
    pub state: StateArgs,
}

impl ShowArgs {
    pub fn run(self) -> Result<()> {
        let workspace = self.state.open()?;
        let object = find_object(&workspace.store, &self.kind, self.id).with_context(|| {
            format!(
                "{} {} not found in state '{}'",
                self.kind, self.id, self.state.state
            )
        })?;

        println!(
            "{}",
            serde_json::to_string_pretty(&object).context("failed to serialize object JSON")?
        );
        Ok(())
    }
}
