pub mod apply;
pub mod events;
pub mod plan;
pub mod show;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use converge_core::{config, RemoteObject, Settings};
use converge_store::{FileStore, DEFAULT_STATE_NAME};

/// State selection shared by every command.
#[derive(Args, Debug, Clone)]
pub struct StateArgs {
    /// Name of the state document under ~/.converge/state/.
    #[arg(long, default_value = DEFAULT_STATE_NAME)]
    pub state: String,
}

/// Home directory, settings and the opened store for one invocation.
pub struct Workspace {
    pub settings: Settings,
    pub store: FileStore,
}

impl StateArgs {
    pub fn open(&self) -> Result<Workspace> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let settings = config::load_at(&home).context("failed to load ~/.converge/config.yaml")?;
        let store = FileStore::open_at(&home, &self.state)
            .with_context(|| format!("failed to open state '{}'", self.state))?;
        Ok(Workspace { settings, store })
    }
}

/// Stored object with this kind and id, searched across every parent.
pub fn find_object(store: &FileStore, kind: &str, id: u64) -> Option<RemoteObject> {
    store
        .inner()
        .state()
        .objects()
        .iter()
        .find(|o| o.reference.kind.0 == kind && o.reference.id.0 == id)
        .cloned()
}
