//! User settings.
//!
//! # Storage layout
//!
//! ```text
//! ~/.converge/
//!   config.yaml       (optional: defaults apply when absent)
//! ```
//!
//! # API pattern
//!
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};

/// Tunables for waits and matching. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Overall budget for one pass, shared by every nested wait.
    pub timeout_secs: u64,
    /// Interval between event-log fetches while waiting for a new event.
    pub event_poll_interval_ms: u64,
    /// Interval between single-event re-reads while waiting for completion.
    pub terminal_poll_interval_ms: u64,
    /// Report duplicate identity matches instead of taking the first.
    pub strict_identity: bool,
    /// Block until the remote operation completes.
    pub wait: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            event_poll_interval_ms: 1000,
            terminal_poll_interval_ms: 500,
            strict_identity: false,
            wait: true,
        }
    }
}

impl Settings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn event_poll_interval(&self) -> Duration {
        Duration::from_millis(self.event_poll_interval_ms)
    }

    pub fn terminal_poll_interval(&self) -> Duration {
        Duration::from_millis(self.terminal_poll_interval_ms)
    }
}

/// `<home>/.converge/`
pub fn converge_root(home: &Path) -> PathBuf {
    home.join(".converge")
}

/// `<home>/.converge/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    converge_root(home).join("config.yaml")
}

/// Load settings, falling back to defaults when the file does not exist.
///
/// Returns `ConfigError::Parse` (with path) if the YAML is malformed.
pub fn load_at(home: &Path) -> Result<Settings, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(Settings::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Settings, ConfigError> {
    load_at(&home()?)
}

/// Atomically save settings: serialize → `.yaml.tmp` sibling → `rename`.
pub fn save_at(home: &Path, settings: &Settings) -> Result<(), ConfigError> {
    let root = converge_root(home);
    std::fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    let path = config_path_at(home);
    let tmp = path.with_extension("yaml.tmp");
    let yaml = serde_yaml::to_string(settings)?;
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}
