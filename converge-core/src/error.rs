//! Error types for converge-core.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::{EventAction, EventId, OperationKind};

/// Failure reported by a [`crate::store::RemoteStore`] implementation.
///
/// The reconciliation core propagates these unchanged; it never interprets a
/// status code beyond success/failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed object does not exist (for calls that require it to).
    #[error("{reference} not found")]
    NotFound { reference: String },

    /// The remote rejected the request.
    #[error("remote rejected request ({status}): {message}")]
    Status { status: u16, message: String },

    /// The request never reached the remote.
    #[error("transport error: {0}")]
    Transport(String),

    /// A local backend failed (filesystem, serialization, ...).
    #[error("store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// All errors that can arise from a reconciliation pass.
#[derive(Debug, Error)]
pub enum ConvergeError {
    /// A desired value differs from the remote one on a field that cannot be
    /// changed after creation.
    #[error("{resource}: field '{field}' cannot be changed after creation")]
    NonMutableField { resource: String, field: String },

    /// A desired value does not fit the field descriptor.
    #[error("{resource}: invalid value for '{field}': {reason}")]
    InvalidValue {
        resource: String,
        field: String,
        reason: String,
    },

    /// A bounded wait exhausted its budget.
    #[error("timed out after {elapsed:?} waiting for {what}")]
    TimeoutExceeded { what: String, elapsed: Duration },

    /// Strict matching found more than one remote candidate for an identity.
    #[error("{resource}: identity {identity} matches {candidates} remote objects")]
    AmbiguousMatch {
        resource: String,
        identity: String,
        candidates: usize,
    },

    /// A remote write failed while applying an operation set.
    #[error("{kind} {resource} {identity} failed: {source}")]
    OperationFailed {
        kind: OperationKind,
        resource: String,
        identity: String,
        #[source]
        source: StoreError,
    },

    /// A create was not attempted because the delete freeing its slot failed.
    #[error("create {resource} {identity} skipped: freeing delete of {blocked_by} failed")]
    DependentSkipped {
        resource: String,
        identity: String,
        blocked_by: String,
    },

    /// The awaited remote operation reached the `failed` status.
    #[error("remote operation {action} (event {event}) failed")]
    EventFailed { event: EventId, action: EventAction },

    /// A resource vanished between a mutation and its re-fetch.
    #[error("{reference} disappeared after it was written")]
    Vanished { reference: String },

    /// A read call failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ConvergeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ConvergeError::TimeoutExceeded { .. })
    }
}

/// Errors from loading or saving [`crate::config::Settings`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Parse failure on load, with the offending file.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
