//! Error types for converge-store.

use std::path::PathBuf;

use thiserror::Error;

use converge_core::StoreError;

/// Errors from persisting store state to disk.
#[derive(Debug, Error)]
pub enum FileStoreError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The state document could not be (de)serialized.
    #[error("state JSON error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

impl From<FileStoreError> for StoreError {
    fn from(err: FileStoreError) -> Self {
        StoreError::Backend(Box::new(err))
    }
}

/// Convenience constructor for [`FileStoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> FileStoreError {
    FileStoreError::Io {
        path: path.into(),
        source,
    }
}
