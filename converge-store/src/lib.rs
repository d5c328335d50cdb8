//! # converge-store
//!
//! Concrete [`converge_core::RemoteStore`] backends.
//!
//! [`MemoryStore`] keeps everything in memory and journals every call;
//! [`FileStore`] wraps it and persists its state as JSON under
//! `~/.converge/state/`.

pub mod error;
pub mod file;
pub mod memory;

pub use error::FileStoreError;
pub use file::{FileStore, DEFAULT_STATE_NAME};
pub use memory::{InjectedFailure, MemoryStore, StoreCall, StoreState, EVENT_PAGE_SIZE};
