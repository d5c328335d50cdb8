//! File-backed [`RemoteStore`].
//!
//! Persists a [`StoreState`] JSON document at
//! `<home>/.converge/state/<name>.json`. Every call that changes state saves
//! the document with the `.tmp` + rename pattern, so a crash mid-write never
//! leaves a truncated file behind.

use std::path::{Path, PathBuf};

use converge_core::{
    Attributes, Collection, EventFilter, EventId, EventRecord, RemoteObject, RemoteStore,
    ResourceRef, StoreError,
};

use crate::error::{io_err, FileStoreError};
use crate::memory::{MemoryStore, StoreState};

/// Name used when the caller does not pick one.
pub const DEFAULT_STATE_NAME: &str = "default";

/// `<home>/.converge/state/<name>.json`: pure, no I/O.
pub fn state_path_at(home: &Path, name: &str) -> PathBuf {
    home.join(".converge")
        .join("state")
        .join(format!("{name}.json"))
}

/// Load the state document for `name`; an empty state if it does not exist.
pub fn load_at(home: &Path, name: &str) -> Result<StoreState, FileStoreError> {
    let path = state_path_at(home, name);
    if !path.exists() {
        return Ok(StoreState::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_json::from_str(&contents).map_err(|source| FileStoreError::Json { path, source })
}

/// Save the state document for `name` atomically.
pub fn save_at(home: &Path, name: &str, state: &StoreState) -> Result<(), FileStoreError> {
    let path = state_path_at(home, name);
    let Some(dir) = path.parent() else {
        return Err(io_err(
            path,
            std::io::Error::other("invalid state path"),
        ));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(state).map_err(|source| FileStoreError::Json {
        path: path.clone(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }
    Ok(())
}

/// A [`MemoryStore`] whose state survives between processes.
#[derive(Debug)]
pub struct FileStore {
    home: PathBuf,
    name: String,
    inner: MemoryStore,
}

impl FileStore {
    pub fn open_at(home: &Path, name: &str) -> Result<Self, FileStoreError> {
        let state = load_at(home, name)?;
        tracing::debug!(
            "opened state '{name}' ({} object(s))",
            state.objects().len()
        );
        Ok(Self {
            home: home.to_path_buf(),
            name: name.to_string(),
            inner: MemoryStore::from_state(state),
        })
    }

    /// `open_at` convenience wrapper.
    pub fn open(name: &str) -> Result<Self, FileStoreError> {
        let home = dirs::home_dir().ok_or(FileStoreError::HomeNotFound)?;
        Self::open_at(&home, name)
    }

    pub fn path(&self) -> PathBuf {
        state_path_at(&self.home, &self.name)
    }

    /// The wrapped store, for seeding and journal inspection.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn save(&self) -> Result<(), FileStoreError> {
        save_at(&self.home, &self.name, &self.inner.state())
    }

    fn persist<T>(&self, result: Result<T, StoreError>) -> Result<T, StoreError> {
        let value = result?;
        self.save()?;
        Ok(value)
    }
}

impl RemoteStore for FileStore {
    fn get(&self, reference: &ResourceRef) -> Result<Option<RemoteObject>, StoreError> {
        self.inner.get(reference)
    }

    fn list(&self, collection: &Collection) -> Result<Vec<RemoteObject>, StoreError> {
        self.inner.list(collection)
    }

    fn create(
        &self,
        collection: &Collection,
        payload: &Attributes,
    ) -> Result<RemoteObject, StoreError> {
        self.persist(self.inner.create(collection, payload))
    }

    fn update(
        &self,
        reference: &ResourceRef,
        fields: &Attributes,
    ) -> Result<RemoteObject, StoreError> {
        self.persist(self.inner.update(reference, fields))
    }

    fn delete(&self, reference: &ResourceRef) -> Result<(), StoreError> {
        self.persist(self.inner.delete(reference))
    }

    fn list_events(&self, filter: &EventFilter) -> Result<Vec<EventRecord>, StoreError> {
        self.inner.list_events(filter)
    }

    // Reads advance pending event statuses, so they are persisted too.
    fn get_event(&self, id: EventId) -> Result<Option<EventRecord>, StoreError> {
        self.persist(self.inner.get_event(id))
    }
}
