// src/session/store.rs

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fs,
    io::ErrorKind,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::SessionPayload;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored session is unreadable: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("session store lock poisoned")]
    Poisoned,
}

/// Everything needed to resume a session after a reload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub current_index: usize,
    /// Question id to selected choice ids.
    pub answers: BTreeMap<i64, Vec<i64>>,
    pub skipped: BTreeSet<usize>,
    pub answered: BTreeSet<usize>,
    /// Last known countdown, used only when the creation time is unknown.
    pub remaining_time: Option<i64>,
    /// The raw session payload, so a reload does not need the network.
    pub payload: Option<SessionPayload>,
}

/// Local key/value persistence for in-progress sessions, keyed by session id.
pub trait SessionStore: Send + Sync {
    fn load(&self, session_id: i64) -> Result<Option<PersistedSession>, StoreError>;
    fn save(&self, session_id: i64, state: &PersistedSession) -> Result<(), StoreError>;
    fn clear(&self, session_id: i64) -> Result<(), StoreError>;
}

impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    fn load(&self, session_id: i64) -> Result<Option<PersistedSession>, StoreError> {
        (**self).load(session_id)
    }

    fn save(&self, session_id: i64, state: &PersistedSession) -> Result<(), StoreError> {
        (**self).save(session_id, state)
    }

    fn clear(&self, session_id: i64) -> Result<(), StoreError> {
        (**self).clear(session_id)
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<i64, PersistedSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, session_id: i64) -> Result<Option<PersistedSession>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(&session_id).cloned())
    }

    fn save(&self, session_id: i64, state: &PersistedSession) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(session_id, state.clone());
        Ok(())
    }

    fn clear(&self, session_id: i64) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(&session_id);
        Ok(())
    }
}

/// One JSON file per session in a directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, session_id: i64) -> PathBuf {
        self.dir.join(format!("session-{}.json", session_id))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, session_id: i64) -> Result<Option<PersistedSession>, StoreError> {
        match fs::read(self.path_for(session_id)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, session_id: i64, state: &PersistedSession) -> Result<(), StoreError> {
        let path = self.path_for(session_id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(state)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn clear(&self, session_id: i64) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(session_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
