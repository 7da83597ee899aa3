//! Journal persistence.
//!
//! The journal itself never touches storage. A [`JournalPersistence`] implementation loads the
//! last snapshot at startup, saves a full snapshot after each mutation and exposes the legacy
//! flat history for the one-shot migration.
//!
//! [`JsonFileStore`] keeps everything under one data directory:
//!
//! ```text
//! <data_dir>/
//!   journal.json                 # { "patients": [...], "events": [...] }
//!   consultation_history.json    # legacy flat history, read only
//! ```
//!
//! The snapshot is written to a temporary file in the same directory and then renamed over the
//! previous one, so a reader never sees a half-written journal.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::de::DeserializeOwned;

use crate::config::CoreConfig;
use crate::constants::{JOURNAL_FILENAME, LEGACY_HISTORY_FILENAME};
use crate::journal::JournalSnapshot;
use crate::migration::LegacyConsultation;
use crate::{PersistenceError, PersistenceResult};

pub trait JournalPersistence: Send + Sync {
    /// Loads the stored snapshot. A store that has never been written loads as empty.
    fn load_all(&self) -> PersistenceResult<JournalSnapshot>;

    /// Replaces the stored snapshot as a whole.
    fn save_all(&self, snapshot: &JournalSnapshot) -> PersistenceResult<()>;

    /// Loads the legacy flat history. Missing history loads as empty.
    fn load_legacy_history(&self) -> PersistenceResult<Vec<LegacyConsultation>>;
}

/// JSON files in a single data directory.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(config.data_dir())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join(JOURNAL_FILENAME)
    }

    pub fn legacy_history_path(&self) -> PathBuf {
        self.data_dir.join(LEGACY_HISTORY_FILENAME)
    }
}

impl JournalPersistence for JsonFileStore {
    fn load_all(&self) -> PersistenceResult<JournalSnapshot> {
        Ok(read_json(&self.journal_path())?.unwrap_or_default())
    }

    fn save_all(&self, snapshot: &JournalSnapshot) -> PersistenceResult<()> {
        fs::create_dir_all(&self.data_dir).map_err(PersistenceError::StorageDirCreation)?;

        let json = serde_json::to_vec_pretty(snapshot).map_err(PersistenceError::Serialization)?;

        let mut file =
            tempfile::NamedTempFile::new_in(&self.data_dir).map_err(PersistenceError::FileWrite)?;
        file.write_all(&json).map_err(PersistenceError::FileWrite)?;
        file.as_file().sync_all().map_err(PersistenceError::FileWrite)?;
        file.persist(self.journal_path())
            .map_err(|e| PersistenceError::FileWrite(e.error))?;

        tracing::debug!(
            patients = snapshot.patients.len(),
            events = snapshot.events.len(),
            "journal snapshot written"
        );
        Ok(())
    }

    fn load_legacy_history(&self) -> PersistenceResult<Vec<LegacyConsultation>> {
        Ok(read_json(&self.legacy_history_path())?.unwrap_or_default())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> PersistenceResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path).map_err(PersistenceError::FileRead)?;
    if contents.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(PersistenceError::Deserialization)
}

/// In-process store. Failures can be switched on to exercise error handling.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<JournalSnapshot>>,
    legacy: Vec<LegacyConsultation>,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_legacy_history(mut self, history: Vec<LegacyConsultation>) -> Self {
        self.legacy = history;
        self
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// The last snapshot saved (or seeded), if any.
    pub fn saved(&self) -> Option<JournalSnapshot> {
        self.snapshot.lock().ok().and_then(|s| s.clone())
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl JournalPersistence for MemoryStore {
    fn load_all(&self) -> PersistenceResult<JournalSnapshot> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("memory store load failed".into()));
        }
        let snapshot = self
            .snapshot
            .lock()
            .map_err(|_| PersistenceError::Unavailable("memory store lock poisoned".into()))?;
        Ok(snapshot.clone().unwrap_or_default())
    }

    fn save_all(&self, snapshot: &JournalSnapshot) -> PersistenceResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("memory store save failed".into()));
        }
        let mut stored = self
            .snapshot
            .lock()
            .map_err(|_| PersistenceError::Unavailable("memory store lock poisoned".into()))?;
        *stored = Some(snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load_legacy_history(&self) -> PersistenceResult<Vec<LegacyConsultation>> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("memory store load failed".into()));
        }
        Ok(self.legacy.clone())
    }
}
