//! Shared, persisted access to a [`Journal`].
//!
//! [`JournalService`] serialises every read and mutation through one mutex and writes a full
//! snapshot after each successful mutation while the lock is still held, so stored snapshots
//! follow the order in which mutations were made.
//!
//! Storage problems never fail a journal operation. They are logged and reported through
//! [`JournalService::persistence_status`]. If the stored journal cannot be loaded at startup
//! the service runs on an empty in-memory journal and stops saving, so the unreadable file is
//! left for an operator to inspect instead of being replaced.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::CoreConfig;
use crate::journal::{Journal, MigrationReport, NormalizationReport};
use crate::persistence::JournalPersistence;
use crate::{JournalError, JournalResult};

/// Outcome of the startup sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartupReport {
    pub migration: Option<MigrationReport>,
    pub normalization: NormalizationReport,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceStatus {
    /// Most recent storage error, cleared by the next successful save.
    pub last_error: Option<String>,
    /// True when saving is disabled because the stored journal could not be loaded.
    pub saves_suspended: bool,
}

struct ServiceState {
    journal: Journal,
    status: PersistenceStatus,
    startup: StartupReport,
}

pub struct JournalService {
    state: Mutex<ServiceState>,
    persistence: Arc<dyn JournalPersistence>,
}

impl JournalService {
    /// Opens the journal: loads the stored snapshot, migrates the legacy history into an empty
    /// journal, re-normalises patient names, and saves if anything changed. The whole
    /// sequence runs under the service lock.
    pub fn open(
        config: &CoreConfig,
        persistence: Arc<dyn JournalPersistence>,
    ) -> JournalResult<Self> {
        let service = Self {
            state: Mutex::new(ServiceState {
                journal: Journal::new(config.doctor_name().clone()),
                status: PersistenceStatus::default(),
                startup: StartupReport::default(),
            }),
            persistence,
        };

        {
            let mut state = service.lock()?;
            service.load(&mut state)?;
        }

        Ok(service)
    }

    fn load(&self, state: &mut ServiceState) -> JournalResult<()> {
        let loaded = self.persistence.load_all().map_err(JournalError::from).and_then(
            |snapshot| Journal::from_snapshot(snapshot, state.journal.doctor_name().clone()),
        );
        match loaded {
            Ok(journal) => state.journal = journal,
            Err(err) => {
                tracing::warn!(error = %err, "stored journal could not be loaded; saves suspended");
                state.status.last_error = Some(err.to_string());
                state.status.saves_suspended = true;
                return Ok(());
            }
        }

        let mut changed = false;
        match self.persistence.load_legacy_history() {
            Ok(history) => {
                state.startup.migration = state.journal.migrate_legacy(&history)?;
                changed |= state.startup.migration.is_some();
            }
            Err(err) => {
                tracing::warn!(error = %err, "legacy consultation history could not be loaded");
                state.status.last_error = Some(err.to_string());
            }
        }

        state.startup.normalization = state.journal.normalize_patients()?;
        changed |= !state.startup.normalization.is_empty();

        if changed {
            self.save(state);
        }
        tracing::info!(
            patients = state.journal.list_patients().len(),
            "journal opened"
        );
        Ok(())
    }

    /// Runs `f` against the journal.
    pub fn read<T>(&self, f: impl FnOnce(&Journal) -> T) -> JournalResult<T> {
        let state = self.lock()?;
        Ok(f(&state.journal))
    }

    /// Runs `f` against the journal and saves a snapshot if it succeeds. A failed save is
    /// recorded in the persistence status but does not fail the call.
    pub fn mutate<T>(&self, f: impl FnOnce(&mut Journal) -> JournalResult<T>) -> JournalResult<T> {
        let mut state = self.lock()?;
        let output = f(&mut state.journal)?;
        self.save(&mut state);
        Ok(output)
    }

    pub fn persistence_status(&self) -> JournalResult<PersistenceStatus> {
        Ok(self.lock()?.status.clone())
    }

    /// What the startup sequence did.
    pub fn startup_report(&self) -> JournalResult<StartupReport> {
        Ok(self.lock()?.startup)
    }

    fn save(&self, state: &mut ServiceState) {
        if state.status.saves_suspended {
            tracing::debug!("journal save skipped; saves suspended");
            return;
        }
        match self.persistence.save_all(&state.journal.snapshot()) {
            Ok(()) => state.status.last_error = None,
            Err(err) => {
                tracing::warn!(error = %err, "journal snapshot could not be saved");
                state.status.last_error = Some(err.to_string());
            }
        }
    }

    fn lock(&self) -> JournalResult<MutexGuard<'_, ServiceState>> {
        self.state.lock().map_err(|_| JournalError::LockPoisoned)
    }
}
