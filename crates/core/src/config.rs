//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the journal service.
//! The core never reads process-wide environment variables itself; binaries do that and hand
//! the result over as a [`CoreConfig`].

use crate::constants::{DEFAULT_DATA_DIR, DEFAULT_DOCTOR_NAME};
use crate::{JournalResult, NonEmptyText};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    doctor_name: NonEmptyText,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(data_dir: PathBuf, doctor_name: NonEmptyText) -> Self {
        Self {
            data_dir,
            doctor_name,
        }
    }

    /// Build a configuration from optional raw values, as read from the environment or a CLI.
    ///
    /// Missing or blank values fall back to [`DEFAULT_DATA_DIR`] and [`DEFAULT_DOCTOR_NAME`].
    pub fn from_values(
        data_dir: Option<String>,
        doctor_name: Option<String>,
    ) -> JournalResult<Self> {
        let data_dir = data_dir
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());

        let doctor_name = match NonEmptyText::optional(doctor_name) {
            Some(name) => name,
            None => NonEmptyText::new(DEFAULT_DOCTOR_NAME)?,
        };

        Ok(Self::new(PathBuf::from(data_dir), doctor_name))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn doctor_name(&self) -> &NonEmptyText {
        &self.doctor_name
    }
}
