//! Constants used throughout the journal core crate.
//!
//! This module contains file names and placeholder values so that the core, the REST surface
//! and the CLI agree on them.

/// Default directory for journal storage when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "journal_data";

/// Filename of the patient-centric journal snapshot (`{ patients, events }`).
pub const JOURNAL_FILENAME: &str = "journal.json";

/// Filename of the legacy flat consultation history. Read-only.
pub const LEGACY_HISTORY_FILENAME: &str = "consultation_history.json";

/// Display name used when a consultation is recorded without a patient name.
pub const ANONYMOUS_PATIENT_NAME: &str = "Anônimo";

/// Practitioner name used when none is configured or a legacy record carries none.
pub const DEFAULT_DOCTOR_NAME: &str = "Nutricionista";

/// Characters removed from patient names before casing.
pub const STRIPPED_NAME_CHARS: [char; 8] = ['.', ';', '\'', '"', '[', ']', '{', '}'];
