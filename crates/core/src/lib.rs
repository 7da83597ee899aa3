//! # Nutrilog Core
//!
//! Core business logic for the Nutrilog consultation journal.
//!
//! This crate owns the patient-centric journal and everything needed to keep it consistent:
//! - Patient name normalisation and find-or-create by normalised name
//! - Timeline events (`initial`, `followup`, `adjustment`) and their typing rules
//! - Read-time grouping of adjustments under the consultations they amend
//! - One-shot migration of the legacy flat consultation history
//! - Snapshot persistence as JSON files and the [`JournalService`] that serialises access
//!
//! **No API concerns**: HTTP servers and command-line parsing belong in `api-rest` and
//! `nutrilog-cli`.

pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod event_store;
pub mod journal;
pub mod migration;
pub mod name;
pub mod patient;
pub mod persistence;
pub mod registry;
pub mod service;
pub mod summary;
pub mod timeline;
pub mod typing;

pub use config::CoreConfig;
pub use error::{JournalError, JournalResult, PersistenceError, PersistenceResult};
pub use event::{
    AdjustmentRecord, ClinicalResult, ConsultationRecord, EventPayload, EventType,
    TimelineEvent, VisitType,
};
pub use journal::{
    Journal, JournalSnapshot, MigrationReport, NewAdjustment, NewConsultation,
    NormalizationReport,
};
pub use migration::LegacyConsultation;
pub use nutrilog_types::{NonEmptyText, TextError};
pub use nutrilog_uuid::{IdError, RecordId};
pub use patient::{Patient, PatientContext, TrainingActivity};
pub use persistence::{JournalPersistence, JsonFileStore, MemoryStore};
pub use service::{JournalService, PersistenceStatus, StartupReport};
pub use summary::{PatientFilter, PatientSummary};
pub use timeline::{ConsultationGroup, TimelineEntry};
