//! The patient journal.
//!
//! [`Journal`] owns the patient registry and the event store and is the only place where they
//! are changed together. Every operation validates its input before touching either
//! collection, so a failed call leaves the journal exactly as it was.
//!
//! The journal is a plain value with no I/O and no locking; [`crate::JournalService`] wraps it
//! for shared use and persistence.

use chrono::{DateTime, Utc};
use nutrilog_types::NonEmptyText;
use nutrilog_uuid::RecordId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::ANONYMOUS_PATIENT_NAME;
use crate::event::{
    AdjustmentRecord, ClinicalResult, ConsultationRecord, EventPayload, TimelineEvent,
};
use crate::event_store::{EventDraft, EventStore};
use crate::migration::{migrate, LegacyConsultation};
use crate::name::normalize;
use crate::patient::{Patient, PatientContext};
use crate::registry::PatientRegistry;
use crate::summary::{last_event_date, summarize, PatientFilter, PatientSummary};
use crate::timeline::{current_consultation, group, TimelineEntry};
use crate::typing::classify;
use crate::{JournalError, JournalResult};

/// The persisted form of a journal: every patient and every event, in stored order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalSnapshot {
    #[serde(default)]
    pub patients: Vec<Patient>,
    #[serde(default)]
    pub events: Vec<TimelineEvent>,
}

/// A finalised consultation to be recorded.
#[derive(Clone, Debug)]
pub struct NewConsultation {
    pub patient_name: String,
    pub context: Option<PatientContext>,
    pub transcript: String,
    pub result: ClinicalResult,
    /// Clinical occurrence time. Defaults to now, or to the patient's latest event if that is
    /// later. An explicit date may not precede the patient's latest event.
    pub date: Option<DateTime<Utc>>,
}

/// An adjustment to be recorded against an existing patient.
#[derive(Clone, Debug)]
pub struct NewAdjustment {
    pub patient_id: RecordId,
    pub note: String,
    pub previous_plan: Option<String>,
    pub new_plan: Option<String>,
    /// Clinical occurrence time. Defaults to now.
    pub date: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub patients: usize,
    pub events: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationReport {
    pub renamed: usize,
    pub merged: usize,
    /// Consultations whose visit type changed because a merge gave their patient an earlier
    /// or second `initial` consultation.
    pub retyped: usize,
}

impl NormalizationReport {
    pub fn is_empty(&self) -> bool {
        self.renamed == 0 && self.merged == 0 && self.retyped == 0
    }
}

#[derive(Clone, Debug)]
pub struct Journal {
    registry: PatientRegistry,
    events: EventStore,
    doctor_name: NonEmptyText,
}

impl Journal {
    /// Creates an empty journal. New events are attributed to `doctor_name`.
    pub fn new(doctor_name: NonEmptyText) -> Self {
        Self {
            registry: PatientRegistry::new(),
            events: EventStore::new(),
            doctor_name,
        }
    }

    /// Rebuilds a journal from a stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidInput`] if the snapshot reuses a patient or event
    /// identifier.
    pub fn from_snapshot(
        snapshot: JournalSnapshot,
        doctor_name: NonEmptyText,
    ) -> JournalResult<Self> {
        Ok(Self {
            registry: PatientRegistry::from_patients(snapshot.patients)?,
            events: EventStore::from_events(snapshot.events)?,
            doctor_name,
        })
    }

    pub fn snapshot(&self) -> JournalSnapshot {
        JournalSnapshot {
            patients: self.registry.as_slice().to_vec(),
            events: self.events.as_slice().to_vec(),
        }
    }

    pub fn doctor_name(&self) -> &NonEmptyText {
        &self.doctor_name
    }

    /// True when the journal holds neither patients nor events.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty() && self.events.is_empty()
    }

    /// Patients in registration order.
    pub fn list_patients(&self) -> &[Patient] {
        self.registry.as_slice()
    }

    /// # Errors
    ///
    /// Returns [`JournalError::PatientNotFound`] if no patient has this identifier.
    pub fn get_patient(&self, patient_id: &RecordId) -> JournalResult<&Patient> {
        self.registry
            .get(patient_id)
            .ok_or_else(|| JournalError::PatientNotFound(patient_id.clone()))
    }

    /// A patient's events, most recent date first. Events sharing a date are listed in reverse
    /// recording order.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::PatientNotFound`] if no patient has this identifier.
    pub fn list_events(&self, patient_id: &RecordId) -> JournalResult<Vec<&TimelineEvent>> {
        self.get_patient(patient_id)?;
        Ok(self.events.newest_first(patient_id))
    }

    /// A patient's timeline with adjustments nested under the consultations they amend.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::PatientNotFound`] if no patient has this identifier.
    pub fn grouped_timeline(&self, patient_id: &RecordId) -> JournalResult<Vec<TimelineEntry>> {
        self.get_patient(patient_id)?;
        Ok(group(&self.patient_events(patient_id)))
    }

    /// Records a finalised consultation for the patient named `patient_name`, creating the
    /// patient if the name is new. The first consultation of a patient is typed `initial`,
    /// every later one `followup`.
    pub fn add_consultation_event(
        &mut self,
        patient_name: &str,
        context: Option<PatientContext>,
        transcript: impl Into<String>,
        result: ClinicalResult,
    ) -> JournalResult<&TimelineEvent> {
        self.record_consultation(NewConsultation {
            patient_name: patient_name.to_owned(),
            context,
            transcript: transcript.into(),
            result,
            date: None,
        })
    }

    /// Records a consultation. A blank name is filed under [`ANONYMOUS_PATIENT_NAME`].
    ///
    /// Consultations are only ever added at the end of a patient's timeline, so the `initial`
    /// event stays the earliest one and adjustments already recorded keep their consultation.
    ///
    /// # Errors
    ///
    /// - [`JournalError::IncompleteResult`] if the result was read from storage without a
    ///   value. Results built with [`ClinicalResult::new`] are always complete.
    /// - [`JournalError::InvalidInput`] if `date` is earlier than the patient's latest event.
    pub fn record_consultation(
        &mut self,
        input: NewConsultation,
    ) -> JournalResult<&TimelineEvent> {
        if input.result.as_json().is_null() {
            return Err(JournalError::IncompleteResult(
                "consultation has no analysis result".into(),
            ));
        }

        let name = normalize(&input.patient_name);
        let name = if name.is_empty() {
            ANONYMOUS_PATIENT_NAME
        } else {
            name.as_str()
        };

        let now = Utc::now();
        let latest = self
            .registry
            .find_by_name(name)
            .and_then(|patient| self.events.latest_date(&patient.id));
        let date = match (input.date, latest) {
            (Some(date), Some(latest)) if date < latest => {
                return Err(JournalError::InvalidInput(format!(
                    "consultation date {} is earlier than the patient's latest event ({})",
                    date.to_rfc3339(),
                    latest.to_rfc3339()
                )));
            }
            (Some(date), _) => date,
            (None, Some(latest)) => now.max(latest),
            (None, None) => now,
        };

        let patient_id = self
            .registry
            .find_or_create(name, input.context.as_ref())?
            .id
            .clone();

        let visit = classify(&patient_id, self.events.as_slice());
        let record = ConsultationRecord {
            transcript: input.transcript,
            result: input.result,
        };
        let mut draft = EventDraft::new(
            patient_id,
            self.doctor_name.as_str(),
            EventPayload::consultation(visit, record),
        );
        draft.date = Some(date);
        draft.created_at = Some(now);

        self.events.append(draft)
    }

    /// Records a plan adjustment for an existing patient.
    pub fn add_adjustment(
        &mut self,
        patient_id: &RecordId,
        note: &str,
    ) -> JournalResult<&TimelineEvent> {
        self.record_adjustment(NewAdjustment {
            patient_id: patient_id.clone(),
            note: note.to_owned(),
            previous_plan: None,
            new_plan: None,
            date: None,
        })
    }

    /// Records an adjustment. The consultation that is current at the adjustment's date is
    /// remembered on the event so later grouping does not depend on timestamps alone.
    ///
    /// # Errors
    ///
    /// - [`JournalError::Text`] if the note is blank.
    /// - [`JournalError::PatientNotFound`] if the patient does not exist.
    pub fn record_adjustment(&mut self, input: NewAdjustment) -> JournalResult<&TimelineEvent> {
        let note = NonEmptyText::new(&input.note)?;
        self.get_patient(&input.patient_id)?;

        let now = Utc::now();
        let date = input.date.unwrap_or(now);
        let consultation_id = current_consultation(&self.patient_events(&input.patient_id), date)
            .map(|c| c.id.clone());

        let record = AdjustmentRecord {
            adjustment_note: note.into_inner(),
            previous_plan: plan_text(input.previous_plan),
            new_plan: plan_text(input.new_plan),
            consultation_id,
        };
        let mut draft = EventDraft::new(
            input.patient_id,
            self.doctor_name.as_str(),
            EventPayload::Adjustment(record),
        );
        draft.date = Some(date);
        draft.created_at = Some(now);

        self.events.append(draft)
    }

    /// Replaces an adjustment's note. Returns false if `event_id` is not an adjustment.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Text`] if the note is blank.
    pub fn edit_adjustment(&mut self, event_id: &RecordId, note: &str) -> JournalResult<bool> {
        let note = NonEmptyText::new(note)?;
        Ok(self.events.edit_note(event_id, &note))
    }

    /// Deletes an adjustment. Returns false if `event_id` is not an adjustment.
    pub fn delete_adjustment(&mut self, event_id: &RecordId) -> bool {
        self.events.remove(event_id)
    }

    /// Renames a patient. Events keep pointing at the same patient.
    ///
    /// # Errors
    ///
    /// See [`PatientRegistry::rename`].
    pub fn rename_patient(&mut self, patient_id: &RecordId, new_name: &str) -> JournalResult<bool> {
        self.registry.rename(patient_id, new_name)
    }

    /// Imports a legacy flat history into an empty journal.
    ///
    /// Returns `Ok(None)` without doing anything if the journal already holds data or the
    /// history is empty. Otherwise the whole history is migrated first and the result is
    /// installed in one step.
    pub fn migrate_legacy(
        &mut self,
        history: &[LegacyConsultation],
    ) -> JournalResult<Option<MigrationReport>> {
        if !self.is_empty() || history.is_empty() {
            return Ok(None);
        }

        let outcome = migrate(history, Utc::now())?;
        let registry = PatientRegistry::from_patients(outcome.patients)?;
        let events = EventStore::from_events(outcome.events)?;

        let report = MigrationReport {
            patients: registry.len(),
            events: events.len(),
        };
        self.registry = registry;
        self.events = events;

        tracing::info!(
            patients = report.patients,
            events = report.events,
            "legacy consultation history migrated"
        );
        Ok(Some(report))
    }

    /// Re-normalises every stored patient name and merges patients that end up sharing a
    /// name into the first one seen. Merged patients' events are moved to the survivor and
    /// their context is merged into it. The survivor's consultations are then retyped so its
    /// earliest one is the only `initial`.
    pub fn normalize_patients(&mut self) -> JournalResult<NormalizationReport> {
        let mut report = NormalizationReport::default();
        let mut survivors: HashMap<String, RecordId> = HashMap::new();

        let ids: Vec<RecordId> = self.registry.as_slice().iter().map(|p| p.id.clone()).collect();
        for id in ids {
            let Some(patient) = self.registry.get(&id) else {
                continue;
            };
            let name = normalize(&patient.name);
            if name.is_empty() {
                continue;
            }
            let key = name.to_lowercase();

            if let Some(survivor_id) = survivors.get(&key) {
                let Some(duplicate) = self.registry.remove(&id) else {
                    continue;
                };
                let moved = self.events.reassign_patient(&id, survivor_id);
                let retyped = self.events.retype_consultations(survivor_id);
                if let Some(survivor) = self.registry.get_mut(survivor_id) {
                    absorb(survivor, &duplicate);
                }
                tracing::info!(
                    merged_id = %id,
                    survivor_id = %survivor_id,
                    events = moved,
                    retyped,
                    "duplicate patient merged"
                );
                report.merged += 1;
                report.retyped += retyped;
                continue;
            }

            if let Some(patient) = self.registry.get_mut(&id) {
                if patient.name != name {
                    patient.name = name;
                    report.renamed += 1;
                }
            }
            survivors.insert(key, id);
        }

        if !report.is_empty() {
            tracing::info!(
                renamed = report.renamed,
                merged = report.merged,
                retyped = report.retyped,
                "patient names normalised"
            );
        }
        Ok(report)
    }

    /// Summaries of the patients matching `filter`, most recently active first.
    pub fn patient_summaries(&self, filter: &PatientFilter) -> Vec<PatientSummary> {
        summarize(self.registry.as_slice(), self.events.as_slice(), filter)
    }

    /// Date of the patient's most recent event.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::PatientNotFound`] if no patient has this identifier.
    pub fn last_visit(&self, patient_id: &RecordId) -> JournalResult<Option<DateTime<Utc>>> {
        self.get_patient(patient_id)?;
        Ok(last_event_date(self.events.for_patient(patient_id)))
    }

    fn patient_events(&self, patient_id: &RecordId) -> Vec<TimelineEvent> {
        self.events.for_patient(patient_id).cloned().collect()
    }
}

fn plan_text(plan: Option<String>) -> Option<String> {
    NonEmptyText::optional(plan).map(NonEmptyText::into_inner)
}

/// Folds a duplicate patient's details into the record that survives a merge.
fn absorb(survivor: &mut Patient, duplicate: &Patient) {
    survivor.context.merge_from(&duplicate.context);
    if survivor.phone.is_none() {
        survivor.phone = duplicate.phone.clone();
    }
    if survivor.email.is_none() {
        survivor.email = duplicate.email.clone();
    }
    if survivor.birth_date.is_none() {
        survivor.birth_date = duplicate.birth_date.clone();
    }
    if duplicate.created_at < survivor.created_at {
        survivor.created_at = duplicate.created_at;
    }
}
