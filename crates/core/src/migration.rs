//! Legacy flat-history migration.
//!
//! Before the journal became patient-centric, consultations were kept as one flat list of
//! records, each carrying the patient's name as free text. [`migrate`] turns such a list into
//! patients and timeline events. It works on a pass-local registry and event store and returns
//! the complete result; nothing is committed until the caller installs the outcome as a whole.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{ANONYMOUS_PATIENT_NAME, DEFAULT_DOCTOR_NAME};
use crate::event::{ClinicalResult, ConsultationRecord, EventPayload, TimelineEvent};
use crate::event_store::{EventDraft, EventStore};
use crate::name::normalize;
use crate::patient::Patient;
use crate::registry::PatientRegistry;
use crate::typing::classify;
use crate::JournalResult;

/// One record of the legacy consultation history.
///
/// Every field is optional: old records were written by several app versions and only the
/// transcript/result pair was ever reliably present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyConsultation {
    /// Either a string or a numeric timestamp-based identifier.
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default, alias = "patient")]
    pub patient_name: Option<String>,
    /// RFC 3339 text, epoch milliseconds, or a `{ seconds, nanoseconds }` object.
    #[serde(default)]
    pub date: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<serde_json::Value>,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub doctor_name: Option<String>,
}

impl LegacyConsultation {
    /// The record's identifier as text, if it had a usable one.
    pub fn legacy_id(&self) -> Option<String> {
        match self.id.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn occurred_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.date.as_ref()).or_else(|| parse_timestamp(self.created_at.as_ref()))
    }

    fn recorded_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.created_at.as_ref()).or_else(|| parse_timestamp(self.date.as_ref()))
    }
}

/// Patients and events produced by one migration pass, in creation order.
#[derive(Clone, Debug, Default)]
pub struct MigrationOutcome {
    pub patients: Vec<Patient>,
    pub events: Vec<TimelineEvent>,
}

/// Migrates a flat history, iterating it in stored order.
///
/// For each record the patient is found or created by normalised name within this pass (blank
/// names map to [`ANONYMOUS_PATIENT_NAME`]). The first record seen for a patient becomes its
/// `initial` event and later ones become `followup`. Missing timestamps fall back to `now` and
/// a missing practitioner to [`DEFAULT_DOCTOR_NAME`].
///
/// Histories written newest-first would leave a patient's latest record typed `initial`, so
/// once every record is in, each patient's earliest consultation by date is made the `initial`
/// one and the others `followup`. Stored order breaks ties between identical dates.
pub fn migrate(
    history: &[LegacyConsultation],
    now: DateTime<Utc>,
) -> JournalResult<MigrationOutcome> {
    let mut registry = PatientRegistry::new();
    let mut events = EventStore::new();

    for item in history {
        let name = match item.patient_name.as_deref().map(normalize) {
            Some(name) if !name.is_empty() => name,
            _ => ANONYMOUS_PATIENT_NAME.to_owned(),
        };
        let patient_id = registry.find_or_create(&name, None)?.id.clone();

        let visit = classify(&patient_id, events.as_slice());
        let record = ConsultationRecord {
            transcript: item.transcript.clone().unwrap_or_default(),
            result: ClinicalResult::from_legacy(
                item.result.clone().unwrap_or(serde_json::Value::Null),
            ),
        };
        let doctor_name = item
            .doctor_name
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DOCTOR_NAME);

        let mut draft = EventDraft::new(
            patient_id,
            doctor_name,
            EventPayload::consultation(visit, record),
        );
        draft.date = Some(item.occurred_at().unwrap_or(now));
        draft.created_at = Some(item.recorded_at().unwrap_or(now));
        draft.legacy_id = item.legacy_id();
        events.append(draft)?;
    }

    let retyped: usize = registry
        .as_slice()
        .iter()
        .map(|patient| events.retype_consultations(&patient.id))
        .sum();
    if retyped > 0 {
        tracing::debug!(retyped, "legacy consultations retyped by date");
    }

    Ok(MigrationOutcome {
        patients: registry.into_patients(),
        events: events.into_events(),
    })
}

fn parse_timestamp(raw: Option<&serde_json::Value>) -> Option<DateTime<Utc>> {
    match raw? {
        serde_json::Value::String(text) => {
            let text = text.trim();
            DateTime::parse_from_rfc3339(text)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| text.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis))
        }
        serde_json::Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        serde_json::Value::Object(fields) => {
            let seconds = fields
                .get("seconds")
                .or_else(|| fields.get("_seconds"))
                .and_then(serde_json::Value::as_i64)?;
            let nanos = fields
                .get("nanoseconds")
                .or_else(|| fields.get("_nanoseconds"))
                .and_then(serde_json::Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(0);
            DateTime::from_timestamp(seconds, nanos)
        }
        _ => None,
    }
}
