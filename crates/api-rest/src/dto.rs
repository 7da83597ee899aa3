//! Request and response bodies of the REST API.
//!
//! Journal records (patients, events, timeline entries) are returned in their stored JSON
//! form and documented as free-form objects.

use nutrilog_core::{
    Patient, PatientContext, PatientSummary, PersistenceStatus, TimelineEntry, TimelineEvent,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
    pub persistence_error: Option<String>,
    pub saves_suspended: bool,
}

impl HealthRes {
    pub fn from_status(status: PersistenceStatus) -> Self {
        Self {
            ok: status.last_error.is_none() && !status.saves_suspended,
            message: "Nutrilog REST API is alive".into(),
            persistence_error: status.last_error,
            saves_suspended: status.saves_suspended,
        }
    }
}

/// Query string of `GET /patients`.
#[derive(Debug, Default, Deserialize)]
pub struct ListPatientsQuery {
    /// Case-insensitive name fragment.
    pub q: Option<String>,
    /// Calendar day, `YYYY-MM-DD`.
    pub date: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListPatientsRes {
    #[schema(value_type = Object)]
    pub patients: Vec<PatientSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatientRes {
    #[schema(value_type = Object)]
    pub patient: Patient,
    /// RFC 3339 date of the most recent event.
    #[schema(value_type = Option<String>)]
    pub last_visit: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RenamePatientReq {
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListEventsRes {
    #[schema(value_type = Object)]
    pub events: Vec<TimelineEvent>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TimelineRes {
    #[schema(value_type = Object)]
    pub entries: Vec<TimelineEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EventRes {
    #[schema(value_type = Object)]
    pub event: TimelineEvent,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateConsultationReq {
    #[serde(default)]
    pub patient_name: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub context: Option<PatientContext>,
    #[serde(default)]
    pub transcript: String,
    /// Structured analysis result, stored verbatim. Must be a non-empty object.
    #[schema(value_type = Object)]
    pub result: serde_json::Value,
    /// RFC 3339 occurrence time. Defaults to now. May not precede the patient's latest
    /// event.
    pub date: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAdjustmentReq {
    pub note: String,
    pub previous_plan: Option<String>,
    pub new_plan: Option<String>,
    /// RFC 3339 occurrence time. Defaults to now.
    pub date: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EditNoteReq {
    pub note: String,
}
