//! Timeline events.
//!
//! A [`TimelineEvent`] is a common envelope (identity, owning patient, dates, provenance) around
//! an [`EventPayload`]. The payload is a sum type: consultation events carry a transcript and
//! the analysis result, adjustment events carry a note and optional plan text. The two shapes
//! can never be mixed on one record.
//!
//! On the wire the payload is flattened into the envelope and discriminated by a `type` field
//! of `initial`, `followup` or `adjustment`.

use chrono::{DateTime, Utc};
use nutrilog_uuid::RecordId;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{JournalError, JournalResult};

/// Kind of a consultation event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitType {
    Initial,
    Followup,
}

/// Discriminant of any timeline event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Initial,
    Followup,
    Adjustment,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Initial => "initial",
            EventType::Followup => "followup",
            EventType::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<VisitType> for EventType {
    fn from(visit: VisitType) -> Self {
        match visit {
            VisitType::Initial => EventType::Initial,
            VisitType::Followup => EventType::Followup,
        }
    }
}

/// Structured result returned by the analysis collaborator, kept verbatim.
///
/// The journal does not depend on any field of the result. The accessors below only serve
/// presentation and understand both the nutritional shape (`nutritionalAssessment`,
/// `clinicalRationale`) and the older medical shape (`diagnosis`, `rationale`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClinicalResult(serde_json::Value);

impl ClinicalResult {
    /// Wraps a completed analysis result.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::IncompleteResult`] unless `value` is a non-empty JSON object.
    pub fn new(value: serde_json::Value) -> JournalResult<Self> {
        match &value {
            serde_json::Value::Object(map) if !map.is_empty() => Ok(Self(value)),
            serde_json::Value::Object(_) => Err(JournalError::IncompleteResult(
                "result object has no fields".into(),
            )),
            other => Err(JournalError::IncompleteResult(format!(
                "expected a JSON object, got {}",
                json_kind(other)
            ))),
        }
    }

    /// Wraps a value read from a legacy record without validation.
    pub(crate) fn from_legacy(value: serde_json::Value) -> Self {
        Self(value)
    }

    fn missing() -> Self {
        Self(serde_json::Value::Null)
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }

    /// Headline of the assessment, if the result carries one.
    pub fn assessment(&self) -> Option<&str> {
        self.text_field(&["nutritionalAssessment", "diagnosis"])
    }

    /// Clinical rationale, if the result carries one.
    pub fn rationale(&self) -> Option<&str> {
        self.text_field(&["clinicalRationale", "rationale"])
    }

    fn text_field(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.0.get(*k).and_then(|v| v.as_str()))
            .find(|s| !s.trim().is_empty())
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Payload of an `initial` or `followup` event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationRecord {
    #[serde(default)]
    pub transcript: String,
    #[serde(default = "ClinicalResult::missing")]
    pub result: ClinicalResult,
}

/// Payload of an `adjustment` event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentRecord {
    pub adjustment_note: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_plan: Option<String>,
    /// Consultation that was current when the adjustment was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consultation_id: Option<RecordId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventPayload {
    Initial(ConsultationRecord),
    Followup(ConsultationRecord),
    Adjustment(AdjustmentRecord),
}

impl EventPayload {
    pub fn consultation(visit: VisitType, record: ConsultationRecord) -> Self {
        match visit {
            VisitType::Initial => EventPayload::Initial(record),
            VisitType::Followup => EventPayload::Followup(record),
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::Initial(_) => EventType::Initial,
            EventPayload::Followup(_) => EventType::Followup,
            EventPayload::Adjustment(_) => EventType::Adjustment,
        }
    }
}

/// A dated record of clinical activity for one patient.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub id: RecordId,
    pub patient_id: RecordId,
    pub date: DateTime<Utc>,
    pub doctor_name: String,
    pub created_at: DateTime<Utc>,
    /// Identifier of the legacy history item this event was migrated from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_id: Option<String>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl TimelineEvent {
    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    /// True for `initial` and `followup` events.
    pub fn is_consultation(&self) -> bool {
        !self.is_adjustment()
    }

    pub fn is_adjustment(&self) -> bool {
        matches!(self.payload, EventPayload::Adjustment(_))
    }

    pub fn consultation(&self) -> Option<&ConsultationRecord> {
        match &self.payload {
            EventPayload::Initial(c) | EventPayload::Followup(c) => Some(c),
            EventPayload::Adjustment(_) => None,
        }
    }

    pub fn adjustment(&self) -> Option<&AdjustmentRecord> {
        match &self.payload {
            EventPayload::Adjustment(a) => Some(a),
            _ => None,
        }
    }

    pub(crate) fn adjustment_mut(&mut self) -> Option<&mut AdjustmentRecord> {
        match &mut self.payload {
            EventPayload::Adjustment(a) => Some(a),
            _ => None,
        }
    }

    /// Changes a consultation's visit type. Returns false for adjustments and for
    /// consultations that already have `visit`.
    pub(crate) fn set_visit(&mut self, visit: VisitType) -> bool {
        let payload = match (&self.payload, visit) {
            (EventPayload::Followup(record), VisitType::Initial) => {
                EventPayload::Initial(record.clone())
            }
            (EventPayload::Initial(record), VisitType::Followup) => {
                EventPayload::Followup(record.clone())
            }
            _ => return false,
        };
        self.payload = payload;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    #[test]
    fn test_clinical_result_requires_non_empty_object() {
        assert!(ClinicalResult::new(json!({"nutritionalAssessment": "ok"})).is_ok());

        for bad in [json!(null), json!({}), json!("texto"), json!([1, 2])] {
            let err = ClinicalResult::new(bad).expect_err("should reject incomplete result");
            assert!(matches!(err, JournalError::IncompleteResult(_)));
        }
    }

    #[test]
    fn test_clinical_result_accessors_read_both_shapes() {
        let nutritional = ClinicalResult::new(json!({
            "nutritionalAssessment": "Déficit proteico",
            "clinicalRationale": "Ingestão abaixo de 0,8 g/kg",
        }))
        .expect("valid result");
        assert_eq!(nutritional.assessment(), Some("Déficit proteico"));
        assert_eq!(nutritional.rationale(), Some("Ingestão abaixo de 0,8 g/kg"));

        let medical = ClinicalResult::new(json!({"diagnosis": "Anemia", "rationale": "Hb 10"}))
            .expect("valid result");
        assert_eq!(medical.assessment(), Some("Anemia"));
        assert_eq!(medical.rationale(), Some("Hb 10"));
    }

    #[test]
    fn test_consultation_event_wire_format() {
        let event = TimelineEvent {
            id: RecordId::parse("event_1").expect("valid id"),
            patient_id: RecordId::parse("patient_1").expect("valid id"),
            date: ts("2024-03-01T10:00:00Z"),
            doctor_name: "Nutricionista".into(),
            created_at: ts("2024-03-01T10:00:00Z"),
            legacy_id: None,
            payload: EventPayload::Initial(ConsultationRecord {
                transcript: "Paciente relata cansaço".into(),
                result: ClinicalResult::new(json!({"nutritionalAssessment": "Fadiga"}))
                    .expect("valid result"),
            }),
        };

        let value = serde_json::to_value(&event).expect("should serialize");

        assert_eq!(value["type"], "initial");
        assert_eq!(value["patientId"], "patient_1");
        assert_eq!(value["transcript"], "Paciente relata cansaço");
        assert_eq!(value["result"]["nutritionalAssessment"], "Fadiga");
        assert!(value.get("adjustmentNote").is_none());

        let back: TimelineEvent = serde_json::from_value(value).expect("should deserialize");
        assert_eq!(back, event);
    }

    #[test]
    fn test_adjustment_event_reads_original_shape() {
        let value = json!({
            "id": "event_1712345678901",
            "patientId": "patient_1712345678000",
            "type": "adjustment",
            "date": "2024-04-05T18:21:18.901Z",
            "adjustmentNote": "aumentar proteína",
            "doctorName": "Dr. Alexandre",
            "createdAt": "2024-04-05T18:21:18.901Z"
        });

        let event: TimelineEvent = serde_json::from_value(value).expect("should deserialize");

        assert!(event.is_adjustment());
        assert_eq!(event.event_type(), EventType::Adjustment);
        let adjustment = event.adjustment().expect("adjustment payload");
        assert_eq!(adjustment.adjustment_note, "aumentar proteína");
        assert_eq!(adjustment.consultation_id, None);
        assert!(event.consultation().is_none());
    }

    #[test]
    fn test_unknown_event_type_is_rejected() {
        let value = json!({
            "id": "e1",
            "patientId": "p1",
            "type": "billing",
            "date": "2024-04-05T18:21:18Z",
            "doctorName": "x",
            "createdAt": "2024-04-05T18:21:18Z"
        });

        assert!(serde_json::from_value::<TimelineEvent>(value).is_err());
    }
}
