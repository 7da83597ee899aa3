//! Patient records and the clinical context attached by the consultation flow.

use chrono::{DateTime, Utc};
use nutrilog_uuid::RecordId;
use serde::{Deserialize, Serialize};

/// A patient known to the journal.
///
/// `name` is always stored in normalised form (see [`crate::name::normalize`]).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: RecordId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(flatten)]
    pub context: PatientContext,
}

impl Patient {
    /// Identity key of this patient: the normalised name, lower-cased.
    pub fn identity_key(&self) -> String {
        crate::name::identity_key(&self.name)
    }
}

/// One recurring physical activity in a patient's training routine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingActivity {
    #[serde(rename = "type")]
    pub activity: String,
    pub frequency: String,
}

/// Free-form clinical context captured alongside a consultation.
///
/// None of these fields take part in identity or typing decisions. When the same patient is
/// seen again, incoming values are merged with "non-empty incoming value overwrites" semantics
/// (see [`PatientContext::merge_from`]).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientContext {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub goals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_custom: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub training_routine: Vec<TrainingActivity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_first_consultation: Option<bool>,
}

impl PatientContext {
    /// Returns true if no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
            && blank(self.goal_custom.as_deref())
            && self.training_routine.is_empty()
            && self.is_first_consultation.is_none()
    }

    /// Merges `incoming` into `self`. Non-empty incoming values overwrite; empty or absent
    /// incoming values never erase what is already stored.
    ///
    /// Returns true if anything changed.
    pub fn merge_from(&mut self, incoming: &PatientContext) -> bool {
        let before = self.clone();

        if !incoming.goals.is_empty() {
            self.goals = incoming.goals.clone();
        }
        if !blank(incoming.goal_custom.as_deref()) {
            self.goal_custom = incoming.goal_custom.clone();
        }
        if !incoming.training_routine.is_empty() {
            self.training_routine = incoming.training_routine.clone();
        }
        if incoming.is_first_consultation.is_some() {
            self.is_first_consultation = incoming.is_first_consultation;
        }

        *self != before
    }
}

fn blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored_context() -> PatientContext {
        PatientContext {
            goals: vec!["emagrecimento".into()],
            goal_custom: Some("correr 10k".into()),
            training_routine: vec![TrainingActivity {
                activity: "musculação".into(),
                frequency: "3x/semana".into(),
            }],
            is_first_consultation: Some(true),
        }
    }

    #[test]
    fn test_merge_ignores_empty_incoming_values() {
        let mut ctx = stored_context();
        let incoming = PatientContext {
            goal_custom: Some("   ".into()),
            ..PatientContext::default()
        };

        let changed = ctx.merge_from(&incoming);

        assert!(!changed, "empty incoming context should not change anything");
        assert_eq!(ctx, stored_context());
    }

    #[test]
    fn test_merge_overwrites_with_non_empty_values() {
        let mut ctx = stored_context();
        let incoming = PatientContext {
            goals: vec!["hipertrofia".into()],
            is_first_consultation: Some(false),
            ..PatientContext::default()
        };

        let changed = ctx.merge_from(&incoming);

        assert!(changed);
        assert_eq!(ctx.goals, vec!["hipertrofia".to_string()]);
        assert_eq!(ctx.is_first_consultation, Some(false));
        assert_eq!(ctx.goal_custom.as_deref(), Some("correr 10k"));
        assert_eq!(ctx.training_routine.len(), 1);
    }

    #[test]
    fn test_is_empty() {
        assert!(PatientContext::default().is_empty());
        assert!(!stored_context().is_empty());
    }

    #[test]
    fn test_patient_serializes_camel_case() {
        let patient = Patient {
            id: RecordId::parse("patient_1").expect("valid id"),
            name: "Ana Costa".into(),
            created_at: DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
                .expect("valid timestamp")
                .with_timezone(&Utc),
            phone: None,
            email: None,
            birth_date: Some("1990-05-04".into()),
            context: stored_context(),
        };

        let json = serde_json::to_value(&patient).expect("should serialize");

        assert_eq!(json["createdAt"], "2024-03-01T12:00:00Z");
        assert_eq!(json["birthDate"], "1990-05-04");
        assert_eq!(json["goalCustom"], "correr 10k");
        assert_eq!(json["trainingRoutine"][0]["type"], "musculação");
        assert_eq!(json["isFirstConsultation"], true);
        assert!(json.get("phone").is_none());

        let back: Patient = serde_json::from_value(json).expect("should deserialize");
        assert_eq!(back, patient);
    }
}
