//! Patient registry.
//!
//! Maps normalised-name identity keys to patient records. Identity is resolved by
//! find-or-create on every consultation, so two patients never share a key as long as all
//! mutation goes through this type. Identifiers, not names, are what events reference, so a
//! rename never detaches a patient from its timeline.

use chrono::Utc;
use nutrilog_uuid::RecordId;

use crate::name::{identity_key, normalize};
use crate::patient::{Patient, PatientContext};
use crate::{JournalError, JournalResult};

#[derive(Clone, Debug, Default)]
pub struct PatientRegistry {
    patients: Vec<Patient>,
}

impl PatientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a registry from stored records, in stored order.
    ///
    /// Stored names are not re-normalised here; see [`crate::Journal::normalize_patients`].
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidInput`] if two records share an identifier.
    pub fn from_patients(patients: Vec<Patient>) -> JournalResult<Self> {
        let mut registry = Self::new();
        for patient in patients {
            registry.insert(patient)?;
        }
        Ok(registry)
    }

    /// Returns the patient whose name normalises to the same key as `raw_name`, creating one
    /// when none exists.
    ///
    /// When an existing patient is found and `context` carries values, they are merged into
    /// the stored record (non-empty incoming values overwrite).
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidInput`] if `raw_name` normalises to an empty string.
    pub fn find_or_create(
        &mut self,
        raw_name: &str,
        context: Option<&PatientContext>,
    ) -> JournalResult<&Patient> {
        let name = normalize(raw_name);
        if name.is_empty() {
            return Err(JournalError::InvalidInput(
                "patient name cannot be empty".into(),
            ));
        }
        let key = name.to_lowercase();

        if let Some(index) = self.position_by_key(&key) {
            let patient = &mut self.patients[index];
            if let Some(incoming) = context {
                if patient.context.merge_from(incoming) {
                    tracing::debug!(patient_id = %patient.id, "patient context updated");
                }
            }
            return Ok(&self.patients[index]);
        }

        let patient = Patient {
            id: self.fresh_id(),
            name,
            created_at: Utc::now(),
            phone: None,
            email: None,
            birth_date: None,
            context: context.cloned().unwrap_or_default(),
        };
        tracing::info!(patient_id = %patient.id, "patient registered");

        let index = self.patients.len();
        self.patients.push(patient);
        Ok(&self.patients[index])
    }

    /// Renames a patient to the normalised form of `new_name`.
    ///
    /// Returns `Ok(false)` without changing anything if the input normalises to an empty
    /// string or to the name already stored.
    ///
    /// # Errors
    ///
    /// - [`JournalError::PatientNotFound`] if `patient_id` is unknown.
    /// - [`JournalError::NameConflict`] if another patient already uses the new name's key.
    pub fn rename(&mut self, patient_id: &RecordId, new_name: &str) -> JournalResult<bool> {
        let index = self
            .position(patient_id)
            .ok_or_else(|| JournalError::PatientNotFound(patient_id.clone()))?;

        let name = normalize(new_name);
        if name.is_empty() || name == self.patients[index].name {
            return Ok(false);
        }

        let key = name.to_lowercase();
        if let Some(other) = self
            .patients
            .iter()
            .find(|p| &p.id != patient_id && p.identity_key() == key)
        {
            return Err(JournalError::NameConflict {
                name,
                existing: other.id.clone(),
            });
        }

        self.patients[index].name = name;
        Ok(true)
    }

    pub fn get(&self, patient_id: &RecordId) -> Option<&Patient> {
        self.patients.iter().find(|p| &p.id == patient_id)
    }

    pub(crate) fn get_mut(&mut self, patient_id: &RecordId) -> Option<&mut Patient> {
        self.patients.iter_mut().find(|p| &p.id == patient_id)
    }

    /// Looks a patient up by any spelling of their name.
    pub fn find_by_name(&self, raw_name: &str) -> Option<&Patient> {
        let key = identity_key(raw_name);
        self.position_by_key(&key).map(|i| &self.patients[i])
    }

    /// Patients in registration order.
    pub fn as_slice(&self) -> &[Patient] {
        &self.patients
    }

    pub fn len(&self) -> usize {
        self.patients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }

    pub fn into_patients(self) -> Vec<Patient> {
        self.patients
    }

    pub(crate) fn insert(&mut self, patient: Patient) -> JournalResult<()> {
        if self.get(&patient.id).is_some() {
            return Err(JournalError::InvalidInput(format!(
                "patient identifier {} is already in use",
                patient.id
            )));
        }
        self.patients.push(patient);
        Ok(())
    }

    pub(crate) fn remove(&mut self, patient_id: &RecordId) -> Option<Patient> {
        let index = self.position(patient_id)?;
        Some(self.patients.remove(index))
    }

    fn position(&self, patient_id: &RecordId) -> Option<usize> {
        self.patients.iter().position(|p| &p.id == patient_id)
    }

    fn position_by_key(&self, key: &str) -> Option<usize> {
        self.patients.iter().position(|p| p.identity_key() == key)
    }

    fn fresh_id(&self) -> RecordId {
        loop {
            let id = RecordId::new();
            if self.get(&id).is_none() {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patient::TrainingActivity;

    #[test]
    fn test_find_or_create_deduplicates_by_normalised_name() {
        let mut registry = PatientRegistry::new();

        let first = registry
            .find_or_create("Maria Silva", None)
            .expect("should create")
            .id
            .clone();
        let second = registry
            .find_or_create("maria   silva", None)
            .expect("should find")
            .id
            .clone();

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.as_slice()[0].name, "Maria Silva");
    }

    #[test]
    fn test_find_or_create_stores_normalised_name_and_context() {
        let mut registry = PatientRegistry::new();
        let context = PatientContext {
            goals: vec!["hipertrofia".into()],
            ..PatientContext::default()
        };

        let patient = registry
            .find_or_create("  joão  PEREIRA.", Some(&context))
            .expect("should create");

        assert_eq!(patient.name, "João Pereira");
        assert_eq!(patient.context, context);
    }

    #[test]
    fn test_find_or_create_merges_non_empty_context_into_existing() {
        let mut registry = PatientRegistry::new();
        let initial = PatientContext {
            goals: vec!["emagrecimento".into()],
            training_routine: vec![TrainingActivity {
                activity: "corrida".into(),
                frequency: "2x/semana".into(),
            }],
            ..PatientContext::default()
        };
        registry
            .find_or_create("Ana Costa", Some(&initial))
            .expect("should create");

        let update = PatientContext {
            is_first_consultation: Some(false),
            ..PatientContext::default()
        };
        let patient = registry
            .find_or_create("ANA COSTA", Some(&update))
            .expect("should find");

        assert_eq!(patient.context.goals, vec!["emagrecimento".to_string()]);
        assert_eq!(patient.context.training_routine.len(), 1);
        assert_eq!(patient.context.is_first_consultation, Some(false));
    }

    #[test]
    fn test_find_or_create_rejects_empty_name() {
        let mut registry = PatientRegistry::new();

        let err = registry
            .find_or_create(" ..; ", None)
            .expect_err("empty name should fail");

        assert!(matches!(err, JournalError::InvalidInput(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_rename_normalises_new_name() {
        let mut registry = PatientRegistry::new();
        let id = registry
            .find_or_create("ana", None)
            .expect("should create")
            .id
            .clone();

        let changed = registry.rename(&id, "ana   costa.").expect("rename should succeed");

        assert!(changed);
        assert_eq!(registry.get(&id).expect("patient").name, "Ana Costa");
        assert_eq!(
            registry.find_by_name("ANA COSTA").map(|p| p.id.clone()),
            Some(id)
        );
    }

    #[test]
    fn test_rename_with_blank_name_is_a_no_op() {
        let mut registry = PatientRegistry::new();
        let id = registry
            .find_or_create("Ana", None)
            .expect("should create")
            .id
            .clone();

        assert!(!registry.rename(&id, "   ").expect("blank rename is a no-op"));
        assert_eq!(registry.get(&id).expect("patient").name, "Ana");
    }

    #[test]
    fn test_rename_unknown_patient_is_not_found() {
        let mut registry = PatientRegistry::new();

        let err = registry
            .rename(&RecordId::new(), "Ana")
            .expect_err("unknown patient should fail");

        assert!(matches!(err, JournalError::PatientNotFound(_)));
    }

    #[test]
    fn test_rename_rejects_collision_with_other_patient() {
        let mut registry = PatientRegistry::new();
        let ana = registry
            .find_or_create("Ana Costa", None)
            .expect("should create")
            .id
            .clone();
        let bia = registry
            .find_or_create("Bia Souza", None)
            .expect("should create")
            .id
            .clone();

        let err = registry
            .rename(&bia, "ana costa")
            .expect_err("collision should be rejected");

        match err {
            JournalError::NameConflict { name, existing } => {
                assert_eq!(name, "Ana Costa");
                assert_eq!(existing, ana);
            }
            other => panic!("expected NameConflict, got {other:?}"),
        }
        assert_eq!(registry.get(&bia).expect("patient").name, "Bia Souza");
    }

    #[test]
    fn test_rename_allows_recasing_own_name() {
        let mut registry = PatientRegistry::new();
        let id = registry
            .find_or_create("Ana Costa", None)
            .expect("should create")
            .id
            .clone();

        assert!(!registry.rename(&id, "ANA COSTA").expect("same key is allowed"));
    }
}
