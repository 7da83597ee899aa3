//! Timeline event store.
//!
//! Events are kept in append order. Read-side ordering is by clinical date, with append
//! position breaking ties, here for flat listings and in [`crate::timeline`] for grouping.
//!
//! Only adjustment events can be edited (note text) or removed. Both operations are guarded
//! no-ops for unknown identifiers and for consultation events, and report whether anything
//! changed.

use chrono::{DateTime, Utc};
use nutrilog_types::NonEmptyText;
use nutrilog_uuid::RecordId;
use std::cmp::Reverse;

use crate::event::{EventPayload, TimelineEvent, VisitType};
use crate::{JournalError, JournalResult};

/// An event about to be appended. Missing identifiers and dates are filled in by the store.
#[derive(Clone, Debug)]
pub struct EventDraft {
    pub id: Option<RecordId>,
    pub patient_id: RecordId,
    pub date: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub doctor_name: String,
    pub legacy_id: Option<String>,
    pub payload: EventPayload,
}

impl EventDraft {
    pub fn new(
        patient_id: RecordId,
        doctor_name: impl Into<String>,
        payload: EventPayload,
    ) -> Self {
        Self {
            id: None,
            patient_id,
            date: None,
            created_at: None,
            doctor_name: doctor_name.into(),
            legacy_id: None,
            payload,
        }
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct EventStore {
    events: Vec<TimelineEvent>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from events in their stored (append) order.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidInput`] if two events share an identifier.
    pub fn from_events(events: Vec<TimelineEvent>) -> JournalResult<Self> {
        let mut store = Self::new();
        for event in events {
            store.ensure_unique(&event.id)?;
            store.events.push(event);
        }
        Ok(store)
    }

    /// Appends an event, assigning its identifier, `date` and `createdAt` when absent.
    ///
    /// `date` defaults to `createdAt`, which defaults to now.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidInput`] if the draft carries an identifier that is
    /// already in use.
    pub fn append(&mut self, draft: EventDraft) -> JournalResult<&TimelineEvent> {
        let id = match draft.id {
            Some(id) => {
                self.ensure_unique(&id)?;
                id
            }
            None => self.fresh_id(),
        };
        let created_at = draft.created_at.unwrap_or_else(Utc::now);
        let date = draft.date.unwrap_or(created_at);

        let event = TimelineEvent {
            id,
            patient_id: draft.patient_id,
            date,
            doctor_name: draft.doctor_name,
            created_at,
            legacy_id: draft.legacy_id,
            payload: draft.payload,
        };

        tracing::debug!(
            event_id = %event.id,
            patient_id = %event.patient_id,
            event_type = %event.event_type(),
            "timeline event appended"
        );

        let index = self.events.len();
        self.events.push(event);
        Ok(&self.events[index])
    }

    /// Removes an adjustment event. Returns false (and changes nothing) if the event does not
    /// exist or is a consultation.
    pub fn remove(&mut self, event_id: &RecordId) -> bool {
        let Some(index) = self
            .events
            .iter()
            .position(|e| &e.id == event_id && e.is_adjustment())
        else {
            return false;
        };

        self.events.remove(index);
        true
    }

    /// Replaces the note of an adjustment event in place. Returns false (and changes nothing)
    /// if the event does not exist or is a consultation.
    pub fn edit_note(&mut self, event_id: &RecordId, note: &NonEmptyText) -> bool {
        let Some(adjustment) = self
            .events
            .iter_mut()
            .find(|e| &e.id == event_id)
            .and_then(TimelineEvent::adjustment_mut)
        else {
            return false;
        };

        adjustment.adjustment_note = note.as_str().to_owned();
        true
    }

    pub fn get(&self, event_id: &RecordId) -> Option<&TimelineEvent> {
        self.events.iter().find(|e| &e.id == event_id)
    }

    /// All events in append order.
    pub fn as_slice(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Events of one patient, most recent date first. Events sharing a date are ordered by
    /// append position, the later one first.
    pub fn newest_first(&self, patient_id: &RecordId) -> Vec<&TimelineEvent> {
        let mut events: Vec<(usize, &TimelineEvent)> = self
            .events
            .iter()
            .enumerate()
            .filter(|(_, e)| &e.patient_id == patient_id)
            .collect();
        events.sort_by_key(|(seq, e)| Reverse((e.date, *seq)));
        events.into_iter().map(|(_, e)| e).collect()
    }

    /// Date of the patient's most recent event of any type.
    pub fn latest_date(&self, patient_id: &RecordId) -> Option<DateTime<Utc>> {
        self.for_patient(patient_id).map(|e| e.date).max()
    }

    /// Events of one patient in append order.
    pub fn for_patient<'a>(
        &'a self,
        patient_id: &'a RecordId,
    ) -> impl Iterator<Item = &'a TimelineEvent> + 'a {
        self.events.iter().filter(move |e| &e.patient_id == patient_id)
    }

    /// Points every event owned by `from` at `to`. Returns the number of events moved.
    pub fn reassign_patient(&mut self, from: &RecordId, to: &RecordId) -> usize {
        let mut moved = 0;
        for event in self.events.iter_mut().filter(|e| &e.patient_id == from) {
            event.patient_id = to.clone();
            moved += 1;
        }
        moved
    }

    /// Types the patient's earliest consultation `initial` and every other one `followup`,
    /// ordering by date and then append position. Returns the number of events retyped.
    pub fn retype_consultations(&mut self, patient_id: &RecordId) -> usize {
        let earliest = self
            .events
            .iter()
            .enumerate()
            .filter(|(_, e)| &e.patient_id == patient_id && e.is_consultation())
            .min_by_key(|(seq, e)| (e.date, *seq))
            .map(|(seq, _)| seq);

        let mut retyped = 0;
        for (seq, event) in self.events.iter_mut().enumerate() {
            if &event.patient_id != patient_id {
                continue;
            }
            let visit = if Some(seq) == earliest {
                VisitType::Initial
            } else {
                VisitType::Followup
            };
            if event.set_visit(visit) {
                retyped += 1;
            }
        }
        retyped
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_events(self) -> Vec<TimelineEvent> {
        self.events
    }

    fn ensure_unique(&self, id: &RecordId) -> JournalResult<()> {
        if self.get(id).is_some() {
            return Err(JournalError::InvalidInput(format!(
                "event identifier {} is already in use",
                id
            )));
        }
        Ok(())
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
