//! Patient summaries for list views: activity counts, last visit, search and date filtering.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::event::TimelineEvent;
use crate::patient::Patient;

/// A patient together with figures derived from their timeline.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    #[serde(flatten)]
    pub patient: Patient,
    /// Number of `initial` and `followup` events. Adjustments are not visits.
    pub consultation_count: usize,
    /// Date of the most recent event of any type.
    pub last_event_date: Option<DateTime<Utc>>,
}

/// Criteria for narrowing the patient list. Empty criteria match every patient.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatientFilter {
    /// Case-insensitive substring of the patient's name.
    pub name_query: Option<String>,
    /// Calendar day (UTC) on which the patient has at least one event.
    pub date: Option<NaiveDate>,
}

impl PatientFilter {
    pub fn is_empty(&self) -> bool {
        self.query().is_none() && self.date.is_none()
    }

    fn query(&self) -> Option<String> {
        self.name_query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase)
    }
}

/// Latest event date of a patient, if they have any event.
pub fn last_event_date<'a, I>(events: I) -> Option<DateTime<Utc>>
where
    I: IntoIterator<Item = &'a TimelineEvent>,
{
    events.into_iter().map(|e| e.date).max()
}

/// Builds summaries for the patients matching `filter`, most recently active first.
///
/// Patients without events come last, in registration order.
pub fn summarize(
    patients: &[Patient],
    events: &[TimelineEvent],
    filter: &PatientFilter,
) -> Vec<PatientSummary> {
    let query = filter.query();

    let mut summaries: Vec<PatientSummary> = patients
        .iter()
        .filter(|p| {
            query
                .as_deref()
                .map_or(true, |q| p.name.to_lowercase().contains(q))
        })
        .filter_map(|patient| {
            let own: Vec<&TimelineEvent> = events
                .iter()
                .filter(|e| e.patient_id == patient.id)
                .collect();

            if let Some(day) = filter.date {
                if !own.iter().any(|e| e.date.date_naive() == day) {
                    return None;
                }
            }

            Some(PatientSummary {
                patient: patient.clone(),
                consultation_count: own.iter().filter(|e| e.is_consultation()).count(),
                last_event_date: last_event_date(own.iter().copied()),
            })
        })
        .collect();

    summaries.sort_by(|a, b| b.last_event_date.cmp(&a.last_event_date));
    summaries
}
