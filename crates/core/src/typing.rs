//! First-visit vs follow-up typing.

use crate::event::{TimelineEvent, VisitType};
use nutrilog_uuid::RecordId;

/// Decides the type of a consultation that is about to be recorded for `patient_id`.
///
/// `existing` must be the event set as it stands *before* the new event is appended. Only
/// consultation events of that patient are counted; adjustments never make a visit a
/// follow-up.
pub fn classify<'a, I>(patient_id: &RecordId, existing: I) -> VisitType
where
    I: IntoIterator<Item = &'a TimelineEvent>,
{
    let has_consultation = existing
        .into_iter()
        .any(|e| &e.patient_id == patient_id && e.is_consultation());

    if has_consultation {
        VisitType::Followup
    } else {
        VisitType::Initial
    }
}
