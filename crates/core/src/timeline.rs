//! Timeline grouping.
//!
//! Adjustments are point-in-time amendments to whichever consultation's plan was current when
//! they were made. On read, each adjustment is nested under that consultation:
//!
//! - An adjustment that recorded a `consultationId` when it was created is attached to that
//!   consultation, provided it is part of the same timeline.
//! - Otherwise consultation `c` owns adjustment `a` when `c` precedes `a` and `next` does
//!   not, `next` being the consultation immediately more recent than `c` (unbounded for the
//!   most recent consultation).
//! - Adjustments older than the earliest consultation, and every adjustment of a timeline with
//!   no consultation at all, are emitted as standalone entries after the groups.
//!
//! Events are ordered by date, and events with identical dates by position in the input: the
//! one that appears later in the slice counts as more recent. Callers pass events in append
//! order, so among same-timestamp consultations the one recorded last is "next" for the
//! others, and an adjustment stamped exactly at a consultation's timestamp belongs to it only
//! if it was recorded after it. Because a new consultation is never dated before the
//! patient's latest event, it always sorts after every existing adjustment, and the
//! `consultationId` stored on an adjustment names the same consultation the window rule
//! finds.
//!
//! No event is ever dropped: every consultation yields a group, possibly without adjustments.

use chrono::{DateTime, Utc};
use nutrilog_uuid::RecordId;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashMap;

use crate::event::TimelineEvent;

/// A consultation with the adjustments that amend it, most recent first.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationGroup {
    pub consultation: TimelineEvent,
    pub adjustments: Vec<TimelineEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TimelineEntry {
    Group(ConsultationGroup),
    Standalone { event: TimelineEvent },
}

impl TimelineEntry {
    pub fn as_group(&self) -> Option<&ConsultationGroup> {
        match self {
            TimelineEntry::Group(group) => Some(group),
            TimelineEntry::Standalone { .. } => None,
        }
    }

    pub fn as_standalone(&self) -> Option<&TimelineEvent> {
        match self {
            TimelineEntry::Standalone { event } => Some(event),
            TimelineEntry::Group(_) => None,
        }
    }

    /// Number of events represented by this entry.
    pub fn event_count(&self) -> usize {
        match self {
            TimelineEntry::Group(group) => 1 + group.adjustments.len(),
            TimelineEntry::Standalone { .. } => 1,
        }
    }
}

/// Groups the events of one patient, given in append order.
pub fn group(events: &[TimelineEvent]) -> Vec<TimelineEntry> {
    let mut consultations: Vec<(usize, &TimelineEvent)> = Vec::new();
    let mut adjustments: Vec<(usize, &TimelineEvent)> = Vec::new();
    for (seq, event) in events.iter().enumerate() {
        if event.is_adjustment() {
            adjustments.push((seq, event));
        } else {
            consultations.push((seq, event));
        }
    }

    consultations.sort_by_key(|(seq, e)| Reverse((e.date, *seq)));
    adjustments.sort_by_key(|(seq, e)| Reverse((e.date, *seq)));

    let by_id: HashMap<&RecordId, usize> = consultations
        .iter()
        .enumerate()
        .map(|(index, (_, e))| (&e.id, index))
        .collect();

    let mut attached: Vec<Vec<TimelineEvent>> = vec![Vec::new(); consultations.len()];
    let mut standalone: Vec<TimelineEvent> = Vec::new();

    // Adjustments are visited most-recent-first, so each bucket is filled already sorted.
    for (seq, adjustment) in &adjustments {
        let owner = adjustment
            .adjustment()
            .and_then(|a| a.consultation_id.as_ref())
            .and_then(|id| by_id.get(id).copied())
            .or_else(|| owner_by_window(&consultations, (adjustment.date, *seq)));

        match owner {
            Some(index) => attached[index].push((*adjustment).clone()),
            None => standalone.push((*adjustment).clone()),
        }
    }

    let mut entries: Vec<TimelineEntry> = consultations
        .iter()
        .zip(attached)
        .map(|((_, consultation), adjustments)| {
            TimelineEntry::Group(ConsultationGroup {
                consultation: (*consultation).clone(),
                adjustments,
            })
        })
        .collect();

    entries.extend(
        standalone
            .into_iter()
            .map(|event| TimelineEntry::Standalone { event }),
    );

    entries
}

/// The consultation that would own an adjustment dated `at` and appended after `events`,
/// under the window rule. `events` are one patient's events in append order.
pub fn current_consultation(
    events: &[TimelineEvent],
    at: DateTime<Utc>,
) -> Option<&TimelineEvent> {
    let mut consultations: Vec<(usize, &TimelineEvent)> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_consultation())
        .collect();
    consultations.sort_by_key(|(seq, e)| Reverse((e.date, *seq)));

    owner_by_window(&consultations, (at, events.len())).map(|index| consultations[index].1)
}

/// Index of the owning consultation under the window rule, within consultations sorted
/// most-recent-first. `key` is the adjustment's date and append position.
///
/// The first consultation that precedes the adjustment in `(date, position)` order owns it:
/// every more recent consultation follows the adjustment.
fn owner_by_window(
    consultations: &[(usize, &TimelineEvent)],
    key: (DateTime<Utc>, usize),
) -> Option<usize> {
    consultations
        .iter()
        .position(|(seq, c)| (c.date, *seq) <= key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{AdjustmentRecord, ClinicalResult, ConsultationRecord, EventPayload};
    use chrono::{Duration, TimeZone};

    fn at(t: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::minutes(t)
    }

    fn consultation(id: &str, t: i64) -> TimelineEvent {
        TimelineEvent {
            id: RecordId::parse(id).expect("valid id"),
            patient_id: RecordId::parse("patient").expect("valid id"),
            date: at(t),
            doctor_name: "Nutricionista".into(),
            created_at: at(t),
            legacy_id: None,
            payload: EventPayload::Followup(ConsultationRecord {
                transcript: String::new(),
                result: ClinicalResult::new(serde_json::json!({"nutritionalAssessment": id}))
                    .expect("valid result"),
            }),
        }
    }

    fn adjustment(id: &str, t: i64) -> TimelineEvent {
        TimelineEvent {
            payload: EventPayload::Adjustment(AdjustmentRecord {
                adjustment_note: id.into(),
                previous_plan: None,
                new_plan: None,
                consultation_id: None,
            }),
            ..consultation(id, t)
        }
    }

    fn linked_adjustment(id: &str, t: i64, consultation_id: &str) -> TimelineEvent {
        let mut event = adjustment(id, t);
        if let EventPayload::Adjustment(a) = &mut event.payload {
            a.consultation_id = Some(RecordId::parse(consultation_id).expect("valid id"));
        }
        event
    }

    fn ids(events: &[TimelineEvent]) -> Vec<&str> {
        events.iter().map(|e| e.id.as_str()).collect()
    }

    fn group_at(entries: &[TimelineEntry], index: usize) -> &ConsultationGroup {
        entries[index].as_group().expect("entry should be a group")
    }

    #[test]
    fn test_adjustments_attach_to_owning_consultation() {
        let events = vec![
            consultation("c0", 0),
            adjustment("a2", 2),
            adjustment("a5", 5),
            consultation("c10", 10),
            adjustment("a12", 12),
        ];

        let entries = group(&events);

        assert_eq!(entries.len(), 2);
        let newest = group_at(&entries, 0);
        assert_eq!(newest.consultation.id.as_str(), "c10");
        assert_eq!(ids(&newest.adjustments), vec!["a12"]);

        let oldest = group_at(&entries, 1);
        assert_eq!(oldest.consultation.id.as_str(), "c0");
        assert_eq!(ids(&oldest.adjustments), vec!["a5", "a2"]);

        let total: usize = entries
            .iter()
            .filter_map(TimelineEntry::as_group)
            .map(|g| g.adjustments.len())
            .sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_adjustment_before_first_consultation_is_standalone() {
        let events = vec![adjustment("a-1", -1), consultation("c0", 0)];

        let entries = group(&events);

        assert_eq!(entries.len(), 2);
        assert!(group_at(&entries, 0).adjustments.is_empty());
        assert_eq!(
            entries[1].as_standalone().map(|e| e.id.as_str()),
            Some("a-1")
        );
    }

    #[test]
    fn test_orphans_follow_groups_most_recent_first() {
        let events = vec![
            adjustment("a-5", -5),
            consultation("c0", 0),
            adjustment("a-2", -2),
        ];

        let entries = group(&events);

        let standalone: Vec<_> = entries
            .iter()
            .filter_map(TimelineEntry::as_standalone)
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(standalone, vec!["a-2", "a-5"]);
        assert!(entries[0].as_group().is_some());
    }

    #[test]
    fn test_adjustments_without_consultations_are_kept() {
        let events = vec![adjustment("a1", 1), adjustment("a3", 3)];

        let entries = group(&events);

        let standalone: Vec<_> = entries
            .iter()
            .filter_map(TimelineEntry::as_standalone)
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(standalone, vec!["a3", "a1"]);
    }

    #[test]
    fn test_adjustment_on_consultation_timestamp_belongs_to_it() {
        let events = vec![
            consultation("c0", 0),
            consultation("c10", 10),
            adjustment("a10", 10),
        ];

        let entries = group(&events);

        assert_eq!(ids(&group_at(&entries, 0).adjustments), vec!["a10"]);
        assert!(group_at(&entries, 1).adjustments.is_empty());
    }

    #[test]
    fn test_adjustment_recorded_before_same_timestamp_consultation_keeps_earlier_owner() {
        let events = vec![
            consultation("c0", 0),
            adjustment("a10", 10),
            consultation("c10", 10),
        ];

        let entries = group(&events);

        assert!(group_at(&entries, 0).adjustments.is_empty());
        assert_eq!(ids(&group_at(&entries, 1).adjustments), vec!["a10"]);
        assert_eq!(
            current_consultation(&events[..2], at(10)).map(|e| e.id.as_str()),
            Some("c0")
        );
    }

    #[test]
    fn test_identical_consultation_timestamps_use_insertion_order() {
        let events = vec![
            consultation("first", 5),
            consultation("second", 5),
            adjustment("a5", 5),
            adjustment("a7", 7),
        ];

        let entries = group(&events);

        assert_eq!(group_at(&entries, 0).consultation.id.as_str(), "second");
        assert_eq!(group_at(&entries, 1).consultation.id.as_str(), "first");
        assert_eq!(ids(&group_at(&entries, 0).adjustments), vec!["a7", "a5"]);
        assert!(group_at(&entries, 1).adjustments.is_empty());

        let again = group(&events);
        assert_eq!(entries, again, "grouping should be deterministic");
    }

    #[test]
    fn test_back_reference_takes_precedence_over_window() {
        let events = vec![
            consultation("c0", 0),
            consultation("c10", 10),
            linked_adjustment("a12", 12, "c0"),
        ];

        let entries = group(&events);

        assert!(group_at(&entries, 0).adjustments.is_empty());
        assert_eq!(ids(&group_at(&entries, 1).adjustments), vec!["a12"]);
    }

    #[test]
    fn test_dangling_back_reference_falls_back_to_window() {
        let events = vec![
            consultation("c0", 0),
            linked_adjustment("a3", 3, "deleted"),
        ];

        let entries = group(&events);

        assert_eq!(ids(&group_at(&entries, 0).adjustments), vec!["a3"]);
    }

    #[test]
    fn test_no_event_is_dropped() {
        let events = vec![
            adjustment("a-3", -3),
            consultation("c0", 0),
            adjustment("a1", 1),
            consultation("c4", 4),
            consultation("c4b", 4),
            adjustment("a4", 4),
            adjustment("a9", 9),
        ];

        let entries = group(&events);

        let total: usize = entries.iter().map(TimelineEntry::event_count).sum();
        assert_eq!(total, events.len());
    }

    #[test]
    fn test_current_consultation_follows_window_rule() {
        let events = vec![
            consultation("c0", 0),
            consultation("c10", 10),
            adjustment("a3", 3),
        ];

        assert_eq!(
            current_consultation(&events, at(5)).map(|e| e.id.as_str()),
            Some("c0")
        );
        assert_eq!(
            current_consultation(&events, at(10)).map(|e| e.id.as_str()),
            Some("c10")
        );
        assert!(current_consultation(&events, at(-1)).is_none());
        assert!(current_consultation(&[adjustment("a1", 1)], at(5)).is_none());
    }

    #[test]
    fn test_empty_timeline() {
        assert!(group(&[]).is_empty());
    }

    #[test]
    fn test_entry_serialization_is_tagged() {
        let entries = group(&[adjustment("a-1", -1), consultation("c0", 0)]);
        let value = serde_json::to_value(&entries).expect("should serialize");

        assert_eq!(value[0]["kind"], "group");
        assert_eq!(value[0]["consultation"]["id"], "c0");
        assert_eq!(value[1]["kind"], "standalone");
        assert_eq!(value[1]["event"]["type"], "adjustment");
    }
}
