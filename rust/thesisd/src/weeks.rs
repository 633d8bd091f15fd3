use serde::Serialize;

use crate::records::{Activity, Evidence};

pub const WEEK_COUNT: usize = 16;

/// A week with no assigned work counts as cleared.
pub const EMPTY_WEEK_IS_COMPLETE: bool = true;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekSlot {
    pub week: u32,
    pub activities: Vec<Activity>,
    pub complete: bool,
}

/// Maps a backend week number onto a 0-based slot. Out-of-range weeks are dropped.
pub fn week_index(semana: i64) -> Option<usize> {
    if (1..=WEEK_COUNT as i64).contains(&semana) {
        Some((semana - 1) as usize)
    } else {
        None
    }
}

pub fn bucket_activities(activities: &[Activity]) -> [Vec<&Activity>; WEEK_COUNT] {
    let mut buckets: [Vec<&Activity>; WEEK_COUNT] = std::array::from_fn(|_| Vec::new());
    for a in activities {
        match week_index(a.semana) {
            Some(i) => buckets[i].push(a),
            None => tracing::debug!(
                activity_id = %a.id,
                semana = a.semana,
                "activity week outside 1..16, ignored"
            ),
        }
    }
    buckets
}

/// Most recent evidence: latest `fechaEntrega` when every evidence carries one,
/// otherwise the last one received. Ties go to the later received.
pub fn latest_evidence(evidences: &[Evidence]) -> Option<&Evidence> {
    if evidences.iter().all(|e| e.fecha_entrega.is_some()) {
        evidences
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| a.fecha_entrega.cmp(&b.fecha_entrega).then(ia.cmp(ib)))
            .map(|(_, e)| e)
    } else {
        evidences.last()
    }
}

/// Either grading track is enough.
pub fn evidence_is_graded(e: &Evidence) -> bool {
    e.calificacion_tutor.is_some() || e.calificacion_docente.is_some()
}

pub fn activity_is_graded(a: &Activity) -> bool {
    latest_evidence(&a.evidencias).is_some_and(evidence_is_graded)
}

pub fn week_is_complete(activities: &[&Activity]) -> bool {
    if activities.is_empty() {
        return EMPTY_WEEK_IS_COMPLETE;
    }
    activities.iter().all(|a| activity_is_graded(a))
}

pub fn completeness(activities: &[Activity]) -> [bool; WEEK_COUNT] {
    let buckets = bucket_activities(activities);
    std::array::from_fn(|i| week_is_complete(&buckets[i]))
}

pub fn week_slots(activities: &[Activity]) -> Vec<WeekSlot> {
    bucket_activities(activities)
        .iter()
        .enumerate()
        .map(|(i, bucket)| WeekSlot {
            week: (i + 1) as u32,
            activities: bucket.iter().map(|a| (*a).clone()).collect(),
            complete: week_is_complete(bucket),
        })
        .collect()
}

/// Slots for a student with no proposal. None are complete, same as the
/// zero-state report.
pub fn empty_week_slots() -> Vec<WeekSlot> {
    (1..=WEEK_COUNT as u32)
        .map(|week| WeekSlot {
            week,
            activities: Vec::new(),
            complete: false,
        })
        .collect()
}

/// Length of the unbroken run of complete weeks starting at week 1.
pub fn consecutive_completed_weeks(weeks: &[bool; WEEK_COUNT]) -> u32 {
    weeks.iter().take_while(|c| **c).count() as u32
}

pub fn total_completed_weeks(weeks: &[bool; WEEK_COUNT]) -> u32 {
    weeks.iter().filter(|c| **c).count() as u32
}
