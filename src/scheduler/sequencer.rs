//! Per-show broadcast ordering.

use std::cmp::Ordering;

use crate::scheduler::model::{Episode, ShowSchedule};

/// Broadcast order within a show: air date ascending with undated episodes
/// after all dated ones, then season, then episode number. This comparator is
/// part of the engine contract; the distributor consumes episodes strictly in
/// this order.
pub fn broadcast_order(a: &Episode, b: &Episode) -> Ordering {
    let by_air_date = match (a.chosen.air_date, b.chosen.air_date) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_air_date
        .then_with(|| a.season.cmp(&b.season))
        .then_with(|| a.number.cmp(&b.number))
}

/// Sort every show's episodes into broadcast order.
pub fn sequence(mut schedules: Vec<ShowSchedule>) -> Vec<ShowSchedule> {
    for schedule in &mut schedules {
        schedule.episodes.sort_by(broadcast_order);
    }
    schedules
}
