//! Round-robin distribution of episodes into week buckets.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info};

use crate::scheduler::model::{ShowSchedule, WeekBucket};

/// Visit order of shows within a week: lexical by title, falling back to the
/// first episode's item key for the pathological case of two distinct shows
/// sharing a title. Container iteration order is never relied on.
pub fn show_visit_order(a: &ShowSchedule, b: &ShowSchedule) -> Ordering {
    a.title.cmp(&b.title).then_with(|| {
        let left = a.episodes.first().map(|e| e.chosen.rating_key.as_str());
        let right = b.episodes.first().map(|e| e.chosen.rating_key.as_str());
        left.cmp(&right)
    })
}

/// Distribute every show's ordered episodes into consecutive week buckets.
///
/// Each week takes the next unconsumed episode from every still-active show,
/// visiting shows in [show_visit_order]. A show that hands over its last
/// episode is exhausted and drops out of later weeks, so buckets legitimately
/// shrink toward the tail of the schedule. The week counter runs across year
/// boundaries: week `n` lands in year `(n-1)/weeks_per_year + 1`. Zero
/// surviving shows produce zero buckets.
pub fn distribute(mut shows: Vec<ShowSchedule>, weeks_per_year: u32) -> Vec<WeekBucket> {
    shows.retain(|s| !s.episodes.is_empty());
    shows.sort_by(show_visit_order);

    let mut cursors = vec![0usize; shows.len()];
    let mut active: Vec<usize> = (0..shows.len()).collect();
    let mut buckets = Vec::new();
    let mut week_counter: u32 = 0;

    while !active.is_empty() {
        week_counter += 1;
        let mut episodes = Vec::with_capacity(active.len());
        active.retain(|&idx| {
            let show = &shows[idx];
            episodes.push(show.episodes[cursors[idx]].clone());
            cursors[idx] += 1;
            if cursors[idx] >= show.episodes.len() {
                debug!(show = %show.title, week = week_counter, "Show exhausted");
                false
            } else {
                true
            }
        });

        buckets.push(WeekBucket {
            year: (week_counter - 1) / weeks_per_year + 1,
            week: (week_counter - 1) % weeks_per_year + 1,
            episodes,
        });
    }

    info!(
        shows = shows.len(),
        weeks = buckets.len(),
        years = buckets.last().map(|b| b.year).unwrap_or(0),
        "Distributed episodes across weeks"
    );
    buckets
}

/// Defensive invariant check over a finished distribution: the multiset of
/// placed episodes must equal the multiset that went in, and no bucket may
/// hold two episodes of the same show. A violation is a programming defect in
/// the pipeline, not an input problem, and aborts the run before any playlist
/// is touched.
pub fn verify_distribution(input: &[ShowSchedule], buckets: &[WeekBucket]) -> Result<(), String> {
    let mut expected: BTreeMap<(&str, u32, u32), usize> = BTreeMap::new();
    for show in input {
        for episode in &show.episodes {
            *expected.entry(episode.key()).or_default() += 1;
        }
    }

    let mut placed: BTreeMap<(&str, u32, u32), usize> = BTreeMap::new();
    for bucket in buckets {
        let mut shows_seen: HashSet<&str> = HashSet::new();
        for episode in &bucket.episodes {
            if !shows_seen.insert(episode.show_title.as_str()) {
                return Err(format!(
                    "year {} week {} holds two episodes of '{}'",
                    bucket.year, bucket.week, episode.show_title
                ));
            }
            *placed.entry(episode.key()).or_default() += 1;
        }
    }

    if expected != placed {
        return Err(format!(
            "episode coverage mismatch: {} distinct keys in, {} out",
            expected.len(),
            placed.len()
        ));
    }
    Ok(())
}
