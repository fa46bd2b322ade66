//! Read-only summary statistics over a computed schedule.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::scheduler::model::WeekBucket;

/// Share of the schedule carried by one content rating.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RatingShare {
    pub rating: String,
    pub episodes: usize,
    /// Episode count over total, in percent.
    pub percent: f64,
}

/// One show's contribution to the schedule.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ShowContribution {
    pub title: String,
    pub episodes: usize,
}

/// Summary metrics for a generation run. Pure projection over the final
/// bucket sequence; computing it mutates nothing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScheduleStatistics {
    pub show_count: usize,
    pub episode_count: usize,
    pub total_runtime_ms: i64,
    pub years: u32,
    pub week_count: usize,
    pub rating_breakdown: Vec<RatingShare>,
    /// Shows ranked by contributed episodes, count descending with lexical
    /// title order breaking ties.
    pub top_shows: Vec<ShowContribution>,
}

/// Aggregate statistics over the buckets of a completed distribution.
pub fn aggregate(buckets: &[WeekBucket]) -> ScheduleStatistics {
    let mut per_show: BTreeMap<&str, usize> = BTreeMap::new();
    let mut per_rating: BTreeMap<&str, usize> = BTreeMap::new();
    let mut episode_count = 0usize;
    let mut total_runtime_ms = 0i64;

    for bucket in buckets {
        total_runtime_ms += bucket.duration_ms();
        for episode in &bucket.episodes {
            episode_count += 1;
            *per_show.entry(episode.show_title.as_str()).or_default() += 1;
            *per_rating
                .entry(episode.content_rating.as_deref().unwrap_or(""))
                .or_default() += 1;
        }
    }

    let mut rating_breakdown: Vec<RatingShare> = per_rating
        .into_iter()
        .map(|(rating, count)| RatingShare {
            rating: rating.to_string(),
            episodes: count,
            percent: count as f64 / episode_count as f64 * 100.0,
        })
        .collect();
    rating_breakdown.sort_by(|a, b| b.episodes.cmp(&a.episodes).then_with(|| a.rating.cmp(&b.rating)));

    let mut top_shows: Vec<ShowContribution> = per_show
        .into_iter()
        .map(|(title, count)| ShowContribution {
            title: title.to_string(),
            episodes: count,
        })
        .collect();
    top_shows.sort_by(|a, b| b.episodes.cmp(&a.episodes).then_with(|| a.title.cmp(&b.title)));

    ScheduleStatistics {
        show_count: top_shows.len(),
        episode_count,
        total_runtime_ms,
        years: buckets.last().map(|b| b.year).unwrap_or(0),
        week_count: buckets.len(),
        rating_breakdown,
        top_shows,
    }
}
