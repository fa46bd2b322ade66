//! Scheduling and reconciliation engine.
//!
//! A sequential, deterministic pipeline: rating filter, cross-library dedup,
//! per-show sequencing, round-robin distribution into week buckets, then
//! reconciliation against the playlists already in the catalog. Every stage
//! is a pure function of the snapshot; identical input must yield an
//! identical bucket sequence or the reconciler would replace playlists that
//! never changed.

pub mod dedup;
pub mod distributor;
pub mod filter;
pub mod model;
pub mod reconciler;
pub mod sequencer;
pub mod stats;

use crate::scheduler::model::{Show, WeekBucket};

/// Run the pure part of the pipeline: snapshot in, ordered week buckets out.
///
/// The coverage and per-bucket uniqueness invariants are re-checked on the
/// way out; an `Err` here is a defect in the pipeline itself.
pub fn compute_schedule(
    shows: Vec<Show>,
    allowed: &[String],
    weeks_per_year: u32,
) -> Result<Vec<WeekBucket>, String> {
    let filtered = filter::filter_by_rating(shows, allowed);
    let deduped = dedup::dedup_across_libraries(filtered);
    let sequenced = sequencer::sequence(deduped);
    let buckets = distributor::distribute(sequenced.clone(), weeks_per_year);
    distributor::verify_distribution(&sequenced, &buckets)?;
    Ok(buckets)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rand::seq::SliceRandom;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::scheduler::model::EpisodeCandidate;

    fn candidate(show: &str, season: u32, number: u32, library: &str) -> EpisodeCandidate {
        EpisodeCandidate {
            rating_key: format!("{show}-s{season}e{number}-{library}"),
            title: format!("Episode {number}"),
            season,
            number,
            air_date: NaiveDate::from_ymd_opt(1990, 9, (number % 28) + 1),
            bitrate: Some(2000 + 100 * (number as u64 % 7)),
            file_size: Some(500_000_000),
            duration_ms: Some(1_320_000),
            library_id: library.to_string(),
        }
    }

    fn snapshot() -> Vec<Show> {
        let mut shows = Vec::new();
        for (title, rating, count) in [
            ("Alvin", "G", 8u32),
            ("Bonkers", "PG", 5),
            ("Casper", "G", 12),
            ("Gargoyles", "PG-13", 6),
        ] {
            for library in ["1", "2"] {
                shows.push(Show {
                    rating_key: format!("{title}-{library}"),
                    title: title.to_string(),
                    library: format!("Kids {library}"),
                    content_rating: Some(rating.to_string()),
                    candidates: (1..=count)
                        .map(|n| candidate(title, 1, n, library))
                        .collect(),
                });
            }
        }
        shows
    }

    fn bucket_keys(buckets: &[WeekBucket]) -> Vec<Vec<String>> {
        buckets.iter().map(|b| b.item_keys()).collect()
    }

    #[test]
    fn test_pipeline_is_deterministic_under_input_shuffle() {
        let allowed = vec!["G".to_string(), "PG".to_string()];
        let baseline = compute_schedule(snapshot(), &allowed, 52).unwrap();

        for seed in 0..8u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut shows = snapshot();
            shows.shuffle(&mut rng);
            for show in &mut shows {
                show.candidates.shuffle(&mut rng);
            }
            let shuffled = compute_schedule(shows, &allowed, 52).unwrap();
            assert_eq!(bucket_keys(&baseline), bucket_keys(&shuffled));
        }
    }

    #[test]
    fn test_pipeline_places_every_surviving_episode_once() {
        let allowed = vec!["G".to_string(), "PG".to_string()];
        let buckets = compute_schedule(snapshot(), &allowed, 52).unwrap();

        // Gargoyles is filtered out; the rest dedup to one copy per episode.
        let placed: usize = buckets.iter().map(|b| b.episodes.len()).sum();
        assert_eq!(placed, 8 + 5 + 12);
        assert_eq!(buckets.len(), 12);
        assert!(buckets.iter().all(|b| {
            let mut titles: Vec<_> = b.episodes.iter().map(|e| &e.show_title).collect();
            titles.sort();
            titles.windows(2).all(|w| w[0] != w[1])
        }));
    }
}
