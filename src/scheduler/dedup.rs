//! Cross-library episode deduplication.
//!
//! The same story episode may exist in more than one library section. Each
//! group of candidates sharing (show title, season, episode) collapses to a
//! single chosen representation. Selection must be a pure function of the
//! snapshot: the reconciler treats any change in chosen items as a reason to
//! replace a playlist, so a non-deterministic pick here would churn playlists
//! that did not actually change.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::debug;

use crate::scheduler::model::{Episode, EpisodeCandidate, Show, ShowSchedule};

/// Preference order between two candidates for the same story episode.
///
/// `Less` means `a` is preferred. The chain, applied until unequal:
/// higher bitrate, then larger file size, then lexically smaller source
/// library id, then lexically smaller item key. The last two steps exist
/// solely to make full ties repeatable across runs; missing bitrate or size
/// ranks below any reported value.
pub fn candidate_preference(a: &EpisodeCandidate, b: &EpisodeCandidate) -> Ordering {
    b.bitrate
        .unwrap_or(0)
        .cmp(&a.bitrate.unwrap_or(0))
        .then_with(|| b.file_size.unwrap_or(0).cmp(&a.file_size.unwrap_or(0)))
        .then_with(|| a.library_id.cmp(&b.library_id))
        .then_with(|| a.rating_key.cmp(&b.rating_key))
}

/// Collapse filtered shows into one [ShowSchedule] per show title, with
/// exactly one [Episode] per (season, episode) key.
///
/// Episodes come out grouped per show but not yet ordered; the sequencer owns
/// broadcast order.
pub fn dedup_across_libraries(shows: Vec<Show>) -> Vec<ShowSchedule> {
    // (title -> (season, number) -> candidates with their show's rating)
    let mut groups: BTreeMap<String, BTreeMap<(u32, u32), Vec<(EpisodeCandidate, Option<String>)>>> =
        BTreeMap::new();

    for show in shows {
        let by_episode = groups.entry(show.title.clone()).or_default();
        for candidate in show.candidates {
            by_episode
                .entry((candidate.season, candidate.number))
                .or_default()
                .push((candidate, show.content_rating.clone()));
        }
    }

    groups
        .into_iter()
        .map(|(title, by_episode)| {
            let episodes = by_episode
                .into_iter()
                .map(|((season, number), mut candidates)| {
                    candidates.sort_by(|(a, _), (b, _)| candidate_preference(a, b));
                    if candidates.len() > 1 {
                        debug!(
                            show = %title,
                            season,
                            number,
                            episode = %candidates[0].0.title,
                            candidates = candidates.len(),
                            chosen = %candidates[0].0.rating_key,
                            "Collapsed duplicate episode"
                        );
                    }
                    let (chosen, content_rating) = candidates.swap_remove(0);
                    Episode {
                        show_title: title.clone(),
                        season,
                        number,
                        content_rating,
                        chosen,
                    }
                })
                .collect();
            ShowSchedule { title, episodes }
        })
        .collect()
}
