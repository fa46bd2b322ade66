//! Core data model for the scheduling engine.
//!
//! Everything here is a transient view derived from a catalog snapshot;
//! nothing is persisted locally. The catalog's own playlist records are the
//! only durable state, keyed by their display title.

use chrono::NaiveDate;

/// One library section's view of a series, as returned by the snapshot pull.
///
/// The same series may appear in more than one library section, each with its
/// own catalog id and candidate set. Cross-library identity is the show title.
#[derive(Debug, Clone)]
pub struct Show {
    /// Catalog identifier of this library's entry for the series.
    pub rating_key: String,
    pub title: String,
    /// Library section the entry was found in.
    pub library: String,
    /// Declared content rating token, absent when the catalog has none.
    pub content_rating: Option<String>,
    pub candidates: Vec<EpisodeCandidate>,
}

/// A concrete playable representation of a story episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeCandidate {
    /// Catalog identifier of the playable item.
    pub rating_key: String,
    pub title: String,
    pub season: u32,
    pub number: u32,
    pub air_date: Option<NaiveDate>,
    /// Video bitrate in kbps, absent when the catalog reports none.
    pub bitrate: Option<u64>,
    /// On-disk size of the largest part, in bytes.
    pub file_size: Option<u64>,
    /// Runtime in milliseconds.
    pub duration_ms: Option<i64>,
    /// Stable identifier of the library section this candidate came from.
    pub library_id: String,
}

/// A story episode after deduplication, backed by exactly one chosen candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    pub show_title: String,
    pub season: u32,
    pub number: u32,
    /// Content rating of the show entry that contributed the chosen candidate.
    pub content_rating: Option<String>,
    pub chosen: EpisodeCandidate,
}

impl Episode {
    /// Identity of the story episode, independent of which candidate backs it.
    pub fn key(&self) -> (&str, u32, u32) {
        (self.show_title.as_str(), self.season, self.number)
    }
}

/// A show's deduplicated episodes, ordered by the sequencer into broadcast
/// order. Input unit of the round-robin distributor.
#[derive(Debug, Clone)]
pub struct ShowSchedule {
    pub title: String,
    pub episodes: Vec<Episode>,
}

/// One scheduled week: at most one episode per contributing show, in show
/// visit order. Immutable once computed for a generation run.
#[derive(Debug, Clone)]
pub struct WeekBucket {
    /// Year index, starting at 1.
    pub year: u32,
    /// Week index within the year, in `1..=weeks_per_year`.
    pub week: u32,
    pub episodes: Vec<Episode>,
}

impl WeekBucket {
    /// Display title of the bucket's playlist. This string is the durable
    /// cross-run key, so the format must not drift: week is zero-padded to
    /// two digits, year is not padded.
    pub fn display_title(&self, prefix: &str) -> String {
        format!("{} - Year {} Week {:02}", prefix, self.year, self.week)
    }

    /// Ordered catalog item keys of the bucket's episodes.
    pub fn item_keys(&self) -> Vec<String> {
        self.episodes
            .iter()
            .map(|e| e.chosen.rating_key.clone())
            .collect()
    }

    /// Total runtime of the bucket in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        self.episodes
            .iter()
            .filter_map(|e| e.chosen.duration_ms)
            .sum()
    }
}

/// A playlist previously created in the catalog, as listed by title prefix.
#[derive(Debug, Clone)]
pub struct PersistedPlaylist {
    /// External playlist handle used for delete/replace calls.
    pub handle: String,
    pub title: String,
    pub item_count: u64,
    pub duration_ms: i64,
}

/// A persisted playlist together with its ordered item identity, the form the
/// reconciler compares against freshly computed buckets. Keyed externally by
/// display title.
#[derive(Debug, Clone)]
pub struct PlaylistRecord {
    pub handle: String,
    /// Ordered catalog item keys currently held by the playlist.
    pub item_keys: Vec<String>,
}
