//! Playlist generation workflow.
//!
//! Pulls a catalog snapshot, runs the scheduling pipeline, reconciles the
//! computed buckets against the playlists already in the catalog, and applies
//! the resulting create/replace calls. Runs are serialized: two overlapping
//! runs could both observe "no playlist" for the same title and both create
//! it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::scheduler::compute_schedule;
use crate::scheduler::model::{PersistedPlaylist, PlaylistRecord, WeekBucket};
use crate::scheduler::reconciler::{Decision, PlannedBucket, reconcile};
use crate::scheduler::stats::{ScheduleStatistics, aggregate};
use crate::services::plex::{Catalog, CatalogError};
use crate::services::rate_limiter::{RetryConfig, retry_async};

/// Parameters of one generation run.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationRequest {
    pub library_names: Vec<String>,
    pub allowed_ratings: Vec<String>,
    pub weeks_per_year: u32,
    pub playlist_title_prefix: String,
}

impl GenerationRequest {
    /// Reject inputs that cannot produce a meaningful run, before any
    /// catalog call is made.
    fn validate(&self) -> Result<(), GenerationError> {
        if self.library_names.iter().all(|n| n.trim().is_empty()) {
            return Err(GenerationError::Configuration(
                "at least one library name is required".to_string(),
            ));
        }
        if self.allowed_ratings.is_empty() {
            return Err(GenerationError::Configuration(
                "at least one content rating is required".to_string(),
            ));
        }
        if self.weeks_per_year == 0 {
            return Err(GenerationError::Configuration(
                "weeks_per_year must be positive".to_string(),
            ));
        }
        if self.playlist_title_prefix.trim().is_empty() {
            return Err(GenerationError::Configuration(
                "playlist title prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Run-level failures. Per-bucket write failures are not errors at this
/// level; they are collected into the report and the run keeps going.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid generation request: {0}")]
    Configuration(String),
    #[error("{0}")]
    CatalogUnavailable(String),
    /// The pipeline broke one of its own invariants. A defect, not an input
    /// or catalog problem.
    #[error("schedule invariant violated: {0}")]
    Internal(String),
}

fn unavailable(e: CatalogError) -> GenerationError {
    GenerationError::CatalogUnavailable(e.to_string())
}

/// One bucket the apply phase could not write.
#[derive(Debug, Clone, Serialize)]
pub struct BucketFailure {
    pub title: String,
    pub reason: String,
}

/// Outcome of a generation run.
#[derive(Debug, Serialize)]
pub struct GenerationReport {
    pub weeks_created: usize,
    pub weeks_replaced: usize,
    pub weeks_unchanged: usize,
    pub weeks_failed: usize,
    /// True when the run was stopped between buckets by shutdown; the
    /// applied prefix is consistent, the rest untouched.
    pub cancelled: bool,
    pub failures: Vec<BucketFailure>,
    pub statistics: ScheduleStatistics,
}

/// Outcome of a prune run.
#[derive(Debug, Serialize)]
pub struct PruneReport {
    pub deleted_count: usize,
    pub total_found: usize,
}

/// Orchestrates generation runs against an explicitly owned catalog handle.
pub struct GeneratorService<C: Catalog> {
    catalog: Arc<C>,
    /// Serializes runs system-wide, including prunes.
    run_guard: Mutex<()>,
    cancel: CancellationToken,
}

impl<C: Catalog> GeneratorService<C> {
    pub fn new(catalog: Arc<C>, cancel: CancellationToken) -> Self {
        Self {
            catalog,
            run_guard: Mutex::new(()),
            cancel,
        }
    }

    /// Run the full workflow: snapshot, schedule, reconcile, apply.
    pub async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationReport, GenerationError> {
        request.validate()?;
        let _guard = self.run_guard.lock().await;

        info!(
            libraries = ?request.library_names,
            ratings = ?request.allowed_ratings,
            prefix = %request.playlist_title_prefix,
            weeks_per_year = request.weeks_per_year,
            "Starting playlist generation"
        );

        let read_retry = RetryConfig::default();
        let snapshot = retry_async(
            || self.catalog.fetch_library_snapshot(&request.library_names),
            &read_retry,
            "fetch library snapshot",
        )
        .await
        .map_err(unavailable)?;

        info!(shows = snapshot.len(), "Snapshot pulled");

        let buckets = compute_schedule(
            snapshot,
            &request.allowed_ratings,
            request.weeks_per_year,
        )
        .map_err(GenerationError::Internal)?;

        let statistics = aggregate(&buckets);

        if buckets.is_empty() {
            warn!("No shows matched the criteria; nothing to schedule");
            return Ok(GenerationReport {
                weeks_created: 0,
                weeks_replaced: 0,
                weeks_unchanged: 0,
                weeks_failed: 0,
                cancelled: false,
                failures: vec![],
                statistics,
            });
        }

        let records = self
            .load_persisted_records(&buckets, &request.playlist_title_prefix, &read_retry)
            .await?;
        let planned = reconcile(buckets, &records, &request.playlist_title_prefix);

        let mut created = 0usize;
        let mut replaced = 0usize;
        let mut unchanged = 0usize;
        let mut failures: Vec<BucketFailure> = Vec::new();
        let mut cancelled = false;
        let write_retry = RetryConfig::for_writes();

        for bucket in planned {
            // Cancellation is only honored between buckets, so a stopped run
            // never leaves a half-written playlist.
            if self.cancel.is_cancelled() {
                warn!(
                    applied = created + replaced + unchanged,
                    "Generation cancelled; remaining buckets left untouched"
                );
                cancelled = true;
                break;
            }

            match &bucket.decision {
                Decision::Unchanged => unchanged += 1,
                Decision::Create => match self.apply_create(&bucket, &write_retry).await {
                    Ok(()) => created += 1,
                    Err(e) => {
                        error!(title = %bucket.title, error = %e, "Failed to create playlist");
                        failures.push(BucketFailure {
                            title: bucket.title.clone(),
                            reason: e.to_string(),
                        });
                    }
                },
                Decision::Replace { handle } => {
                    match self.apply_replace(&bucket, handle, &write_retry).await {
                        Ok(()) => replaced += 1,
                        Err(e) => {
                            error!(title = %bucket.title, error = %e, "Failed to replace playlist");
                            failures.push(BucketFailure {
                                title: bucket.title.clone(),
                                reason: e.to_string(),
                            });
                        }
                    }
                }
            }
        }

        info!(
            created,
            replaced,
            unchanged,
            failed = failures.len(),
            cancelled,
            "Generation run finished"
        );

        Ok(GenerationReport {
            weeks_created: created,
            weeks_replaced: replaced,
            weeks_unchanged: unchanged,
            weeks_failed: failures.len(),
            cancelled,
            failures,
            statistics,
        })
    }

    /// List playlists under the prefix and load ordered items for the titles
    /// the computed schedule collides with. Reads only; failure aborts the
    /// run with nothing applied.
    async fn load_persisted_records(
        &self,
        buckets: &[WeekBucket],
        prefix: &str,
        retry: &RetryConfig,
    ) -> Result<HashMap<String, PlaylistRecord>, GenerationError> {
        let existing = retry_async(
            || self.catalog.list_playlists(prefix),
            retry,
            "list existing playlists",
        )
        .await
        .map_err(unavailable)?;

        let computed_titles: HashSet<String> =
            buckets.iter().map(|b| b.display_title(prefix)).collect();

        let mut records = HashMap::new();
        for playlist in existing {
            if !computed_titles.contains(&playlist.title) {
                continue;
            }
            let items = retry_async(
                || self.catalog.playlist_items(&playlist.handle),
                retry,
                "fetch playlist items",
            )
            .await
            .map_err(unavailable)?;
            records.insert(
                playlist.title,
                PlaylistRecord {
                    handle: playlist.handle,
                    item_keys: items,
                },
            );
        }
        Ok(records)
    }

    async fn apply_create(
        &self,
        bucket: &PlannedBucket,
        retry: &RetryConfig,
    ) -> Result<(), CatalogError> {
        let keys = bucket.bucket.item_keys();
        retry_async(
            || self.catalog.create_playlist(&bucket.title, &keys),
            retry,
            "create playlist",
        )
        .await
    }

    /// Whole-bucket swap: delete the stale playlist, then recreate it with
    /// the new ordered contents. The catalog's ordering semantics make
    /// item-by-item patching unsafe.
    async fn apply_replace(
        &self,
        bucket: &PlannedBucket,
        handle: &str,
        retry: &RetryConfig,
    ) -> Result<(), CatalogError> {
        retry_async(
            || self.catalog.delete_playlist(handle),
            retry,
            "delete playlist",
        )
        .await?;
        self.apply_create(bucket, retry).await
    }

    /// Summary of the playlists currently persisted under a prefix.
    pub async fn playlist_summary(
        &self,
        prefix: &str,
    ) -> Result<Vec<PersistedPlaylist>, GenerationError> {
        retry_async(
            || self.catalog.list_playlists(prefix),
            &RetryConfig::default(),
            "list existing playlists",
        )
        .await
        .map_err(unavailable)
    }

    /// Delete every playlist whose title starts with `prefix`. Individual
    /// delete failures are logged and skipped.
    pub async fn prune(&self, prefix: &str) -> Result<PruneReport, GenerationError> {
        if prefix.trim().is_empty() {
            return Err(GenerationError::Configuration(
                "playlist title prefix must not be empty".to_string(),
            ));
        }
        let _guard = self.run_guard.lock().await;

        let existing = retry_async(
            || self.catalog.list_playlists(prefix),
            &RetryConfig::default(),
            "list existing playlists",
        )
        .await
        .map_err(unavailable)?;

        let total_found = existing.len();
        let mut deleted_count = 0usize;
        for playlist in existing {
            if self.cancel.is_cancelled() {
                warn!(deleted = deleted_count, "Prune cancelled");
                break;
            }
            match self.catalog.delete_playlist(&playlist.handle).await {
                Ok(()) => {
                    info!(title = %playlist.title, "Deleted playlist");
                    deleted_count += 1;
                }
                Err(e) => {
                    error!(title = %playlist.title, error = %e, "Failed to delete playlist");
                }
            }
        }

        Ok(PruneReport {
            deleted_count,
            total_found,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use super::*;
    use crate::scheduler::model::{EpisodeCandidate, Show};

    /// In-memory catalog: playlists live in a map keyed by title, the way the
    /// real server keys them for reconciliation.
    #[derive(Default)]
    struct FakeCatalog {
        shows: StdMutex<Vec<Show>>,
        playlists: StdMutex<HashMap<String, (String, Vec<String>)>>,
        next_handle: AtomicUsize,
        fail_creates: StdMutex<HashSet<String>>,
    }

    impl FakeCatalog {
        fn with_shows(shows: Vec<Show>) -> Self {
            Self {
                shows: StdMutex::new(shows),
                ..Self::default()
            }
        }

        fn set_shows(&self, shows: Vec<Show>) {
            *self.shows.lock().unwrap() = shows;
        }

        fn fail_create_of(&self, title: &str) {
            self.fail_creates.lock().unwrap().insert(title.to_string());
        }

        fn playlist_titles(&self) -> Vec<String> {
            let mut titles: Vec<String> =
                self.playlists.lock().unwrap().keys().cloned().collect();
            titles.sort();
            titles
        }
    }

    #[async_trait]
    impl Catalog for FakeCatalog {
        async fn fetch_library_snapshot(
            &self,
            _libraries: &[String],
        ) -> Result<Vec<Show>, CatalogError> {
            Ok(self.shows.lock().unwrap().clone())
        }

        async fn list_playlists(
            &self,
            title_prefix: &str,
        ) -> Result<Vec<PersistedPlaylist>, CatalogError> {
            Ok(self
                .playlists
                .lock()
                .unwrap()
                .iter()
                .filter(|(title, _)| title.starts_with(title_prefix))
                .map(|(title, (handle, items))| PersistedPlaylist {
                    handle: handle.clone(),
                    title: title.clone(),
                    item_count: items.len() as u64,
                    duration_ms: 0,
                })
                .collect())
        }

        async fn playlist_items(&self, handle: &str) -> Result<Vec<String>, CatalogError> {
            self.playlists
                .lock()
                .unwrap()
                .values()
                .find(|(h, _)| h.as_str() == handle)
                .map(|(_, items)| items.clone())
                .ok_or_else(|| CatalogError::Unavailable("no such playlist".to_string()))
        }

        async fn create_playlist(
            &self,
            title: &str,
            item_keys: &[String],
        ) -> Result<(), CatalogError> {
            if self.fail_creates.lock().unwrap().contains(title) {
                return Err(CatalogError::WriteFailed("server said no".to_string()));
            }
            let handle = format!("pl-{}", self.next_handle.fetch_add(1, Ordering::SeqCst));
            self.playlists
                .lock()
                .unwrap()
                .insert(title.to_string(), (handle, item_keys.to_vec()));
            Ok(())
        }

        async fn delete_playlist(&self, handle: &str) -> Result<(), CatalogError> {
            self.playlists
                .lock()
                .unwrap()
                .retain(|_, entry| entry.0.as_str() != handle);
            Ok(())
        }
    }

    fn show(title: &str, count: u32) -> Show {
        Show {
            rating_key: title.to_lowercase(),
            title: title.to_string(),
            library: "Kids".to_string(),
            content_rating: Some("G".to_string()),
            candidates: (1..=count)
                .map(|n| EpisodeCandidate {
                    rating_key: format!("{title}-{n}"),
                    title: format!("Episode {n}"),
                    season: 1,
                    number: n,
                    air_date: None,
                    bitrate: Some(4000),
                    file_size: Some(500_000_000),
                    duration_ms: Some(1_320_000),
                    library_id: "1".to_string(),
                })
                .collect(),
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            library_names: vec!["Kids".to_string()],
            allowed_ratings: vec!["G".to_string()],
            weeks_per_year: 52,
            playlist_title_prefix: "Saturday Morning".to_string(),
        }
    }

    fn service(catalog: Arc<FakeCatalog>) -> GeneratorService<FakeCatalog> {
        GeneratorService::new(catalog, CancellationToken::new())
    }

    #[tokio::test]
    async fn test_first_run_creates_all_buckets() {
        let catalog = Arc::new(FakeCatalog::with_shows(vec![show("Alvin", 3), show("Bonkers", 2)]));
        let report = service(catalog.clone()).generate(request()).await.unwrap();

        assert_eq!(report.weeks_created, 3);
        assert_eq!(report.weeks_replaced, 0);
        assert_eq!(report.weeks_unchanged, 0);
        assert_eq!(report.statistics.episode_count, 5);
        assert_eq!(
            catalog.playlist_titles(),
            vec![
                "Saturday Morning - Year 1 Week 01",
                "Saturday Morning - Year 1 Week 02",
                "Saturday Morning - Year 1 Week 03",
            ]
        );
    }

    #[tokio::test]
    async fn test_regeneration_is_idempotent() {
        let catalog = Arc::new(FakeCatalog::with_shows(vec![show("Alvin", 3), show("Bonkers", 2)]));
        let generator = service(catalog);

        generator.generate(request()).await.unwrap();
        let second = generator.generate(request()).await.unwrap();

        assert_eq!(second.weeks_created, 0);
        assert_eq!(second.weeks_replaced, 0);
        assert_eq!(second.weeks_unchanged, 3);
    }

    #[tokio::test]
    async fn test_new_episode_replaces_only_shifted_buckets() {
        let catalog = Arc::new(FakeCatalog::with_shows(vec![show("Alvin", 3), show("Bonkers", 2)]));
        let generator = service(catalog.clone());
        generator.generate(request()).await.unwrap();

        // Bonkers gains an episode: weeks one and two keep their contents,
        // week three now holds a Bonkers episode alongside Alvin's.
        catalog.set_shows(vec![show("Alvin", 3), show("Bonkers", 3)]);
        let report = generator.generate(request()).await.unwrap();

        assert_eq!(report.weeks_unchanged, 2);
        assert_eq!(report.weeks_replaced, 1);
        assert_eq!(report.weeks_created, 0);
    }

    #[tokio::test]
    async fn test_write_failure_does_not_abort_the_run() {
        let catalog = Arc::new(FakeCatalog::with_shows(vec![show("Alvin", 3)]));
        catalog.fail_create_of("Saturday Morning - Year 1 Week 02");
        let report = service(catalog.clone()).generate(request()).await.unwrap();

        assert_eq!(report.weeks_created, 2);
        assert_eq!(report.weeks_failed, 1);
        assert_eq!(report.failures[0].title, "Saturday Morning - Year 1 Week 02");
        assert_eq!(
            catalog.playlist_titles(),
            vec![
                "Saturday Morning - Year 1 Week 01",
                "Saturday Morning - Year 1 Week 03",
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_filter_result_is_success_with_zeros() {
        let catalog = Arc::new(FakeCatalog::with_shows(vec![show("Alvin", 3)]));
        let mut req = request();
        req.allowed_ratings = vec!["TV-MA".to_string()];
        let report = service(catalog).generate(req).await.unwrap();

        assert_eq!(report.weeks_created, 0);
        assert_eq!(report.statistics.week_count, 0);
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn test_validation_rejects_bad_requests() {
        let generator = service(Arc::new(FakeCatalog::default()));

        let mut req = request();
        req.library_names = vec![];
        assert_matches!(
            generator.generate(req).await,
            Err(GenerationError::Configuration(_))
        );

        let mut req = request();
        req.allowed_ratings = vec![];
        assert_matches!(
            generator.generate(req).await,
            Err(GenerationError::Configuration(_))
        );

        let mut req = request();
        req.weeks_per_year = 0;
        assert_matches!(
            generator.generate(req).await,
            Err(GenerationError::Configuration(_))
        );

        let mut req = request();
        req.playlist_title_prefix = "  ".to_string();
        assert_matches!(
            generator.generate(req).await,
            Err(GenerationError::Configuration(_))
        );
    }

    #[tokio::test]
    async fn test_cancelled_run_applies_nothing_further() {
        let catalog = Arc::new(FakeCatalog::with_shows(vec![show("Alvin", 3)]));
        let cancel = CancellationToken::new();
        let generator = GeneratorService::new(catalog.clone(), cancel.clone());

        cancel.cancel();
        let report = generator.generate(request()).await.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.weeks_created, 0);
        assert!(catalog.playlist_titles().is_empty());
    }

    #[tokio::test]
    async fn test_prune_deletes_matching_playlists() {
        let catalog = Arc::new(FakeCatalog::with_shows(vec![show("Alvin", 2)]));
        let generator = service(catalog.clone());
        generator.generate(request()).await.unwrap();

        // A playlist outside the prefix survives.
        catalog
            .create_playlist("Movie Night", &["m1".to_string()])
            .await
            .unwrap();

        let report = generator.prune("Saturday Morning").await.unwrap();
        assert_eq!(report.deleted_count, 2);
        assert_eq!(report.total_found, 2);
        assert_eq!(catalog.playlist_titles(), vec!["Movie Night"]);
    }
}
