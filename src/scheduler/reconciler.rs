//! Reconciliation of computed buckets against persisted playlists.
//!
//! Decisions only; the apply phase issues the actual catalog calls. Replace
//! is whole-bucket (delete then recreate) because the catalog's playlist
//! ordering cannot be patched item by item safely. Persisted playlists with
//! no computed counterpart are deliberately left alone; pruning is a separate
//! operation.

use std::collections::HashMap;

use tracing::debug;

use crate::scheduler::model::{PlaylistRecord, WeekBucket};

/// What the apply phase should do for one computed bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// No playlist exists under the bucket's title.
    Create,
    /// A playlist exists but its ordered item identity differs.
    Replace { handle: String },
    /// The persisted playlist already matches, including order.
    Unchanged,
}

/// A computed bucket paired with its display title and reconcile decision.
#[derive(Debug, Clone)]
pub struct PlannedBucket {
    pub bucket: WeekBucket,
    pub title: String,
    pub decision: Decision,
}

/// Compare each computed bucket against the persisted record of the same
/// title. Comparison is over the ordered item key sequence; order matters
/// because broadcast order within a week is meaningful.
pub fn reconcile(
    buckets: Vec<WeekBucket>,
    existing: &HashMap<String, PlaylistRecord>,
    prefix: &str,
) -> Vec<PlannedBucket> {
    buckets
        .into_iter()
        .map(|bucket| {
            let title = bucket.display_title(prefix);
            let decision = match existing.get(&title) {
                None => Decision::Create,
                Some(record) if record.item_keys == bucket.item_keys() => Decision::Unchanged,
                Some(record) => Decision::Replace {
                    handle: record.handle.clone(),
                },
            };
            debug!(title = %title, decision = ?decision, "Reconciled bucket");
            PlannedBucket {
                bucket,
                title,
                decision,
            }
        })
        .collect()
}
