//! Content-rating filter.

use tracing::debug;

use crate::scheduler::model::Show;

/// Keep the shows whose content rating token is a member of `allowed`.
///
/// Matching is case-sensitive and exact: `PG` does not match `PG-13`. A show
/// with no rating is treated as rated `""` and is therefore excluded unless
/// the empty string itself is allowed. An empty allow-set selects nothing;
/// that is a valid (empty) result, not an error.
pub fn filter_by_rating(shows: Vec<Show>, allowed: &[String]) -> Vec<Show> {
    shows
        .into_iter()
        .filter(|show| {
            let rating = show.content_rating.as_deref().unwrap_or("");
            let included = allowed.iter().any(|token| token.as_str() == rating);
            debug!(
                show = %show.title,
                key = %show.rating_key,
                library = %show.library,
                rating = %rating,
                included,
                "Rating filter"
            );
            included
        })
        .collect()
}
