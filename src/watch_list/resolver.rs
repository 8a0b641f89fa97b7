//! Next-episode resolution: air-date filtering and the retry policy.

use super::{EpisodeResolutionError, NextEpisode, WatchListError};
use crate::model::{EpisodeCandidate, TvShow};
use chrono::{DateTime, Utc};

/// Turns the service's next episode into a candidate if it already aired
///
/// Episodes without an air date, or airing at or after `now`, are not
/// surfaced.
pub(super) fn candidate_if_aired(
    show: &TvShow,
    next: Option<NextEpisode>,
    now: DateTime<Utc>,
) -> Option<EpisodeCandidate> {
    let next = next?;
    let first_aired = next.first_aired?;
    if first_aired >= now {
        return None;
    }

    Some(EpisodeCandidate {
        show: show.clone(),
        title: next.title.unwrap_or_else(|| "Unknown".to_string()),
        external_id: next.imdb_id,
        season: next.season,
        episode: next.number,
    })
}

/// Runs `attempt` until it succeeds, fails permanently, or `max_retries`
/// extra attempts are used up
///
/// Retries happen immediately, there is no delay between attempts.
pub(super) fn resolve_with_retry<F>(
    show: &TvShow,
    max_retries: u32,
    mut attempt: F,
) -> Result<Option<EpisodeCandidate>, EpisodeResolutionError>
where
    F: FnMut() -> Result<Option<EpisodeCandidate>, WatchListError>,
{
    let mut retries = 0;

    loop {
        match attempt() {
            Ok(candidate) => {
                if retries > 0 {
                    tracing::debug!(
                        show = %show.name,
                        attempts = retries + 1,
                        "Resolved next episode after retry"
                    );
                }
                return Ok(candidate);
            }
            Err(e) if e.is_retryable() && retries < max_retries => {
                retries += 1;
                tracing::warn!(
                    show = %show.name,
                    error = %e,
                    attempt = retries,
                    max_retries = max_retries,
                    "Resolving next episode failed, retrying"
                );
            }
            Err(e) => {
                return Err(EpisodeResolutionError {
                    show: show.name.clone(),
                    attempts: retries + 1,
                    source: e,
                });
            }
        }
    }
}
