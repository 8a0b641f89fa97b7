//! SubtitleChecker - Find out whether subtitles exist for what you watch next
//!
//! This library asks a watch-list service (trakt.tv) which shows the user
//! follows, works out the next aired episode the user has not watched yet for
//! each of them, and searches a subtitle service (opensubtitles.com) for
//! matching subtitles. Results are streamed to a [`ProgressSink`] as they
//! arrive.

mod config;
mod credentials;
mod executor;
mod model;
mod pipeline;
mod progress;
mod subtitles;
mod watch_list;

#[cfg(test)]
mod test_helpers;

pub use config::{
    CheckerConfig, DEFAULT_LANGUAGE, DEFAULT_RESOLUTION_RETRIES, OpenSubtitlesCredentials,
    TraktCredentials,
};
pub use credentials::{
    CredentialStore, FileCredentialStore, MemoryCredentialStore, TokenPair,
};
pub use executor::{DirectExecutor, Task, TaskExecutor, ThreadPoolExecutor};
pub use model::{EpisodeCandidate, EpisodeSearchResult, SubtitleRecord, TvShow};
pub use pipeline::{FinallyHook, RunPhase, SubtitlesChecker};
pub use progress::{ProgressEvent, ProgressSink};
pub use subtitles::{OpenSubtitlesApi, SubtitleFetcher, SubtitleSearchApi};
pub use watch_list::{
    AuthorizationGate, AuthorizationPrompt, NextEpisode, TraktApi, WatchList, WatchListApi,
};

// Re-export error types
pub use credentials::CredentialError;
pub use executor::ExecutorError;
pub use subtitles::{LoginError, SearchFailedError, SubtitleFetchError, SubtitleServiceError};
pub use watch_list::{AuthorizationError, EpisodeResolutionError, LoadingError, WatchListError};

use thiserror::Error;

/// Top-level error type reported when a subtitle check fails
#[derive(Debug, Error)]
pub enum SubtitlesCheckerError {
    /// Error while authorizing with the watch-list service
    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    /// Error while listing the tracked shows
    #[error("Loading error: {0}")]
    Loading(#[from] LoadingError),

    /// Error while resolving a show's next episode
    #[error("Episode resolution error: {0}")]
    EpisodeResolution(#[from] EpisodeResolutionError),

    /// Error while logging in to the subtitle service
    #[error("Login error: {0}")]
    Login(#[from] LoginError),

    /// Error while searching subtitles for an episode
    #[error("Subtitle search error: {0}")]
    SearchFailed(#[from] SearchFailedError),
}

impl From<SubtitleFetchError> for SubtitlesCheckerError {
    fn from(error: SubtitleFetchError) -> Self {
        match error {
            SubtitleFetchError::Login(e) => SubtitlesCheckerError::Login(e),
            SubtitleFetchError::SearchFailed(e) => SubtitlesCheckerError::SearchFailed(e),
        }
    }
}
