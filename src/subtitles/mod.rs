//! Subtitle lookup for resolved episodes
//!
//! This module defines the [`SubtitleSearchApi`] trait implemented by
//! subtitle search services and the [`SubtitleFetcher`] that picks the right
//! lookup strategy for an episode.
mod opensubtitles;
mod opensubtitles_types;

pub use opensubtitles::OpenSubtitlesApi;

use crate::model::{EpisodeCandidate, EpisodeSearchResult, SubtitleRecord};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// IMDB ids carry this prefix, search services want the bare number
const IMDB_ID_PREFIX: &str = "tt";

/// Errors reported by a subtitle search service
#[derive(Debug, Error)]
pub enum SubtitleServiceError {
    /// Request to the service failed before a response arrived
    #[error("Request failed: {0}")]
    RequestError(String),

    /// The service answered with an unsuccessful HTTP status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Failed to parse the service's JSON response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),
}

/// Logging in to the subtitle service failed
#[derive(Debug, Error)]
#[error("Subtitle service login failed: {0}")]
pub struct LoginError(#[from] pub SubtitleServiceError);

/// A subtitle search for a specific episode failed
#[derive(Debug, Error)]
#[error("Subtitle search for {episode} failed: {source}")]
pub struct SearchFailedError {
    /// The episode searched for, formatted as `Show S01E02`
    pub episode: String,
    #[source]
    pub source: SubtitleServiceError,
}

/// Errors from [`SubtitleFetcher::fetch_subtitles`]
#[derive(Debug, Error)]
pub enum SubtitleFetchError {
    #[error(transparent)]
    Login(#[from] LoginError),

    #[error(transparent)]
    SearchFailed(#[from] SearchFailedError),
}

/// Remote operations of a subtitle search service.
///
/// Searches are only valid after a successful [`SubtitleSearchApi::login`].
pub trait SubtitleSearchApi: Send + Sync {
    /// Opens a session with the service
    fn login(&self) -> Result<(), SubtitleServiceError>;

    /// Searches subtitles by IMDB id given without its `tt` prefix
    fn search_by_imdb_id(&self, imdb_id: &str) -> Result<Vec<SubtitleRecord>, SubtitleServiceError>;

    /// Searches subtitles by show name, season and episode number
    fn search_by_name_and_episode(
        &self,
        show_name: &str,
        season: u32,
        episode: u32,
    ) -> Result<Vec<SubtitleRecord>, SubtitleServiceError>;
}

/// Looks up subtitles for episodes, logging in on first use
pub struct SubtitleFetcher {
    api: Arc<dyn SubtitleSearchApi>,
    logged_in: Mutex<bool>,
}

impl SubtitleFetcher {
    pub fn new(api: Arc<dyn SubtitleSearchApi>) -> Self {
        Self {
            api,
            logged_in: Mutex::new(false),
        }
    }

    /// Returns whether a session is already open
    pub fn is_logged_in(&self) -> bool {
        *self.logged_in.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Logs in to the subtitle service unless already logged in
    ///
    /// Concurrent callers are serialized, so only one of them talks to the
    /// service.
    pub fn login(&self) -> Result<(), LoginError> {
        let mut logged_in = self.logged_in.lock().unwrap_or_else(PoisonError::into_inner);
        if !*logged_in {
            self.api.login()?;
            tracing::info!("Logged in to subtitle service");
            *logged_in = true;
        }
        Ok(())
    }

    /// Searches subtitles for an episode
    ///
    /// Searches by IMDB id when the episode has one. Otherwise searches by
    /// show name, season and episode number; if either number is unknown
    /// the result is empty and the service is not asked.
    ///
    /// # Errors
    ///
    /// Fails if login fails or the service rejects the search. Failed
    /// searches are not retried.
    pub fn fetch_subtitles(
        &self,
        episode: &EpisodeCandidate,
    ) -> Result<EpisodeSearchResult, SubtitleFetchError> {
        self.login()?;

        let search = match (&episode.external_id, episode.season, episode.episode) {
            (Some(imdb_id), _, _) => {
                let id = imdb_id.strip_prefix(IMDB_ID_PREFIX).unwrap_or(imdb_id);
                self.api.search_by_imdb_id(id)
            }
            (None, Some(season), Some(number)) => {
                self.api
                    .search_by_name_and_episode(&episode.show.name, season, number)
            }
            (None, _, _) => {
                tracing::debug!(episode = %episode, "No id and no episode numbers, skipping search");
                Ok(Vec::new())
            }
        };

        let subtitles = search.map_err(|e| SearchFailedError {
            episode: episode.to_string(),
            source: e,
        })?;

        Ok(EpisodeSearchResult {
            episode: episode.clone(),
            subtitles,
        })
    }
}
