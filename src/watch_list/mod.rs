//! Watch-list access: which shows the user tracks and what to watch next.
//!
//! The remote service sits behind the [`WatchListApi`] trait. [`WatchList`]
//! layers the authorization gate, the air-date filter and the retry policy
//! on top of it.
mod auth;
mod resolver;
mod trakt;
mod trakt_types;

pub use auth::{AuthorizationError, AuthorizationGate, AuthorizationPrompt};
pub use trakt::TraktApi;

use crate::credentials::{CredentialStore, TokenPair};
use crate::model::{EpisodeCandidate, TvShow};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by a watch-list service
#[derive(Debug, Error)]
pub enum WatchListError {
    /// Request to the service failed before a response arrived
    #[error("Request failed: {0}")]
    RequestError(String),

    /// The service answered with an unsuccessful HTTP status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Failed to parse the service's JSON response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// A request URL could not be built from the configured service address
    #[error("Invalid service URL: {0}")]
    InvalidUrl(String),

    /// A call that needs an access token was made before authorization
    #[error("Not authorized, authorization must succeed first")]
    NotAuthorized,
}

impl WatchListError {
    /// Whether the failure is transient and the call may be repeated
    ///
    /// Transport failures (timeouts, refused connections), rate limiting and
    /// server side errors are retryable. Anything that would fail the same
    /// way again is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            WatchListError::RequestError(_) => true,
            WatchListError::Status { status, .. } => *status == 429 || *status >= 500,
            WatchListError::ParseError(_) => false,
            WatchListError::InvalidUrl(_) => false,
            WatchListError::NotAuthorized => false,
        }
    }
}

/// Listing the tracked shows failed
#[derive(Debug, Error)]
#[error("Failed to load watched shows: {0}")]
pub struct LoadingError(#[from] pub WatchListError);

/// Resolving a show's next episode failed, including all retries
#[derive(Debug, Error)]
#[error("Failed to resolve next episode of '{show}' after {attempts} attempt(s): {source}")]
pub struct EpisodeResolutionError {
    /// Name of the show being resolved
    pub show: String,
    /// How many attempts were made in total
    pub attempts: u32,
    /// The error of the last attempt
    #[source]
    pub source: WatchListError,
}

/// The next unwatched episode of a show as reported by the service
#[derive(Debug, Clone, PartialEq)]
pub struct NextEpisode {
    pub title: Option<String>,
    pub season: Option<u32>,
    pub number: Option<u32>,
    /// IMDB id including its `tt` prefix
    pub imdb_id: Option<String>,
    /// When the episode first aired; `None` if no air date is announced
    pub first_aired: Option<DateTime<Utc>>,
}

/// Remote operations of a watch-list service.
///
/// Implementors talk to services such as trakt.tv. They hold the access token
/// handed to them through [`WatchListApi::use_tokens`] and must be shareable
/// between worker threads.
pub trait WatchListApi: Send + Sync {
    /// Builds the URL the user visits to authorize this application
    ///
    /// `state` is an opaque value echoed back by the service.
    fn authorization_url(&self, state: &str) -> Result<String, WatchListError>;

    /// Exchanges a user supplied authorization code for a token pair
    fn exchange_code(&self, code: &str) -> Result<TokenPair, WatchListError>;

    /// Obtains a fresh token pair using a refresh token
    fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenPair, WatchListError>;

    /// Sets the tokens used for all subsequent calls
    fn use_tokens(&self, tokens: &TokenPair);

    /// Lists every show the user has watched, in service order
    fn watched_shows(&self) -> Result<Vec<TvShow>, WatchListError>;

    /// Returns the next episode the user has not watched yet, if any
    fn next_episode(&self, show: &TvShow) -> Result<Option<NextEpisode>, WatchListError>;
}

/// Authorized access to the user's watch list
///
/// Combines the show source and the episode resolver behind one
/// authorization gate.
pub struct WatchList {
    api: Arc<dyn WatchListApi>,
    gate: AuthorizationGate,
    max_retries: u32,
}

impl WatchList {
    /// Creates a watch list using the default retry budget
    pub fn new(
        api: Arc<dyn WatchListApi>,
        store: Arc<dyn CredentialStore>,
        prompt: Arc<dyn AuthorizationPrompt>,
    ) -> Self {
        let gate = AuthorizationGate::new(Arc::clone(&api), store, prompt);
        Self {
            api,
            gate,
            max_retries: crate::config::DEFAULT_RESOLUTION_RETRIES,
        }
    }

    /// Sets how many extra attempts a failed next-episode lookup gets
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Makes sure a valid session with the service exists
    ///
    /// See [`AuthorizationGate::ensure_authorized`].
    pub fn ensure_authorized(&self) -> Result<(), AuthorizationError> {
        self.gate.ensure_authorized()
    }

    /// Returns whether authorization has already succeeded
    pub fn is_authorized(&self) -> bool {
        self.gate.is_authorized()
    }

    /// Lists the tracked shows in the order the service returns them
    ///
    /// Requires [`WatchList::ensure_authorized`] to have succeeded.
    pub fn list_watched_shows(&self) -> Result<Vec<TvShow>, LoadingError> {
        if !self.gate.is_authorized() {
            return Err(LoadingError(WatchListError::NotAuthorized));
        }
        Ok(self.api.watched_shows()?)
    }

    /// Looks up the next aired, unwatched episode of a show with one attempt
    pub fn next_episode(&self, show: &TvShow) -> Result<Option<EpisodeCandidate>, WatchListError> {
        if !self.gate.is_authorized() {
            return Err(WatchListError::NotAuthorized);
        }
        let next = self.api.next_episode(show)?;
        Ok(resolver::candidate_if_aired(show, next, Utc::now()))
    }

    /// Looks up the next aired, unwatched episode of a show
    ///
    /// Returns `Ok(None)` if the show is fully watched or its next episode has
    /// not aired yet. Transient failures are retried immediately, up to the
    /// configured number of extra attempts.
    pub fn resolve_next_episode(
        &self,
        show: &TvShow,
    ) -> Result<Option<EpisodeCandidate>, EpisodeResolutionError> {
        resolver::resolve_with_retry(show, self.max_retries, || self.next_episode(show))
    }
}
