//! Hand-written service doubles shared by the unit tests.

use crate::SubtitlesCheckerError;
use crate::credentials::TokenPair;
use crate::model::{EpisodeCandidate, EpisodeSearchResult, SubtitleRecord, TvShow};
use crate::progress::ProgressSink;
use crate::subtitles::{SubtitleSearchApi, SubtitleServiceError};
use crate::watch_list::{AuthorizationPrompt, NextEpisode, WatchListApi, WatchListError};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration as StdDuration;

/// One-shot signal between threads of a test
#[derive(Default)]
pub(crate) struct Latch {
    open: Mutex<bool>,
    opened: Condvar,
}

impl Latch {
    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.opened.notify_all();
    }

    /// Waits until the latch is open; returns `false` on timeout
    pub fn wait(&self, timeout: StdDuration) -> bool {
        let open = self.open.lock().unwrap();
        let (open, _) = self
            .opened
            .wait_timeout_while(open, timeout, |open| !*open)
            .unwrap();
        *open
    }
}

/// A next episode that aired a week ago
pub(crate) fn aired_episode(
    title: &str,
    imdb_id: Option<&str>,
    season: Option<u32>,
    number: Option<u32>,
) -> NextEpisode {
    NextEpisode {
        title: Some(title.to_string()),
        season,
        number,
        imdb_id: imdb_id.map(String::from),
        first_aired: Some(Utc::now() - Duration::days(7)),
    }
}

/// A next episode airing in a week
pub(crate) fn unaired_episode(title: &str, season: Option<u32>, number: Option<u32>) -> NextEpisode {
    NextEpisode {
        first_aired: Some(Utc::now() + Duration::days(7)),
        ..aired_episode(title, None, season, number)
    }
}

/// Watch-list service double
///
/// Shows without a configured next episode are fully watched.
#[derive(Default)]
pub(crate) struct MockWatchListApi {
    pub shows: Vec<TvShow>,
    pub next_episodes: HashMap<u64, NextEpisode>,
    /// Number of transient failures before `next_episode` succeeds, per show
    pub next_episode_failures: HashMap<u64, u32>,
    pub fail_listing: bool,
    pub fail_refresh: bool,
    pub fail_exchange: bool,
    /// `next_episode` for these shows waits for the latch to open first
    pub next_episode_gates: HashMap<u64, Arc<Latch>>,
    watched_shows_calls: AtomicUsize,
    next_episode_calls: Mutex<HashMap<u64, u32>>,
    refresh_calls: AtomicUsize,
    last_refresh_token: Mutex<Option<String>>,
    exchanged_codes: Mutex<Vec<String>>,
    tokens_in_use: Mutex<Option<TokenPair>>,
}

impl MockWatchListApi {
    pub fn with_shows(shows: Vec<TvShow>) -> Self {
        Self {
            shows,
            ..Self::default()
        }
    }

    pub fn with_next_episode(mut self, show_id: u64, episode: NextEpisode) -> Self {
        self.next_episodes.insert(show_id, episode);
        self
    }

    pub fn failing_next_episode(mut self, show_id: u64, failures: u32) -> Self {
        self.next_episode_failures.insert(show_id, failures);
        self
    }

    pub fn gated_next_episode(mut self, show_id: u64, gate: Arc<Latch>) -> Self {
        self.next_episode_gates.insert(show_id, gate);
        self
    }

    pub fn watched_shows_calls(&self) -> usize {
        self.watched_shows_calls.load(Ordering::SeqCst)
    }

    pub fn next_episode_calls(&self, show_id: u64) -> u32 {
        self.next_episode_calls
            .lock()
            .unwrap()
            .get(&show_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn last_refresh_token(&self) -> Option<String> {
        self.last_refresh_token.lock().unwrap().clone()
    }

    pub fn exchanged_codes(&self) -> Vec<String> {
        self.exchanged_codes.lock().unwrap().clone()
    }

    pub fn tokens_in_use(&self) -> Option<TokenPair> {
        self.tokens_in_use.lock().unwrap().clone()
    }
}

impl WatchListApi for MockWatchListApi {
    fn authorization_url(&self, state: &str) -> Result<String, WatchListError> {
        Ok(format!("https://example.test/authorize?state={}", state))
    }

    fn exchange_code(&self, code: &str) -> Result<TokenPair, WatchListError> {
        self.exchanged_codes.lock().unwrap().push(code.to_string());
        if self.fail_exchange {
            return Err(WatchListError::Status {
                status: 401,
                body: "invalid_grant".to_string(),
            });
        }
        Ok(TokenPair {
            access_token: "exchanged-access".to_string(),
            refresh_token: "exchanged-refresh".to_string(),
        })
    }

    fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenPair, WatchListError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_refresh_token.lock().unwrap() = Some(refresh_token.to_string());
        if self.fail_refresh {
            return Err(WatchListError::Status {
                status: 401,
                body: "invalid_grant".to_string(),
            });
        }
        Ok(TokenPair {
            access_token: "refreshed-access".to_string(),
            refresh_token: "refreshed-refresh".to_string(),
        })
    }

    fn use_tokens(&self, tokens: &TokenPair) {
        *self.tokens_in_use.lock().unwrap() = Some(tokens.clone());
    }

    fn watched_shows(&self) -> Result<Vec<TvShow>, WatchListError> {
        self.watched_shows_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing {
            return Err(WatchListError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        Ok(self.shows.clone())
    }

    fn next_episode(&self, show: &TvShow) -> Result<Option<NextEpisode>, WatchListError> {
        let calls = {
            let mut calls = self.next_episode_calls.lock().unwrap();
            let count = calls.entry(show.external_id).or_insert(0);
            *count += 1;
            *count
        };

        if let Some(gate) = self.next_episode_gates.get(&show.external_id) {
            if !gate.wait(StdDuration::from_secs(5)) {
                return Err(WatchListError::ParseError(format!(
                    "gate for '{}' never opened",
                    show.name
                )));
            }
        }

        let failures = self
            .next_episode_failures
            .get(&show.external_id)
            .copied()
            .unwrap_or(0);
        if calls <= failures {
            return Err(WatchListError::RequestError("operation timed out".to_string()));
        }

        Ok(self.next_episodes.get(&show.external_id).cloned())
    }
}

/// Subtitle service double
#[derive(Default)]
pub(crate) struct MockSubtitleApi {
    pub by_id: HashMap<String, Vec<SubtitleRecord>>,
    pub fail_login: bool,
    pub fail_search: bool,
    /// Opened as soon as any search starts
    pub search_started: Option<Arc<Latch>>,
    login_calls: AtomicUsize,
    id_searches: Mutex<Vec<String>>,
    name_searches: Mutex<Vec<(String, u32, u32)>>,
}

impl MockSubtitleApi {
    pub fn with_id_result(mut self, imdb_id: &str, records: Vec<SubtitleRecord>) -> Self {
        self.by_id.insert(imdb_id.to_string(), records);
        self
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn id_searches(&self) -> Vec<String> {
        self.id_searches.lock().unwrap().clone()
    }

    pub fn name_searches(&self) -> Vec<(String, u32, u32)> {
        self.name_searches.lock().unwrap().clone()
    }

    pub fn signalling_search(mut self, started: Arc<Latch>) -> Self {
        self.search_started = Some(started);
        self
    }

    fn search_error(&self) -> Result<(), SubtitleServiceError> {
        if let Some(started) = &self.search_started {
            started.open();
        }
        if self.fail_search {
            return Err(SubtitleServiceError::Status {
                status: 503,
                body: "maintenance".to_string(),
            });
        }
        Ok(())
    }
}

impl SubtitleSearchApi for MockSubtitleApi {
    fn login(&self) -> Result<(), SubtitleServiceError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_login {
            return Err(SubtitleServiceError::Status {
                status: 401,
                body: "bad credentials".to_string(),
            });
        }
        Ok(())
    }

    fn search_by_imdb_id(&self, imdb_id: &str) -> Result<Vec<SubtitleRecord>, SubtitleServiceError> {
        self.id_searches.lock().unwrap().push(imdb_id.to_string());
        self.search_error()?;
        Ok(self.by_id.get(imdb_id).cloned().unwrap_or_default())
    }

    fn search_by_name_and_episode(
        &self,
        show_name: &str,
        season: u32,
        episode: u32,
    ) -> Result<Vec<SubtitleRecord>, SubtitleServiceError> {
        self.name_searches
            .lock()
            .unwrap()
            .push((show_name.to_string(), season, episode));
        self.search_error()?;
        Ok(Vec::new())
    }
}

/// Authorization prompt double answering with a fixed code
pub(crate) struct MockPrompt {
    code: Option<String>,
    fail_first: bool,
    calls: AtomicUsize,
    last_url: Mutex<Option<String>>,
}

impl MockPrompt {
    pub fn new(code: &str) -> Self {
        Self {
            code: Some(code.to_string()),
            fail_first: false,
            calls: AtomicUsize::new(0),
            last_url: Mutex::new(None),
        }
    }

    /// A prompt where the user never provides a code
    pub fn failing() -> Self {
        Self {
            code: None,
            ..Self::new("")
        }
    }

    /// A prompt that fails on the first call and answers afterwards
    pub fn failing_once(code: &str) -> Self {
        Self {
            fail_first: true,
            ..Self::new(code)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_url(&self) -> Option<String> {
        self.last_url.lock().unwrap().clone()
    }
}

impl AuthorizationPrompt for MockPrompt {
    fn access_code(&self, authorization_url: &str) -> io::Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_url.lock().unwrap() = Some(authorization_url.to_string());

        if self.fail_first && call == 0 {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "prompt cancelled"));
        }
        self.code
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no input"))
    }
}

/// A notification as seen by [`RecordingSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SinkEvent {
    /// Episode title
    Found(String),
    /// Episode title and number of subtitles
    Loaded(String, usize),
    Complete,
    /// Error message
    Error(String),
}

/// Progress sink recording every notification in order
#[derive(Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
    loaded: Mutex<Vec<EpisodeSearchResult>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn found_titles(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Found(title) => Some(title),
                _ => None,
            })
            .collect()
    }

    pub fn loaded(&self) -> Vec<EpisodeSearchResult> {
        self.loaded.lock().unwrap().clone()
    }

    pub fn completions(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| **e == SinkEvent::Complete)
            .count()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Error(message) => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn on_episode_found(&self, episode: &EpisodeCandidate) {
        self.events
            .lock()
            .unwrap()
            .push(SinkEvent::Found(episode.title.clone()));
    }

    fn on_subtitles_loaded(&self, result: &EpisodeSearchResult) {
        self.loaded.lock().unwrap().push(result.clone());
        self.events.lock().unwrap().push(SinkEvent::Loaded(
            result.episode.title.clone(),
            result.subtitles.len(),
        ));
    }

    fn on_complete(&self) {
        self.events.lock().unwrap().push(SinkEvent::Complete);
    }

    fn on_error(&self, error: SubtitlesCheckerError) {
        self.events
            .lock()
            .unwrap()
            .push(SinkEvent::Error(error.to_string()));
    }
}
