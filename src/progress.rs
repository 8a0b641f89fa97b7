//! Progress reporting for a subtitle check run
//!
//! The pipeline reports through a [`ProgressSink`]. Any closure taking a
//! [`ProgressEvent`] can serve as a sink, which keeps simple callers free of
//! trait boilerplate.

use crate::SubtitlesCheckerError;
use crate::model::{EpisodeCandidate, EpisodeSearchResult};

/// Receives notifications while a check runs
///
/// Calls are never made concurrently; the pipeline delivers one notification
/// at a time, possibly from different worker threads. Exactly one of
/// [`ProgressSink::on_complete`] and [`ProgressSink::on_error`] is called per
/// run, and nothing follows it.
pub trait ProgressSink: Send + Sync {
    /// An unwatched episode was found; its subtitle search starts now
    fn on_episode_found(&self, episode: &EpisodeCandidate);

    /// The subtitle search for an episode finished
    fn on_subtitles_loaded(&self, result: &EpisodeSearchResult);

    /// Every episode was checked successfully
    fn on_complete(&self);

    /// The run failed and was stopped
    fn on_error(&self, error: SubtitlesCheckerError);
}

/// Progress event delivered to closure sinks
#[derive(Debug)]
pub enum ProgressEvent {
    /// An unwatched episode was found
    EpisodeFound(EpisodeCandidate),

    /// The subtitle search for an episode finished
    SubtitlesLoaded(EpisodeSearchResult),

    /// Every episode was checked successfully
    Complete,

    /// The run failed
    Error(SubtitlesCheckerError),
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn on_episode_found(&self, episode: &EpisodeCandidate) {
        self(ProgressEvent::EpisodeFound(episode.clone()));
    }

    fn on_subtitles_loaded(&self, result: &EpisodeSearchResult) {
        self(ProgressEvent::SubtitlesLoaded(result.clone()));
    }

    fn on_complete(&self) {
        self(ProgressEvent::Complete);
    }

    fn on_error(&self, error: SubtitlesCheckerError) {
        self(ProgressEvent::Error(error));
    }
}
