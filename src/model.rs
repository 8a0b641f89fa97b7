//! Data structures shared by every stage of the subtitle check.
//!
//! All values are created once and then only read, so they are plain owned
//! structs that are cheap to clone between worker threads.

use std::fmt;

/// A show the user tracks on the watch-list service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TvShow {
    /// The show title as reported by the watch-list service
    pub name: String,
    /// The watch-list service's numeric id for the show
    pub external_id: u64,
}

impl TvShow {
    pub fn new(name: impl Into<String>, external_id: u64) -> Self {
        Self {
            name: name.into(),
            external_id,
        }
    }
}

/// The next unwatched, already aired episode of a tracked show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeCandidate {
    /// The show this episode belongs to
    pub show: TvShow,
    /// The episode title
    pub title: String,
    /// IMDB id of the episode (e.g. `tt0959621`), if known
    pub external_id: Option<String>,
    /// Season number, if known
    pub season: Option<u32>,
    /// Episode number within the season, if known
    pub episode: Option<u32>,
}

impl fmt::Display for EpisodeCandidate {
    /// Formats as `Show S01E02`, leaving unknown numbers as `??`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} S", self.show.name)?;
        match self.season {
            Some(season) => write!(f, "{:02}", season)?,
            None => write!(f, "??")?,
        }
        write!(f, "E")?;
        match self.episode {
            Some(episode) => write!(f, "{:02}", episode),
            None => write!(f, "??"),
        }
    }
}

/// A single subtitle search hit.
///
/// This describes where a subtitle file can be obtained, not its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleRecord {
    /// Name of the subtitle file
    pub file_name: String,
    /// Location the subtitle can be downloaded from
    pub download_uri: String,
}

impl SubtitleRecord {
    pub fn new(file_name: impl Into<String>, download_uri: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            download_uri: download_uri.into(),
        }
    }
}

/// Outcome of the subtitle search for one episode.
///
/// An empty `subtitles` list means the episode was checked and nothing was
/// found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeSearchResult {
    /// The episode that was searched for
    pub episode: EpisodeCandidate,
    /// Subtitles found, in the order the search service returned them
    pub subtitles: Vec<SubtitleRecord>,
}
