//! trakt.tv API request and response types.
//!
//! These structures mirror the JSON format of the trakt.tv v2 API.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of `GET /sync/watched/shows`
#[derive(Debug, Deserialize)]
pub(super) struct TraktWatchedShow {
    pub show: TraktShow,
}

#[derive(Debug, Deserialize)]
pub(super) struct TraktShow {
    pub title: String,
    pub ids: TraktShowIds,
}

#[derive(Debug, Deserialize)]
pub(super) struct TraktShowIds {
    pub trakt: u64,
}

/// Response of `GET /shows/{id}/progress/watched`
#[derive(Debug, Deserialize)]
pub(super) struct TraktProgress {
    /// Next episode to watch; null when the show is fully watched
    pub next_episode: Option<TraktEpisode>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TraktEpisode {
    pub season: Option<u32>,
    pub number: Option<u32>,
    pub title: Option<String>,
    pub ids: Option<TraktEpisodeIds>,
    /// Only present with `extended=full`
    pub first_aired: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TraktEpisodeIds {
    pub imdb: Option<String>,
}

/// Body of `POST /oauth/token`
#[derive(Debug, Serialize)]
pub(super) struct TraktTokenRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<&'a str>,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub redirect_uri: &'a str,
    pub grant_type: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct TraktTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}
