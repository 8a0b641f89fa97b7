//! OpenSubtitles REST API request and response types.
use serde::{Deserialize, Serialize};

/// Body of `POST /login`
#[derive(Debug, Serialize)]
pub(super) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Response of `POST /login`
#[derive(Debug, Deserialize)]
pub(super) struct LoginResponse {
    pub token: String,
}

/// Response of `GET /subtitles`
#[derive(Debug, Deserialize)]
pub(super) struct SearchResponse {
    #[serde(default)]
    pub data: Vec<SubtitleEntry>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SubtitleEntry {
    pub attributes: SubtitleAttributes,
}

#[derive(Debug, Deserialize)]
pub(super) struct SubtitleAttributes {
    /// Release name the subtitle was made for
    pub release: Option<String>,
    /// Page the subtitle can be downloaded from
    pub url: Option<String>,
    #[serde(default)]
    pub files: Vec<SubtitleFile>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SubtitleFile {
    pub file_id: u64,
    pub file_name: Option<String>,
}
