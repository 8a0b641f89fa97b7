//! OpenSubtitles subtitle search implementation.
use super::opensubtitles_types::{LoginRequest, LoginResponse, SearchResponse};
use super::{SubtitleSearchApi, SubtitleServiceError};
use crate::config::OpenSubtitlesCredentials;
use crate::model::SubtitleRecord;
use serde::de::DeserializeOwned;
use std::sync::{PoisonError, RwLock};

/// Subtitle search client for the opensubtitles.com REST API.
///
/// Without a configured username searches run anonymously with the API key
/// alone; `login` then only marks the session as ready.
pub struct OpenSubtitlesApi {
    client: reqwest::blocking::Client,
    base_url: String,
    language: String,
    credentials: OpenSubtitlesCredentials,
    token: RwLock<Option<String>>,
}

impl OpenSubtitlesApi {
    /// Creates a client searching subtitles in `language` (ISO 639-1).
    pub fn new(credentials: &OpenSubtitlesCredentials, language: &str) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            base_url: "https://api.opensubtitles.com/api/v1".to_string(),
            language: language.to_lowercase(),
            credentials: credentials.clone(),
            token: RwLock::new(None),
        }
    }

    /// Converts a search response into subtitle records.
    ///
    /// Every file of every result becomes one record. Results without a
    /// download page are skipped.
    fn convert_response(response: SearchResponse) -> Vec<SubtitleRecord> {
        let mut records = Vec::new();

        for entry in response.data {
            let attributes = entry.attributes;
            let Some(url) = attributes.url else {
                continue;
            };

            for file in attributes.files {
                let file_name = file
                    .file_name
                    .or_else(|| attributes.release.clone())
                    .unwrap_or_else(|| file.file_id.to_string());
                records.push(SubtitleRecord::new(file_name, url.clone()));
            }
        }

        records
    }

    /// Checks the status and parses the JSON body of a response.
    fn parse_response<T: DeserializeOwned>(
        response: reqwest::blocking::Response,
    ) -> Result<T, SubtitleServiceError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(SubtitleServiceError::Status { status, body });
        }

        let body = response
            .bytes()
            .map_err(|e| SubtitleServiceError::RequestError(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| SubtitleServiceError::ParseError(e.to_string()))
    }

    /// Runs a subtitle search with the given query parameters.
    fn search(&self, query: &[(&str, String)]) -> Result<Vec<SubtitleRecord>, SubtitleServiceError> {
        let url = format!("{}/subtitles", self.base_url);

        let mut request = self
            .client
            .get(&url)
            .query(query)
            .query(&[("languages", self.language.as_str())])
            .header("Api-Key", &self.credentials.api_key)
            .header(reqwest::header::USER_AGENT, &self.credentials.user_agent);

        if let Some(token) = self
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .map_err(|e| SubtitleServiceError::RequestError(e.to_string()))?;

        let search: SearchResponse = Self::parse_response(response)?;
        Ok(Self::convert_response(search))
    }
}

impl SubtitleSearchApi for OpenSubtitlesApi {
    fn login(&self) -> Result<(), SubtitleServiceError> {
        let (Some(username), Some(password)) = (
            self.credentials.username.as_deref(),
            self.credentials.password.as_deref(),
        ) else {
            tracing::debug!("No OpenSubtitles account configured, searching anonymously");
            return Ok(());
        };

        let url = format!("{}/login", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.credentials.api_key)
            .header(reqwest::header::USER_AGENT, &self.credentials.user_agent)
            .json(&LoginRequest { username, password })
            .send()
            .map_err(|e| SubtitleServiceError::RequestError(e.to_string()))?;

        let login: LoginResponse = Self::parse_response(response)?;
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(login.token);

        Ok(())
    }

    fn search_by_imdb_id(&self, imdb_id: &str) -> Result<Vec<SubtitleRecord>, SubtitleServiceError> {
        // The API wants the id as a number without leading zeroes
        let imdb_id = imdb_id
            .parse::<u64>()
            .map(|id| id.to_string())
            .unwrap_or_else(|_| imdb_id.to_string());

        self.search(&[("imdb_id", imdb_id)])
    }

    fn search_by_name_and_episode(
        &self,
        show_name: &str,
        season: u32,
        episode: u32,
    ) -> Result<Vec<SubtitleRecord>, SubtitleServiceError> {
        self.search(&[
            ("episode_number", episode.to_string()),
            ("query", show_name.to_lowercase()),
            ("season_number", season.to_string()),
        ])
    }
}
