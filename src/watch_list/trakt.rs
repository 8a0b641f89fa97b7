//! trakt.tv watch-list implementation.
use super::trakt_types::{
    TraktEpisode, TraktProgress, TraktTokenRequest, TraktTokenResponse, TraktWatchedShow,
};
use super::{NextEpisode, WatchListApi, WatchListError};
use crate::config::TraktCredentials;
use crate::credentials::TokenPair;
use crate::model::TvShow;
use serde::de::DeserializeOwned;
use std::sync::{PoisonError, RwLock};

/// Redirect URI for applications that show the code to the user instead of
/// redirecting
const OUT_OF_BAND_REDIRECT: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Watch-list client for the trakt.tv API.
///
/// Uses https://api.trakt.tv for API calls and https://trakt.tv for the
/// OAuth authorization page.
pub struct TraktApi {
    client: reqwest::blocking::Client,
    base_url: String,
    site_url: String,
    client_id: String,
    client_secret: String,
    tokens: RwLock<Option<TokenPair>>,
}

impl TraktApi {
    /// Creates a new trakt.tv client for the given application credentials.
    pub fn new(credentials: &TraktCredentials) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            base_url: "https://api.trakt.tv".to_string(),
            site_url: "https://trakt.tv".to_string(),
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            tokens: RwLock::new(None),
        }
    }

    /// Converts trakt's next episode into our `NextEpisode`.
    fn convert_episode(episode: TraktEpisode) -> NextEpisode {
        NextEpisode {
            title: episode.title,
            season: episode.season,
            number: episode.number,
            imdb_id: episode.ids.and_then(|ids| ids.imdb),
            first_aired: episode.first_aired,
        }
    }

    fn access_token(&self) -> Result<String, WatchListError> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|t| t.access_token.clone())
            .ok_or(WatchListError::NotAuthorized)
    }

    /// Checks the status and parses the JSON body of a response.
    fn parse_response<T: DeserializeOwned>(
        response: reqwest::blocking::Response,
    ) -> Result<T, WatchListError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(WatchListError::Status { status, body });
        }

        // A body that stalls or breaks off is a transport failure, not bad JSON
        let body = response
            .bytes()
            .map_err(|e| WatchListError::RequestError(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| WatchListError::ParseError(e.to_string()))
    }

    /// Performs an authenticated GET request against the API.
    fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, WatchListError> {
        let token = self.access_token()?;
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .query(query)
            .bearer_auth(token)
            .header("trakt-api-version", "2")
            .header("trakt-api-key", &self.client_id)
            .send()
            .map_err(|e| WatchListError::RequestError(e.to_string()))?;

        Self::parse_response(response)
    }

    /// Requests a token pair from the OAuth token endpoint.
    fn request_tokens(&self, request: &TraktTokenRequest<'_>) -> Result<TokenPair, WatchListError> {
        let url = format!("{}/oauth/token", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .map_err(|e| WatchListError::RequestError(e.to_string()))?;

        let tokens: TraktTokenResponse = Self::parse_response(response)?;
        Ok(TokenPair {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })
    }
}

impl WatchListApi for TraktApi {
    fn authorization_url(&self, state: &str) -> Result<String, WatchListError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/oauth/authorize", self.site_url),
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", OUT_OF_BAND_REDIRECT),
                ("state", state),
            ],
        )
        .map_err(|e| WatchListError::InvalidUrl(e.to_string()))?;

        Ok(url.to_string())
    }

    fn exchange_code(&self, code: &str) -> Result<TokenPair, WatchListError> {
        self.request_tokens(&TraktTokenRequest {
            code: Some(code),
            refresh_token: None,
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            redirect_uri: OUT_OF_BAND_REDIRECT,
            grant_type: "authorization_code",
        })
    }

    fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenPair, WatchListError> {
        self.request_tokens(&TraktTokenRequest {
            code: None,
            refresh_token: Some(refresh_token),
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            redirect_uri: OUT_OF_BAND_REDIRECT,
            grant_type: "refresh_token",
        })
    }

    fn use_tokens(&self, tokens: &TokenPair) {
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = Some(tokens.clone());
    }

    fn watched_shows(&self) -> Result<Vec<TvShow>, WatchListError> {
        let watched: Vec<TraktWatchedShow> =
            self.get("/sync/watched/shows", &[("extended", "noseasons")])?;

        Ok(watched
            .into_iter()
            .map(|w| TvShow::new(w.show.title, w.show.ids.trakt))
            .collect())
    }

    fn next_episode(&self, show: &TvShow) -> Result<Option<NextEpisode>, WatchListError> {
        let path = format!("/shows/{}/progress/watched", show.external_id);
        let progress: TraktProgress = self.get(
            &path,
            &[
                ("hidden", "false"),
                ("specials", "false"),
                ("extended", "full"),
            ],
        )?;

        Ok(progress.next_episode.map(Self::convert_episode))
    }
}
