//! Configuration for a subtitle check run
//!
//! Holds the service credentials and tuning knobs. The CLI fills this from
//! command line arguments and environment variables; library users build it
//! directly.

/// Default subtitle language (ISO 639-1)
pub const DEFAULT_LANGUAGE: &str = "en";

/// Number of extra attempts made when resolving a show's next episode fails
/// with a transient error
pub const DEFAULT_RESOLUTION_RETRIES: u32 = 2;

/// User agent sent to OpenSubtitles, which rejects requests without one
pub const DEFAULT_USER_AGENT: &str = concat!("subtitle_checker v", env!("CARGO_PKG_VERSION"));

/// OAuth application credentials for trakt.tv
#[derive(Debug, Clone, Default)]
pub struct TraktCredentials {
    /// The application's client id (also used as the API key)
    pub client_id: String,
    /// The application's client secret
    pub client_secret: String,
}

/// Access credentials for opensubtitles.com
#[derive(Debug, Clone)]
pub struct OpenSubtitlesCredentials {
    /// Consumer API key
    pub api_key: String,
    /// Account name; anonymous searches are used when absent
    pub username: Option<String>,
    /// Account password, only used together with `username`
    pub password: Option<String>,
    /// User agent announced to the service
    pub user_agent: String,
}

impl Default for OpenSubtitlesCredentials {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            username: None,
            password: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Settings for a `SubtitlesChecker`
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Language subtitles are searched in (ISO 639-1, e.g. "en", "pl")
    pub language: String,
    /// trakt.tv application credentials
    pub trakt: TraktCredentials,
    /// opensubtitles.com credentials
    pub open_subtitles: OpenSubtitlesCredentials,
    /// Extra attempts for next-episode resolution after a transient failure
    pub max_resolution_retries: u32,
    /// Worker count for background runs; `None` uses one per logical CPU
    pub worker_threads: Option<usize>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            trakt: TraktCredentials::default(),
            open_subtitles: OpenSubtitlesCredentials::default(),
            max_resolution_retries: DEFAULT_RESOLUTION_RETRIES,
            worker_threads: None,
        }
    }
}
