//! Where the watch-list OAuth tokens live between authorizations.
//!
//! A refreshed or newly exchanged token pair replaces the stored one. The
//! file-backed store keeps it as JSON in the user's configuration directory,
//! so the next run can refresh instead of prompting again.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Errors from reading or writing the token file
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The platform has no per-user configuration directory
    #[error("No user configuration directory to keep tokens in")]
    NoConfigDirectory,

    /// The token file or its directory could not be read or written
    #[error("Cannot access token file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The token file exists but does not hold a token pair
    #[error("Token file {path} is corrupted: {source}")]
    Corrupted {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The token pair could not be encoded for writing
    #[error("Cannot encode tokens: {0}")]
    Encode(#[from] serde_json::Error),
}

/// An OAuth access token together with the token used to renew it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Storage for the watch-list service's OAuth tokens
///
/// Implementations must be shareable between worker threads.
pub trait CredentialStore: Send + Sync {
    /// Returns the stored access token, if any
    fn access_token(&self) -> Option<String>;

    /// Returns the stored refresh token, if any
    fn refresh_token(&self) -> Option<String>;

    /// Replaces both stored tokens
    fn set_tokens(&self, access_token: &str, refresh_token: &str) -> Result<(), CredentialError>;

    /// Returns both tokens if the store holds a complete pair
    fn token_pair(&self) -> Option<TokenPair> {
        Some(TokenPair {
            access_token: self.access_token()?,
            refresh_token: self.refresh_token()?,
        })
    }
}

/// Keeps tokens in memory only; they are lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    tokens: Mutex<Option<TokenPair>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-filled with the given tokens
    pub fn with_tokens(access_token: &str, refresh_token: &str) -> Self {
        Self {
            tokens: Mutex::new(Some(TokenPair {
                access_token: access_token.to_string(),
                refresh_token: refresh_token.to_string(),
            })),
        }
    }

    fn current(&self) -> Option<TokenPair> {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn access_token(&self) -> Option<String> {
        self.current().map(|t| t.access_token)
    }

    fn refresh_token(&self) -> Option<String> {
        self.current().map(|t| t.refresh_token)
    }

    fn set_tokens(&self, access_token: &str, refresh_token: &str) -> Result<(), CredentialError> {
        *self.tokens.lock().unwrap_or_else(PoisonError::into_inner) = Some(TokenPair {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
        });
        Ok(())
    }
}

/// Persists tokens as a JSON file
///
/// The file is read once when the store is opened and rewritten on every
/// `set_tokens` call.
#[derive(Debug)]
pub struct FileCredentialStore {
    /// The JSON file holding the token pair
    path: PathBuf,
    /// Tokens as last read or written
    tokens: Mutex<Option<TokenPair>>,
}

impl FileCredentialStore {
    /// Opens the store in the system's standard config directory
    ///
    /// The file is named after `name`, sanitized (lowercased, characters
    /// other than a-z, 0-9 and hyphen replaced with underscores).
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let store = FileCredentialStore::open("trakt")?;
    /// ```
    pub fn open(name: &str) -> Result<Self, CredentialError> {
        let proj_dirs = directories::ProjectDirs::from("pl", "homik", "subtitlechecker")
            .ok_or(CredentialError::NoConfigDirectory)?;

        let config_dir = proj_dirs.config_dir();
        fs::create_dir_all(config_dir).map_err(|e| CredentialError::Io {
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        Self::at_path(config_dir.join(format!("{}.json", sanitize_name(name))))
    }

    /// Opens the store backed by an explicit file path
    ///
    /// A missing file is not an error; the store then starts out empty.
    pub fn at_path(path: impl Into<PathBuf>) -> Result<Self, CredentialError> {
        let path = path.into();
        let tokens = load_tokens(&path)?;
        Ok(Self {
            path,
            tokens: Mutex::new(tokens),
        })
    }

    /// Returns the path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn current(&self) -> Option<TokenPair> {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CredentialStore for FileCredentialStore {
    fn access_token(&self) -> Option<String> {
        self.current().map(|t| t.access_token)
    }

    fn refresh_token(&self) -> Option<String> {
        self.current().map(|t| t.refresh_token)
    }

    fn set_tokens(&self, access_token: &str, refresh_token: &str) -> Result<(), CredentialError> {
        let pair = TokenPair {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
        };

        // Hold the lock while writing so concurrent updates hit the file in order
        let mut tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        let content = serde_json::to_string_pretty(&pair)?;
        fs::write(&self.path, content).map_err(|e| CredentialError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        *tokens = Some(pair);

        Ok(())
    }
}

fn load_tokens(path: &Path) -> Result<Option<TokenPair>, CredentialError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).map_err(|e| CredentialError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let tokens =
        serde_json::from_str(&content).map_err(|e| CredentialError::Corrupted {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(Some(tokens))
}

/// Sanitizes a name for use in file paths
fn sanitize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
