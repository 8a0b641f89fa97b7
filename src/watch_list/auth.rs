//! Authorization gate for the watch-list service
//!
//! Before any watch-list call the user's OAuth tokens must be valid. Stored
//! tokens are refreshed; without stored tokens, or when refreshing fails, the
//! user is asked to authorize the application interactively.

use super::{WatchListApi, WatchListError};
use crate::credentials::{CredentialError, CredentialStore, TokenPair};
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Errors that can occur while authorizing with the watch-list service
#[derive(Debug, Error)]
pub enum AuthorizationError {
    /// The user could not be asked for an authorization code
    #[error("Failed to obtain authorization code: {0}")]
    Prompt(#[source] io::Error),

    /// The service rejected the authorization attempt
    #[error("Authorization rejected by service: {0}")]
    Service(#[source] WatchListError),

    /// The new tokens could not be persisted
    #[error("Failed to store credentials: {0}")]
    Credentials(#[from] CredentialError),
}

/// Asks the user to authorize this application
pub trait AuthorizationPrompt: Send + Sync {
    /// Shows `authorization_url` to the user and returns the code they enter
    ///
    /// Implementations should tell the user to open the URL, approve access
    /// and type in the code the service displays afterwards.
    fn access_code(&self, authorization_url: &str) -> io::Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthState {
    Unauthorized,
    Authorizing,
    Authorized,
}

/// Ensures a valid watch-list session exists, at most once
///
/// The first successful [`AuthorizationGate::ensure_authorized`] call flips
/// the gate to authorized; later calls return immediately. Callers racing the
/// first call wait for its outcome instead of starting a second attempt.
pub struct AuthorizationGate {
    api: Arc<dyn WatchListApi>,
    store: Arc<dyn CredentialStore>,
    prompt: Arc<dyn AuthorizationPrompt>,
    state: Mutex<AuthState>,
    state_changed: Condvar,
}

impl AuthorizationGate {
    pub fn new(
        api: Arc<dyn WatchListApi>,
        store: Arc<dyn CredentialStore>,
        prompt: Arc<dyn AuthorizationPrompt>,
    ) -> Self {
        Self {
            api,
            store,
            prompt,
            state: Mutex::new(AuthState::Unauthorized),
            state_changed: Condvar::new(),
        }
    }

    /// Returns whether authorization has already succeeded
    pub fn is_authorized(&self) -> bool {
        *self.lock_state() == AuthState::Authorized
    }

    /// Authorizes with the watch-list service unless already done
    ///
    /// With a stored token pair the tokens are refreshed. Without one, or if
    /// refreshing fails, the user is asked for an authorization code via the
    /// prompt. New tokens are persisted in the credential store.
    ///
    /// # Errors
    ///
    /// Returns an error if interactive authorization fails or the new tokens
    /// cannot be stored. The gate stays unauthorized in that case.
    pub fn ensure_authorized(&self) -> Result<(), AuthorizationError> {
        let mut state = self.lock_state();
        loop {
            match *state {
                AuthState::Authorized => return Ok(()),
                AuthState::Authorizing => {
                    state = self
                        .state_changed
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                AuthState::Unauthorized => break,
            }
        }
        *state = AuthState::Authorizing;
        drop(state);

        // The prompt may block on user input, so the lock is not held here
        let result = self.authorize();

        let mut state = self.lock_state();
        *state = match result {
            Ok(()) => AuthState::Authorized,
            Err(_) => AuthState::Unauthorized,
        };
        self.state_changed.notify_all();

        result
    }

    fn lock_state(&self) -> MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn authorize(&self) -> Result<(), AuthorizationError> {
        let Some(stored) = self.store.token_pair() else {
            tracing::info!("No stored watch-list credentials, starting interactive authorization");
            return self.authorize_interactively();
        };

        match self.api.refresh_access_token(&stored.refresh_token) {
            Ok(tokens) => {
                tracing::debug!("Refreshed watch-list access token");
                self.accept(tokens)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Refreshing watch-list access token failed, falling back to interactive authorization"
                );
                self.authorize_interactively()
            }
        }
    }

    fn authorize_interactively(&self) -> Result<(), AuthorizationError> {
        let state = ulid::Ulid::new().to_string();
        let url = self
            .api
            .authorization_url(&state)
            .map_err(AuthorizationError::Service)?;

        let code = self
            .prompt
            .access_code(&url)
            .map_err(AuthorizationError::Prompt)?;

        let tokens = self
            .api
            .exchange_code(code.trim())
            .map_err(AuthorizationError::Service)?;

        tracing::info!("Authorized with watch-list service");
        self.accept(tokens)
    }

    /// Persists the tokens and hands them to the API client
    fn accept(&self, tokens: TokenPair) -> Result<(), AuthorizationError> {
        self.store
            .set_tokens(&tokens.access_token, &tokens.refresh_token)?;
        self.api.use_tokens(&tokens);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use crate::test_helpers::{MockPrompt, MockWatchListApi};

    fn gate(
        api: MockWatchListApi,
        store: MemoryCredentialStore,
        prompt: MockPrompt,
    ) -> (
        AuthorizationGate,
        Arc<MockWatchListApi>,
        Arc<MemoryCredentialStore>,
        Arc<MockPrompt>,
    ) {
        let api = Arc::new(api);
        let store = Arc::new(store);
        let prompt = Arc::new(prompt);
        let gate = AuthorizationGate::new(api.clone(), store.clone(), prompt.clone());
        (gate, api, store, prompt)
    }

    #[test]
    fn test_stored_tokens_are_refreshed() {
        let (gate, api, store, prompt) = gate(
            MockWatchListApi::default(),
            MemoryCredentialStore::with_tokens("old-access", "old-refresh"),
            MockPrompt::new("code"),
        );

        gate.ensure_authorized().unwrap();

        assert!(gate.is_authorized());
        assert_eq!(api.refresh_calls(), 1);
        assert_eq!(api.last_refresh_token().as_deref(), Some("old-refresh"));
        assert_eq!(prompt.calls(), 0);
        assert_eq!(store.access_token().as_deref(), Some("refreshed-access"));
        assert_eq!(
            api.tokens_in_use().map(|t| t.access_token),
            Some("refreshed-access".to_string())
        );
    }

    #[test]
    fn test_missing_tokens_trigger_interactive_authorization() {
        let (gate, api, store, prompt) = gate(
            MockWatchListApi::default(),
            MemoryCredentialStore::new(),
            MockPrompt::new("  1234  "),
        );

        gate.ensure_authorized().unwrap();

        assert_eq!(api.refresh_calls(), 0);
        assert_eq!(prompt.calls(), 1);
        assert!(prompt.last_url().unwrap().starts_with("https://example.test/authorize"));
        assert_eq!(api.exchanged_codes(), vec!["1234".to_string()]);
        assert_eq!(store.access_token().as_deref(), Some("exchanged-access"));
        assert_eq!(store.refresh_token().as_deref(), Some("exchanged-refresh"));
    }

    #[test]
    fn test_failed_refresh_falls_back_to_prompt() {
        let mut api = MockWatchListApi::default();
        api.fail_refresh = true;
        let (gate, api, store, prompt) = gate(
            api,
            MemoryCredentialStore::with_tokens("old-access", "old-refresh"),
            MockPrompt::new("code"),
        );

        gate.ensure_authorized().unwrap();

        assert_eq!(api.refresh_calls(), 1);
        assert_eq!(prompt.calls(), 1);
        assert_eq!(store.access_token().as_deref(), Some("exchanged-access"));
    }

    #[test]
    fn test_refresh_and_exchange_failing_is_an_error() {
        let mut api = MockWatchListApi::default();
        api.fail_refresh = true;
        api.fail_exchange = true;
        let (gate, _, store, _) = gate(
            api,
            MemoryCredentialStore::with_tokens("old-access", "old-refresh"),
            MockPrompt::new("code"),
        );

        let result = gate.ensure_authorized();

        assert!(matches!(result, Err(AuthorizationError::Service(_))));
        assert!(!gate.is_authorized());
        assert_eq!(store.access_token().as_deref(), Some("old-access"));
    }

    #[test]
    fn test_prompt_failure_is_an_error() {
        let (gate, api, _, _) = gate(
            MockWatchListApi::default(),
            MemoryCredentialStore::new(),
            MockPrompt::failing(),
        );

        assert!(matches!(
            gate.ensure_authorized(),
            Err(AuthorizationError::Prompt(_))
        ));
        assert!(api.exchanged_codes().is_empty());
    }

    #[test]
    fn test_second_call_is_a_no_op() {
        let (gate, api, _, prompt) = gate(
            MockWatchListApi::default(),
            MemoryCredentialStore::new(),
            MockPrompt::new("code"),
        );

        gate.ensure_authorized().unwrap();
        gate.ensure_authorized().unwrap();

        assert_eq!(prompt.calls(), 1);
        assert_eq!(api.exchanged_codes().len(), 1);
        assert_eq!(api.refresh_calls(), 0);
    }

    #[test]
    fn test_failed_authorization_can_be_retried() {
        let (gate, _, _, prompt) = gate(
            MockWatchListApi::default(),
            MemoryCredentialStore::new(),
            MockPrompt::failing_once("code"),
        );

        assert!(gate.ensure_authorized().is_err());
        gate.ensure_authorized().unwrap();

        assert!(gate.is_authorized());
        assert_eq!(prompt.calls(), 2);
    }

    #[test]
    fn test_concurrent_callers_authorize_once() {
        let (gate, api, _, _) = gate(
            MockWatchListApi::default(),
            MemoryCredentialStore::with_tokens("old-access", "old-refresh"),
            MockPrompt::new("code"),
        );

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| gate.ensure_authorized().unwrap());
            }
        });

        assert!(gate.is_authorized());
        assert_eq!(api.refresh_calls(), 1);
    }
}
