use clap::Parser;
use std::io;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use subtitle_checker::{
    AuthorizationPrompt, CheckerConfig, CredentialStore, DEFAULT_LANGUAGE, FileCredentialStore,
    MemoryCredentialStore, OpenSubtitlesCredentials, ProgressEvent, SubtitlesChecker,
    TraktCredentials,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Checks whether subtitles exist for the next episode of every show you watch
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Language to search subtitles in (ISO 639-1)
    #[arg(short, long, default_value = DEFAULT_LANGUAGE)]
    language: String,

    /// Check one show after another on the current thread
    #[arg(long)]
    sequential: bool,

    /// Do not persist trakt.tv tokens between runs
    #[arg(long)]
    no_save: bool,

    /// Number of worker threads (defaults to one per CPU)
    #[arg(short = 'j', long)]
    workers: Option<usize>,

    /// trakt.tv application client id
    #[arg(long, env = "TRAKT_CLIENT_ID", hide_env_values = true)]
    trakt_client_id: String,

    /// trakt.tv application client secret
    #[arg(long, env = "TRAKT_CLIENT_SECRET", hide_env_values = true)]
    trakt_client_secret: String,

    /// opensubtitles.com API key
    #[arg(long, env = "OPENSUBTITLES_API_KEY", hide_env_values = true)]
    opensubtitles_api_key: String,

    /// opensubtitles.com account name (anonymous if omitted)
    #[arg(long, env = "OPENSUBTITLES_USERNAME")]
    opensubtitles_username: Option<String>,

    /// opensubtitles.com account password
    #[arg(long, env = "OPENSUBTITLES_PASSWORD", hide_env_values = true)]
    opensubtitles_password: Option<String>,
}

impl Cli {
    fn checker_config(&self) -> CheckerConfig {
        CheckerConfig {
            language: self.language.clone(),
            trakt: TraktCredentials {
                client_id: self.trakt_client_id.clone(),
                client_secret: self.trakt_client_secret.clone(),
            },
            open_subtitles: OpenSubtitlesCredentials {
                api_key: self.opensubtitles_api_key.clone(),
                username: self.opensubtitles_username.clone(),
                password: self.opensubtitles_password.clone(),
                ..OpenSubtitlesCredentials::default()
            },
            worker_threads: self.workers,
            ..CheckerConfig::default()
        }
    }
}

/// Asks for the trakt.tv authorization code on the terminal
struct TerminalPrompt;

impl AuthorizationPrompt for TerminalPrompt {
    fn access_code(&self, authorization_url: &str) -> io::Result<String> {
        println!("\n=== trakt.tv Authorization ===");
        println!("Open the following URL in your browser and approve access:");
        println!("  {}\n", authorization_url);

        dialoguer::Input::<String>::new()
            .with_prompt("Enter the code shown by trakt.tv")
            .interact_text()
            .map_err(io::Error::other)
    }
}

/// Handles progress events and prints formatted output to stdout
fn handle_progress_event(event: ProgressEvent, failed: &AtomicBool) {
    match event {
        ProgressEvent::EpisodeFound(episode) => {
            println!("Unwatched episode found: {} - {}", episode, episode.title);
        }
        ProgressEvent::SubtitlesLoaded(result) => {
            if result.subtitles.is_empty() {
                println!("Subtitles for {} were not found", result.episode);
            } else {
                println!(
                    "Subtitles for {} were found ({})",
                    result.episode,
                    result.subtitles.len()
                );
            }
        }
        ProgressEvent::Complete => {
            println!("\nSearch finished!");
        }
        ProgressEvent::Error(e) => {
            failed.store(true, Ordering::SeqCst);
            eprintln!("\nError during subtitle check: {}", e);
        }
    }
}

fn credential_store(no_save: bool) -> Arc<dyn CredentialStore> {
    if no_save {
        return Arc::new(MemoryCredentialStore::new());
    }

    match FileCredentialStore::open("trakt") {
        Ok(store) => {
            tracing::debug!(path = %store.path().display(), "Using stored trakt.tv tokens");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Cannot use token file, tokens will not be saved");
            Arc::new(MemoryCredentialStore::new())
        }
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let failed = Arc::new(AtomicBool::new(false));
    let sink_failed = Arc::clone(&failed);
    let checker = SubtitlesChecker::new(
        &cli.checker_config(),
        credential_store(cli.no_save),
        Arc::new(TerminalPrompt),
        Arc::new(move |event: ProgressEvent| handle_progress_event(event, &sink_failed)),
    );

    if cli.sequential {
        checker.run_blocking();
    } else {
        let (done_tx, done_rx) = mpsc::channel();
        let started = checker.run_in_background(Some(Box::new(move || {
            let _ = done_tx.send(());
        })));

        if let Err(e) = started {
            eprintln!("Error: {}", e);
            process::exit(1);
        }

        // The sender is dropped without a message only if the run was abandoned
        if done_rx.recv().is_err() {
            eprintln!("Error: subtitle check stopped unexpectedly");
            process::exit(1);
        }
    }

    if failed.load(Ordering::SeqCst) {
        process::exit(1);
    }
}
