//! The subtitle checking pipeline
//!
//! A run authorizes with the watch list, lists the tracked shows, resolves
//! each show's next episode and searches subtitles for every episode found.
//! Each of those steps is a separate task on the caller's executor, so on a
//! worker pool the subtitle search for one show overlaps with the episode
//! resolution of the others.
//!
//! Any failure stops the whole run: the sink receives the error and no
//! further notifications, even from tasks that are still in flight.

use crate::SubtitlesCheckerError;
use crate::config::CheckerConfig;
use crate::credentials::CredentialStore;
use crate::executor::{DirectExecutor, ExecutorError, TaskExecutor, ThreadPoolExecutor};
use crate::model::{EpisodeCandidate, TvShow};
use crate::progress::ProgressSink;
use crate::subtitles::{OpenSubtitlesApi, SubtitleFetcher};
use crate::watch_list::{AuthorizationPrompt, TraktApi, WatchList};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Callback run once after the final notification of a run
pub type FinallyHook = Box<dyn FnOnce() + Send + 'static>;

/// Stages a run moves through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunPhase {
    Idle,
    Authorizing,
    Enumerating,
    PerShowResolving,
    PerEpisodeFetching,
    Complete,
    Error,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Complete | RunPhase::Error)
    }
}

/// Checks subtitle availability for the next episode of every tracked show
///
/// # Examples
///
/// ```no_run
/// use subtitle_checker::{
///     CheckerConfig, MemoryCredentialStore, ProgressEvent, SubtitlesChecker,
/// };
/// use std::sync::Arc;
///
/// # fn prompt() -> Arc<dyn subtitle_checker::AuthorizationPrompt> { unimplemented!() }
/// let checker = SubtitlesChecker::new(
///     &CheckerConfig::default(),
///     Arc::new(MemoryCredentialStore::new()),
///     prompt(),
///     Arc::new(|event: ProgressEvent| println!("{:?}", event)),
/// );
///
/// // Blocks until every show was checked
/// checker.run_blocking();
/// ```
pub struct SubtitlesChecker {
    watch_list: Arc<WatchList>,
    fetcher: Arc<SubtitleFetcher>,
    sink: Arc<dyn ProgressSink>,
    worker_threads: Option<usize>,
}

impl SubtitlesChecker {
    /// Creates a checker backed by trakt.tv and opensubtitles.com
    pub fn new(
        config: &CheckerConfig,
        store: Arc<dyn CredentialStore>,
        prompt: Arc<dyn AuthorizationPrompt>,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        let watch_list = WatchList::new(Arc::new(TraktApi::new(&config.trakt)), store, prompt)
            .with_max_retries(config.max_resolution_retries);
        let fetcher = SubtitleFetcher::new(Arc::new(OpenSubtitlesApi::new(
            &config.open_subtitles,
            &config.language,
        )));

        let mut checker = Self::with_services(watch_list, fetcher, sink);
        checker.worker_threads = config.worker_threads;
        checker
    }

    /// Creates a checker from already configured services
    pub fn with_services(
        watch_list: WatchList,
        fetcher: SubtitleFetcher,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            watch_list: Arc::new(watch_list),
            fetcher: Arc::new(fetcher),
            sink,
            worker_threads: None,
        }
    }

    /// Starts a run on `executor`
    ///
    /// Returns as soon as the first task is handed to the executor; with
    /// [`DirectExecutor`] that means after the run has finished. `on_finally`
    /// is called once after the final notification, whether the run
    /// succeeded or failed.
    ///
    /// Shutting down the executor is the only way to cancel a run. Neither
    /// the final notification nor `on_finally` is guaranteed in that case.
    pub fn run(&self, executor: Arc<dyn TaskExecutor>, on_finally: Option<FinallyHook>) {
        let run = Arc::new(Run {
            watch_list: Arc::clone(&self.watch_list),
            fetcher: Arc::clone(&self.fetcher),
            sink: Arc::clone(&self.sink),
            executor,
            phase: Mutex::new(RunPhase::Idle),
            pending: AtomicUsize::new(1),
            on_finally: Mutex::new(on_finally),
        });
        run.start();
    }

    /// Runs on the calling thread and returns when the run has finished
    pub fn run_blocking(&self) {
        self.run(Arc::new(DirectExecutor), None);
    }

    /// Runs on a new worker pool and returns immediately
    ///
    /// The pool is shut down once the run finishes, then `on_finally` is
    /// called.
    pub fn run_in_background(&self, on_finally: Option<FinallyHook>) -> Result<(), ExecutorError> {
        let executor = Arc::new(ThreadPoolExecutor::new(self.worker_threads)?);
        tracing::debug!(threads = executor.threads(), "Starting background run");

        let pool = Arc::clone(&executor);
        self.run(
            executor,
            Some(Box::new(move || {
                pool.shutdown();
                if let Some(hook) = on_finally {
                    hook();
                }
            })),
        );
        Ok(())
    }
}

/// State shared by all tasks of one run
struct Run {
    watch_list: Arc<WatchList>,
    fetcher: Arc<SubtitleFetcher>,
    sink: Arc<dyn ProgressSink>,
    executor: Arc<dyn TaskExecutor>,
    /// Guards sink calls, so notifications never overlap or follow the end
    phase: Mutex<RunPhase>,
    /// Tasks submitted but not yet finished; the run completes at zero
    pending: AtomicUsize,
    on_finally: Mutex<Option<FinallyHook>>,
}

impl Run {
    fn start(self: Arc<Self>) {
        let run = Arc::clone(&self);
        self.executor.execute(Box::new(move || run.enumerate_shows()));
    }

    fn enumerate_shows(self: Arc<Self>) {
        if self.is_terminated() {
            return;
        }

        self.advance(RunPhase::Authorizing);
        if let Err(e) = self.watch_list.ensure_authorized() {
            return self.fail(e.into());
        }

        self.advance(RunPhase::Enumerating);
        let shows = match self.watch_list.list_watched_shows() {
            Ok(shows) => shows,
            Err(e) => return self.fail(e.into()),
        };
        tracing::debug!(count = shows.len(), "Loaded watched shows");

        self.advance(RunPhase::PerShowResolving);
        self.pending.fetch_add(shows.len(), Ordering::SeqCst);
        for show in shows {
            if self.is_terminated() {
                return;
            }
            let run = Arc::clone(&self);
            self.executor.execute(Box::new(move || run.resolve_show(show)));
        }

        self.finish_task();
    }

    fn resolve_show(self: Arc<Self>, show: TvShow) {
        if self.is_terminated() {
            return;
        }

        match self.watch_list.resolve_next_episode(&show) {
            Err(e) => return self.fail(e.into()),
            Ok(None) => {
                tracing::debug!(show = %show.name, "Nothing new to watch");
            }
            Ok(Some(episode)) => {
                if !self.notify(|sink| sink.on_episode_found(&episode)) {
                    return;
                }
                self.advance(RunPhase::PerEpisodeFetching);

                self.pending.fetch_add(1, Ordering::SeqCst);
                let run = Arc::clone(&self);
                self.executor
                    .execute(Box::new(move || run.fetch_subtitles(episode)));
            }
        }

        self.finish_task();
    }

    fn fetch_subtitles(self: Arc<Self>, episode: EpisodeCandidate) {
        if self.is_terminated() {
            return;
        }

        match self.fetcher.fetch_subtitles(&episode) {
            Err(e) => self.fail(e.into()),
            Ok(result) => {
                if self.notify(|sink| sink.on_subtitles_loaded(&result)) {
                    self.finish_task();
                }
            }
        }
    }

    fn lock_phase(&self) -> MutexGuard<'_, RunPhase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_terminated(&self) -> bool {
        self.lock_phase().is_terminal()
    }

    /// Moves forward to `phase`; never moves backwards or out of a final phase
    fn advance(&self, phase: RunPhase) {
        let mut current = self.lock_phase();
        if !current.is_terminal() && *current < phase {
            tracing::debug!(from = ?*current, to = ?phase, "Run phase changed");
            *current = phase;
        }
    }

    /// Delivers a notification unless the run already ended
    fn notify(&self, deliver: impl FnOnce(&dyn ProgressSink)) -> bool {
        let phase = self.lock_phase();
        if phase.is_terminal() {
            return false;
        }
        deliver(self.sink.as_ref());
        true
    }

    fn finish_task(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.terminate(None);
        }
    }

    fn fail(&self, error: SubtitlesCheckerError) {
        self.terminate(Some(error));
    }

    /// Sends the final notification and runs the finally hook, once
    fn terminate(&self, error: Option<SubtitlesCheckerError>) {
        {
            let mut phase = self.lock_phase();
            if phase.is_terminal() {
                if let Some(error) = error {
                    tracing::debug!(error = %error, "Ignoring error after run ended");
                }
                return;
            }

            match error {
                None => {
                    *phase = RunPhase::Complete;
                    tracing::debug!("Subtitle check complete");
                    self.sink.on_complete();
                }
                Some(error) => {
                    *phase = RunPhase::Error;
                    tracing::error!(error = %error, "Subtitle check failed");
                    self.sink.on_error(error);
                }
            }
        }

        let hook = self
            .on_finally
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(hook) = hook {
            hook();
        }
    }
}
