//! Task executors the checking pipeline runs on
//!
//! The pipeline never spawns threads itself. It hands every unit of work to a
//! [`TaskExecutor`] supplied by the caller: either [`DirectExecutor`], which
//! runs tasks immediately on the calling thread, or [`ThreadPoolExecutor`],
//! a pool of worker threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// A unit of work handed to an executor
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Errors that can occur while setting up an executor
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The worker pool could not be created
    #[error("Failed to build worker pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),
}

/// Something that runs tasks
pub trait TaskExecutor: Send + Sync {
    /// Runs `task`, now or at some later point
    fn execute(&self, task: Task);
}

/// Runs every task immediately on the calling thread
///
/// A pipeline on this executor is fully sequential and deterministic.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectExecutor;

impl TaskExecutor for DirectExecutor {
    fn execute(&self, task: Task) {
        task();
    }
}

/// Runs tasks on a pool of worker threads
///
/// Calling [`ThreadPoolExecutor::shutdown`] abandons every task that has not
/// started yet; tasks already running finish normally.
pub struct ThreadPoolExecutor {
    pool: rayon::ThreadPool,
    shut_down: Arc<AtomicBool>,
}

impl ThreadPoolExecutor {
    /// Creates a pool with `threads` workers, or one per logical CPU if `None`
    pub fn new(threads: Option<usize>) -> Result<Self, ExecutorError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.unwrap_or(0))
            .thread_name(|index| format!("subtitle-checker-{}", index))
            .build()?;

        Ok(Self {
            pool,
            shut_down: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Number of worker threads in the pool
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Stops running tasks; queued and later submitted tasks are dropped
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }

    /// Returns whether [`ThreadPoolExecutor::shutdown`] was called
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl TaskExecutor for ThreadPoolExecutor {
    fn execute(&self, task: Task) {
        if self.is_shut_down() {
            tracing::debug!("Executor shut down, dropping task");
            return;
        }

        let shut_down = Arc::clone(&self.shut_down);
        self.pool.spawn(move || {
            if !shut_down.load(Ordering::SeqCst) {
                task();
            }
        });
    }
}
