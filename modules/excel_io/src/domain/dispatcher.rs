//! Bounded worker pool for asynchronous exports.
//!
//! `core_size` workers drain a bounded queue. When the queue is full, up to
//! `max_size - core_size` overflow workers are started. When those are busy as
//! well, the submitter runs the task itself (caller-runs), so an export is
//! never dropped and memory stays bounded.
//!
//! There is no completion channel back to the submitting request: failures are
//! logged and counted in [`DispatcherStats`].

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::task::TaskTracker;

use crate::domain::error::InterchangeError;

pub type ExportTask = BoxFuture<'static, Result<(), InterchangeError>>;

/// How a submitted task was scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Queued,
    Overflow,
    /// The pool was saturated (or shut down); the task already ran on the caller.
    CallerRan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSize {
    pub core: usize,
    pub max: usize,
    pub queue: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherStats {
    pub queued: u64,
    pub overflow: u64,
    pub caller_runs: u64,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    queued: AtomicU64,
    overflow: AtomicU64,
    caller_runs: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

type Queue = Arc<tokio::sync::Mutex<mpsc::Receiver<ExportTask>>>;

pub struct ExportDispatcher {
    size: PoolSize,
    sender: Mutex<Option<mpsc::Sender<ExportTask>>>,
    queue: Queue,
    overflow_workers: Arc<AtomicUsize>,
    tracker: TaskTracker,
    counters: Arc<Counters>,
}

impl ExportDispatcher {
    /// Start the core workers. Must be called inside a tokio runtime.
    pub fn start(size: PoolSize) -> Self {
        let size = PoolSize {
            core: size.core.max(1),
            max: size.max.max(size.core.max(1)),
            queue: size.queue.max(1),
        };
        let (tx, rx) = mpsc::channel(size.queue);
        let dispatcher = Self {
            size,
            sender: Mutex::new(Some(tx)),
            queue: Arc::new(tokio::sync::Mutex::new(rx)),
            overflow_workers: Arc::new(AtomicUsize::new(0)),
            tracker: TaskTracker::new(),
            counters: Arc::new(Counters::default()),
        };

        for n in 0..size.core {
            let queue = dispatcher.queue.clone();
            let counters = dispatcher.counters.clone();
            dispatcher.tracker.spawn(async move {
                loop {
                    let next = queue.lock().await.recv().await;
                    match next {
                        Some(task) => run_task(task, &counters).await,
                        None => break,
                    }
                }
                tracing::debug!(worker = n, "Export worker stopped");
            });
        }

        tracing::info!(
            core = size.core,
            max = size.max,
            queue = size.queue,
            "Export dispatcher started"
        );
        dispatcher
    }

    pub fn size(&self) -> PoolSize {
        self.size
    }

    /// Schedule `task`; with the pool saturated the task runs before this returns.
    pub async fn submit(&self, task: ExportTask) -> Submission {
        let sender = self.sender.lock().clone();
        let Some(sender) = sender else {
            tracing::warn!("Export dispatcher is shut down; running export on the caller");
            return self.run_on_caller(task).await;
        };

        let task = match sender.try_send(task) {
            Ok(()) => {
                self.counters.queued.fetch_add(1, Ordering::Relaxed);
                return Submission::Queued;
            }
            Err(TrySendError::Full(task)) | Err(TrySendError::Closed(task)) => task,
        };

        if self.try_reserve_overflow() {
            self.counters.overflow.fetch_add(1, Ordering::Relaxed);
            let queue = self.queue.clone();
            let counters = self.counters.clone();
            let workers = self.overflow_workers.clone();
            self.tracker.spawn(async move {
                run_task(task, &counters).await;
                // help drain the backlog; a locked queue means a core worker is on it
                loop {
                    let next = match queue.try_lock() {
                        Ok(mut rx) => rx.try_recv().ok(),
                        Err(_) => None,
                    };
                    match next {
                        Some(task) => run_task(task, &counters).await,
                        None => break,
                    }
                }
                workers.fetch_sub(1, Ordering::AcqRel);
            });
            return Submission::Overflow;
        }

        tracing::warn!(
            max = self.size.max,
            queue = self.size.queue,
            "Export pool saturated; running export on the caller"
        );
        self.run_on_caller(task).await
    }

    fn try_reserve_overflow(&self) -> bool {
        let limit = self.size.max - self.size.core;
        self.overflow_workers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .is_ok()
    }

    async fn run_on_caller(&self, task: ExportTask) -> Submission {
        self.counters.caller_runs.fetch_add(1, Ordering::Relaxed);
        run_task(task, &self.counters).await;
        Submission::CallerRan
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            queued: self.counters.queued.load(Ordering::Relaxed),
            overflow: self.counters.overflow.load(Ordering::Relaxed),
            caller_runs: self.counters.caller_runs.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting work and wait up to `grace` for queued and running tasks.
    ///
    /// Returns `false` if the grace period ran out first.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        // dropping the sender lets the workers drain the queue and exit
        drop(self.sender.lock().take());
        self.tracker.close();

        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => {
                tracing::info!(stats = ?self.stats(), "Export dispatcher drained");
                true
            }
            Err(_) => {
                tracing::warn!(
                    grace_secs = grace.as_secs(),
                    running = self.tracker.len(),
                    "Export dispatcher grace period elapsed with tasks still running"
                );
                false
            }
        }
    }
}

async fn run_task(task: ExportTask, counters: &Counters) {
    match task.await {
        Ok(()) => {
            counters.completed.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = %e, kind = e.kind(), "Async export failed");
        }
    }
}
