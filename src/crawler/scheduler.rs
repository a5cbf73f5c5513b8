//! Scheduler: owns a mirror run from seed to final summary
//!
//! This module handles:
//! - Seeding the run and tracking the crawl counters
//! - Feeding discovered links back into the worker pool
//! - Depth, domain and duplicate filtering of discovered links
//! - Detecting natural completion, explicit stop and cancellation
//!
//! Results are consumed by a single loop. Tasks it discovers go onto an
//! in-memory frontier first and are moved into the pool's bounded queue
//! whenever a slot is free, so the loop never blocks on a full queue while
//! workers are blocked on a full result stream.

use crate::config::CrawlerConfig;
use crate::crawler::{DownloadResult, DownloadTask, Downloader, VisitedSet, WorkerPool};
use crate::output::{format_progress, log_summary, CrawlSummary, RunOutcome, SchedulerStats};
use crate::url::{normalize_url, PathResolver};
use crate::MirrorError;
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Monotonic task counters
///
/// `pending` is never stored; it is derived from the other three. Children
/// are counted before their parent's outcome is recorded, and snapshots
/// read `failed`, then `completed`, then `total`, so a snapshot never shows
/// more finished tasks than scheduled ones.
#[derive(Debug, Default)]
struct CrawlCounters {
    total: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl CrawlCounters {
    fn record_scheduled(&self) {
        self.total.fetch_add(1, Ordering::SeqCst);
    }

    fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self, active_workers: usize) -> SchedulerStats {
        let failed = self.failed.load(Ordering::SeqCst);
        let completed = self.completed.load(Ordering::SeqCst);
        let total = self.total.load(Ordering::SeqCst);

        SchedulerStats {
            total,
            completed,
            failed,
            active_workers,
        }
    }
}

/// Orchestrates one mirror run
///
/// A scheduler is single-use: call [`Scheduler::start`] once.
pub struct Scheduler {
    config: CrawlerConfig,
    downloader: Arc<dyn Downloader>,
    resolver: Arc<dyn PathResolver>,
    visited: VisitedSet,
    counters: CrawlCounters,
    frontier: Mutex<VecDeque<DownloadTask>>,
    frontier_ready: Notify,
    active_workers: Arc<AtomicUsize>,
    stop: CancellationToken,
    summary: Mutex<Option<CrawlSummary>>,
}

impl Scheduler {
    /// Creates a scheduler for the seed URL and limits in `config`
    pub fn new(
        config: CrawlerConfig,
        downloader: Arc<dyn Downloader>,
        resolver: Arc<dyn PathResolver>,
    ) -> Self {
        Self {
            config,
            downloader,
            resolver,
            visited: VisitedSet::new(),
            counters: CrawlCounters::default(),
            frontier: Mutex::new(VecDeque::new()),
            frontier_ready: Notify::new(),
            active_workers: Arc::new(AtomicUsize::new(0)),
            stop: CancellationToken::new(),
            summary: Mutex::new(None),
        }
    }

    /// Runs the mirror until it completes, is stopped or is cancelled
    ///
    /// # Arguments
    ///
    /// * `cancel` - Cancels the whole run, including in-flight downloads
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Every scheduled task finished, or [`Scheduler::stop`] was called
    /// * `Err(MirrorError::Cancelled)` - `cancel` fired first
    pub async fn start(&self, cancel: CancellationToken) -> Result<(), MirrorError> {
        let started_at = Utc::now();
        let clock = Instant::now();

        tracing::info!(
            "Starting mirror of {} (max depth: {}, workers: {}, rate limit: {}/s)",
            self.config.url,
            self.config.max_depth,
            self.config.workers,
            self.config.rate_limit
        );

        let seed = DownloadTask::seed(self.config.url.clone());
        self.visited.add(&visit_key(&seed.url));
        self.schedule(seed);

        let pool_cancel = cancel.child_token();
        let pool = self.build_pool(pool_cancel.clone());
        let mut results = pool.start(pool_cancel.clone());

        let period = self.config.progress_interval();
        let mut progress = tokio::time::interval_at(Instant::now() + period, period);
        progress.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let outcome = loop {
            self.flush_frontier(&pool);

            if self.stats().is_finished() {
                break RunOutcome::Finished;
            }

            let has_backlog = !self.frontier_is_empty();

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Mirror interrupted, shutting down");
                    break RunOutcome::Cancelled;
                }
                _ = self.stop.cancelled() => {
                    tracing::info!("Mirror stopped");
                    break RunOutcome::Stopped;
                }
                _ = progress.tick() => {
                    tracing::info!("{}", format_progress(&self.stats()));
                }
                result = results.recv() => match result {
                    Some(result) => self.handle_result(result),
                    None => {
                        tracing::error!(
                            "All workers exited with {} tasks pending",
                            self.stats().pending()
                        );
                        break RunOutcome::Aborted;
                    }
                },
                permit = pool.reserve(), if has_backlog => {
                    if let Ok(permit) = permit {
                        if let Some(task) = self.pop_frontier() {
                            permit.send(task);
                        }
                    }
                }
                _ = self.frontier_ready.notified() => {}
            }
        };

        pool.close();
        if outcome != RunOutcome::Finished {
            pool_cancel.cancel();
        }

        let summary = CrawlSummary {
            started_at,
            elapsed: clock.elapsed(),
            outcome,
            visited_urls: self.visited.len(),
            stats: self.stats(),
        };
        log_summary(&summary);
        *self.summary.lock().unwrap_or_else(|e| e.into_inner()) = Some(summary);

        match outcome {
            RunOutcome::Cancelled => Err(MirrorError::Cancelled),
            RunOutcome::Aborted => Err(MirrorError::WorkersExited {
                pending: self.stats().pending(),
            }),
            RunOutcome::Finished | RunOutcome::Stopped => Ok(()),
        }
    }

    /// Adds a task to the run
    ///
    /// The task is counted immediately and handed to the worker pool as soon
    /// as its queue has room. Never blocks.
    pub fn schedule(&self, task: DownloadTask) {
        self.counters.record_scheduled();
        tracing::trace!("Scheduled {} (depth {})", task.url, task.depth);
        self.frontier
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(task);
        self.frontier_ready.notify_one();
    }

    /// Lock-free snapshot of the run counters
    pub fn stats(&self) -> SchedulerStats {
        self.counters
            .snapshot(self.active_workers.load(Ordering::SeqCst))
    }

    /// Ends the run early; [`Scheduler::start`] returns `Ok(())`
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Final summary, available once [`Scheduler::start`] has returned
    pub fn summary(&self) -> Option<CrawlSummary> {
        self.summary
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of distinct normalized URLs admitted so far
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Returns true if the normalized form of `url` has been admitted
    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(&visit_key(url))
    }

    fn build_pool(&self, cancel: CancellationToken) -> WorkerPool<DownloadTask, DownloadResult> {
        let downloader = Arc::clone(&self.downloader);
        let active = Arc::clone(&self.active_workers);

        WorkerPool::new(self.config.workers, move |task: DownloadTask| {
            let downloader = Arc::clone(&downloader);
            let active = Arc::clone(&active);
            let cancel = cancel.clone();
            async move {
                let _busy = BusyGuard::enter(&active);
                let download = AssertUnwindSafe(downloader.download(&cancel, &task))
                    .catch_unwind()
                    .await;
                match download {
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) => DownloadResult::failed(task, e),
                    Err(panic) => {
                        let error = MirrorError::TaskPanicked {
                            url: task.url.clone(),
                            message: panic_message(panic.as_ref()),
                        };
                        DownloadResult::failed(task, error)
                    }
                }
            }
        })
    }

    fn handle_result(&self, result: DownloadResult) {
        if let Some(error) = &result.error {
            tracing::warn!("Failed to download {}: {}", result.task.url, error);
            self.counters.record_failed();
            return;
        }

        match &result.file_path {
            Some(path) => tracing::info!("Downloaded {} -> {}", result.task.url, path.display()),
            None => tracing::info!("Downloaded {}", result.task.url),
        }

        if result.task.depth < self.config.max_depth {
            let scheduled = result
                .links
                .iter()
                .filter(|link| self.follow_link(&result.task, link))
                .count();
            tracing::debug!(
                "Scheduled {} of {} links from {}",
                scheduled,
                result.links.len(),
                result.task.url
            );
        }

        self.counters.record_completed();
    }

    /// Schedules a child task for `link` if it is in scope and new
    fn follow_link(&self, parent: &DownloadTask, link: &str) -> bool {
        let absolute = match self.resolver.resolve_absolute_url(&parent.url, link) {
            Ok(url) => url,
            Err(e) => {
                tracing::trace!("Skipping unresolvable link {:?} on {}: {}", link, parent.url, e);
                return false;
            }
        };

        if !self.resolver.is_same_domain(&self.config.url, &absolute) {
            tracing::trace!("Skipping cross-domain link {}", absolute);
            return false;
        }

        if !self.visited.add(&visit_key(&absolute)) {
            return false;
        }

        self.schedule(parent.child(absolute));
        true
    }

    fn flush_frontier(&self, pool: &WorkerPool<DownloadTask, DownloadResult>) {
        let mut frontier = self.frontier.lock().unwrap_or_else(|e| e.into_inner());
        while let Some(task) = frontier.pop_front() {
            if let Err((task, _)) = pool.try_submit(task) {
                frontier.push_front(task);
                break;
            }
        }
    }

    fn pop_frontier(&self) -> Option<DownloadTask> {
        self.frontier
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }

    fn frontier_is_empty(&self) -> bool {
        self.frontier
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }
}

/// Dedup key for a URL; unparseable input is keyed by its raw text
fn visit_key(url: &str) -> String {
    normalize_url(url).unwrap_or_else(|_| url.to_string())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Counts a worker as active for as long as the guard lives
struct BusyGuard<'a>(&'a AtomicUsize);

impl<'a> BusyGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
