//! Crawler module for mirroring a site
//!
//! This module contains the core mirroring logic, including:
//! - The scheduler that owns a run and its counters
//! - A bounded worker pool and a token-bucket rate limiter
//! - HTTP fetching, link extraction and the web downloader
//! - Wiring everything together for a complete run

mod coordinator;
mod downloader;
mod fetcher;
mod parser;
mod rate_limiter;
mod scheduler;
mod task;
mod visited;
mod worker_pool;

pub use coordinator::{run_mirror, Coordinator};
pub use downloader::WebDownloader;
pub use fetcher::{build_http_client, FetchedBody, HttpClient, MAX_REDIRECTS};
pub use parser::{extract_css_links, extract_html_links};
pub use rate_limiter::RateLimiter;
pub use scheduler::Scheduler;
pub use task::{DownloadResult, DownloadTask, ResourceType};
pub use visited::VisitedSet;
pub use worker_pool::{PoolError, WorkerPool};

use crate::MirrorError;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Downloads and processes one task
///
/// Implementations must return promptly once `cancel` fires and must not
/// modify the task. A returned error is recorded as a failed task.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(
        &self,
        cancel: &CancellationToken,
        task: &DownloadTask,
    ) -> Result<DownloadResult, MirrorError>;
}
