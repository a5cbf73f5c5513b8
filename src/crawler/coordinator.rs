//! Crawler coordinator - builds and runs a complete mirror
//!
//! This module wires the run together:
//! - Validating configuration
//! - Building the rate limiter, HTTP client and storage backend
//! - Lowering the request rate to honour the seed host's Crawl-delay
//! - Running the scheduler and shutting the limiter down afterwards

use crate::config::{validate, Config};
use crate::crawler::{HttpClient, RateLimiter, Scheduler, WebDownloader};
use crate::storage::FsStorage;
use crate::url::{MirrorPaths, UrlResolver};
use crate::MirrorError;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Owns every component of one mirror run
pub struct Coordinator {
    config: Config,
    limiter: Arc<RateLimiter>,
    http: Arc<HttpClient>,
    scheduler: Scheduler,
}

impl Coordinator {
    /// Creates a coordinator instance
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `config` - The merged configuration; validated here
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(MirrorError)` - Invalid configuration or HTTP client setup failed
    pub fn new(config: Config) -> Result<Self, MirrorError> {
        validate(&config)?;

        let limiter = Arc::new(RateLimiter::new(config.crawler.rate_limit));
        let http = Arc::new(HttpClient::new(&config.http, Arc::clone(&limiter))?);

        let paths = MirrorPaths::new(&config.output.output_dir);
        let storage = Arc::new(FsStorage::new(&config.output.output_dir));
        let downloader = WebDownloader::new(Arc::clone(&http), storage, paths);

        let scheduler = Scheduler::new(
            config.crawler.clone(),
            Arc::new(downloader),
            Arc::new(UrlResolver),
        );

        Ok(Self {
            config,
            limiter,
            http,
            scheduler,
        })
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Runs the mirror to completion
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The run finished or was stopped
    /// * `Err(MirrorError::Cancelled)` - `cancel` fired
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), MirrorError> {
        tracing::info!("Output directory: {}", self.config.output.output_dir.display());
        tracing::info!("Respect robots.txt: {}", self.config.http.respect_robots);

        let result = async {
            self.apply_crawl_delay(&cancel).await?;
            self.scheduler.start(cancel.clone()).await
        }
        .await;

        self.limiter.stop();
        result
    }

    /// Lowers the rate when the seed host's robots.txt asks for a
    /// Crawl-delay longer than the configured rate allows
    async fn apply_crawl_delay(&self, cancel: &CancellationToken) -> Result<(), MirrorError> {
        let Some(robots) = self.http.robots() else {
            return Ok(());
        };
        let Ok(seed) = Url::parse(&self.config.crawler.url) else {
            return Ok(());
        };

        let rules = robots.robots_for(cancel, &seed).await?;
        let Some(delay) = rules.crawl_delay(robots.user_agent()) else {
            return Ok(());
        };

        let allowed = rate_for_delay(delay);
        if allowed < self.limiter.rate() {
            tracing::info!(
                "robots.txt requests a {:.1}s crawl delay, lowering rate limit to {}/s",
                delay.as_secs_f64(),
                allowed
            );
            self.limiter.set_rate(allowed);
        }

        Ok(())
    }
}

/// Highest whole requests-per-second rate that respects `delay` (at least 1)
fn rate_for_delay(delay: Duration) -> u32 {
    let secs = delay.as_secs_f64();
    if secs <= 0.0 {
        return u32::MAX;
    }
    ((1.0 / secs).floor() as u32).max(1)
}

/// Runs a complete mirror operation
///
/// This is the main entry point for mirroring a site.
///
/// # Example
///
/// ```no_run
/// use sumi_mirror::config::load_config;
/// use sumi_mirror::crawler::run_mirror;
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("mirror.toml"))?;
/// run_mirror(config, CancellationToken::new()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_mirror(config: Config, cancel: CancellationToken) -> Result<(), MirrorError> {
    let coordinator = Coordinator::new(config)?;
    coordinator.run(cancel).await
}
