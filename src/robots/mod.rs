//! Robots.txt handling module
//!
//! robots.txt is fetched once per origin (`scheme://host[:port]`), through
//! the shared rate limiter, and cached for 24 hours. A robots.txt that cannot
//! be fetched, or answers with a non-200 status, allows everything.

mod cache;
mod parser;

pub use cache::{CachedRobots, ROBOTS_TTL_HOURS};
pub use parser::ParsedRobots;

use crate::crawler::RateLimiter;
use crate::MirrorError;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Per-origin robots.txt cache and URL checker
pub struct RobotsChecker {
    client: Client,
    limiter: Arc<RateLimiter>,
    user_agent: String,
    cache: RwLock<HashMap<String, CachedRobots>>,
}

impl RobotsChecker {
    /// Creates a checker that fetches with `client` and obeys `limiter`
    pub fn new(client: Client, limiter: Arc<RateLimiter>, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            limiter,
            user_agent: user_agent.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Checks whether the configured user agent may fetch `url`
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Allowed, or the URL could not be parsed
    /// * `Ok(false)` - Disallowed by the origin's robots.txt
    /// * `Err(MirrorError)` - Cancelled while fetching robots.txt
    pub async fn is_allowed(
        &self,
        cancel: &CancellationToken,
        url: &str,
    ) -> Result<bool, MirrorError> {
        let Ok(parsed) = Url::parse(url) else {
            return Ok(true);
        };

        let robots = self.robots_for(cancel, &parsed).await?;
        Ok(robots.is_allowed(url, &self.user_agent))
    }

    /// Returns the (possibly cached) robots.txt rules for `url`'s origin
    pub async fn robots_for(
        &self,
        cancel: &CancellationToken,
        url: &Url,
    ) -> Result<ParsedRobots, MirrorError> {
        let origin = url.origin().ascii_serialization();

        if let Some(cached) = self.cached(&origin) {
            return Ok(cached);
        }

        let robots = self.fetch(cancel, &origin).await?;
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(origin, CachedRobots::new(robots.clone()));

        Ok(robots)
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    fn cached(&self, origin: &str) -> Option<ParsedRobots> {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        cache
            .get(origin)
            .filter(|entry| !entry.is_stale())
            .map(|entry| entry.content.clone())
    }

    async fn fetch(
        &self,
        cancel: &CancellationToken,
        origin: &str,
    ) -> Result<ParsedRobots, MirrorError> {
        let robots_url = format!("{}/robots.txt", origin);
        self.limiter.wait(cancel).await?;

        tracing::debug!("Fetching {}", robots_url);

        let request = async {
            let response = self.client.get(&robots_url).send().await?;
            if response.status() != StatusCode::OK {
                tracing::debug!(
                    "{} returned HTTP {}, allowing all",
                    robots_url,
                    response.status()
                );
                return Ok(ParsedRobots::allow_all());
            }
            let body = response.text().await?;
            Ok::<_, reqwest::Error>(ParsedRobots::from_content(&body))
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MirrorError::Cancelled),
            result = request => Ok(result.unwrap_or_else(|e| {
                tracing::debug!("Failed to fetch {}: {}, allowing all", robots_url, e);
                ParsedRobots::allow_all()
            })),
        }
    }
}
