//! Sumi-Mirror: a polite recursive site mirror
//!
//! This crate implements a crawler that mirrors a website to the local
//! filesystem, following same-domain links up to a configured depth while
//! respecting robots.txt and a global request-rate ceiling.

pub mod config;
pub mod crawler;
pub mod output;
pub mod robots;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Mirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Too many redirects from {url}")]
    RedirectLimit { url: String },

    #[error("URL disallowed by robots.txt: {url}")]
    RobotsDenied { url: String },

    #[error("Rate limiter: {0}")]
    RateLimit(#[from] RateLimitError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Worker pool error: {0}")]
    Pool(#[from] crawler::PoolError),

    #[error("Download of {url} panicked: {message}")]
    TaskPanicked { url: String, message: String },

    #[error("All workers exited with {pending} tasks pending")]
    WorkersExited { pending: u64 },

    #[error("Crawl cancelled")]
    Cancelled,
}

impl MirrorError {
    /// Returns true if this error means the run (or request) was cancelled
    /// rather than failing on its own
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::RateLimit(_))
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Errors surfaced by [`crawler::RateLimiter::wait`]
///
/// Both variants are cancellation-kind: callers abort the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RateLimitError {
    #[error("wait cancelled")]
    Cancelled,

    #[error("rate limiter stopped")]
    Stopped,
}

// Re-export commonly used types
pub use config::Config;
pub use crawler::{DownloadResult, DownloadTask, Downloader, ResourceType, Scheduler};
pub use url::{normalize_url, PathResolver};
