use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Sumi-Mirror
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawl scope and concurrency configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Seed URL the mirror starts from
    pub url: String,

    /// Maximum link depth to follow from the seed (0 = seed only)
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Number of parallel download workers
    pub workers: usize,

    /// Maximum requests per second across all workers
    #[serde(rename = "rate-limit")]
    pub rate_limit: u32,

    /// Interval between progress log lines (milliseconds)
    #[serde(rename = "progress-interval")]
    pub progress_interval: u64,
}

impl CrawlerConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_depth: 1,
            workers: 5,
            rate_limit: 10,
            progress_interval: 2000,
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Request timeout (seconds)
    pub timeout: u64,

    /// Whether to honour robots.txt
    #[serde(rename = "respect-robots")]
    pub respect_robots: bool,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("sumi-mirror/{}", env!("CARGO_PKG_VERSION")),
            timeout: 30,
            respect_robots: true,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory the mirrored site is written to
    #[serde(rename = "output-dir")]
    pub output_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./download"),
        }
    }
}
