//! Sumi-Mirror main entry point
//!
//! This is the command-line interface for the Sumi-Mirror site mirror.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use sumi_mirror::config::{parse_config, validate, Config};
use sumi_mirror::crawler::Coordinator;
use sumi_mirror::output::print_summary;
use sumi_mirror::MirrorError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Sumi-Mirror: A polite recursive site mirror
///
/// Sumi-Mirror downloads a website into a local directory, following
/// same-domain links up to a maximum depth. Links in saved pages and
/// stylesheets are rewritten so the mirror can be browsed offline.
#[derive(Parser, Debug)]
#[command(name = "sumi-mirror")]
#[command(version)]
#[command(about = "A polite recursive site mirror", long_about = None)]
struct Cli {
    /// URL to mirror (overrides the config file)
    #[arg(value_name = "URL")]
    url: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Maximum link depth from the seed URL (0 = seed only)
    #[arg(short = 'd', long = "depth")]
    depth: Option<u32>,

    /// Number of parallel download workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Maximum requests per second
    #[arg(short, long)]
    rate_limit: Option<u32>,

    /// User-Agent header sent with every request
    #[arg(long)]
    user_agent: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Ignore robots.txt
    #[arg(long)]
    no_robots: bool,

    /// Progress log interval in milliseconds
    #[arg(long)]
    progress_interval: Option<u64>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    /// Applies command-line overrides on top of `config`
    fn apply(self, mut config: Config) -> Config {
        if let Some(url) = self.url {
            config.crawler.url = url;
        }
        if let Some(output) = self.output {
            config.output.output_dir = output;
        }
        if let Some(depth) = self.depth {
            config.crawler.max_depth = depth;
        }
        if let Some(workers) = self.workers {
            config.crawler.workers = workers;
        }
        if let Some(rate) = self.rate_limit {
            config.crawler.rate_limit = rate;
        }
        if let Some(user_agent) = self.user_agent {
            config.http.user_agent = user_agent;
        }
        if let Some(timeout) = self.timeout {
            config.http.timeout = timeout;
        }
        if self.no_robots {
            config.http.respect_robots = false;
        }
        if let Some(interval) = self.progress_interval {
            config.crawler.progress_interval = interval;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);
    let quiet = cli.quiet;

    let config = load(cli)?;

    tracing::info!("URL: {}", config.crawler.url);
    tracing::info!(
        "Max depth: {}, Workers: {}, Rate limit: {}/sec",
        config.crawler.max_depth,
        config.crawler.workers,
        config.crawler.rate_limit
    );

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let coordinator = Coordinator::new(config).context("Failed to set up mirror")?;
    let result = coordinator.run(cancel).await;

    if !quiet {
        if let Some(summary) = coordinator.scheduler().summary() {
            print_summary(&summary);
        }
    }

    match result {
        Ok(()) => {
            tracing::info!("Mirror completed successfully");
            Ok(())
        }
        Err(MirrorError::Cancelled) => {
            tracing::warn!("Mirror interrupted");
            Err(MirrorError::Cancelled.into())
        }
        Err(e) => {
            tracing::error!("Mirror failed: {}", e);
            Err(e.into())
        }
    }
}

/// Builds the merged configuration: defaults, then file, then flags
fn load(cli: Cli) -> anyhow::Result<Config> {
    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            parse_config(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?
        }
        None => Config::default(),
    };

    let config = cli.apply(config);
    validate(&config).context("Invalid configuration")?;
    Ok(config)
}

/// Cancels the run on the first Ctrl-C
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal, stopping gracefully...");
            cancel.cancel();
        }
    });
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_mirror=info,warn"),
            1 => EnvFilter::new("sumi_mirror=debug,info"),
            2 => EnvFilter::new("sumi_mirror=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "sumi-mirror",
            "https://example.com/",
            "-d",
            "3",
            "-w",
            "8",
            "--rate-limit",
            "2",
            "--no-robots",
            "-o",
            "/tmp/site",
        ]);

        let config = cli.apply(Config::default());
        assert_eq!(config.crawler.url, "https://example.com/");
        assert_eq!(config.crawler.max_depth, 3);
        assert_eq!(config.crawler.workers, 8);
        assert_eq!(config.crawler.rate_limit, 2);
        assert!(!config.http.respect_robots);
        assert_eq!(config.output.output_dir, PathBuf::from("/tmp/site"));
    }

    #[test]
    fn test_no_flags_keeps_config() {
        let cli = Cli::parse_from(["sumi-mirror"]);
        let mut base = Config::default();
        base.crawler.url = "http://example.com/".to_string();
        base.crawler.workers = 3;

        let config = cli.apply(base);
        assert_eq!(config.crawler.url, "http://example.com/");
        assert_eq!(config.crawler.workers, 3);
        assert!(config.http.respect_robots);
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
