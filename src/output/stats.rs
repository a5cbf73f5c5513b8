//! Crawl statistics: periodic progress lines and the final summary

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Point-in-time counter snapshot taken from the scheduler
///
/// `pending()` is derived, so `pending = total - completed - failed` holds
/// for every snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Tasks ever scheduled
    pub total: u64,

    /// Tasks that finished successfully
    pub completed: u64,

    /// Tasks that finished with an error
    pub failed: u64,

    /// Workers currently running a download
    pub active_workers: usize,
}

impl SchedulerStats {
    /// Tasks scheduled but not yet finished
    pub fn pending(&self) -> u64 {
        self.total
            .saturating_sub(self.completed)
            .saturating_sub(self.failed)
    }

    /// True once at least one task exists and every task has finished
    pub fn is_finished(&self) -> bool {
        self.total > 0 && self.pending() == 0 && self.total == self.completed + self.failed
    }

    /// Completed tasks as a percentage of all scheduled tasks
    pub fn progress_percent(&self) -> f64 {
        percent(self.completed, self.total)
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Finished,
    Stopped,
    Cancelled,
    /// Every worker exited while tasks were still pending
    Aborted,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Finished => write!(f, "finished"),
            Self::Stopped => write!(f, "stopped"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Final report for a mirror run
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub outcome: RunOutcome,

    /// Distinct normalized URLs admitted to the crawl
    pub visited_urls: usize,

    pub stats: SchedulerStats,
}

impl CrawlSummary {
    /// Successful tasks as a percentage of all scheduled tasks
    pub fn success_rate(&self) -> f64 {
        percent(self.stats.completed, self.stats.total)
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64) * 100.0
    }
}

/// Formats the periodic progress line
pub fn format_progress(stats: &SchedulerStats) -> String {
    format!(
        "Progress: {:.1}% | Completed: {} | Failed: {} | Pending: {} | Total: {} | Active workers: {}",
        stats.progress_percent(),
        stats.completed,
        stats.failed,
        stats.pending(),
        stats.total,
        stats.active_workers
    )
}

/// Logs the final summary through `tracing`
pub fn log_summary(summary: &CrawlSummary) {
    tracing::info!(
        "Mirror {} after {:.1}s",
        summary.outcome,
        summary.elapsed.as_secs_f64()
    );
    tracing::info!("  Visited URLs: {}", summary.visited_urls);
    tracing::info!("  Tasks completed: {}", summary.stats.completed);
    tracing::info!("  Tasks failed: {}", summary.stats.failed);
    tracing::info!("  Success rate: {:.1}%", summary.success_rate());
}

/// Prints the final summary to stdout
///
/// # Arguments
///
/// * `summary` - The summary to display
pub fn print_summary(summary: &CrawlSummary) {
    println!("=== Mirror Summary ===\n");

    println!("Run:");
    println!(
        "  Started: {}",
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("  Elapsed: {:.1}s", summary.elapsed.as_secs_f64());
    println!("  Outcome: {}", summary.outcome);
    println!();

    println!("Tasks:");
    println!("  Visited URLs: {}", summary.visited_urls);
    println!("  Total: {}", summary.stats.total);
    println!("  Completed: {}", summary.stats.completed);
    println!("  Failed: {}", summary.stats.failed);
    println!();

    println!(
        "Success Rate: {:.1}% ({} / {} tasks completed)",
        summary.success_rate(),
        summary.stats.completed,
        summary.stats.total
    );
}
