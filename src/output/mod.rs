//! Output module for run progress and summaries
//!
//! Progress lines and the final summary are emitted through `tracing`;
//! the binary additionally prints the summary to stdout.

pub mod stats;

pub use stats::{
    format_progress, log_summary, print_summary, CrawlSummary, RunOutcome, SchedulerStats,
};
