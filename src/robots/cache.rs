//! Cached robots.txt entries

use crate::robots::ParsedRobots;
use chrono::{DateTime, Duration, Utc};

/// How long a fetched robots.txt stays valid
pub const ROBOTS_TTL_HOURS: i64 = 24;

/// Parsed robots.txt plus the time it was fetched
#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub content: ParsedRobots,
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    /// Caches `content` as fetched now
    pub fn new(content: ParsedRobots) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
        }
    }

    /// True once the entry is older than [`ROBOTS_TTL_HOURS`]
    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Utc::now())
    }

    fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        now - self.fetched_at > Duration::hours(ROBOTS_TTL_HOURS)
    }
}
