//! robots.txt rules for one host
//!
//! Allow/Disallow matching is delegated to the robotstxt crate; Crawl-delay,
//! which that matcher ignores, is read directly from the file.

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// Rules loaded from a host's robots.txt
#[derive(Debug, Clone, Default)]
pub struct ParsedRobots {
    /// Raw robots.txt body; empty means everything is allowed
    content: String,
}

impl ParsedRobots {
    /// Wraps a robots.txt body
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    /// Rules that allow every URL
    ///
    /// Used when robots.txt is missing or could not be fetched.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Checks whether `user_agent` may fetch `url`
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL to check
    /// * `user_agent` - Full User-Agent header value; only the product token
    ///   before the first `/` is matched against `User-agent` lines
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, product_token(user_agent), url)
    }

    /// Crawl-delay declared for `user_agent`, falling back to the `*` group
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        let agent = product_token(user_agent).to_lowercase();
        let mut group: Vec<String> = Vec::new();
        let mut group_closed = false;
        let mut specific = None;
        let mut wildcard = None;

        for line in self.content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_lowercase().as_str() {
                "user-agent" => {
                    if group_closed {
                        group.clear();
                        group_closed = false;
                    }
                    group.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    group_closed = true;
                    let Some(delay) = parse_delay(value) else {
                        continue;
                    };
                    if group.iter().any(|ua| ua == "*") {
                        wildcard = Some(delay);
                    }
                    if group.iter().any(|ua| *ua == agent) {
                        specific = Some(delay);
                    }
                }
                _ => group_closed = true,
            }
        }

        specific.or(wildcard)
    }
}

fn parse_delay(value: &str) -> Option<Duration> {
    value
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

/// `sumi-mirror/1.0 (+https://...)` -> `sumi-mirror`
fn product_token(user_agent: &str) -> &str {
    user_agent
        .split(|c: char| c == '/' || c.is_whitespace())
        .next()
        .unwrap_or(user_agent)
}
