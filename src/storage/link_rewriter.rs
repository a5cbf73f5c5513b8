//! Rewrites links in saved HTML and CSS to point at the local mirror
//!
//! Only links that resolve to the page's own host are rewritten; the new
//! value is the target's file path relative to the page's file, with any
//! `#fragment` kept. Everything else is left byte-for-byte untouched.

use crate::url::{is_same_domain, resolve_absolute_url, MirrorPaths};
use regex::{Captures, Regex};
use std::sync::LazyLock;
use url::Url;

/// `href="..."`, `src='...'` (double- or single-quoted)
static ATTR_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(^|\s)(href|src)(\s*=\s*)(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// `url(...)` with optional quotes
static CSS_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"url\(\s*(['"]?)([^'"\)\s]+)['"]?\s*\)"#).unwrap());

const UNTOUCHED_PREFIXES: &[&str] = &["#", "javascript:", "mailto:", "tel:", "data:"];

/// Maps same-host links to relative local paths
#[derive(Debug, Clone)]
pub struct LinkRewriter {
    paths: MirrorPaths,
}

impl LinkRewriter {
    pub fn new(paths: MirrorPaths) -> Self {
        Self { paths }
    }

    /// Rewrites `href`/`src` attributes and inline `url()` references
    ///
    /// # Arguments
    ///
    /// * `html` - Page source
    /// * `page_url` - URL the page was downloaded from
    pub fn rewrite_html(&self, html: &str, page_url: &str) -> String {
        let rewritten = ATTR_LINK.replace_all(html, |caps: &Captures| {
            let (quote, value) = match (caps.get(4), caps.get(5)) {
                (Some(v), _) => ('"', v.as_str()),
                (None, Some(v)) => ('\'', v.as_str()),
                (None, None) => return caps[0].to_string(),
            };

            match self.local_link(value, page_url) {
                Some(local) => format!(
                    "{}{}{}{}{}{}",
                    &caps[1], &caps[2], &caps[3], quote, local, quote
                ),
                None => caps[0].to_string(),
            }
        });

        self.rewrite_css(&rewritten, page_url)
    }

    /// Rewrites `url()` references in a stylesheet
    pub fn rewrite_css(&self, css: &str, page_url: &str) -> String {
        CSS_URL
            .replace_all(css, |caps: &Captures| {
                match self.local_link(&caps[2], page_url) {
                    Some(local) => format!("url({}{}{})", &caps[1], local, &caps[1]),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Local relative path for `link`, if it points at the page's own host
    fn local_link(&self, link: &str, page_url: &str) -> Option<String> {
        let link = link.trim();
        let lower = link.to_ascii_lowercase();
        if link.is_empty() || UNTOUCHED_PREFIXES.iter().any(|p| lower.starts_with(p)) {
            return None;
        }

        let absolute = resolve_absolute_url(page_url, link).ok()?;
        if !is_same_domain(page_url, &absolute) {
            return None;
        }

        let mut local = self.paths.relative_link(page_url, &absolute).ok()?;
        let fragment = Url::parse(&absolute)
            .ok()
            .and_then(|u| u.fragment().map(str::to_string));
        if let Some(fragment) = fragment {
            local.push('#');
            local.push_str(&fragment);
        }
        Some(local)
    }
}
