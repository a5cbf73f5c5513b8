//! Link extraction from downloaded HTML and CSS
//!
//! Links are returned raw (unresolved) in document order with duplicates
//! removed. Resolution against the page URL and scope filtering happen in
//! the scheduler.

use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;

/// Element selectors and the attribute holding the link
const LINK_SOURCES: &[(&str, &str)] = &[
    ("a[href]", "href"),
    ("link[href]", "href"),
    ("img[src]", "src"),
    ("script[src]", "src"),
    ("iframe[src]", "src"),
    ("embed[src]", "src"),
    ("meta[property='og:image'][content]", "content"),
    ("meta[name='twitter:image'][content]", "content"),
    ("object[data]", "data"),
];

/// Schemes that never point at a downloadable resource
const SKIPPED_PREFIXES: &[&str] = &["#", "javascript:", "mailto:", "tel:", "data:"];

/// Extracts links from an HTML document
///
/// # Link Sources
///
/// - `<a href>` and `<link href>`
/// - `<img src>`, `<script src>`, `<iframe src>`, `<embed src>`
/// - `og:image` and `twitter:image` meta tags
/// - `<object data>`
///
/// Empty links, in-page anchors, and `javascript:`, `mailto:`, `tel:` and
/// `data:` URIs are skipped.
///
/// # Example
///
/// ```
/// use sumi_mirror::crawler::extract_html_links;
///
/// let html = r##"<a href="/about">About</a><img src="logo.png"><a href="#top">Top</a>"##;
/// assert_eq!(extract_html_links(html), vec!["/about", "logo.png"]);
/// ```
pub fn extract_html_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links = LinkSet::default();

    for (selector, attr) in LINK_SOURCES {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };

        for element in document.select(&selector) {
            if let Some(value) = element.value().attr(attr) {
                links.push(value);
            }
        }
    }

    links.into_vec()
}

/// Extracts `url(...)` references and `@import` targets from a stylesheet
///
/// # Example
///
/// ```
/// use sumi_mirror::crawler::extract_css_links;
///
/// let css = r#"@import "reset.css"; body { background: url('img/bg.png'); }"#;
/// assert_eq!(extract_css_links(css), vec!["img/bg.png", "reset.css"]);
/// ```
pub fn extract_css_links(css: &str) -> Vec<String> {
    let mut links = LinkSet::default();

    for caps in CSS_URL.captures_iter(css) {
        if let Some(m) = caps.get(1) {
            links.push(m.as_str());
        }
    }

    for caps in CSS_IMPORT.captures_iter(css) {
        if let Some(m) = caps.get(1) {
            links.push(m.as_str());
        }
    }

    links.into_vec()
}

/// Matches `url(x)`, `url('x')` and `url("x")`
static CSS_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"url\(\s*['"]?([^'"\)\s]+)['"]?\s*\)"#).unwrap());

/// Matches `@import "x"` and `@import 'x'`
static CSS_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"@import\s+['"]([^'"]+)['"]"#).unwrap());

/// Returns true if a raw link can never be downloaded
fn is_skipped(link: &str) -> bool {
    let lower = link.to_ascii_lowercase();
    SKIPPED_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// Order-preserving set of accepted links
#[derive(Default)]
struct LinkSet {
    seen: HashSet<String>,
    links: Vec<String>,
}

impl LinkSet {
    fn push(&mut self, raw: &str) {
        let link = raw.trim();
        if link.is_empty() || is_skipped(link) {
            return;
        }
        if self.seen.insert(link.to_string()) {
            self.links.push(link.to_string());
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.links
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_all_html_sources() {
        let html = r#"
            <html>
            <head>
                <link rel="stylesheet" href="/style.css">
                <meta property="og:image" content="/og.png">
                <meta name="twitter:image" content="/tw.png">
                <script src="/app.js"></script>
            </head>
            <body>
                <a href="/page">Page</a>
                <img src="images/logo.png">
                <iframe src="/frame.html"></iframe>
                <embed src="/movie.swf">
                <object data="/doc.pdf"></object>
            </body>
            </html>
        "#;

        let links = extract_html_links(html);
        for expected in [
            "/style.css",
            "/og.png",
            "/tw.png",
            "/app.js",
            "/page",
            "images/logo.png",
            "/frame.html",
            "/movie.swf",
            "/doc.pdf",
        ] {
            assert!(links.contains(&expected.to_string()), "missing {}", expected);
        }
        assert_eq!(links.len(), 9);
    }

    #[test]
    fn test_skips_special_links() {
        let html = r##"
            <a href="">Empty</a>
            <a href="#section">Anchor</a>
            <a href="javascript:void(0)">JS</a>
            <a href="mailto:test@example.com">Email</a>
            <a href="tel:+1234567890">Phone</a>
            <img src="data:image/png;base64,AAAA">
            <a href="/real">Real</a>
        "##;

        assert_eq!(extract_html_links(html), vec!["/real"]);
    }

    #[test]
    fn test_deduplicates_preserving_order() {
        let html = r#"<a href="/b">B</a><a href="/a">A</a><a href=" /b ">B again</a>"#;
        assert_eq!(extract_html_links(html), vec!["/b", "/a"]);
    }

    #[test]
    fn test_keeps_fragment_links_with_path() {
        let html = r#"<a href="/a#frag">A</a>"#;
        assert_eq!(extract_html_links(html), vec!["/a#frag"]);
    }

    #[test]
    fn test_css_url_variants() {
        let css = r#"
            .a { background: url(plain.png); }
            .b { background: url('single.png'); }
            .c { background: url( "double.png" ); }
            .d { background: url(data:image/png;base64,AAAA); }
        "#;

        assert_eq!(
            extract_css_links(css),
            vec!["plain.png", "single.png", "double.png"]
        );
    }

    #[test]
    fn test_css_imports() {
        let css = r#"@import "base.css"; @import 'theme.css';"#;
        assert_eq!(extract_css_links(css), vec!["base.css", "theme.css"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(extract_html_links("").is_empty());
        assert!(extract_css_links("").is_empty());
    }
}
