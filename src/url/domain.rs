use url::Url;

/// Extracts the domain from a URL
///
/// Returns the lowercase host, or None if the URL has no host.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_mirror::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true if both URLs share the same host and port
///
/// Unparseable input is never the same domain.
///
/// # Examples
///
/// ```
/// use sumi_mirror::url::is_same_domain;
///
/// assert!(is_same_domain("http://example.com/", "http://EXAMPLE.com/a"));
/// assert!(!is_same_domain("http://example.com/", "http://other.com/x"));
/// ```
pub fn is_same_domain(a: &str, b: &str) -> bool {
    let (Ok(a), Ok(b)) = (Url::parse(a), Url::parse(b)) else {
        return false;
    };

    match (extract_domain(&a), extract_domain(&b)) {
        (Some(host_a), Some(host_b)) => {
            host_a == host_b && a.port_or_known_default() == b.port_or_known_default()
        }
        _ => false,
    }
}
