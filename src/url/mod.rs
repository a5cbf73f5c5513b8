//! URL handling module for Sumi-Mirror
//!
//! This module provides URL normalization (the dedup key generator),
//! link resolution, same-domain checks and URL → local path mapping.

mod domain;
mod normalize;
mod paths;

pub use domain::{extract_domain, is_same_domain};
pub use normalize::normalize_url;
pub use paths::MirrorPaths;

use crate::UrlError;
use url::Url;

/// Resolves discovered links and decides crawl scope
///
/// The scheduler depends only on this trait, never on a concrete
/// filesystem or transport type.
pub trait PathResolver: Send + Sync {
    /// Resolves `relative` against `base`, returning an absolute URL
    fn resolve_absolute_url(&self, base: &str, relative: &str) -> Result<String, UrlError>;

    /// Returns true if both URLs point at the same host (and port)
    fn is_same_domain(&self, a: &str, b: &str) -> bool;
}

/// Stateless [`PathResolver`] backed by the `url` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlResolver;

impl PathResolver for UrlResolver {
    fn resolve_absolute_url(&self, base: &str, relative: &str) -> Result<String, UrlError> {
        resolve_absolute_url(base, relative)
    }

    fn is_same_domain(&self, a: &str, b: &str) -> bool {
        is_same_domain(a, b)
    }
}

/// Resolves a (possibly relative) link against a base URL
///
/// # Examples
///
/// ```
/// use sumi_mirror::url::resolve_absolute_url;
///
/// let url = resolve_absolute_url("https://example.com/docs/", "../about").unwrap();
/// assert_eq!(url, "https://example.com/about");
/// ```
pub fn resolve_absolute_url(base: &str, relative: &str) -> Result<String, UrlError> {
    let base = Url::parse(base).map_err(|e| UrlError::Parse(e.to_string()))?;
    let joined = base
        .join(relative.trim())
        .map_err(|e| UrlError::Parse(e.to_string()))?;

    if joined.scheme() != "http" && joined.scheme() != "https" {
        return Err(UrlError::InvalidScheme(joined.scheme().to_string()));
    }

    Ok(joined.to_string())
}
