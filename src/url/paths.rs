use crate::UrlError;
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Maps URLs onto the local mirror directory layout
///
/// Layout: `<output>/<host>[_<port>]/<path>`, where a directory-style path
/// (`/docs/`) becomes `docs/index.html` and an extension-less last segment
/// (`/about`) becomes `about.html`. Query strings do not affect the path.
#[derive(Debug, Clone)]
pub struct MirrorPaths {
    base_dir: PathBuf,
}

impl MirrorPaths {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the file a URL is saved to
    ///
    /// # Examples
    ///
    /// ```
    /// use sumi_mirror::url::MirrorPaths;
    /// use std::path::Path;
    ///
    /// let paths = MirrorPaths::new("/tmp/out");
    /// let local = paths.url_to_local_path("https://example.com/docs/").unwrap();
    /// assert_eq!(local, Path::new("/tmp/out/example.com/docs/index.html"));
    /// ```
    pub fn url_to_local_path(&self, raw_url: &str) -> Result<PathBuf, UrlError> {
        let url = Url::parse(raw_url).map_err(|e| UrlError::Parse(e.to_string()))?;
        let host = url.host_str().ok_or(UrlError::MissingDomain)?.to_lowercase();

        let host_dir = match url.port() {
            Some(port) => format!("{}_{}", host, port),
            None => host,
        };

        let mut local = self.base_dir.join(host_dir);
        local.push(site_relative_path(url.path()));
        Ok(local)
    }

    /// Returns the path of `target` relative to the directory holding `from`,
    /// using forward slashes so it can be written into HTML or CSS
    ///
    /// # Examples
    ///
    /// ```
    /// use sumi_mirror::url::MirrorPaths;
    ///
    /// let paths = MirrorPaths::new("out");
    /// let rel = paths
    ///     .relative_link("https://example.com/blog/post", "https://example.com/img/a.png")
    ///     .unwrap();
    /// assert_eq!(rel, "../img/a.png");
    /// ```
    pub fn relative_link(&self, from: &str, target: &str) -> Result<String, UrlError> {
        let from_path = self.url_to_local_path(from)?;
        let target_path = self.url_to_local_path(target)?;
        let from_dir = from_path.parent().unwrap_or(&self.base_dir);

        let relative = relative_path(from_dir, &target_path);
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Ok(parts.join("/"))
    }
}

/// Converts a URL path into a relative file path inside the host directory
fn site_relative_path(url_path: &str) -> PathBuf {
    let segments: Vec<&str> = url_path
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect();

    let mut path = PathBuf::new();
    let Some((last, dirs)) = segments.split_last() else {
        path.push("index.html");
        return path;
    };

    for dir in dirs {
        path.push(dir);
    }

    if url_path.ends_with('/') {
        path.push(last);
        path.push("index.html");
    } else if last.contains('.') {
        path.push(last);
    } else {
        path.push(format!("{}.html", last));
    }

    path
}

/// Computes `to` relative to the directory `from_dir`
fn relative_path(from_dir: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component> = from_dir.components().collect();
    let to_components: Vec<Component> = to.components().collect();

    let common = from
        .iter()
        .zip(to_components.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = PathBuf::new();
    for _ in common..from.len() {
        result.push("..");
    }
    for component in &to_components[common..] {
        result.push(component.as_os_str());
    }
    result
}
