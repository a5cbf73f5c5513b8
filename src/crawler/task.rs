//! Download tasks, results and resource classification

use crate::MirrorError;
use std::fmt;
use std::path::PathBuf;

/// Kind of resource being mirrored
///
/// Only the downloader uses this, to decide whether content is scanned
/// for links and rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceType {
    Html,
    Css,
    JavaScript,
    Image,
    Font,
    #[default]
    Other,
}

impl ResourceType {
    /// Classifies a resource by its Content-Type header
    pub fn from_content_type(content_type: &str) -> Self {
        let content_type = content_type.to_lowercase();

        if content_type.contains("text/html") || content_type.contains("application/xhtml") {
            Self::Html
        } else if content_type.contains("text/css") {
            Self::Css
        } else if content_type.contains("javascript") || content_type.contains("ecmascript") {
            Self::JavaScript
        } else if content_type.starts_with("image/") {
            Self::Image
        } else if content_type.contains("font") {
            Self::Font
        } else {
            Self::Other
        }
    }

    /// Guesses a resource type from the URL's file extension
    pub fn from_url(url: &str) -> Self {
        // Ignore query and fragment when looking at the extension
        let path = url
            .split(['?', '#'])
            .next()
            .unwrap_or(url)
            .to_lowercase();

        let extension = match path.rsplit_once('/') {
            Some((_, last)) => last.rsplit_once('.').map(|(_, ext)| ext.to_string()),
            None => None,
        };

        match extension.as_deref() {
            Some("html" | "htm" | "xhtml") => Self::Html,
            Some("css") => Self::Css,
            Some("js" | "mjs") => Self::JavaScript,
            Some("png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "ico" | "bmp" | "avif") => {
                Self::Image
            }
            Some("woff" | "woff2" | "ttf" | "otf" | "eot") => Self::Font,
            _ => Self::Other,
        }
    }

    /// Prefers the Content-Type classification when it is more specific
    /// than the current guess
    pub fn refine(self, content_type: &str) -> Self {
        match Self::from_content_type(content_type) {
            Self::Other => self,
            specific => specific,
        }
    }

    /// Returns true if content of this type is scanned for links
    pub fn has_links(&self) -> bool {
        matches!(self, Self::Html | Self::Css)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Html => "HTML",
            Self::Css => "CSS",
            Self::JavaScript => "JavaScript",
            Self::Image => "Image",
            Self::Font => "Font",
            Self::Other => "Other",
        };
        f.write_str(name)
    }
}

/// A unit of download work
///
/// Tasks are never modified once created; children are built with
/// [`DownloadTask::child`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// Absolute URL to download
    pub url: String,

    /// Link distance from the seed (seed = 0)
    pub depth: u32,

    /// Best guess of the resource kind
    pub resource_type: ResourceType,

    /// URL of the page the link was found on (None for the seed)
    pub parent_url: Option<String>,
}

impl DownloadTask {
    /// Creates the depth-0 task for the seed URL
    pub fn seed(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth: 0,
            resource_type: ResourceType::Html,
            parent_url: None,
        }
    }

    /// Creates a task one level deeper, discovered on this task's page
    pub fn child(&self, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            resource_type: ResourceType::from_url(&url),
            url,
            depth: self.depth + 1,
            parent_url: Some(self.url.clone()),
        }
    }
}

/// Outcome of downloading one task
#[derive(Debug)]
pub struct DownloadResult {
    /// The task this result belongs to
    pub task: DownloadTask,

    /// Saved (possibly rewritten) content
    pub content: Vec<u8>,

    /// Raw, unresolved links found in the content
    pub links: Vec<String>,

    /// Where the content was written
    pub file_path: Option<PathBuf>,

    /// Set when the download failed
    pub error: Option<MirrorError>,
}

impl DownloadResult {
    /// An empty successful result for `task`
    pub fn new(task: DownloadTask) -> Self {
        Self {
            task,
            content: Vec::new(),
            links: Vec::new(),
            file_path: None,
            error: None,
        }
    }

    /// A failed result for `task`
    pub fn failed(task: DownloadTask, error: MirrorError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(task)
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
