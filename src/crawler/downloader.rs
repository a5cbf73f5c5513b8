//! Web downloader: fetches one resource, extracts its links, saves it
//!
//! HTML and CSS are scanned for links and have same-host links rewritten to
//! local relative paths before saving. Everything else is saved as-is.

use crate::crawler::parser::{extract_css_links, extract_html_links};
use crate::crawler::{DownloadResult, DownloadTask, Downloader, HttpClient, ResourceType};
use crate::storage::{LinkRewriter, Storage};
use crate::url::MirrorPaths;
use crate::MirrorError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// [`Downloader`] backed by HTTP and a [`Storage`] backend
pub struct WebDownloader {
    http: Arc<HttpClient>,
    storage: Arc<dyn Storage>,
    paths: MirrorPaths,
    rewriter: LinkRewriter,
}

impl WebDownloader {
    pub fn new(http: Arc<HttpClient>, storage: Arc<dyn Storage>, paths: MirrorPaths) -> Self {
        Self {
            http,
            storage,
            rewriter: LinkRewriter::new(paths.clone()),
            paths,
        }
    }

    /// Guesses the resource type with a HEAD request
    ///
    /// Falls back to the task's URL-based guess when HEAD fails or the
    /// Content-Type says nothing useful.
    async fn probe_type(
        &self,
        cancel: &CancellationToken,
        task: &DownloadTask,
    ) -> Result<ResourceType, MirrorError> {
        match self.http.head(cancel, &task.url).await {
            Ok(content_type) => Ok(task.resource_type.refine(&content_type)),
            Err(e) if e.is_cancelled() || matches!(e, MirrorError::RobotsDenied { .. }) => Err(e),
            Err(e) => {
                tracing::debug!("HEAD {} failed ({}), guessing type from URL", task.url, e);
                Ok(task.resource_type)
            }
        }
    }

    async fn save(&self, url: &str, content: &[u8]) -> Result<std::path::PathBuf, MirrorError> {
        let path = self.paths.url_to_local_path(url)?;
        tracing::debug!("Saving {} to {}", url, path.display());
        self.storage.save(&path, content).await?;
        Ok(path)
    }
}

#[async_trait]
impl Downloader for WebDownloader {
    async fn download(
        &self,
        cancel: &CancellationToken,
        task: &DownloadTask,
    ) -> Result<DownloadResult, MirrorError> {
        let guessed = self.probe_type(cancel, task).await?;
        let fetched = self.http.get(cancel, &task.url).await?;
        let resource_type = guessed.refine(&fetched.content_type);

        let (content, links) = match resource_type {
            ResourceType::Html => {
                let html = String::from_utf8_lossy(&fetched.content);
                let links = extract_html_links(&html);
                let rewritten = self.rewriter.rewrite_html(&html, &task.url);
                (rewritten.into_bytes(), links)
            }
            ResourceType::Css => {
                let css = String::from_utf8_lossy(&fetched.content);
                let links = extract_css_links(&css);
                let rewritten = self.rewriter.rewrite_css(&css, &task.url);
                (rewritten.into_bytes(), links)
            }
            _ => (fetched.content, Vec::new()),
        };

        if !links.is_empty() {
            tracing::debug!("Found {} links in {} ({})", links.len(), task.url, resource_type);
        }

        let file_path = self.save(&task.url, &content).await?;

        Ok(DownloadResult {
            task: task.clone(),
            content,
            links,
            file_path: Some(file_path),
            error: None,
        })
    }
}
