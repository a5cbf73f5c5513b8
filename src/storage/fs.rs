//! Filesystem storage backend

use crate::storage::{Storage, StorageError, StorageResult};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Writes mirrored files under a root directory with `tokio::fs`
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rejects paths that could land outside the root
    fn check_path(&self, path: &Path) -> StorageResult<()> {
        let escapes = path
            .components()
            .any(|c| matches!(c, Component::ParentDir));

        if escapes || !path.starts_with(&self.root) {
            return Err(StorageError::OutsideRoot(path.to_path_buf()));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for FsStorage {
    async fn save(&self, path: &Path, content: &[u8]) -> StorageResult<()> {
        self.check_path(path)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        tokio::fs::write(path, content)
            .await
            .map_err(|source| StorageError::Write {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::debug!("Saved {} bytes to {}", content.len(), path.display());
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }
}
