//! Storage traits and error types
//!
//! This module defines the trait interface for mirror storage backends and
//! associated error types.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Path escapes the output directory: {0}")]
    OutsideRoot(PathBuf),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for mirror storage backends
///
/// Implementations must be safe to share between workers.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Writes `content` to `path`, creating parent directories as needed
    ///
    /// An existing file is replaced.
    async fn save(&self, path: &Path, content: &[u8]) -> StorageResult<()>;

    /// Returns true if something already exists at `path`
    async fn exists(&self, path: &Path) -> bool;
}
