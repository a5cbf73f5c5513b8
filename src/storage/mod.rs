//! Storage module for writing the mirror to disk
//!
//! This module handles:
//! - The async [`Storage`] trait and its filesystem backend
//! - Rewriting links in saved HTML and CSS to local relative paths

mod fs;
mod link_rewriter;
mod traits;

pub use fs::FsStorage;
pub use link_rewriter::LinkRewriter;
pub use traits::{Storage, StorageError, StorageResult};
