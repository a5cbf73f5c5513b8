//! Configuration module for Sumi-Mirror
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then command-line overrides. The merged result is validated before the
//! crawl starts.
//!
//! # Example
//!
//! ```no_run
//! use sumi_mirror::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("mirror.toml")).unwrap();
//! println!("Mirroring {} to depth {}", config.crawler.url, config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, HttpConfig, OutputConfig};

// Re-export parser functions
pub use parser::{load_config, parse_config};
pub use validation::validate;
