//! Configuration module for the crawl engine
//!
//! This module handles loading, parsing, and validating TOML job configuration files.
//!
//! # Example
//!
//! ```no_run
//! use seo_crawl_engine::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl.toml")).unwrap();
//! println!("Crawl will stop at depth {}", config.crawl.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CrawlConfig, CrawlMode, CrawlSettings, RenderedOptions, RetrySettings, ScreenshotType,
    Viewport, WaitUntil,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{validate, KNOWN_RESOURCE_TYPES};
