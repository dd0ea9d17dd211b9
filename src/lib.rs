//! SEO crawl engine: a bounded, polite site crawler
//!
//! This crate discovers, fetches (optionally rendering JavaScript in a headless
//! browser), and extracts SEO-relevant structure from the pages of a single site,
//! producing normalized page records and the internal link edges between them.

pub mod config;
pub mod crawler;
pub mod job;
pub mod output;
pub mod robots;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for run-start and configuration failures
///
/// Per-page failures never surface here; they become [`output::CrawlError`]
/// entries in the crawl result.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Failed to launch browser: {0}")]
    BrowserLaunch(String),

    #[error("Browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: state::JobStatus,
        to: state::JobStatus,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

// Re-export commonly used types
pub use config::{CrawlConfig, CrawlMode};
pub use job::{CrawlJob, CrawlOutcome, JobHandle};
pub use output::{CrawlError, CrawlResult, LinkEdge, PageRecord};
pub use state::{CancelFlag, JobStatus, JobStatusSnapshot};
pub use crate::url::{fingerprint, normalize, normalize_url};
