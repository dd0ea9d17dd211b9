//! Crawler module for page fetching and traversal
//!
//! This module contains the core crawling logic, including:
//! - The fetch strategy contract and its static (HTTP) and rendered (browser) implementations
//! - Exponential-backoff retries around each fetch
//! - HTML extraction of SEO fields, text, language, and links
//! - The FIFO frontier and the coordinator that drives a bounded worker pool

mod coordinator;
mod fetcher;
mod language;
mod parser;
mod renderer;
mod retry;
mod scheduler;
mod strategy;

pub use coordinator::{Coordinator, ProgressSink};
pub(crate) use coordinator::panic_message;
pub use fetcher::{build_http_client, StaticFetcher};
pub use language::{detect_language, resolve_language, UNKNOWN_LANGUAGE};
pub use parser::{extract_page, parse_html, ParsedPage};
pub use renderer::RenderedFetcher;
pub use retry::{RetryFailure, RetryPolicy};
pub use scheduler::{Frontier, QueuedUrl};
pub use strategy::{FetchError, FetchStrategy, FetchedDocument, Fetcher};
