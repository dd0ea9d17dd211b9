//! Fetch strategy contract
//!
//! The coordinator only talks to [`FetchStrategy`]. The static (HTTP) and
//! rendered (headless browser) implementations live in `fetcher` and `renderer`;
//! [`Fetcher::acquire`] picks one by job mode.

use crate::config::{CrawlConfig, CrawlMode};
use crate::crawler::fetcher::StaticFetcher;
use crate::crawler::renderer::RenderedFetcher;
use crate::output::ErrorClass;
use crate::EngineError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A document as returned by one fetch strategy call
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// URL after redirects
    pub final_url: Url,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub body: String,
    pub elapsed: Duration,

    /// Base64 PNG, rendered mode with screenshots enabled
    pub screenshot: Option<String>,

    /// Exceptions and console errors logged by page scripts
    pub js_errors: Vec<String>,

    /// True when `body` is a serialized DOM after script execution
    pub rendered: bool,
}

impl FetchedDocument {
    /// Returns true if the content type is HTML (or missing, which browsers treat as HTML)
    pub fn is_html(&self) -> bool {
        match &self.content_type {
            None => true,
            Some(ct) => {
                let ct = ct.to_ascii_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml")
            }
        }
    }
}

/// Failure of a single fetch attempt
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("Render failed: {0}")]
    Render(String),
}

impl FetchError {
    /// Client errors (4xx) will not change on retry; everything else might
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Http { status } if (400..500).contains(status))
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Timeout(_) => ErrorClass::FetchTimeout,
            Self::Connection(_) => ErrorClass::FetchConnection,
            Self::Http { .. } => ErrorClass::FetchHttp,
            Self::Render(_) => ErrorClass::Render,
        }
    }
}

/// One way of turning a URL into a document
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    async fn fetch(&self, url: &Url) -> Result<FetchedDocument, FetchError>;

    /// Whether in-flight fetches should be aborted (rather than drained) on cancel
    fn aborts_in_flight_on_cancel(&self) -> bool {
        false
    }

    /// Frees pooled resources; fetches after this fail
    async fn release(&self);
}

/// Factory over the available strategies, keyed by [`CrawlMode`]
pub enum Fetcher {
    Static(StaticFetcher),
    Rendered(RenderedFetcher),
}

impl Fetcher {
    /// Acquires the pooled resources for the configured mode
    ///
    /// For static mode this builds the HTTP client; for rendered mode it
    /// launches the browser and opens the shared context.
    pub async fn acquire(config: &CrawlConfig) -> Result<Self, EngineError> {
        match config.crawl.mode {
            CrawlMode::Static => Ok(Self::Static(StaticFetcher::new(&config.crawl)?)),
            CrawlMode::Rendered => Ok(Self::Rendered(
                RenderedFetcher::launch(&config.crawl, &config.rendered).await?,
            )),
        }
    }

    pub fn into_strategy(self) -> Arc<dyn FetchStrategy> {
        match self {
            Self::Static(fetcher) => Arc::new(fetcher),
            Self::Rendered(fetcher) => Arc::new(fetcher),
        }
    }
}
