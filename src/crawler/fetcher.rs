//! Static (plain HTTP) fetch strategy
//!
//! One pooled `reqwest` client per run: built when the job starts, shared by
//! every worker, dropped on release. No scripts are executed.

use crate::config::CrawlSettings;
use crate::crawler::strategy::{FetchError, FetchStrategy, FetchedDocument};
use async_trait::async_trait;
use reqwest::{header, redirect::Policy, Client};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use url::Url;

/// Maximum number of redirects followed for a single request
const MAX_REDIRECTS: usize = 10;

/// Builds the shared HTTP client for a run
///
/// # Example
///
/// ```no_run
/// use seo_crawl_engine::config::CrawlSettings;
/// use seo_crawl_engine::crawler::build_http_client;
///
/// let settings = CrawlSettings::new("https://example.com/");
/// let client = build_http_client(&settings).unwrap();
/// ```
pub fn build_http_client(settings: &CrawlSettings) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(settings.user_agent.as_str())
        .timeout(settings.timeout())
        .connect_timeout(settings.timeout().min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetch strategy backed by a pooled HTTP client
pub struct StaticFetcher {
    client: RwLock<Option<Client>>,
    timeout: Duration,
}

impl StaticFetcher {
    pub fn new(settings: &CrawlSettings) -> Result<Self, reqwest::Error> {
        let client = build_http_client(settings)?;
        tracing::debug!(
            "HTTP client ready (user agent: {}, timeout: {:?})",
            settings.user_agent,
            settings.timeout()
        );
        Ok(Self {
            client: RwLock::new(Some(client)),
            timeout: settings.timeout(),
        })
    }

    async fn client(&self) -> Result<Client, FetchError> {
        self.client
            .read()
            .await
            .clone()
            .ok_or_else(|| FetchError::Connection("HTTP client already released".to_string()))
    }
}

#[async_trait]
impl FetchStrategy for StaticFetcher {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch(&self, url: &Url) -> Result<FetchedDocument, FetchError> {
        let client = self.client().await?;
        let started = Instant::now();

        let response = client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_error(e, self.timeout))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut document = FetchedDocument {
            final_url,
            status_code: status.as_u16(),
            content_type,
            body: String::new(),
            elapsed: Duration::ZERO,
            screenshot: None,
            js_errors: Vec::new(),
            rendered: false,
        };

        // Non-HTML bodies are never parsed, so don't download them
        if document.is_html() {
            document.body = response
                .text()
                .await
                .map_err(|e| classify_error(e, self.timeout))?;
        }

        document.elapsed = started.elapsed();
        Ok(document)
    }

    async fn release(&self) {
        if self.client.write().await.take().is_some() {
            tracing::debug!("HTTP client released");
        }
    }
}

/// Maps a transport error onto the fetch error taxonomy
fn classify_error(error: reqwest::Error, timeout: Duration) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(timeout)
    } else if error.is_connect() {
        FetchError::Connection(format!("Connection refused: {}", error))
    } else if error.is_redirect() {
        FetchError::Connection(format!("Redirect error: {}", error))
    } else {
        FetchError::Connection(error.to_string())
    }
}
