//! Result model for a crawl run
//!
//! Everything here is plain data: the coordinator builds it, callers serialize it.

use crate::output::edges::{build_link_edges, LinkEdge};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A link found on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingLink {
    /// Normalized absolute target URL
    pub url: String,

    /// Trimmed anchor text; None when the anchor has no text
    pub anchor_text: Option<String>,
}

/// Everything extracted from one successfully fetched page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Normalized URL the page was requested as
    pub url: String,
    pub url_fingerprint: String,

    /// URL after redirects, as reported by the fetch strategy
    pub final_url: String,
    pub canonical_url: Option<String>,
    pub status_code: u16,
    pub content_type: Option<String>,

    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<String>,
    pub h1: Option<String>,

    /// Visible text with script/style content removed and whitespace collapsed
    pub text_content: String,
    pub content_fingerprint: String,
    pub word_count: usize,

    /// ISO 639-1 code, or "unknown"
    pub language: String,

    /// hreflang value -> alternate URL
    pub hreflang: BTreeMap<String, String>,

    /// Link distance from the start URL
    pub depth: u32,

    /// Same-site links, deduplicated by target, in document order
    pub links: Vec<OutgoingLink>,

    /// Cross-site links; recorded but never fetched
    pub external_links: Vec<OutgoingLink>,

    /// Base64 PNG, rendered mode only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,

    /// Serialized DOM after scripts ran, rendered mode only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered_html: Option<String>,

    /// Uncaught exceptions and console errors seen while rendering
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub js_errors: Vec<String>,

    pub elapsed_ms: u64,
    pub fetched_at: DateTime<Utc>,
}

/// Coarse classification of a per-page failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    UrlFiltered,
    FetchTimeout,
    FetchConnection,
    FetchHttp,
    Render,
    Extraction,
    Internal,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UrlFiltered => "url_filtered",
            Self::FetchTimeout => "fetch_timeout",
            Self::FetchConnection => "fetch_connection",
            Self::FetchHttp => "fetch_http",
            Self::Render => "render",
            Self::Extraction => "extraction",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed page; the list of these is append-only for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlError {
    pub url: String,
    pub depth: u32,
    pub class: ErrorClass,
    pub message: String,
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
}

impl CrawlError {
    pub fn new(url: impl Into<String>, depth: u32, class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth,
            class,
            message: message.into(),
            attempts: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

/// Why the traversal loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Frontier empty and nothing in flight
    #[default]
    Drained,

    /// `max_pages` records committed
    PageLimit,

    /// Cancellation observed
    Cancelled,
}

/// Aggregate output of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub pages: Vec<PageRecord>,
    pub total_discovered: usize,
    pub total_crawled: usize,
    pub total_failed: usize,
    pub errors: Vec<CrawlError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub termination: Termination,
}

impl CrawlResult {
    /// An empty result for a run that never got going
    pub fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            pages: Vec::new(),
            total_discovered: 0,
            total_crawled: 0,
            total_failed: 0,
            errors: Vec::new(),
            started_at,
            finished_at: Utc::now(),
            termination: Termination::Drained,
        }
    }

    /// Total number of links (internal and external) across all pages
    pub fn links_found(&self) -> usize {
        self.pages
            .iter()
            .map(|p| p.links.len() + p.external_links.len())
            .sum()
    }

    /// Derives the link graph edges for this run's pages
    pub fn link_edges(&self) -> Vec<LinkEdge> {
        build_link_edges(&self.pages)
    }

    pub fn page(&self, url: &str) -> Option<&PageRecord> {
        self.pages.iter().find(|p| p.url == url)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::page_record;
    use super::*;

    #[test]
    fn test_links_found_counts_internal_and_external() {
        let mut page = page_record("https://example.com/", 0, &["https://example.com/a"]);
        page.external_links.push(OutgoingLink {
            url: "https://other.org/".to_string(),
            anchor_text: Some("Other".to_string()),
        });

        let mut result = CrawlResult::empty(Utc::now());
        result.pages.push(page);
        assert_eq!(result.links_found(), 2);
    }

    #[test]
    fn test_crawl_error_attempts() {
        let error = CrawlError::new("https://example.com/", 0, ErrorClass::FetchHttp, "HTTP 500")
            .with_attempts(3);
        assert_eq!(error.attempts, 3);
        assert_eq!(error.class.to_string(), "fetch_http");
    }

    #[test]
    fn test_optional_fields_skipped_in_json() {
        let page = page_record("https://example.com/", 0, &[]);
        let json = serde_json::to_value(&page).unwrap();
        assert!(json.get("screenshot").is_none());
        assert!(json.get("rendered_html").is_none());
        assert!(json.get("js_errors").is_none());
        assert_eq!(json["language"], "unknown");
    }
}
