use crate::output::PageRecord;
use crate::url::fingerprint_str;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a link's target relates to the pages of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Same-site target that was crawled in this run
    Internal,

    /// Cross-site target; never fetched
    External,

    /// Same-site target with no page record (skipped, failed, or beyond the limits)
    Unresolved,
}

/// A directed link between two pages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEdge {
    pub source_fingerprint: String,
    pub target_fingerprint: String,
    pub target_url: String,
    pub anchor_text: Option<String>,
    pub kind: EdgeKind,
}

/// Derives link edges from a run's page records
///
/// Internal links whose target has no record in `pages` are reported as
/// [`EdgeKind::Unresolved`] instead of pointing at a page that does not exist.
pub fn build_link_edges(pages: &[PageRecord]) -> Vec<LinkEdge> {
    let crawled: HashSet<&str> = pages.iter().map(|p| p.url_fingerprint.as_str()).collect();
    let mut edges = Vec::new();

    for page in pages {
        for link in &page.links {
            let target_fingerprint = fingerprint_str(&link.url);
            let kind = if crawled.contains(target_fingerprint.as_str()) {
                EdgeKind::Internal
            } else {
                EdgeKind::Unresolved
            };

            edges.push(LinkEdge {
                source_fingerprint: page.url_fingerprint.clone(),
                target_fingerprint,
                target_url: link.url.clone(),
                anchor_text: link.anchor_text.clone(),
                kind,
            });
        }

        for link in &page.external_links {
            edges.push(LinkEdge {
                source_fingerprint: page.url_fingerprint.clone(),
                target_fingerprint: fingerprint_str(&link.url),
                target_url: link.url.clone(),
                anchor_text: link.anchor_text.clone(),
                kind: EdgeKind::External,
            });
        }
    }

    edges
}
