//! Output module for crawl results
//!
//! This module handles:
//! - The result model of a run (page records, errors, termination reason)
//! - Single-owner accumulation of records with upsert-by-fingerprint
//! - Link edge derivation
//! - Markdown run summaries

mod accumulator;
mod edges;
mod markdown;
mod types;

pub use accumulator::ResultAccumulator;
pub use edges::{build_link_edges, EdgeKind, LinkEdge};
pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use types::{CrawlError, CrawlResult, ErrorClass, OutgoingLink, PageRecord, Termination};
