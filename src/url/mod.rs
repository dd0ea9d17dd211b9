//! URL handling module
//!
//! This module provides URL normalization, fingerprinting, site membership checks,
//! asset filtering, and the per-run dedup index.

mod domain;
mod filter;
mod fingerprint;
mod normalize;
mod visited;

pub use domain::{extract_domain, is_internal};
pub use filter::is_crawlable_resource;
pub use fingerprint::{content_fingerprint, fingerprint, fingerprint_str};
pub use normalize::{normalize, normalize_url};
pub use visited::VisitedSet;
