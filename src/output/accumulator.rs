use crate::output::{CrawlError, PageRecord};
use std::collections::HashMap;

/// Single-owner store for the records and errors of one run
///
/// Only the coordinator holds one of these; workers hand their results back
/// instead of writing here directly.
#[derive(Debug, Default)]
pub struct ResultAccumulator {
    pages: Vec<PageRecord>,
    index: HashMap<String, usize>,
    errors: Vec<CrawlError>,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a page record keyed by its URL fingerprint
    ///
    /// A second record with the same fingerprint replaces the first in place.
    /// Returns true if the fingerprint was new.
    pub fn upsert(&mut self, record: PageRecord) -> bool {
        match self.index.get(&record.url_fingerprint) {
            Some(&position) => {
                self.pages[position] = record;
                false
            }
            None => {
                self.index
                    .insert(record.url_fingerprint.clone(), self.pages.len());
                self.pages.push(record);
                true
            }
        }
    }

    pub fn push_error(&mut self, error: CrawlError) {
        self.errors.push(error);
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Running total of internal and external links over committed pages
    pub fn links_found(&self) -> usize {
        self.pages
            .iter()
            .map(|p| p.links.len() + p.external_links.len())
            .sum()
    }

    pub fn into_parts(self) -> (Vec<PageRecord>, Vec<CrawlError>) {
        (self.pages, self.errors)
    }
}
