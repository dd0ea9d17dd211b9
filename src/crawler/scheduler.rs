//! Crawl frontier
//!
//! A FIFO queue of `(url, depth)` pairs plus an index of what is currently
//! queued, so the same page reached twice from one wave of links is only
//! queued once. The visited set lives with the coordinator; the frontier only
//! knows about URLs that have not been dispatched yet.

use crate::url::fingerprint;
use std::collections::{HashSet, VecDeque};
use url::Url;

/// A URL waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedUrl {
    /// Normalized URL
    pub url: Url,

    /// Link distance from the start URL
    pub depth: u32,

    pub fingerprint: String,
}

impl QueuedUrl {
    pub fn new(url: Url, depth: u32) -> Self {
        let fingerprint = fingerprint(&url);
        Self {
            url,
            depth,
            fingerprint,
        }
    }
}

/// FIFO frontier for one run
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<QueuedUrl>,
    queued: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a frontier seeded with the start URL at depth 0
    pub fn seeded(start: Url) -> Self {
        let mut frontier = Self::new();
        frontier.push(QueuedUrl::new(start, 0));
        frontier
    }

    /// Appends a URL unless the same fingerprint is already queued
    ///
    /// Returns true if the URL was added.
    pub fn push(&mut self, entry: QueuedUrl) -> bool {
        if !self.queued.insert(entry.fingerprint.clone()) {
            return false;
        }
        self.queue.push_back(entry);
        true
    }

    /// Takes the oldest queued URL
    pub fn pop(&mut self) -> Option<QueuedUrl> {
        let entry = self.queue.pop_front()?;
        self.queued.remove(&entry.fingerprint);
        Some(entry)
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.queued.contains(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
