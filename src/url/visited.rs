use std::collections::HashSet;

/// Per-run dedup index of URL fingerprints
///
/// Owned by the coordinator for the lifetime of one run and never shared
/// between runs.
#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: HashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.seen.contains(fingerprint)
    }

    /// Records a fingerprint, returning true if it had not been seen before
    pub fn mark(&mut self, fingerprint: impl Into<String>) -> bool {
        self.seen.insert(fingerprint.into())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
