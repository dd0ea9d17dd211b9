use crate::state::JobStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of a job, as exposed to pollers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStatusSnapshot {
    pub status: JobStatus,
    pub pages_discovered: usize,
    pub pages_crawled: usize,
    pub pages_failed: usize,
    pub links_found: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub error_message: Option<String>,
}

impl JobStatusSnapshot {
    /// Progress counters reported while a run is in flight
    pub fn with_progress(&mut self, progress: &CrawlProgress) {
        self.pages_discovered = progress.pages_discovered;
        self.pages_crawled = progress.pages_crawled;
        self.pages_failed = progress.pages_failed;
        self.links_found = progress.links_found;
    }

    /// Sets `finished_at` and derives `duration_seconds` from `started_at`
    pub fn finish(&mut self, finished_at: DateTime<Utc>) {
        self.finished_at = Some(finished_at);
        self.duration_seconds = self
            .started_at
            .map(|started| (finished_at - started).num_milliseconds() as f64 / 1000.0);
    }
}

/// Counters the coordinator publishes after every dispatch and commit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlProgress {
    pub pages_discovered: usize,
    pub pages_crawled: usize,
    pub pages_failed: usize,
    pub links_found: usize,
}
