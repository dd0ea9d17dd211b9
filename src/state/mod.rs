//! State module for tracking job progress
//!
//! # Components
//!
//! - `JobStatus`: the crawl job lifecycle (pending, running, completed, failed, cancelled)
//! - `JobStatusSnapshot`: the polling view of a job, counters included
//! - `CrawlProgress`: counters published by the coordinator while a run is in flight
//! - `CancelFlag`: cooperative cancellation shared by a job and its handles

mod cancel;
mod job_status;
mod snapshot;

pub use cancel::CancelFlag;
pub use job_status::JobStatus;
pub use snapshot::{CrawlProgress, JobStatusSnapshot};
