//! Crawl job lifecycle
//!
//! A [`CrawlJob`] wraps one run: it validates the configuration, acquires the
//! fetch strategy for the job's mode, drives the coordinator, and guarantees
//! the strategy is released exactly once however the run ends. Progress and
//! the final status are published through a `watch` channel that any number of
//! [`JobHandle`]s can poll or subscribe to.

use crate::config::{validate, CrawlConfig};
use crate::crawler::{panic_message, Coordinator, FetchStrategy, Fetcher};
use crate::output::{CrawlResult, Termination};
use crate::robots::{AllowAll, RobotsChecker};
use crate::state::{CancelFlag, JobStatus, JobStatusSnapshot};
use crate::EngineError;
use chrono::Utc;
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::watch;

/// Final status and results of a run
#[derive(Debug, Clone, Serialize)]
pub struct CrawlOutcome {
    pub snapshot: JobStatusSnapshot,
    pub result: CrawlResult,
}

/// Cloneable control and polling surface for a job
#[derive(Debug, Clone)]
pub struct JobHandle {
    cancel: CancelFlag,
    status: watch::Receiver<JobStatusSnapshot>,
}

impl JobHandle {
    /// Requests cooperative cancellation; committed results are kept
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Current status and counters
    pub fn status(&self) -> JobStatusSnapshot {
        self.status.borrow().clone()
    }

    /// A receiver that is notified on every status or counter change
    pub fn subscribe(&self) -> watch::Receiver<JobStatusSnapshot> {
        self.status.clone()
    }
}

/// One crawl run of one site
pub struct CrawlJob {
    config: Arc<CrawlConfig>,
    robots: Arc<dyn RobotsChecker>,
    cancel: CancelFlag,
    status: Arc<watch::Sender<JobStatusSnapshot>>,
}

impl CrawlJob {
    /// Creates a pending job after validating its configuration
    pub fn new(config: CrawlConfig) -> Result<Self, EngineError> {
        validate(&config)?;
        let (status, _) = watch::channel(JobStatusSnapshot::default());

        Ok(Self {
            config: Arc::new(config),
            robots: Arc::new(AllowAll),
            cancel: CancelFlag::new(),
            status: Arc::new(status),
        })
    }

    /// Replaces the default allow-all robots checker
    pub fn with_robots(mut self, robots: Arc<dyn RobotsChecker>) -> Self {
        self.robots = robots;
        self
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    pub fn handle(&self) -> JobHandle {
        JobHandle {
            cancel: self.cancel.clone(),
            status: self.status.subscribe(),
        }
    }

    /// Acquires the strategy for the configured mode and runs the job
    ///
    /// Acquisition failure leaves the job `failed` with an empty result.
    pub async fn run(self) -> CrawlOutcome {
        if self.cancel.is_cancelled() {
            return self.cancelled_before_start();
        }

        match Fetcher::acquire(&self.config).await {
            Ok(fetcher) => self.run_with(fetcher.into_strategy()).await,
            Err(e) => {
                tracing::error!(
                    "Failed to start {} crawl of {}: {}",
                    self.config.crawl.mode,
                    self.config.crawl.start_url,
                    e
                );
                self.fail_before_start(format!("Failed to acquire fetch strategy: {}", e))
            }
        }
    }

    /// Runs the job with an already acquired strategy
    ///
    /// The strategy is released exactly once before this returns, including
    /// when the traversal panics.
    pub async fn run_with(self, strategy: Arc<dyn FetchStrategy>) -> CrawlOutcome {
        if self.cancel.is_cancelled() {
            strategy.release().await;
            return self.cancelled_before_start();
        }

        let coordinator = match Coordinator::new(
            Arc::clone(&self.config),
            Arc::clone(&strategy),
            self.cancel.clone(),
        ) {
            Ok(coordinator) => coordinator,
            Err(e) => {
                strategy.release().await;
                return self.fail_before_start(e.to_string());
            }
        };

        self.transition(JobStatus::Running);
        let sink_status = Arc::clone(&self.status);
        let coordinator = coordinator
            .with_robots(Arc::clone(&self.robots))
            .on_progress(Box::new(move |progress| {
                sink_status.send_modify(|snapshot| snapshot.with_progress(&progress));
            }));

        let traversal = AssertUnwindSafe(coordinator.run()).catch_unwind().await;
        strategy.release().await;
        tracing::debug!("Released {} fetch strategy", strategy.name());

        match traversal {
            Ok(result) => {
                let status = if result.termination == Termination::Cancelled {
                    JobStatus::Cancelled
                } else {
                    JobStatus::Completed
                };
                self.finish(status, &result, None);
                CrawlOutcome {
                    snapshot: self.status.borrow().clone(),
                    result,
                }
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!("Crawl of {} aborted: {}", self.config.crawl.start_url, message);

                let started_at = self.status.borrow().started_at.unwrap_or_else(Utc::now);
                let result = CrawlResult::empty(started_at);
                self.finish(
                    JobStatus::Failed,
                    &result,
                    Some(format!("Crawl orchestrator panicked: {}", message)),
                );
                CrawlOutcome {
                    snapshot: self.status.borrow().clone(),
                    result,
                }
            }
        }
    }

    fn cancelled_before_start(&self) -> CrawlOutcome {
        tracing::info!("Crawl of {} cancelled before start", self.config.crawl.start_url);
        let mut result = CrawlResult::empty(Utc::now());
        result.termination = Termination::Cancelled;
        self.finish(JobStatus::Cancelled, &result, None);
        CrawlOutcome {
            snapshot: self.status.borrow().clone(),
            result,
        }
    }

    fn fail_before_start(&self, message: String) -> CrawlOutcome {
        let result = CrawlResult::empty(Utc::now());
        self.finish(JobStatus::Failed, &result, Some(message));
        CrawlOutcome {
            snapshot: self.status.borrow().clone(),
            result,
        }
    }

    /// Moves to a terminal status with counters taken from the result
    fn finish(&self, status: JobStatus, result: &CrawlResult, error_message: Option<String>) {
        if !self.transition(status) {
            return;
        }
        let links_found = result.links_found();
        self.status.send_modify(|snapshot| {
            snapshot.pages_discovered = result.total_discovered;
            snapshot.pages_crawled = result.total_crawled;
            snapshot.pages_failed = result.total_failed;
            snapshot.links_found = links_found;
            snapshot.error_message = error_message;
            if snapshot.started_at.is_none() {
                snapshot.started_at = Some(result.started_at);
            }
            snapshot.finish(result.finished_at);
        });
    }

    /// Applies a status change if the lifecycle allows it
    fn transition(&self, next: JobStatus) -> bool {
        let current = self.status.borrow().status;
        if !current.can_transition_to(next) {
            let error = EngineError::InvalidTransition {
                from: current,
                to: next,
            };
            tracing::error!("{}", error);
            return false;
        }

        self.status.send_modify(|snapshot| {
            snapshot.status = next;
            if next == JobStatus::Running {
                snapshot.started_at = Some(Utc::now());
            }
        });
        tracing::debug!("Job status: {} -> {}", current, next);
        true
    }
}
