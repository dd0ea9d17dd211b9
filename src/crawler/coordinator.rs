//! Crawler coordinator - main crawl orchestration logic
//!
//! The coordinator owns everything mutable about a run: the frontier, the
//! visited set, the result accumulator, and the counters. Workers fetch and
//! extract one page each and hand back a `Result<PageRecord, CrawlError>`;
//! only this loop ever commits them.

use crate::config::CrawlConfig;
use crate::crawler::parser::extract_page;
use crate::crawler::retry::RetryPolicy;
use crate::crawler::scheduler::{Frontier, QueuedUrl};
use crate::crawler::strategy::FetchStrategy;
use crate::output::{
    CrawlError, CrawlResult, ErrorClass, PageRecord, ResultAccumulator, Termination,
};
use crate::robots::{AllowAll, RobotsChecker};
use crate::state::{CancelFlag, CrawlProgress};
use crate::url::{is_crawlable_resource, normalize_url, VisitedSet};
use crate::EngineError;
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{JoinError, JoinSet};
use url::Url;

/// Receives counters after every dispatch and commit
pub type ProgressSink = Box<dyn Fn(CrawlProgress) + Send + Sync>;

/// Outcome of one fetch+extract unit
type UnitOutcome = Result<PageRecord, CrawlError>;

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<CrawlConfig>,
    origin: Url,
    strategy: Arc<dyn FetchStrategy>,
    robots: Arc<dyn RobotsChecker>,
    retry: RetryPolicy,
    cancel: CancelFlag,
    progress_sink: Option<ProgressSink>,
}

/// Mutable state of one traversal
struct RunState {
    frontier: Frontier,
    visited: VisitedSet,
    results: ResultAccumulator,
    in_flight: JoinSet<UnitOutcome>,
    progress: CrawlProgress,
}

impl Coordinator {
    /// Creates a coordinator for one run
    ///
    /// The strategy must already be acquired; the coordinator never releases it.
    pub fn new(
        config: Arc<CrawlConfig>,
        strategy: Arc<dyn FetchStrategy>,
        cancel: CancelFlag,
    ) -> Result<Self, EngineError> {
        let origin = normalize_url(&config.crawl.start_url)?;
        let retry = RetryPolicy::from(&config.retry);

        Ok(Self {
            config,
            origin,
            strategy,
            robots: Arc::new(AllowAll),
            retry,
            cancel,
            progress_sink: None,
        })
    }

    /// Consulted before dispatch when `respect-robots` is on
    pub fn with_robots(mut self, robots: Arc<dyn RobotsChecker>) -> Self {
        self.robots = robots;
        self
    }

    pub fn on_progress(mut self, sink: ProgressSink) -> Self {
        self.progress_sink = Some(sink);
        self
    }

    /// Runs the traversal until the frontier drains, the page limit is hit,
    /// or cancellation is observed
    ///
    /// Per-page failures are recorded in the result; this never fails.
    pub async fn run(self) -> CrawlResult {
        let settings = &self.config.crawl;
        let started_at = Utc::now();
        let start_time = Instant::now();

        tracing::info!(
            "Starting {} crawl of {} (max depth {}, max pages {}, concurrency {})",
            self.strategy.name(),
            self.origin,
            settings.max_depth,
            settings.max_pages,
            settings.concurrency_limit
        );

        let mut state = RunState {
            frontier: Frontier::seeded(self.origin.clone()),
            visited: VisitedSet::new(),
            results: ResultAccumulator::new(),
            in_flight: JoinSet::new(),
            progress: CrawlProgress::default(),
        };

        let termination = loop {
            if self.cancel.is_cancelled() {
                break Termination::Cancelled;
            }

            self.dispatch_ready(&mut state);

            if state.in_flight.is_empty() {
                if state.results.page_count() >= settings.max_pages {
                    break Termination::PageLimit;
                }
                if self.cancel.is_cancelled() {
                    break Termination::Cancelled;
                }
                break Termination::Drained;
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break Termination::Cancelled,
                joined = state.in_flight.join_next() => {
                    if let Some(joined) = joined {
                        self.commit(&mut state, joined, true);
                        self.report_progress(&state, start_time);
                        if self.has_pending_work(&state) {
                            self.politeness_pause().await;
                        }
                    }
                }
            }
        };

        if termination == Termination::Cancelled {
            self.wind_down(&mut state).await;
        }

        let (pages, errors) = state.results.into_parts();
        tracing::info!(
            "Crawl finished ({:?}): {} pages crawled, {} failed, {} discovered in {:?}",
            termination,
            pages.len(),
            errors.len(),
            state.progress.pages_discovered,
            start_time.elapsed()
        );

        CrawlResult {
            total_discovered: state.progress.pages_discovered,
            total_crawled: pages.len(),
            total_failed: errors.len(),
            pages,
            errors,
            started_at,
            finished_at: Utc::now(),
            termination,
        }
    }

    /// Starts units until the pool is full, the frontier is empty, or the
    /// page limit holds further dispatch
    fn dispatch_ready(&self, state: &mut RunState) {
        let settings = &self.config.crawl;

        while state.in_flight.len() < settings.concurrency_limit {
            if self.cancel.is_cancelled() {
                return;
            }
            // Every in-flight unit may still become a page
            if state.results.page_count() + state.in_flight.len() >= settings.max_pages {
                return;
            }
            let Some(next) = state.frontier.pop() else {
                return;
            };

            if let Some(reason) = self.skip_reason(&next, &state.visited) {
                tracing::trace!("Skipping {} (depth {}): {}", next.url, next.depth, reason);
                continue;
            }

            state.visited.mark(next.fingerprint.clone());
            state.progress.pages_discovered += 1;
            tracing::debug!("Dispatching {} (depth {})", next.url, next.depth);

            self.spawn_unit(&mut state.in_flight, next);
            self.publish(state.progress);
        }
    }

    fn skip_reason(&self, entry: &QueuedUrl, visited: &VisitedSet) -> Option<&'static str> {
        let settings = &self.config.crawl;

        if entry.depth > settings.max_depth {
            Some("beyond max depth")
        } else if visited.contains(&entry.fingerprint) {
            Some("already visited")
        } else if !is_crawlable_resource(&entry.url) {
            Some("not a page")
        } else if settings.respect_robots && !self.robots.is_allowed(&entry.url) {
            Some("disallowed by robots rules")
        } else {
            None
        }
    }

    fn spawn_unit(&self, in_flight: &mut JoinSet<UnitOutcome>, entry: QueuedUrl) {
        let strategy = Arc::clone(&self.strategy);
        let origin = self.origin.clone();
        let retry = self.retry;
        let QueuedUrl { url, depth, .. } = entry;
        let url_str = url.to_string();

        in_flight.spawn(async move {
            AssertUnwindSafe(crawl_unit(strategy, retry, origin, url, depth))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(CrawlError::new(
                        url_str,
                        depth,
                        ErrorClass::Internal,
                        format!("Crawl unit panicked: {}", panic_message(panic.as_ref())),
                    ))
                })
        });
    }

    /// Folds one finished unit into the run
    fn commit(
        &self,
        state: &mut RunState,
        joined: Result<UnitOutcome, JoinError>,
        follow_links: bool,
    ) {
        match joined {
            Ok(Ok(record)) => {
                tracing::debug!(
                    "Crawled {} (status {}, {} links)",
                    record.url,
                    record.status_code,
                    record.links.len()
                );
                let children = if follow_links {
                    self.children_of(&record)
                } else {
                    Vec::new()
                };
                state.progress.links_found += record.links.len() + record.external_links.len();
                state.results.upsert(record);
                state.progress.pages_crawled = state.results.page_count();
                self.enqueue_children(state, children);
            }
            Ok(Err(error)) => {
                tracing::warn!(
                    "Failed {} after {} attempt(s): {}",
                    error.url,
                    error.attempts,
                    error.message
                );
                state.results.push_error(error);
                state.progress.pages_failed = state.results.error_count();
            }
            Err(e) if e.is_cancelled() => {
                tracing::debug!("Crawl unit aborted");
            }
            Err(e) => {
                tracing::error!("Crawl unit failed to join: {}", e);
            }
        }

        self.publish(state.progress);
    }

    /// Internal links of a committed page worth following
    fn children_of(&self, record: &PageRecord) -> Vec<QueuedUrl> {
        let settings = &self.config.crawl;
        let depth = record.depth + 1;
        if depth > settings.max_depth {
            return Vec::new();
        }

        let limit = settings.max_links_per_page.unwrap_or(usize::MAX);
        record
            .links
            .iter()
            .take(limit)
            .filter_map(|link| Url::parse(&link.url).ok())
            .filter(is_crawlable_resource)
            .map(|url| QueuedUrl::new(url, depth))
            .collect()
    }

    fn enqueue_children(&self, state: &mut RunState, children: Vec<QueuedUrl>) {
        let max_pages = self.config.crawl.max_pages;

        for child in children {
            let committed_or_pending =
                state.results.page_count() + state.in_flight.len() + state.frontier.len();
            if committed_or_pending >= max_pages {
                tracing::trace!("Page budget reached, not queueing {}", child.url);
                break;
            }
            if state.visited.contains(&child.fingerprint) {
                continue;
            }
            state.frontier.push(child);
        }
    }

    /// True while another unit may still be dispatched or committed
    fn has_pending_work(&self, state: &RunState) -> bool {
        !state.in_flight.is_empty()
            || (!state.frontier.is_empty()
                && state.results.page_count() < self.config.crawl.max_pages)
    }

    /// Waits out the politeness delay, cut short by cancellation
    async fn politeness_pause(&self) {
        let delay = self.config.crawl.politeness_delay();
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.cancel.cancelled() => {}
        }
    }

    /// Drains or aborts whatever is still in flight after cancellation
    async fn wind_down(&self, state: &mut RunState) {
        if state.in_flight.is_empty() {
            return;
        }

        if self.strategy.aborts_in_flight_on_cancel() {
            tracing::info!("Cancelled, aborting {} in-flight fetches", state.in_flight.len());
            state.in_flight.abort_all();
        } else {
            tracing::info!("Cancelled, draining {} in-flight fetches", state.in_flight.len());
        }

        // Finished pages still commit, but nothing new is queued
        while let Some(joined) = state.in_flight.join_next().await {
            self.commit(state, joined, false);
        }

        self.publish(state.progress);
    }

    fn report_progress(&self, state: &RunState, start_time: Instant) {
        let done = state.progress.pages_crawled + state.progress.pages_failed;
        if done == 0 || done % 10 != 0 {
            return;
        }
        let rate =
            state.progress.pages_crawled as f64 / start_time.elapsed().as_secs_f64().max(0.001);
        tracing::info!(
            "Progress: {} pages crawled, {} failed, {} queued, {} in flight, {:.2} pages/sec",
            state.progress.pages_crawled,
            state.progress.pages_failed,
            state.frontier.len(),
            state.in_flight.len(),
            rate
        );
    }

    fn publish(&self, progress: CrawlProgress) {
        if let Some(sink) = &self.progress_sink {
            sink(progress);
        }
    }
}

/// Fetches (with retries) and extracts one page
async fn crawl_unit(
    strategy: Arc<dyn FetchStrategy>,
    retry: RetryPolicy,
    origin: Url,
    url: Url,
    depth: u32,
) -> UnitOutcome {
    match retry.run(url.as_str(), || strategy.fetch(&url)).await {
        Ok(document) => Ok(extract_page(&url, depth, &origin, document)),
        Err(failure) => Err(CrawlError::new(
            url.as_str(),
            depth,
            failure.last_error.class(),
            failure.last_error.to_string(),
        )
        .with_attempts(failure.attempts)),
    }
}

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
