//! Rendered (headless browser) fetch strategy
//!
//! One browser process and one isolated browser context per run. Every fetch
//! opens its own page inside that context and closes it again, including when
//! the fetch is timed out or aborted mid-flight.

use crate::config::{CrawlSettings, RenderedOptions, ScreenshotType, WaitUntil};
use crate::crawler::strategy::{FetchError, FetchStrategy, FetchedDocument};
use crate::EngineError;
use async_trait::async_trait;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig, HeadlessMode};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EventRequestPaused, FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    ErrorReason, EventResponseReceived, ResourceType,
};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, NavigateParams};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{
    ConsoleApiCalledType, EvaluateParams, EventConsoleApiCalled, EventExceptionThrown,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::viewport::Viewport as BrowserViewport;
use chromiumoxide::listeners::EventStream;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::{FutureExt, Stream, StreamExt};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use url::Url;

/// Interval between DOM state polls
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long the resource count must hold still to count as network idle
const NETWORK_IDLE_WINDOW: Duration = Duration::from_millis(500);

/// Grace period for the CDP handler task to finish after the browser exits
const HANDLER_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Fetch strategy backed by a headless Chromium instance
pub struct RenderedFetcher {
    browser: Mutex<Option<Browser>>,
    context_id: BrowserContextId,
    handler: Mutex<Option<JoinHandle<()>>>,
    profile_dir: Mutex<Option<TempDir>>,
    options: RenderedOptions,
    blocked: Vec<ResourceType>,
}

impl RenderedFetcher {
    /// Launches the browser and opens the run's isolated context
    pub async fn launch(
        settings: &CrawlSettings,
        options: &RenderedOptions,
    ) -> Result<Self, EngineError> {
        let executable = find_browser_executable(options.executable_path.as_deref())?;
        let profile_dir = tempfile::Builder::new()
            .prefix("seo-crawl-profile-")
            .tempdir()?;

        let blocked: Vec<ResourceType> = options
            .blocked_resource_types
            .iter()
            .filter_map(|name| resource_type(name))
            .collect();

        let mut builder = BrowserConfig::builder()
            .request_timeout(options.timeout())
            .window_size(options.viewport.width, options.viewport.height)
            .viewport(BrowserViewport {
                width: options.viewport.width,
                height: options.viewport.height,
                ..Default::default()
            })
            .user_data_dir(profile_dir.path())
            .arg(format!("--user-agent={}", settings.user_agent))
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--mute-audio")
            .arg("--hide-scrollbars");

        builder = if options.headless {
            builder.headless_mode(HeadlessMode::default())
        } else {
            builder.with_head()
        };
        if let Some(path) = executable {
            builder = builder.chrome_executable(path);
        }
        if !blocked.is_empty() {
            builder = builder.enable_request_intercept();
        }

        let config = builder.build().map_err(EngineError::BrowserLaunch)?;
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| EngineError::BrowserLaunch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    let message = e.to_string();
                    // Chromium emits CDP messages newer than the bindings know about
                    if message.contains("data did not match any variant of untagged enum Message")
                        || message.contains("Failed to deserialize WS response")
                    {
                        continue;
                    }
                    tracing::debug!("Browser handler error: {}", message);
                }
            }
        });

        let context_id = match browser
            .create_browser_context(CreateBrowserContextParams::default())
            .await
        {
            Ok(id) => id,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler.abort();
                return Err(EngineError::Browser(e));
            }
        };

        tracing::info!(
            "Browser launched (headless: {}, viewport: {}x{}, blocking: {:?})",
            options.headless,
            options.viewport.width,
            options.viewport.height,
            options.blocked_resource_types
        );

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            context_id,
            handler: Mutex::new(Some(handler)),
            profile_dir: Mutex::new(Some(profile_dir)),
            options: options.clone(),
            blocked,
        })
    }

    async fn open_page(&self) -> Result<Page, FetchError> {
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| FetchError::Render("browser already released".to_string()))?;

        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(self.context_id.clone())
            .build()
            .map_err(FetchError::Render)?;

        browser.new_page(params).await.map_err(|e| self.cdp_error(e))
    }

    /// Fails blocked resource types, continues everything else
    fn spawn_interceptor(
        &self,
        mut paused: EventStream<EventRequestPaused>,
        page: Page,
    ) -> JoinHandle<()> {
        let blocked = self.blocked.clone();
        tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let request_id = event.request_id.clone();
                let outcome = if blocked.contains(&event.resource_type) {
                    page.execute(FailRequestParams::new(request_id, ErrorReason::BlockedByClient))
                        .await
                        .map(|_| ())
                } else {
                    page.execute(ContinueRequestParams::new(request_id))
                        .await
                        .map(|_| ())
                };
                if let Err(e) = outcome {
                    tracing::trace!("Request interception failed: {}", e);
                }
            }
        })
    }

    async fn render(&self, url: &Url) -> Result<FetchedDocument, FetchError> {
        let started = Instant::now();
        let mut guard = PageGuard::new(self.open_page().await?);
        let page = guard.page.clone();

        if !self.blocked.is_empty() {
            let paused = page
                .event_listener::<EventRequestPaused>()
                .await
                .map_err(|e| self.cdp_error(e))?;
            guard.interceptor = Some(self.spawn_interceptor(paused, page.clone()));
        }

        let result = self.render_in_page(&page, url, started).await;
        guard.close().await;
        result
    }

    async fn render_in_page(
        &self,
        page: &Page,
        url: &Url,
        started: Instant,
    ) -> Result<FetchedDocument, FetchError> {
        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| self.cdp_error(e))?;
        let mut exceptions = page
            .event_listener::<EventExceptionThrown>()
            .await
            .map_err(|e| self.cdp_error(e))?;
        let mut console = page
            .event_listener::<EventConsoleApiCalled>()
            .await
            .map_err(|e| self.cdp_error(e))?;

        let navigation = page
            .execute(NavigateParams::new(url.as_str()))
            .await
            .map_err(|e| self.cdp_error(e))?;
        if let Some(error_text) = navigation.result.error_text.clone() {
            return Err(FetchError::Connection(format!("{}: {}", url, error_text)));
        }
        let frame_id = navigation.result.frame_id.clone();

        self.wait_for_load(page).await;
        tokio::time::sleep(self.options.settle()).await;
        self.wait_for_readiness(page, url).await;

        let main_response = drain(&mut responses).into_iter().find(|event| {
            event.r#type == ResourceType::Document && event.frame_id.as_ref() == Some(&frame_id)
        });
        let (status_code, content_type) = match main_response {
            Some(event) => (
                u16::try_from(event.response.status).unwrap_or(0),
                Some(event.response.mime_type.clone()),
            ),
            None => {
                let status: i64 = self
                    .evaluate(
                        page,
                        "(performance.getEntriesByType('navigation')[0] || {}).responseStatus || 0",
                    )
                    .await
                    .unwrap_or(0);
                let content_type: Option<String> =
                    self.evaluate(page, "document.contentType").await.ok();
                (u16::try_from(status).ok().filter(|s| *s > 0).unwrap_or(200), content_type)
            }
        };

        if status_code >= 400 {
            return Err(FetchError::Http {
                status: status_code,
            });
        }

        let mut js_errors: Vec<String> = drain(&mut exceptions)
            .into_iter()
            .map(|event| {
                event
                    .exception_details
                    .exception
                    .as_ref()
                    .and_then(|e| e.description.clone())
                    .unwrap_or_else(|| event.exception_details.text.clone())
            })
            .collect();
        js_errors.extend(drain(&mut console).into_iter().filter_map(|event| {
            let level = match event.r#type {
                ConsoleApiCalledType::Error => "error",
                ConsoleApiCalledType::Warning => "warning",
                _ => return None,
            };
            let text: Vec<String> = event
                .args
                .iter()
                .map(|arg| match (&arg.value, &arg.description) {
                    (Some(serde_json::Value::String(s)), _) => s.clone(),
                    (Some(value), _) => value.to_string(),
                    (None, Some(description)) => description.clone(),
                    (None, None) => String::new(),
                })
                .collect();
            Some(format!("console.{}: {}", level, text.join(" ")))
        }));

        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .and_then(|u| Url::parse(&u).ok())
            .unwrap_or_else(|| url.clone());

        let body = page.content().await.map_err(|e| self.cdp_error(e))?;

        let screenshot = if self.options.capture_screenshot {
            self.capture_screenshot(page, url).await
        } else {
            None
        };

        Ok(FetchedDocument {
            final_url,
            status_code,
            content_type,
            body,
            elapsed: started.elapsed(),
            screenshot,
            js_errors,
            rendered: true,
        })
    }

    /// Polls until the configured load condition holds
    ///
    /// A failed evaluation counts as not loaded yet: client-side redirects
    /// destroy the execution context mid-poll. The fetch timeout bounds the wait.
    async fn wait_for_load(&self, page: &Page) {
        let mut tracker = LoadTracker::new(self.options.wait_until);

        loop {
            let sample = LoadSample {
                ready_state: self.probe(page, "document.readyState").await,
                href: self.probe(page, "location.href").await,
                resources: match self.options.wait_until {
                    WaitUntil::NetworkIdle => {
                        self.probe(page, "performance.getEntriesByType('resource').length")
                            .await
                    }
                    _ => None,
                },
            };
            if tracker.observe(&sample, Instant::now()) {
                return;
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Evaluates an expression, treating failure as "no answer yet"
    async fn probe<T: DeserializeOwned>(&self, page: &Page, expression: &str) -> Option<T> {
        match self.evaluate(page, expression).await {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::trace!("Load poll `{}` failed: {}", expression, e);
                None
            }
        }
    }

    /// Waits for enough visible text (and the optional selector)
    ///
    /// Best effort: expiry is logged and the page is captured as it is.
    async fn wait_for_readiness(&self, page: &Page, url: &Url) {
        let selector_check = self.options.wait_for_selector.as_ref().map(|selector| {
            format!(
                "document.querySelector({}) !== null",
                serde_json::Value::String(selector.clone())
            )
        });
        let min_text = self.options.readiness_min_text_length;

        let ready = tokio::time::timeout(self.options.readiness_timeout(), async {
            loop {
                let text_len: u64 = self
                    .evaluate(page, "document.body ? document.body.innerText.length : 0")
                    .await
                    .unwrap_or(0);
                let selector_found = match &selector_check {
                    Some(expr) => self.evaluate::<bool>(page, expr).await.unwrap_or(false),
                    None => true,
                };
                if text_len as usize > min_text && selector_found {
                    return;
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        })
        .await;

        if ready.is_err() {
            tracing::debug!(
                "Readiness not reached for {} within {:?}, capturing as is",
                url,
                self.options.readiness_timeout()
            );
        }
    }

    async fn capture_screenshot(&self, page: &Page, url: &Url) -> Option<String> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(self.options.screenshot_type == ScreenshotType::Fullpage)
            .build();

        match page.screenshot(params).await {
            Ok(bytes) => Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
            Err(e) => {
                tracing::warn!("Screenshot failed for {}: {}", url, e);
                None
            }
        }
    }

    async fn evaluate<T: DeserializeOwned>(
        &self,
        page: &Page,
        expression: &str,
    ) -> Result<T, FetchError> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .return_by_value(true)
            .build()
            .map_err(FetchError::Render)?;

        page.evaluate_expression(params)
            .await
            .map_err(|e| self.cdp_error(e))?
            .into_value::<T>()
            .map_err(|e| FetchError::Render(format!("unexpected value for `{}`: {}", expression, e)))
    }

    fn cdp_error(&self, error: CdpError) -> FetchError {
        match error {
            CdpError::Timeout => FetchError::Timeout(self.options.timeout()),
            other => FetchError::Render(other.to_string()),
        }
    }
}

#[async_trait]
impl FetchStrategy for RenderedFetcher {
    fn name(&self) -> &'static str {
        "rendered"
    }

    async fn fetch(&self, url: &Url) -> Result<FetchedDocument, FetchError> {
        let timeout = self.options.timeout();
        match tokio::time::timeout(timeout, self.render(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(timeout)),
        }
    }

    fn aborts_in_flight_on_cancel(&self) -> bool {
        true
    }

    async fn release(&self) {
        if let Some(mut browser) = self.browser.lock().await.take() {
            if let Err(e) = browser
                .dispose_browser_context(self.context_id.clone())
                .await
            {
                tracing::debug!("Failed to dispose browser context: {}", e);
            }
            if let Err(e) = browser.close().await {
                tracing::warn!("Failed to close browser: {}", e);
            }
            if let Err(e) = browser.wait().await {
                tracing::warn!("Failed to wait for browser exit: {}", e);
            }
            tracing::debug!("Browser released");
        }

        if let Some(mut handler) = self.handler.lock().await.take() {
            if tokio::time::timeout(HANDLER_SHUTDOWN_GRACE, &mut handler)
                .await
                .is_err()
            {
                handler.abort();
            }
        }

        if let Some(dir) = self.profile_dir.lock().await.take() {
            if let Err(e) = dir.close() {
                tracing::debug!("Failed to remove browser profile: {}", e);
            }
        }
    }
}

/// Closes the page when a fetch ends, however it ends
struct PageGuard {
    page: Page,
    interceptor: Option<JoinHandle<()>>,
    closed: bool,
}

impl PageGuard {
    fn new(page: Page) -> Self {
        Self {
            page,
            interceptor: None,
            closed: false,
        }
    }

    async fn close(&mut self) {
        if let Some(task) = self.interceptor.take() {
            task.abort();
        }
        if !self.closed {
            self.closed = true;
            if let Err(e) = self.page.clone().close().await {
                tracing::debug!("Failed to close page: {}", e);
            }
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Some(task) = self.interceptor.take() {
            task.abort();
        }
        if self.closed {
            return;
        }
        // Timed out or aborted mid-fetch
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let page = self.page.clone();
            runtime.spawn(async move {
                let _ = page.close().await;
            });
        }
    }
}

/// Collects the events already buffered on a listener without waiting
fn drain<S: Stream + Unpin>(stream: &mut S) -> Vec<S::Item> {
    let mut events = Vec::new();
    while let Some(Some(event)) = stream.next().now_or_never() {
        events.push(event);
    }
    events
}

/// Maps a configured resource type name to its CDP counterpart
fn resource_type(name: &str) -> Option<ResourceType> {
    let kind = match name.to_ascii_lowercase().as_str() {
        "document" => ResourceType::Document,
        "stylesheet" => ResourceType::Stylesheet,
        "image" => ResourceType::Image,
        "media" => ResourceType::Media,
        "font" => ResourceType::Font,
        "script" => ResourceType::Script,
        "texttrack" => ResourceType::TextTrack,
        "xhr" => ResourceType::Xhr,
        "fetch" => ResourceType::Fetch,
        "eventsource" => ResourceType::EventSource,
        "websocket" => ResourceType::WebSocket,
        "manifest" => ResourceType::Manifest,
        "other" => ResourceType::Other,
        _ => return None,
    };
    Some(kind)
}

/// Locates a Chromium binary
///
/// An explicitly configured path must exist. Without one, `CHROMIUM_PATH`
/// and the usual install locations are tried; `Ok(None)` leaves the choice
/// to chromiumoxide's own detection.
fn find_browser_executable(configured: Option<&str>) -> Result<Option<PathBuf>, EngineError> {
    if let Some(path) = configured {
        let path = PathBuf::from(path);
        return if path.exists() {
            Ok(Some(path))
        } else {
            Err(EngineError::BrowserLaunch(format!(
                "browser executable not found: {}",
                path.display()
            )))
        };
    }

    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(Some(path));
        }
        tracing::warn!("CHROMIUM_PATH points to a missing file: {}", path.display());
    }

    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
    } else if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    } else {
        &[
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/snap/bin/chromium",
        ]
    };

    Ok(candidates
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists()))
}

/// One poll of a page's load state; `None` where the evaluation failed
#[derive(Debug, Default)]
struct LoadSample {
    ready_state: Option<String>,
    href: Option<String>,
    resources: Option<u64>,
}

/// Decides from successive samples when the configured wait condition holds
struct LoadTracker {
    wait_until: WaitUntil,
    /// Resource count and when it was first seen at that value
    stable_since: Option<(u64, Instant)>,
}

impl LoadTracker {
    fn new(wait_until: WaitUntil) -> Self {
        Self {
            wait_until,
            stable_since: None,
        }
    }

    fn observe(&mut self, sample: &LoadSample, now: Instant) -> bool {
        // Still on the blank page the tab was opened with, or mid-redirect
        match sample.href.as_deref() {
            None | Some("about:blank") => return false,
            Some(_) => {}
        }
        let Some(state) = sample.ready_state.as_deref() else {
            return false;
        };

        match self.wait_until {
            WaitUntil::DomContentLoaded => state == "interactive" || state == "complete",
            WaitUntil::Load => state == "complete",
            WaitUntil::NetworkIdle => {
                if state != "complete" {
                    return false;
                }
                let Some(count) = sample.resources else {
                    self.stable_since = None;
                    return false;
                };
                match self.stable_since {
                    Some((previous, since)) if previous == count => {
                        now.duration_since(since) >= NETWORK_IDLE_WINDOW
                    }
                    _ => {
                        self.stable_since = Some((count, now));
                        false
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_mapping() {
        assert_eq!(resource_type("image"), Some(ResourceType::Image));
        assert_eq!(resource_type("Font"), Some(ResourceType::Font));
        assert_eq!(resource_type("MEDIA"), Some(ResourceType::Media));
        assert_eq!(resource_type("xhr"), Some(ResourceType::Xhr));
        assert_eq!(resource_type("hologram"), None);
    }

    fn sample(state: &str, href: &str, resources: Option<u64>) -> LoadSample {
        LoadSample {
            ready_state: Some(state.to_string()),
            href: Some(href.to_string()),
            resources,
        }
    }

    #[test]
    fn test_load_tracker_waits_through_failed_polls() {
        let mut tracker = LoadTracker::new(WaitUntil::Load);
        let now = Instant::now();

        // Execution context destroyed by a client-side redirect
        assert!(!tracker.observe(&LoadSample::default(), now));
        assert!(!tracker.observe(
            &LoadSample {
                href: Some("https://example.com/next".to_string()),
                ..LoadSample::default()
            },
            now
        ));
        assert!(!tracker.observe(&sample("complete", "about:blank", None), now));
        assert!(tracker.observe(&sample("complete", "https://example.com/next", None), now));
    }

    #[test]
    fn test_load_tracker_dom_ready() {
        let mut tracker = LoadTracker::new(WaitUntil::DomContentLoaded);
        let now = Instant::now();
        assert!(!tracker.observe(&sample("loading", "https://example.com/", None), now));
        assert!(tracker.observe(&sample("interactive", "https://example.com/", None), now));
    }

    #[test]
    fn test_load_tracker_network_idle_needs_stable_window() {
        let mut tracker = LoadTracker::new(WaitUntil::NetworkIdle);
        let start = Instant::now();
        let url = "https://example.com/";

        assert!(!tracker.observe(&sample("complete", url, Some(3)), start));
        assert!(!tracker.observe(&sample("complete", url, Some(5)), start + Duration::from_millis(100)));
        assert!(!tracker.observe(&sample("complete", url, Some(5)), start + Duration::from_millis(400)));
        // A failed count restarts the window
        assert!(!tracker.observe(&sample("complete", url, None), start + Duration::from_millis(700)));
        assert!(!tracker.observe(&sample("complete", url, Some(5)), start + Duration::from_millis(800)));
        assert!(tracker.observe(&sample("complete", url, Some(5)), start + Duration::from_millis(1300)));
    }

    #[test]
    fn test_missing_configured_executable() {
        let result = find_browser_executable(Some("/nonexistent/chromium-binary"));
        assert!(matches!(result, Err(EngineError::BrowserLaunch(_))));
    }

    #[test]
    fn test_existing_configured_executable() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        let found = find_browser_executable(Some(path)).unwrap();
        assert_eq!(found.as_deref(), Some(file.path()));
    }

    #[tokio::test]
    async fn test_launch_fails_without_executable() {
        let settings = CrawlSettings::new("https://example.com/");
        let options = RenderedOptions {
            executable_path: Some("/nonexistent/chromium-binary".to_string()),
            ..RenderedOptions::default()
        };
        assert!(matches!(
            RenderedFetcher::launch(&settings, &options).await,
            Err(EngineError::BrowserLaunch(_))
        ));
    }

    #[tokio::test]
    #[ignore = "requires a local Chromium install"]
    async fn test_render_and_release() {
        let settings = CrawlSettings::new("https://example.com/");
        let options = RenderedOptions {
            settle_ms: 0,
            readiness_timeout_ms: 500,
            capture_screenshot: true,
            ..RenderedOptions::default()
        };
        let fetcher = RenderedFetcher::launch(&settings, &options).await.unwrap();

        let url = Url::parse("https://example.com/").unwrap();
        let document = fetcher.fetch(&url).await.unwrap();
        assert!(document.rendered);
        assert!(document.body.contains("<html"));
        assert!(document.screenshot.is_some());

        fetcher.release().await;
        assert!(matches!(
            fetcher.fetch(&url).await,
            Err(FetchError::Render(_))
        ));
    }
}
