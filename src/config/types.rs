use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Complete configuration for one crawl job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    pub crawl: CrawlSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub rendered: RenderedOptions,
}

impl CrawlConfig {
    /// Builds a configuration with defaults for everything except the start URL
    pub fn for_start_url(start_url: impl Into<String>) -> Self {
        Self {
            crawl: CrawlSettings::new(start_url),
            retry: RetrySettings::default(),
            rendered: RenderedOptions::default(),
        }
    }
}

/// Which fetch strategy a job uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlMode {
    /// Plain HTTP fetch, no script execution
    #[default]
    #[serde(alias = "fast")]
    Static,

    /// Headless browser fetch with script execution
    #[serde(alias = "js")]
    Rendered,
}

impl CrawlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Rendered => "rendered",
        }
    }
}

impl fmt::Display for CrawlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Traversal bounds and request identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSettings {
    /// Page the crawl starts from (depth 0)
    #[serde(rename = "start-url")]
    pub start_url: String,

    #[serde(default)]
    pub mode: CrawlMode,

    /// Maximum link distance from the start URL
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum number of pages committed per run
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: usize,

    /// Maximum number of fetches in flight at once
    #[serde(rename = "concurrency-limit", default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Pause applied after every completed fetch
    #[serde(
        rename = "politeness-delay-seconds",
        default = "default_politeness_delay"
    )]
    pub politeness_delay_seconds: f64,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    #[serde(rename = "respect-robots", default = "default_true")]
    pub respect_robots: bool,

    /// Per-request timeout for the static strategy
    #[serde(rename = "timeout-seconds", default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Only the first N internal links of each page are followed
    #[serde(rename = "max-links-per-page", default)]
    pub max_links_per_page: Option<usize>,
}

impl CrawlSettings {
    pub fn new(start_url: impl Into<String>) -> Self {
        Self {
            start_url: start_url.into(),
            mode: CrawlMode::default(),
            max_depth: default_max_depth(),
            max_pages: default_max_pages(),
            concurrency_limit: default_concurrency_limit(),
            politeness_delay_seconds: default_politeness_delay(),
            user_agent: default_user_agent(),
            respect_robots: true,
            timeout_seconds: default_timeout_seconds(),
            max_links_per_page: None,
        }
    }

    pub fn politeness_delay(&self) -> Duration {
        Duration::from_secs_f64(self.politeness_delay_seconds.max(0.0))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Backoff parameters for transient fetch failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(rename = "initial-backoff-ms", default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(rename = "max-backoff-ms", default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Screenshot area for rendered captures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenshotType {
    #[default]
    Viewport,
    #[serde(alias = "full-page")]
    Fullpage,
}

/// Page lifecycle point a rendered fetch waits for after navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    Load,
    #[serde(alias = "dom-content-loaded", alias = "dom-ready")]
    DomContentLoaded,
    #[default]
    #[serde(alias = "network-idle")]
    NetworkIdle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Options that only apply to the rendered strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedOptions {
    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(rename = "capture-screenshot", default)]
    pub capture_screenshot: bool,

    #[serde(rename = "screenshot-type", default)]
    pub screenshot_type: ScreenshotType,

    #[serde(default)]
    pub viewport: Viewport,

    #[serde(rename = "wait-until", default)]
    pub wait_until: WaitUntil,

    /// Upper bound for one whole rendered fetch
    #[serde(rename = "timeout-ms", default = "default_render_timeout_ms")]
    pub timeout_ms: u64,

    /// CDP resource types (e.g. "image", "font", "media") aborted before they load
    #[serde(
        rename = "blocked-resource-types",
        default = "default_blocked_resource_types"
    )]
    pub blocked_resource_types: Vec<String>,

    /// Hydration pause after the wait condition is met
    #[serde(rename = "settle-ms", default = "default_settle_ms")]
    pub settle_ms: u64,

    #[serde(rename = "wait-for-selector", default)]
    pub wait_for_selector: Option<String>,

    #[serde(
        rename = "readiness-min-text-length",
        default = "default_readiness_min_text_length"
    )]
    pub readiness_min_text_length: usize,

    #[serde(
        rename = "readiness-timeout-ms",
        default = "default_readiness_timeout_ms"
    )]
    pub readiness_timeout_ms: u64,

    /// Browser binary; falls back to CHROMIUM_PATH and well-known install paths
    #[serde(rename = "executable-path", default)]
    pub executable_path: Option<String>,
}

impl Default for RenderedOptions {
    fn default() -> Self {
        Self {
            headless: true,
            capture_screenshot: false,
            screenshot_type: ScreenshotType::default(),
            viewport: Viewport::default(),
            wait_until: WaitUntil::default(),
            timeout_ms: default_render_timeout_ms(),
            blocked_resource_types: default_blocked_resource_types(),
            settle_ms: default_settle_ms(),
            wait_for_selector: None,
            readiness_min_text_length: default_readiness_min_text_length(),
            readiness_timeout_ms: default_readiness_timeout_ms(),
            executable_path: None,
        }
    }
}

impl RenderedOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }
}

fn default_true() -> bool {
    true
}

fn default_max_depth() -> u32 {
    3
}

fn default_max_pages() -> usize {
    1000
}

fn default_concurrency_limit() -> usize {
    10
}

fn default_politeness_delay() -> f64 {
    1.0
}

fn default_user_agent() -> String {
    "SEO-SaaS-Bot/1.0".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    2000
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_render_timeout_ms() -> u64 {
    30_000
}

fn default_blocked_resource_types() -> Vec<String> {
    vec!["image".to_string(), "font".to_string(), "media".to_string()]
}

fn default_settle_ms() -> u64 {
    3000
}

fn default_readiness_min_text_length() -> usize {
    100
}

fn default_readiness_timeout_ms() -> u64 {
    5000
}
