use crate::config::types::{CrawlConfig, CrawlSettings, RenderedOptions, RetrySettings};
use crate::ConfigError;
use url::Url;

/// Resource types the rendered strategy knows how to block
pub const KNOWN_RESOURCE_TYPES: &[&str] = &[
    "document",
    "stylesheet",
    "image",
    "media",
    "font",
    "script",
    "texttrack",
    "xhr",
    "fetch",
    "eventsource",
    "websocket",
    "manifest",
    "other",
];

/// Validates the entire configuration
pub fn validate(config: &CrawlConfig) -> Result<(), ConfigError> {
    validate_crawl_settings(&config.crawl)?;
    validate_retry_settings(&config.retry)?;
    validate_rendered_options(&config.rendered)?;
    Ok(())
}

/// Validates traversal bounds and request identity
fn validate_crawl_settings(settings: &CrawlSettings) -> Result<(), ConfigError> {
    validate_start_url(&settings.start_url)?;

    if settings.max_pages < 1 {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1, got 0".to_string(),
        ));
    }

    if settings.concurrency_limit < 1 || settings.concurrency_limit > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency_limit must be between 1 and 100, got {}",
            settings.concurrency_limit
        )));
    }

    if !settings.politeness_delay_seconds.is_finite() || settings.politeness_delay_seconds < 0.0 {
        return Err(ConfigError::Validation(format!(
            "politeness_delay_seconds must be a non-negative number, got {}",
            settings.politeness_delay_seconds
        )));
    }

    if settings.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if settings.timeout_seconds == 0 {
        return Err(ConfigError::Validation(
            "timeout_seconds must be > 0".to_string(),
        ));
    }

    if settings.max_links_per_page == Some(0) {
        return Err(ConfigError::Validation(
            "max_links_per_page must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates that the start URL is an absolute http(s) URL with a host
fn validate_start_url(start_url: &str) -> Result<(), ConfigError> {
    let url = Url::parse(start_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid start_url '{}': {}", start_url, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "start_url '{}' must use http or https",
            start_url
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "start_url '{}' has no host",
            start_url
        )));
    }

    Ok(())
}

fn validate_retry_settings(settings: &RetrySettings) -> Result<(), ConfigError> {
    if settings.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "max_attempts must be >= 1".to_string(),
        ));
    }

    if settings.max_backoff_ms < settings.initial_backoff_ms {
        return Err(ConfigError::Validation(format!(
            "max_backoff_ms ({}) must be >= initial_backoff_ms ({})",
            settings.max_backoff_ms, settings.initial_backoff_ms
        )));
    }

    Ok(())
}

/// Validates rendered-mode options
///
/// These are checked even for static jobs so a config can be switched between
/// modes without surprises.
fn validate_rendered_options(options: &RenderedOptions) -> Result<(), ConfigError> {
    if options.viewport.width == 0 || options.viewport.height == 0 {
        return Err(ConfigError::Validation(format!(
            "viewport must be non-zero, got {}x{}",
            options.viewport.width, options.viewport.height
        )));
    }

    if options.timeout_ms == 0 {
        return Err(ConfigError::Validation("timeout_ms must be > 0".to_string()));
    }

    if options.readiness_timeout_ms > options.timeout_ms {
        return Err(ConfigError::Validation(format!(
            "readiness_timeout_ms ({}) cannot exceed timeout_ms ({})",
            options.readiness_timeout_ms, options.timeout_ms
        )));
    }

    for resource_type in &options.blocked_resource_types {
        let lowered = resource_type.to_ascii_lowercase();
        if !KNOWN_RESOURCE_TYPES.contains(&lowered.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Unknown blocked resource type '{}'",
                resource_type
            )));
        }
    }

    if let Some(selector) = &options.wait_for_selector {
        if selector.trim().is_empty() {
            return Err(ConfigError::Validation(
                "wait_for_selector cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}
