//! Rendered-mode crawls
//!
//! Tests that drive a real browser need Chromium on the machine (or
//! `CHROMIUM_PATH`) and are ignored by default; run them with
//! `cargo test -- --ignored`.

use seo_crawl_engine::config::{CrawlConfig, CrawlMode, WaitUntil};
use seo_crawl_engine::{CrawlJob, JobStatus};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_rendered_config(base_url: &str) -> CrawlConfig {
    let mut config = CrawlConfig::for_start_url(format!("{}/", base_url));
    config.crawl.mode = CrawlMode::Rendered;
    config.crawl.max_depth = 0;
    config.crawl.max_pages = 1;
    config.crawl.politeness_delay_seconds = 0.0;
    config.rendered.settle_ms = 0;
    config.rendered.readiness_timeout_ms = 1000;
    config.rendered.wait_until = WaitUntil::Load;
    config
}

#[tokio::test]
async fn test_missing_browser_fails_job() {
    let mut config = create_rendered_config("https://example.com");
    config.rendered.executable_path = Some("/nonexistent/chromium-binary".to_string());

    let job = CrawlJob::new(config).unwrap();
    let outcome = job.run().await;

    assert_eq!(outcome.snapshot.status, JobStatus::Failed);
    assert!(outcome
        .snapshot
        .error_message
        .as_deref()
        .unwrap()
        .contains("/nonexistent/chromium-binary"));
    assert_eq!(outcome.snapshot.pages_discovered, 0);
    assert!(outcome.result.pages.is_empty());
    assert!(outcome.snapshot.finished_at.is_some());
}

#[tokio::test]
#[ignore = "requires a local Chromium install"]
async fn test_blocked_images_never_requested() {
    let server = MockServer::start().await;
    let images: String = (0..5)
        .map(|i| format!("<img src=\"/img/photo{}.png\" alt=\"photo {}\">", i, i))
        .collect();
    let body = format!(
        "<html lang=\"en\"><head><title>Gallery</title></head><body>\
         <h1>Gallery</h1><p>A page with several photos and a short description.</p>{}\
         <script>document.body.insertAdjacentHTML('beforeend', '<p id=\"late\">Added by script</p>');</script>\
         </body></html>",
        images
    );

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/img/.*"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 16], "image/png"))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = create_rendered_config(&server.uri());
    config.rendered.blocked_resource_types = vec!["image".to_string()];

    let outcome = CrawlJob::new(config).unwrap().run().await;

    assert_eq!(outcome.snapshot.status, JobStatus::Completed);
    assert_eq!(outcome.result.pages.len(), 1);

    let page = &outcome.result.pages[0];
    assert!(page.word_count > 0);
    assert!(page.text_content.contains("Added by script"));
    assert!(page.rendered_html.is_some());
}

#[tokio::test]
#[ignore = "requires a local Chromium install"]
async fn test_script_errors_captured() {
    let server = MockServer::start().await;
    let body = "<html><head><title>Broken</title></head><body><p>Content</p>\
                <script>console.error('widget failed'); undefinedFunction();</script>\
                </body></html>";
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(&server)
        .await;

    let outcome = CrawlJob::new(create_rendered_config(&server.uri()))
        .unwrap()
        .run()
        .await;

    let page = &outcome.result.pages[0];
    assert!(page.js_errors.iter().any(|e| e.contains("widget failed")));
    assert!(page.js_errors.iter().any(|e| e.contains("undefinedFunction")));
}
