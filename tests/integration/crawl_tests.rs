//! End-to-end static crawls against mock HTTP servers

use async_trait::async_trait;
use seo_crawl_engine::config::CrawlConfig;
use seo_crawl_engine::crawler::{FetchError, FetchStrategy, FetchedDocument};
use seo_crawl_engine::output::{EdgeKind, Termination};
use seo_crawl_engine::robots::RobotsTxtRules;
use seo_crawl_engine::{CrawlJob, JobStatus};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a fast static-mode configuration rooted at the mock server
fn create_test_config(base_url: &str, max_depth: u32, max_pages: usize) -> CrawlConfig {
    let mut config = CrawlConfig::for_start_url(format!("{}/", base_url));
    config.crawl.max_depth = max_depth;
    config.crawl.max_pages = max_pages;
    config.crawl.concurrency_limit = 4;
    config.crawl.politeness_delay_seconds = 0.0;
    config.crawl.timeout_seconds = 5;
    config.crawl.user_agent = "TestBot/1.0".to_string();
    config.retry.initial_backoff_ms = 1;
    config.retry.max_backoff_ms = 5;
    config
}

fn html_page(title: &str, links: &[String]) -> ResponseTemplate {
    let anchors: String = links
        .iter()
        .map(|href| format!("<a href=\"{}\">Link to {}</a>\n", href, href))
        .collect();
    let body = format!(
        "<html lang=\"en\"><head><title>{}</title></head><body>\
         <h1>{}</h1><p>Some readable content for the {} page.</p>{}</body></html>",
        title, title, title, anchors
    );
    ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}

async fn mount_page(server: &MockServer, page_path: &str, title: &str, links: &[String]) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(html_page(title, links))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_internal_and_external_links() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        "Home",
        &[
            format!("{}/one", base),
            "/two".to_string(),
            "three".to_string(),
            "https://external.example.org/elsewhere".to_string(),
        ],
    )
    .await;
    for (page_path, title) in [("/one", "One"), ("/two", "Two"), ("/three", "Three")] {
        mount_page(&server, page_path, title, &[format!("{}/deeper", base)]).await;
    }
    Mock::given(method("GET"))
        .and(path("/deeper"))
        .respond_with(html_page("Deeper", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let job = CrawlJob::new(create_test_config(&base, 1, 10)).unwrap();
    let outcome = job.run().await;
    let result = &outcome.result;

    assert_eq!(outcome.snapshot.status, JobStatus::Completed);
    assert_eq!(result.termination, Termination::Drained);
    assert_eq!(result.pages.len(), 4);
    assert!(result.pages.iter().all(|p| p.depth <= 1));
    assert!(result.errors.is_empty());

    let home = result.page(&format!("{}/", base)).unwrap();
    assert_eq!(home.title.as_deref(), Some("Home"));
    assert_eq!(home.h1.as_deref(), Some("Home"));
    assert_eq!(home.language, "en");
    assert_eq!(home.links.len(), 3);
    assert_eq!(home.external_links.len(), 1);
    assert_eq!(
        home.external_links[0].url,
        "https://external.example.org/elsewhere"
    );

    let edges = result.link_edges();
    let count = |kind| edges.iter().filter(|e| e.kind == kind).count();
    assert_eq!(count(EdgeKind::External), 1);
    assert_eq!(count(EdgeKind::Internal), 3);
    // Each depth-1 page links to /deeper, which is beyond max depth
    assert_eq!(count(EdgeKind::Unresolved), 3);

    assert_eq!(outcome.snapshot.pages_discovered, 4);
    assert_eq!(outcome.snapshot.links_found, 7);
}

#[tokio::test]
async fn test_server_error_on_every_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let outcome = CrawlJob::new(create_test_config(&server.uri(), 2, 10))
        .unwrap()
        .run()
        .await;

    assert_eq!(outcome.snapshot.status, JobStatus::Completed);
    assert_eq!(outcome.snapshot.pages_discovered, 1);
    assert_eq!(outcome.snapshot.pages_crawled, 0);
    assert_eq!(outcome.snapshot.pages_failed, 1);
    assert!(outcome.result.pages.is_empty());

    let error = &outcome.result.errors[0];
    assert_eq!(error.attempts, 3);
    assert!(error.message.contains("500"));
}

#[tokio::test]
async fn test_transient_failures_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mount_page(&server, "/", "Recovered", &[]).await;

    let outcome = CrawlJob::new(create_test_config(&server.uri(), 0, 10))
        .unwrap()
        .run()
        .await;

    assert_eq!(outcome.snapshot.status, JobStatus::Completed);
    assert_eq!(outcome.result.pages.len(), 1);
    assert!(outcome.result.errors.is_empty());
    assert_eq!(outcome.result.pages[0].title.as_deref(), Some("Recovered"));
}

#[tokio::test]
async fn test_client_error_not_retried() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/", "Home", &["/gone".to_string()]).await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = CrawlJob::new(create_test_config(&base, 1, 10))
        .unwrap()
        .run()
        .await;

    assert_eq!(outcome.snapshot.status, JobStatus::Completed);
    assert_eq!(outcome.result.pages.len(), 1);
    assert_eq!(outcome.result.errors.len(), 1);
    assert_eq!(outcome.result.errors[0].attempts, 1);
    assert_eq!(outcome.result.errors[0].url, format!("{}/gone", base));
}

#[tokio::test]
async fn test_page_reached_by_many_paths_fetched_once() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", "Home", &["/a".into(), "/b".into(), "/c".into()]).await;
    for page_path in ["/a", "/b", "/c"] {
        mount_page(
            &server,
            page_path,
            page_path,
            &[
                "/shared".into(),
                "/shared/".into(),
                "/shared?utm_source=x".into(),
                "/shared#section".into(),
                "/".into(),
            ],
        )
        .await;
    }
    Mock::given(method("GET"))
        .and(path("/shared"))
        .respond_with(html_page("Shared", &[]))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = CrawlJob::new(create_test_config(&base, 3, 50))
        .unwrap()
        .run()
        .await;

    let result = &outcome.result;
    assert_eq!(result.pages.len(), 5);
    let fingerprints: HashSet<_> = result.pages.iter().map(|p| &p.url_fingerprint).collect();
    assert_eq!(fingerprints.len(), result.pages.len());
}

#[tokio::test]
async fn test_max_pages_respected() {
    let server = MockServer::start().await;
    let base = server.uri();

    let children: Vec<String> = (0..30).map(|i| format!("/p{}", i)).collect();
    mount_page(&server, "/", "Home", &children).await;
    for child in &children {
        mount_page(&server, child, child, &[]).await;
    }

    let outcome = CrawlJob::new(create_test_config(&base, 2, 8))
        .unwrap()
        .run()
        .await;

    assert_eq!(outcome.result.pages.len(), 8);
    assert_eq!(outcome.result.termination, Termination::PageLimit);
    let snapshot = &outcome.snapshot;
    assert!(snapshot.pages_crawled + snapshot.pages_failed <= snapshot.pages_discovered);
}

#[tokio::test]
async fn test_non_page_resources_not_fetched() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        "Home",
        &["/report.pdf".into(), "/logo.png".into(), "/about".into()],
    )
    .await;
    mount_page(&server, "/about", "About", &[]).await;
    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF", "application/pdf"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = CrawlJob::new(create_test_config(&base, 1, 10))
        .unwrap()
        .run()
        .await;

    assert_eq!(outcome.result.pages.len(), 2);
    assert!(outcome.result.errors.is_empty());
}

#[tokio::test]
async fn test_robots_rules_skip_disallowed_pages() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", "Home", &["/private/area".into(), "/public".into()]).await;
    mount_page(&server, "/public", "Public", &[]).await;
    Mock::given(method("GET"))
        .and(path("/private/area"))
        .respond_with(html_page("Private", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&base, 1, 10);
    let rules = RobotsTxtRules::from_content(
        "User-agent: *\nDisallow: /private\n",
        config.crawl.user_agent.clone(),
    );
    let outcome = CrawlJob::new(config)
        .unwrap()
        .with_robots(Arc::new(rules))
        .run()
        .await;

    assert_eq!(outcome.result.pages.len(), 2);
    assert!(outcome.result.errors.is_empty());
}

/// Serves an endless binary tree of pages and counts releases
#[derive(Default)]
struct SlowTree {
    fetches: AtomicUsize,
    releases: AtomicUsize,
}

#[async_trait]
impl FetchStrategy for SlowTree {
    fn name(&self) -> &'static str {
        "slow-tree"
    }

    async fn fetch(&self, url: &Url) -> Result<FetchedDocument, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;

        let prefix = url.path().trim_end_matches('/');
        let body = format!(
            "<html><body><p>node</p><a href=\"{0}/l\">l</a><a href=\"{0}/r\">r</a></body></html>",
            prefix
        );
        Ok(FetchedDocument {
            final_url: url.clone(),
            status_code: 200,
            content_type: Some("text/html".to_string()),
            body,
            elapsed: Duration::from_millis(5),
            screenshot: None,
            js_errors: Vec::new(),
            rendered: false,
        })
    }

    async fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancellation_keeps_committed_pages() {
    let mut config = CrawlConfig::for_start_url("https://tree.example.com/");
    config.crawl.max_depth = 10;
    config.crawl.max_pages = 100;
    config.crawl.concurrency_limit = 1;
    config.crawl.politeness_delay_seconds = 0.0;

    let job = CrawlJob::new(config).unwrap();
    let handle = job.handle();
    let mut progress = handle.subscribe();

    let canceller = tokio::spawn(async move {
        let mut observed = Vec::new();
        while progress.changed().await.is_ok() {
            let crawled = progress.borrow_and_update().pages_crawled;
            observed.push(crawled);
            if crawled >= 50 && !handle.is_cancelled() {
                handle.cancel();
            }
            if progress.borrow().status.is_terminal() {
                break;
            }
        }
        observed
    });

    let strategy = Arc::new(SlowTree::default());
    let outcome = job.run_with(strategy.clone()).await;
    let observed = canceller.await.unwrap();

    assert_eq!(outcome.snapshot.status, JobStatus::Cancelled);
    assert_eq!(outcome.result.termination, Termination::Cancelled);
    assert!(outcome.snapshot.pages_crawled >= 50);
    assert!(outcome.snapshot.pages_crawled < 100);
    assert!(observed.windows(2).all(|w| w[1] >= w[0]));
    assert_eq!(strategy.releases.load(Ordering::SeqCst), 1);
    assert_eq!(
        strategy.fetches.load(Ordering::SeqCst),
        outcome.snapshot.pages_discovered
    );
}
