//! Page extraction
//!
//! Turns one fetched document into a [`PageRecord`]: on-page SEO fields, visible
//! text, language, and the internal/external links to follow or record.
//! Extraction never fails; anything missing from the markup comes back as `None`.

use crate::crawler::language::resolve_language;
use crate::crawler::strategy::FetchedDocument;
use crate::output::{OutgoingLink, PageRecord};
use crate::url::{content_fingerprint, fingerprint, is_internal, normalize};
use chrono::Utc;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::{BTreeMap, HashSet};
use url::Url;

/// Elements whose text content is never visible
const HIDDEN_TEXT_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Schemes that look like links but never lead to a page
const SKIPPED_HREF_PREFIXES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// Everything pulled out of an HTML document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<String>,
    pub h1: Option<String>,
    pub canonical_url: Option<String>,
    pub hreflang: BTreeMap<String, String>,
    pub html_lang: Option<String>,
    pub text: String,
    pub links: Vec<OutgoingLink>,
    pub external_links: Vec<OutgoingLink>,
}

/// Builds the page record for a fetched document
///
/// `url` is the normalized URL the page was requested as and `origin` the
/// crawl's start URL, which decides what counts as an internal link.
pub fn extract_page(url: &Url, depth: u32, origin: &Url, document: FetchedDocument) -> PageRecord {
    let parsed = if document.is_html() {
        parse_html(&document.body, &document.final_url, origin)
    } else {
        ParsedPage::default()
    };

    let language = resolve_language(parsed.html_lang.as_deref(), &parsed.text);
    let word_count = parsed.text.split_whitespace().count();

    tracing::trace!(
        "Extracted {}: {} words, {} internal / {} external links",
        url,
        word_count,
        parsed.links.len(),
        parsed.external_links.len()
    );

    PageRecord {
        url: url.to_string(),
        url_fingerprint: fingerprint(url),
        final_url: document.final_url.to_string(),
        canonical_url: parsed.canonical_url,
        status_code: document.status_code,
        content_type: document.content_type,
        title: parsed.title,
        meta_description: parsed.meta_description,
        meta_keywords: parsed.meta_keywords,
        h1: parsed.h1,
        content_fingerprint: content_fingerprint(&parsed.text),
        text_content: parsed.text,
        word_count,
        language,
        hreflang: parsed.hreflang,
        depth,
        links: parsed.links,
        external_links: parsed.external_links,
        screenshot: document.screenshot,
        rendered_html: document.rendered.then_some(document.body),
        js_errors: document.js_errors,
        elapsed_ms: document.elapsed.as_millis() as u64,
        fetched_at: Utc::now(),
    }
}

/// Parses HTML content and extracts SEO fields and links
///
/// # Link Extraction Rules
///
/// **Include:** every `<a href>`, resolved against `<base href>` when present,
/// otherwise against `page_url`. `rel="nofollow"` links are included.
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links and data URIs
/// - fragment-only links (same page anchors)
/// - anything that does not normalize to an http(s) URL
///
/// # Example
///
/// ```
/// use seo_crawl_engine::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let page_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &page_url, &page_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].url, "https://example.com/page");
/// ```
pub fn parse_html(html: &str, page_url: &Url, origin: &Url) -> ParsedPage {
    let document = Html::parse_document(html);
    let base = base_url(&document, page_url);

    let (links, external_links) = extract_links(&document, &base, origin);

    ParsedPage {
        title: first_text(&document, "title"),
        meta_description: meta_content(&document, "description"),
        meta_keywords: meta_content(&document, "keywords"),
        h1: first_text(&document, "h1"),
        canonical_url: extract_canonical(&document, &base),
        hreflang: extract_hreflang(&document, &base),
        html_lang: extract_html_lang(&document),
        text: extract_visible_text(&document),
        links,
        external_links,
    }
}

/// Resolves the document's `<base href>` if it has a usable one
fn base_url(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|el| el.value().attr("href"))
                .and_then(|href| page_url.join(href.trim()).ok())
        })
        .unwrap_or_else(|| page_url.clone())
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<Vec<_>>().join(" ")))
        .filter(|s| !s.is_empty())
}

fn meta_content(document: &Html, name: &str) -> Option<String> {
    let selector = Selector::parse("meta[name][content]").ok()?;
    document
        .select(&selector)
        .find(|el| {
            el.value()
                .attr("name")
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
        })
        .and_then(|el| el.value().attr("content"))
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty())
}

fn extract_canonical(document: &Html, base: &Url) -> Option<String> {
    let selector = Selector::parse("link[rel][href]").ok()?;
    document
        .select(&selector)
        .find(|el| has_rel(el, "canonical"))
        .and_then(|el| el.value().attr("href"))
        .map(|href| resolve_or_keep(href, base))
}

fn extract_hreflang(document: &Html, base: &Url) -> BTreeMap<String, String> {
    let mut hreflang = BTreeMap::new();
    let Ok(selector) = Selector::parse("link[hreflang][href]") else {
        return hreflang;
    };

    for element in document.select(&selector) {
        if !has_rel(&element, "alternate") {
            continue;
        }
        if let (Some(lang), Some(href)) = (element.value().attr("hreflang"), element.value().attr("href")) {
            let lang = lang.trim();
            if !lang.is_empty() {
                hreflang.insert(lang.to_string(), resolve_or_keep(href, base));
            }
        }
    }

    hreflang
}

fn extract_html_lang(document: &Html) -> Option<String> {
    document
        .root_element()
        .value()
        .attr("lang")
        .map(|lang| lang.trim().to_string())
        .filter(|lang| !lang.is_empty())
}

/// Collects text nodes outside script/style/noscript/template, whitespace-collapsed
fn extract_visible_text(document: &Html) -> String {
    let mut pieces: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_TEXT_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }

        let trimmed = text.trim();
        if !trimmed.is_empty() {
            pieces.push(trimmed);
        }
    }

    collapse_whitespace(&pieces.join(" "))
}

/// Splits `<a href>` targets into internal and external links, deduplicated by target
fn extract_links(document: &Html, base: &Url, origin: &Url) -> (Vec<OutgoingLink>, Vec<OutgoingLink>) {
    let mut internal = Vec::new();
    let mut external = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    let Ok(selector) = Selector::parse("a[href]") else {
        return (internal, external);
    };

    for element in document.select(&selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if should_skip_href(href) {
            continue;
        }

        let target = match normalize(href, base) {
            Ok(url) => url,
            Err(e) => {
                tracing::trace!("Skipping link {:?}: {}", href, e);
                continue;
            }
        };

        if !seen.insert(target.to_string()) {
            continue;
        }

        let link = OutgoingLink {
            url: target.to_string(),
            anchor_text: anchor_text(&element),
        };

        if is_internal(&target, origin) {
            internal.push(link);
        } else {
            external.push(link);
        }
    }

    (internal, external)
}

fn should_skip_href(href: &str) -> bool {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return true;
    }

    let lowered = href.to_ascii_lowercase();
    SKIPPED_HREF_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
}

/// Anchor text of a link, falling back to the alt text of an image inside it
fn anchor_text(element: &ElementRef) -> Option<String> {
    let text = collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));
    if !text.is_empty() {
        return Some(text);
    }

    let img = Selector::parse("img[alt]").ok()?;
    element
        .select(&img)
        .find_map(|img| img.value().attr("alt"))
        .map(collapse_whitespace)
        .filter(|alt| !alt.is_empty())
}

fn has_rel(element: &ElementRef, rel: &str) -> bool {
    element
        .value()
        .attr("rel")
        .is_some_and(|value| value.split_whitespace().any(|r| r.eq_ignore_ascii_case(rel)))
}

fn resolve_or_keep(href: &str, base: &Url) -> String {
    let href = href.trim();
    base.join(href)
        .map(|url| url.to_string())
        .unwrap_or_else(|_| href.to_string())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn page_url() -> Url {
        Url::parse("https://example.com/page").unwrap()
    }

    fn parse(html: &str) -> ParsedPage {
        let url = page_url();
        parse_html(html, &url, &url)
    }

    fn document(body: &str, content_type: &str) -> FetchedDocument {
        FetchedDocument {
            final_url: page_url(),
            status_code: 200,
            content_type: Some(content_type.to_string()),
            body: body.to_string(),
            elapsed: Duration::from_millis(12),
            screenshot: None,
            js_errors: Vec::new(),
            rendered: false,
        }
    }

    #[test]
    fn test_extract_seo_fields() {
        let html = r#"<html lang="en-GB"><head>
            <title>  Test   Page </title>
            <meta name="description" content="A page about tests">
            <meta name="Keywords" content="tests, rust">
            <link rel="canonical" href="/canonical">
            <link rel="alternate" hreflang="de" href="https://example.com/de/page">
            <link rel="alternate" hreflang="x-default" href="/page">
            </head><body><h1>Main <em>Heading</em></h1><h1>Second</h1></body></html>"#;

        let parsed = parse(html);
        assert_eq!(parsed.title.as_deref(), Some("Test Page"));
        assert_eq!(parsed.meta_description.as_deref(), Some("A page about tests"));
        assert_eq!(parsed.meta_keywords.as_deref(), Some("tests, rust"));
        assert_eq!(parsed.h1.as_deref(), Some("Main Heading"));
        assert_eq!(
            parsed.canonical_url.as_deref(),
            Some("https://example.com/canonical")
        );
        assert_eq!(parsed.hreflang.len(), 2);
        assert_eq!(parsed.hreflang["de"], "https://example.com/de/page");
        assert_eq!(parsed.hreflang["x-default"], "https://example.com/page");
        assert_eq!(parsed.html_lang.as_deref(), Some("en-GB"));
    }

    #[test]
    fn test_missing_fields_are_none() {
        let parsed = parse("<html><head></head><body></body></html>");
        assert_eq!(parsed.title, None);
        assert_eq!(parsed.meta_description, None);
        assert_eq!(parsed.h1, None);
        assert_eq!(parsed.canonical_url, None);
        assert!(parsed.hreflang.is_empty());
        assert_eq!(parsed.html_lang, None);
        assert!(parsed.text.is_empty());
    }

    #[test]
    fn test_visible_text_skips_scripts_and_styles() {
        let html = r#"<html><head><style>body { color: red; }</style></head><body>
            <p>Hello   world</p><script>var hidden = 1;</script>
            <noscript>Enable JS</noscript><div>Second <b>block</b></div></body></html>"#;

        let parsed = parse(html);
        assert_eq!(parsed.text, "Hello world Second block");
    }

    #[test]
    fn test_extract_relative_link() {
        let parsed = parse(r#"<html><body><a href="other">Link</a></body></html>"#);
        assert_eq!(parsed.links.len(), 1);
        assert_eq!(parsed.links[0].url, "https://example.com/other");
        assert_eq!(parsed.links[0].anchor_text.as_deref(), Some("Link"));
    }

    #[test]
    fn test_external_links_separated() {
        let parsed = parse(
            r#"<html><body>
            <a href="/a">A</a>
            <a href="https://other.com/page">Other</a>
            <a href="https://blog.example.com/">Blog</a>
            </body></html>"#,
        );
        assert_eq!(parsed.links.len(), 1);
        assert_eq!(parsed.external_links.len(), 2);
        assert_eq!(parsed.external_links[0].url, "https://other.com/page");
    }

    #[test]
    fn test_skipped_links() {
        let parsed = parse(
            r##"<html><body>
            <a href="javascript:void(0)">JS</a>
            <a href="JavaScript:alert(1)">JS</a>
            <a href="mailto:test@example.com">Email</a>
            <a href="tel:+1234567890">Call</a>
            <a href="data:text/html,<h1>Test</h1>">Data</a>
            <a href="/file.pdf" download>Download</a>
            <a href="#section">Jump</a>
            <a href="">Empty</a>
            <a href="/valid">Valid</a>
            </body></html>"##,
        );
        assert_eq!(parsed.links.len(), 1);
        assert_eq!(parsed.links[0].url, "https://example.com/valid");
    }

    #[test]
    fn test_links_deduplicated_after_normalization() {
        let parsed = parse(
            r#"<html><body>
            <a href="/about">About</a>
            <a href="/about/">About again</a>
            <a href="/about#team">Team</a>
            <a href="https://EXAMPLE.com/about?utm_source=nav">Tracked</a>
            </body></html>"#,
        );
        assert_eq!(parsed.links.len(), 1);
        assert_eq!(parsed.links[0].anchor_text.as_deref(), Some("About"));
    }

    #[test]
    fn test_empty_anchor_text_is_none_or_image_alt() {
        let parsed = parse(
            r#"<html><body>
            <a href="/blank">   </a>
            <a href="/logo"><img src="logo.png" alt="Company logo"></a>
            </body></html>"#,
        );
        assert_eq!(parsed.links[0].anchor_text, None);
        assert_eq!(parsed.links[1].anchor_text.as_deref(), Some("Company logo"));
    }

    #[test]
    fn test_base_href_used_for_resolution() {
        let parsed = parse(
            r#"<html><head><base href="https://example.com/docs/"></head>
            <body><a href="intro">Intro</a></body></html>"#,
        );
        assert_eq!(parsed.links[0].url, "https://example.com/docs/intro");
    }

    #[test]
    fn test_follow_nofollow_links() {
        let parsed = parse(r#"<html><body><a href="/page2" rel="nofollow">Link</a></body></html>"#);
        assert_eq!(parsed.links.len(), 1);
    }

    #[test]
    fn test_extract_page_builds_record() {
        let html = r#"<html lang="en"><head><title>Home</title></head>
            <body><p>one two three four</p><a href="/a">A</a></body></html>"#;
        let url = page_url();
        let record = extract_page(&url, 2, &url, document(html, "text/html; charset=utf-8"));

        assert_eq!(record.url, "https://example.com/page");
        assert_eq!(record.url_fingerprint, fingerprint(&url));
        assert_eq!(record.depth, 2);
        assert_eq!(record.title.as_deref(), Some("Home"));
        assert_eq!(record.word_count, 6);
        assert_eq!(record.language, "en");
        assert_eq!(record.links.len(), 1);
        assert_eq!(record.elapsed_ms, 12);
        assert_eq!(record.content_fingerprint, content_fingerprint(&record.text_content));
        assert_eq!(record.rendered_html, None);
    }

    #[test]
    fn test_non_html_yields_empty_record() {
        let url = page_url();
        let record = extract_page(&url, 0, &url, document("%PDF-1.4", "application/pdf"));

        assert_eq!(record.word_count, 0);
        assert!(record.text_content.is_empty());
        assert!(record.links.is_empty());
        assert_eq!(record.title, None);
        assert_eq!(record.language, "unknown");
    }

    #[test]
    fn test_rendered_document_keeps_html() {
        let url = page_url();
        let mut doc = document("<html><body>Rendered</body></html>", "text/html");
        doc.rendered = true;
        doc.js_errors = vec!["ReferenceError: x is not defined".to_string()];

        let record = extract_page(&url, 0, &url, doc);
        assert!(record.rendered_html.unwrap().contains("Rendered"));
        assert_eq!(record.js_errors.len(), 1);
    }
}
