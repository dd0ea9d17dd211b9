use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use seo_crawl_engine::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true if `url` belongs to the same site as `origin`
///
/// Same site means same host (case-insensitive) and the same explicit port.
/// The scheme is ignored, so a site upgraded from http to https stays internal;
/// default ports are never explicit once parsed.
/// Subdomains are separate sites: `blog.example.com` is external to `example.com`.
pub fn is_internal(url: &Url, origin: &Url) -> bool {
    match (extract_domain(url), extract_domain(origin)) {
        (Some(a), Some(b)) => a == b && url.port() == origin.port(),
        _ => false,
    }
}
