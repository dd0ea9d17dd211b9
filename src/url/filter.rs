use url::Url;

/// Path extensions that never lead to an HTML page
const SKIP_EXTENSIONS: &[&str] = &[
    ".pdf", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".ico", ".css", ".js", ".xml",
    ".zip", ".gz", ".mp4", ".mp3", ".woff", ".woff2",
];

/// Returns false for URLs whose path points at a static asset
///
/// Only the path is inspected, so `/report.pdf?download=1` is filtered while
/// `/search?format=.pdf` is not.
pub fn is_crawlable_resource(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    !SKIP_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}
