use sha2::{Digest, Sha256};
use url::Url;

/// Stable 64-character identity for a normalized URL
///
/// Callers are expected to pass a URL that already went through
/// [`normalize`](super::normalize); equivalent spellings of the same page only
/// collapse to one fingerprint after normalization.
pub fn fingerprint(url: &Url) -> String {
    fingerprint_str(url.as_str())
}

/// Same as [`fingerprint`] for a URL already stored in normalized string form
pub fn fingerprint_str(normalized_url: &str) -> String {
    sha256_hex(normalized_url)
}

/// Fingerprint of a page's extracted text, used to spot duplicate content
pub fn content_fingerprint(text: &str) -> String {
    sha256_hex(text)
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
