//! Page language resolution
//!
//! The declared `<html lang>` wins when it is a plausible language tag;
//! otherwise the visible text is run through statistical detection.

/// Returned when no language can be determined
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Shortest text worth running detection on
const MIN_DETECTION_CHARS: usize = 20;

/// Resolves the language of a page to an ISO 639-1 code
pub fn resolve_language(html_lang: Option<&str>, text: &str) -> String {
    if let Some(code) = html_lang.and_then(primary_subtag) {
        return code;
    }

    detect_language(text).unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string())
}

/// Extracts the primary subtag of a short language tag (`en-US` -> `en`)
///
/// Longer values are usually junk (`english`, template placeholders) and are
/// ignored in favour of detection.
fn primary_subtag(lang: &str) -> Option<String> {
    let lang = lang.trim();
    if lang.is_empty() || lang.len() > 5 {
        return None;
    }

    let primary = lang.split(['-', '_']).next()?;
    if primary.len() == 2 && primary.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(primary.to_ascii_lowercase())
    } else {
        None
    }
}

/// Runs statistical detection over page text
pub fn detect_language(text: &str) -> Option<String> {
    if text.chars().count() < MIN_DETECTION_CHARS {
        return None;
    }

    let info = whatlang::detect(text)?;
    iso_639_1(info.lang().code()).map(str::to_string)
}

/// Maps whatlang's ISO 639-3 codes to ISO 639-1 where a two-letter code exists
fn iso_639_1(code: &str) -> Option<&'static str> {
    let mapped = match code {
        "afr" => "af",
        "aka" => "ak",
        "amh" => "am",
        "ara" => "ar",
        "aze" => "az",
        "bel" => "be",
        "ben" => "bn",
        "bul" => "bg",
        "cat" => "ca",
        "ces" => "cs",
        "cmn" => "zh",
        "dan" => "da",
        "deu" => "de",
        "ell" => "el",
        "eng" => "en",
        "epo" => "eo",
        "est" => "et",
        "fin" => "fi",
        "fra" => "fr",
        "guj" => "gu",
        "heb" => "he",
        "hin" => "hi",
        "hrv" => "hr",
        "hun" => "hu",
        "hye" => "hy",
        "ind" => "id",
        "ita" => "it",
        "jav" => "jv",
        "jpn" => "ja",
        "kan" => "kn",
        "kat" => "ka",
        "khm" => "km",
        "kor" => "ko",
        "lat" => "la",
        "lav" => "lv",
        "lit" => "lt",
        "mal" => "ml",
        "mar" => "mr",
        "mkd" => "mk",
        "mya" => "my",
        "nep" => "ne",
        "nld" => "nl",
        "nob" => "nb",
        "ori" => "or",
        "pan" => "pa",
        "pes" => "fa",
        "pol" => "pl",
        "por" => "pt",
        "ron" => "ro",
        "rus" => "ru",
        "sin" => "si",
        "slk" => "sk",
        "slv" => "sl",
        "sna" => "sn",
        "spa" => "es",
        "srp" => "sr",
        "swe" => "sv",
        "tam" => "ta",
        "tel" => "te",
        "tgl" => "tl",
        "tha" => "th",
        "tuk" => "tk",
        "tur" => "tr",
        "ukr" => "uk",
        "urd" => "ur",
        "uzb" => "uz",
        "vie" => "vi",
        "yid" => "yi",
        "zul" => "zu",
        _ => return None,
    };
    Some(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENGLISH: &str = "The quick brown fox jumps over the lazy dog while the farmer \
        watches from the porch and wonders whether it will rain before the harvest.";
    const GERMAN: &str = "Der schnelle braune Fuchs springt über den faulen Hund, während \
        der Bauer von der Veranda aus zusieht und sich fragt, ob es vor der Ernte regnet.";

    #[test]
    fn test_html_lang_wins() {
        assert_eq!(resolve_language(Some("fr"), ENGLISH), "fr");
        assert_eq!(resolve_language(Some("en-US"), GERMAN), "en");
        assert_eq!(resolve_language(Some("PT_br"), ""), "pt");
    }

    #[test]
    fn test_long_or_bogus_lang_falls_back_to_detection() {
        assert_eq!(resolve_language(Some("english"), ENGLISH), "en");
        assert_eq!(resolve_language(Some("{{lang}}"), GERMAN), "de");
        assert_eq!(resolve_language(Some(""), GERMAN), "de");
    }

    #[test]
    fn test_detection_without_html_lang() {
        assert_eq!(resolve_language(None, ENGLISH), "en");
        assert_eq!(resolve_language(None, GERMAN), "de");
    }

    #[test]
    fn test_short_text_is_unknown() {
        assert_eq!(resolve_language(None, "Hi there"), UNKNOWN_LANGUAGE);
        assert_eq!(resolve_language(None, ""), UNKNOWN_LANGUAGE);
    }

    #[test]
    fn test_iso_mapping() {
        assert_eq!(iso_639_1("eng"), Some("en"));
        assert_eq!(iso_639_1("cmn"), Some("zh"));
        assert_eq!(iso_639_1("xyz"), None);
    }
}
