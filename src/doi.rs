//! DOI and ShortDOI string recognition.
//!
//! Input validation happens here, before any storage interaction; the same
//! patterns back the autolink and omnibox glue that scans free text.

use std::sync::LazyLock;

use regex::Regex;

static DOI_EXACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^10\.[0-9]{4,}(?:\.[0-9]+)*/\S+$").expect("doi pattern"));

static SHORT_DOI_EXACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^10/[a-zA-Z0-9]+$").expect("shortdoi pattern"));

// Suffix chars that would break out of an href attribute are excluded so a
// matched range can be linkified verbatim.
static DOI_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b10\.[0-9]{4,}(?:\.[0-9]+)*/[^\s"&'<>]+\b"#).expect("doi find pattern")
});

/// Returns true for a full DOI of the form `10.NNNN/suffix`.
pub fn is_doi(input: &str) -> bool {
    DOI_EXACT.is_match(input)
}

/// Returns true for a ShortDOI of the form `10/suffix`.
pub fn is_short_doi(input: &str) -> bool {
    SHORT_DOI_EXACT.is_match(input)
}

/// Returns true when `input` is either DOI form.
pub fn is_any_doi(input: &str) -> bool {
    is_doi(input) || is_short_doi(input)
}

/// Finds the first DOI embedded in free text.
pub fn find_doi(text: &str) -> Option<&str> {
    DOI_IN_TEXT.find(text).map(|m| m.as_str())
}

/// Finds every DOI embedded in free text, in document order.
pub fn find_all_dois(text: &str) -> Vec<&str> {
    DOI_IN_TEXT.find_iter(text).map(|m| m.as_str()).collect()
}

/// Reduces pasted input to a bare DOI when possible.
///
/// Strips surrounding whitespace, a `doi:` scheme prefix, and resolver URL
/// wrappers such as `https://doi.org/10.1000/xyz`. Returns `None` when no
/// valid DOI remains.
pub fn normalize(input: &str) -> Option<String> {
    let trimmed = input.trim();
    let bare = trimmed
        .strip_prefix("doi:")
        .or_else(|| trimmed.strip_prefix("DOI:"))
        .map(str::trim_start)
        .unwrap_or(trimmed);

    if is_any_doi(bare) {
        return Some(bare.to_string());
    }

    // Resolver URL forms keep the DOI as the path tail.
    if let Some(idx) = bare.find("/10.") {
        let tail = &bare[idx + 1..];
        if is_doi(tail) {
            return Some(tail.to_string());
        }
    }
    if let Some(idx) = bare.find("/10/") {
        let tail = &bare[idx + 1..];
        if is_short_doi(tail) {
            return Some(tail.to_string());
        }
    }

    None
}
