//! Chapter number detection from page URLs.

use regex::Regex;
use std::sync::LazyLock;

/// Marker patterns in precedence order. The first pattern that matches wins.
static CHAPTER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["chapter", "ch", "ep", "episode"]
        .iter()
        .map(|marker| Regex::new(&format!(r"(?i){marker}[_-]?(\d+(?:\.\d+)?)")).unwrap())
        .collect()
});

/// Extracts a chapter or episode number from a URL.
///
/// Returns `None` when none of the markers is followed by a number.
pub fn chapter_from_url(url: &str) -> Option<String> {
    CHAPTER_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}
