//! Turns raw extractor output into a canonical record.

use super::RawExtraction;
use crate::record::{DEFAULT_CHAPTER, DEFAULT_STATUS, DEFAULT_TITLE, MangaRecord};
use url::Url;

/// Trimmed value, or `None` for missing and blank input.
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Fills defaults, cleans genres and resets the rating.
///
/// `page_url` supplies the fallback source (its hostname) and URL.
pub fn normalize(raw: RawExtraction, page_url: &Url) -> MangaRecord {
    let mut genres: Vec<String> = Vec::with_capacity(raw.genres.len());
    for genre in raw.genres {
        let genre = genre.trim();
        if !genre.is_empty() && !genres.iter().any(|g| g == genre) {
            genres.push(genre.to_string());
        }
    }

    MangaRecord {
        title: present(raw.title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        description: present(raw.description).unwrap_or_default(),
        author: present(raw.author).unwrap_or_default(),
        genres,
        status: present(raw.status)
            .map(|s| s.to_lowercase())
            .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        current_chapter: present(raw.current_chapter)
            .unwrap_or_else(|| DEFAULT_CHAPTER.to_string()),
        img_path: present(raw.img_path).unwrap_or_default(),
        source: present(raw.source)
            .unwrap_or_else(|| page_url.host_str().unwrap_or_default().to_string()),
        url: present(raw.url).unwrap_or_else(|| page_url.to_string()),
        rating: 0.0,
    }
}
