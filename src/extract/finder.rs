//! Selector-priority lookups for individual metadata fields.
//!
//! Every lookup tries its candidates from most specific to least specific
//! and never fails: an unparsable selector or a missing element just moves
//! on to the next candidate.

use super::chapter::chapter_from_url;
use scraper::{ElementRef, Html, Selector};
use url::Url;

const TITLE_CANDIDATES: &[&str] = &[
    "h1",
    ".title",
    ".manga-title",
    ".series-title",
    ".comic-title",
    ".story-title",
    r#"[class*="title"]"#,
];

const DESCRIPTION_CANDIDATES: &[&str] = &[
    ".description",
    ".synopsis",
    ".summary",
    ".overview",
    ".manga-desc",
    ".story-desc",
    r#"[class*="description"]"#,
];

const AUTHOR_CANDIDATES: &[&str] = &[
    ".author",
    ".creator",
    ".manga-author",
    ".artist",
    r#"[class*="author"]"#,
    r#"[class*="creator"]"#,
];

const GENRE_CANDIDATES: &[&str] = &[
    ".genre",
    ".tag",
    ".category",
    ".genres a",
    r#"[class*="genre"]"#,
    r#"[class*="tag"]"#,
];

const STATUS_CANDIDATES: &[&str] = &[".status", ".publication-status", r#"[class*="status"]"#];

const COVER_CANDIDATES: &[&str] = &[
    ".cover img",
    ".manga-cover img",
    ".poster img",
    ".thumbnail img",
    r#"[class*="cover"] img"#,
    r#"[class*="poster"] img"#,
];

/// Separator between the series name and the site name in `<title>`.
const DOCUMENT_TITLE_SEPARATOR: &str = " - ";

/// Compiles a selector, logging and skipping ones the engine rejects.
fn compile(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(sel) => Some(sel),
        Err(e) => {
            tracing::debug!(selector, error = %e, "skipping unparsable selector");
            None
        }
    }
}

fn element_text(elem: ElementRef<'_>) -> String {
    elem.text().collect::<String>().trim().to_string()
}

/// Parses a pixel dimension attribute such as `"320"` or `"320px"`.
fn pixel_attr(elem: ElementRef<'_>, name: &str) -> Option<u32> {
    let raw = elem.value().attr(name)?.trim();
    let digits = raw.strip_suffix("px").unwrap_or(raw).trim();
    digits
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u32)
}

/// DOM probing over one parsed document.
pub struct FieldFinder<'a> {
    doc: &'a Html,
    url: &'a Url,
    document_title: &'a str,
}

impl<'a> FieldFinder<'a> {
    pub fn new(doc: &'a Html, url: &'a Url, document_title: &'a str) -> Self {
        Self {
            doc,
            url,
            document_title,
        }
    }

    pub fn url(&self) -> &Url {
        self.url
    }

    /// Trimmed text of the first element of the first candidate that has any.
    ///
    /// Like `querySelector`, only the first element of each candidate is
    /// considered.
    pub fn first_text<S: AsRef<str>>(&self, candidates: &[S]) -> Option<String> {
        candidates.iter().find_map(|candidate| {
            let sel = compile(candidate.as_ref())?;
            let elem = self.doc.select(&sel).next()?;
            Some(element_text(elem)).filter(|text| !text.is_empty())
        })
    }

    /// Union of the texts of every element matched by every candidate.
    ///
    /// Empty texts are skipped and duplicates keep their first position.
    pub fn all_texts<S: AsRef<str>>(&self, candidates: &[S]) -> Vec<String> {
        let mut values: Vec<String> = Vec::new();
        for sel in candidates.iter().filter_map(|c| compile(c.as_ref())) {
            for elem in self.doc.select(&sel) {
                let text = element_text(elem);
                if !text.is_empty() && !values.contains(&text) {
                    values.push(text);
                }
            }
        }
        values
    }

    /// Absolute `src` of the first element of the first candidate that has one.
    pub fn first_src<S: AsRef<str>>(&self, candidates: &[S]) -> Option<String> {
        candidates.iter().find_map(|candidate| {
            let sel = compile(candidate.as_ref())?;
            let elem = self.doc.select(&sel).next()?;
            self.resolve_src(elem)
        })
    }

    /// Value of a labelled row, e.g. `<li>Author : Oda</li>`.
    ///
    /// Rows are matched by `rows`; the first row whose text contains `label`
    /// is used. With a `value` selector the value is that element's text,
    /// otherwise it is the row text after the label, an optional plural
    /// `(s)` and an optional colon.
    pub fn labelled(&self, rows: &str, label: &str, value: Option<&str>) -> Option<String> {
        let row = self.labelled_row(rows, label)?;
        let text = match value {
            Some(value) => {
                let sel = compile(value)?;
                element_text(row.select(&sel).next()?)
            }
            None => {
                let text = element_text(row);
                let after = text
                    .find(label)
                    .map(|idx| &text[idx + label.len()..])
                    .unwrap_or(&text);
                let after = after.strip_prefix("(s)").unwrap_or(after).trim_start();
                after.strip_prefix(':').unwrap_or(after).trim().to_string()
            }
        };
        Some(text).filter(|t| !t.is_empty())
    }

    /// Texts of every `items` element inside the first row labelled `label`.
    pub fn labelled_all(&self, rows: &str, label: &str, items: &str) -> Vec<String> {
        let (Some(row), Some(sel)) = (self.labelled_row(rows, label), compile(items)) else {
            return Vec::new();
        };
        let mut values: Vec<String> = Vec::new();
        for text in row.select(&sel).map(element_text) {
            if !text.is_empty() && !values.contains(&text) {
                values.push(text);
            }
        }
        values
    }

    fn labelled_row(&self, rows: &str, label: &str) -> Option<ElementRef<'a>> {
        let sel = compile(rows)?;
        self.doc
            .select(&sel)
            .find(|row| row.text().collect::<String>().contains(label))
    }

    fn resolve_src(&self, elem: ElementRef<'_>) -> Option<String> {
        let src = elem.value().attr("src")?.trim();
        if src.is_empty() {
            return None;
        }
        match self.url.join(src) {
            Ok(resolved) => Some(resolved.to_string()),
            Err(e) => {
                tracing::debug!(src, error = %e, "ignoring malformed image URL");
                None
            }
        }
    }

    pub fn find_title(&self) -> Option<String> {
        self.first_text(TITLE_CANDIDATES).or_else(|| {
            self.document_title
                .split(DOCUMENT_TITLE_SEPARATOR)
                .next()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        })
    }

    pub fn find_description(&self) -> Option<String> {
        self.first_text(DESCRIPTION_CANDIDATES)
    }

    pub fn find_author(&self) -> Option<String> {
        self.first_text(AUTHOR_CANDIDATES)
    }

    pub fn find_genres(&self) -> Vec<String> {
        self.all_texts(GENRE_CANDIDATES)
    }

    pub fn find_status(&self) -> Option<String> {
        self.first_text(STATUS_CANDIDATES)
            .map(|status| status.to_lowercase())
    }

    pub fn find_current_chapter(&self) -> Option<String> {
        chapter_from_url(self.url.as_str())
    }

    /// Cover image from the candidate list, falling back to the first
    /// `<img>` whose declared width and height both exceed `min_dimension`.
    pub fn find_cover_image(&self, min_dimension: u32) -> Option<String> {
        self.first_src(COVER_CANDIDATES)
            .or_else(|| self.large_image(min_dimension))
    }

    fn large_image(&self, min_dimension: u32) -> Option<String> {
        let sel = compile("img")?;
        self.doc
            .select(&sel)
            .filter(|img| {
                matches!(
                    (pixel_attr(*img, "width"), pixel_attr(*img, "height")),
                    (Some(w), Some(h)) if w > min_dimension && h > min_dimension
                )
            })
            .find_map(|img| self.resolve_src(img))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_finder<T>(html: &str, url: &str, f: impl FnOnce(&FieldFinder<'_>) -> T) -> T {
        let doc = Html::parse_document(html);
        let url = Url::parse(url).unwrap();
        let title = doc
            .select(&Selector::parse("title").unwrap())
            .next()
            .map(element_text)
            .unwrap_or_default();
        let finder = FieldFinder::new(&doc, &url, &title);
        f(&finder)
    }

    #[test]
    fn test_first_text_skips_empty_and_bad_selectors() {
        let html = r#"<h1>  </h1><div class="series-title"> Solo Leveling </div>"#;
        with_finder(html, "https://example.com/", |finder| {
            assert_eq!(
                finder.first_text(&["h1", "[[broken", ".series-title"]),
                Some("Solo Leveling".to_string())
            );
        });
    }

    #[test]
    fn test_title_falls_back_to_document_title() {
        let html = "<html><head><title>Tower of God - Read Online</title></head><body></body></html>";
        with_finder(html, "https://example.com/", |finder| {
            assert_eq!(finder.find_title(), Some("Tower of God".to_string()));
        });

        with_finder("<p>nothing</p>", "https://example.com/", |finder| {
            assert_eq!(finder.find_title(), None);
        });
    }

    #[test]
    fn test_genres_union_dedup_in_order() {
        let html = r#"
            <span class="genre">Action</span>
            <span class="genre">Drama</span>
            <a class="tag">Action</a>
            <a class="tag"> </a>
            <li class="category">Fantasy</li>
            <li class="category">Drama</li>
        "#;
        with_finder(html, "https://example.com/", |finder| {
            let first = finder.find_genres();
            assert_eq!(first, vec!["Action", "Drama", "Fantasy"]);
            assert_eq!(finder.find_genres(), first);
        });
    }

    #[test]
    fn test_status_is_lowercased() {
        let html = r#"<span class="publication-status">COMPLETED</span>"#;
        with_finder(html, "https://example.com/", |finder| {
            assert_eq!(finder.find_status(), Some("completed".to_string()));
        });
    }

    #[test]
    fn test_cover_from_candidate_resolves_relative_src() {
        let html = r#"<div class="cover"><img src="/covers/op.jpg"></div>"#;
        with_finder(html, "https://example.com/manga/op", |finder| {
            assert_eq!(
                finder.find_cover_image(200),
                Some("https://example.com/covers/op.jpg".to_string())
            );
        });
    }

    #[test]
    fn test_cover_falls_back_to_large_image() {
        let html = r#"
            <img src="/icon.png" width="32" height="32">
            <img src="/banner.png" width="900" height="200">
            <img src="https://cdn.example.com/cover.jpg" width="300px" height="450">
        "#;
        with_finder(html, "https://example.com/", |finder| {
            assert_eq!(
                finder.find_cover_image(200),
                Some("https://cdn.example.com/cover.jpg".to_string())
            );
        });
    }

    #[test]
    fn test_cover_skips_malformed_src() {
        let html = r#"
            <div class="cover"><img src="http://["></div>
            <div class="poster"><img src="/covers/berserk.jpg"></div>
        "#;
        with_finder(html, "https://example.com/manga/berserk", |finder| {
            assert_eq!(
                finder.find_cover_image(200),
                Some("https://example.com/covers/berserk.jpg".to_string())
            );
        });

        let html = r#"
            <div class="cover"><img src="http://["></div>
            <img src="/scans/berserk-vol1.jpg" width="400" height="600">
        "#;
        with_finder(html, "https://example.com/manga/berserk", |finder| {
            assert_eq!(
                finder.find_cover_image(200),
                Some("https://example.com/scans/berserk-vol1.jpg".to_string())
            );
        });
    }

    #[test]
    fn test_cover_missing() {
        with_finder(r#"<img src="/a.png">"#, "https://example.com/", |finder| {
            assert_eq!(finder.find_cover_image(200), None);
        });
    }

    #[test]
    fn test_labelled_row_without_value_selector() {
        let html = r#"
            <ul class="manga-info-text">
                <li><h1>One Piece</h1></li>
                <li>Author(s) : <a>Oda Eiichiro</a></li>
                <li>Status : Ongoing</li>
            </ul>
        "#;
        with_finder(html, "https://example.com/", |finder| {
            assert_eq!(
                finder.labelled(".manga-info-text li", "Status", None),
                Some("Ongoing".to_string())
            );
            assert_eq!(
                finder.labelled(".manga-info-text li", "Author", None),
                Some("Oda Eiichiro".to_string())
            );
            assert_eq!(finder.labelled(".manga-info-text li", "Artist", None), None);
        });
    }

    #[test]
    fn test_labelled_row_singular_and_plural() {
        for row in ["Author : Miura Kentarou", "Author(s) : Miura Kentarou", "Author: Miura Kentarou"] {
            let html = format!(r#"<ul class="manga-info-text"><li>{row}</li></ul>"#);
            with_finder(&html, "https://example.com/", |finder| {
                assert_eq!(
                    finder.labelled(".manga-info-text li", "Author", None),
                    Some("Miura Kentarou".to_string()),
                    "row {row:?}"
                );
            });
        }
    }

    #[test]
    fn test_labelled_row_with_value_selector() {
        let html = r#"
            <table class="variations-tableInfo">
                <tr><td>Author(s) :</td><td>ONE</td></tr>
                <tr><td>Genres :</td><td><a>Action</a> - <a>Comedy</a></td></tr>
            </table>
        "#;
        with_finder(html, "https://example.com/", |finder| {
            assert_eq!(
                finder.labelled(".variations-tableInfo tr", "Author", Some("td:last-child")),
                Some("ONE".to_string())
            );
            assert_eq!(
                finder.labelled_all(".variations-tableInfo tr", "Genres", "td:last-child a"),
                vec!["Action", "Comedy"]
            );
        });
    }

    #[test]
    fn test_chapter_from_page_url() {
        with_finder("", "https://example.com/series/chapter-12/", |finder| {
            assert_eq!(finder.find_current_chapter(), Some("12".to_string()));
        });
    }
}
