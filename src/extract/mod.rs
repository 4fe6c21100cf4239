//! Metadata extraction from manga reader pages.
//!
//! [`MangaExtractor::extract`] picks the site profile registered for the
//! page's hostname (or the generic field lookups when there is none) and
//! normalizes the result into a [`MangaRecord`]. Extraction never fails;
//! fields that cannot be found fall back to defaults.

mod chapter;
mod finder;
mod normalize;
mod sites;

pub use chapter::chapter_from_url;
pub use finder::FieldFinder;
pub use normalize::normalize;
pub use sites::{ImageRule, ListRule, SiteProfile, SiteRegistry, TextRule};

use crate::config::ExtractionConfig;
use crate::page::Page;
use crate::record::MangaRecord;

/// Extractor output before defaults are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawExtraction {
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub genres: Vec<String>,
    pub status: Option<String>,
    pub current_chapter: Option<String>,
    pub img_path: Option<String>,
    pub source: Option<String>,
    pub url: Option<String>,
}

/// Chooses and runs the right extraction for a page.
pub struct MangaExtractor {
    registry: SiteRegistry,
    cover_min_dimension: u32,
}

impl Default for MangaExtractor {
    fn default() -> Self {
        Self::new(&ExtractionConfig::default())
    }
}

impl MangaExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            registry: SiteRegistry::new(&config.sites),
            cover_min_dimension: config.cover_min_dimension,
        }
    }

    pub fn registry(&self) -> &SiteRegistry {
        &self.registry
    }

    /// Extracts a canonical record from the page.
    pub fn extract(&self, page: &Page) -> MangaRecord {
        let doc = page.document();
        let document_title = page.document_title();
        let finder = FieldFinder::new(&doc, page.url(), &document_title);

        let raw = match self.registry.find_for_host(page.hostname()) {
            Some(profile) => {
                tracing::debug!(site = %profile.label, url = %page.url(), "using site profile");
                profile.extract(&finder)
            }
            None => {
                tracing::debug!(host = page.hostname(), "no site profile, using generic lookups");
                self.extract_generic(&finder)
            }
        };

        let record = normalize(raw, page.url());
        tracing::debug!(
            title = %record.title,
            chapter = %record.current_chapter,
            source = %record.source,
            "extracted record"
        );
        record
    }

    /// Generic lookups for sites without a profile.
    fn extract_generic(&self, finder: &FieldFinder<'_>) -> RawExtraction {
        RawExtraction {
            title: finder.find_title(),
            description: finder.find_description(),
            author: finder.find_author(),
            genres: finder.find_genres(),
            status: finder.find_status(),
            current_chapter: finder.find_current_chapter(),
            img_path: finder.find_cover_image(self.cover_min_dimension),
            source: finder.url().host_str().map(str::to_string),
            url: Some(finder.url().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KAKALOT_PAGE: &str = r#"
        <html><head><title>One Piece Chapter 1100 - Mangakakalot</title></head>
        <body>
            <div class="manga-info-pic"><img src="/thumb/one-piece.jpg"></div>
            <ul class="manga-info-text">
                <li><h1>One Piece</h1></li>
                <li>Author(s) : <a href="/author/oda">Oda Eiichiro</a></li>
                <li>Status : Ongoing</li>
                <li>Genres :
                    <a href="/manga_list?genre=2">Action</a>,
                    <a href="/manga_list?genre=3">Adventure</a>
                </li>
            </ul>
            <div class="panel-story-info-description">Gol D. Roger was known as the Pirate King.</div>
        </body></html>
    "#;

    #[test]
    fn test_mangakakalot_end_to_end() {
        let page = Page::parse(
            "https://mangakakalot.com/manga/one-piece/chapter-1100",
            KAKALOT_PAGE,
        )
        .unwrap();
        let record = MangaExtractor::default().extract(&page);

        assert_eq!(record.title, "One Piece");
        assert_eq!(record.current_chapter, "1100");
        assert_eq!(record.status, "ongoing");
        assert_eq!(record.source, "Mangakakalot");
        assert_eq!(record.author, "Oda Eiichiro");
        assert_eq!(record.genres, vec!["Action", "Adventure"]);
        assert_eq!(
            record.description,
            "Gol D. Roger was known as the Pirate King."
        );
        assert_eq!(record.img_path, "https://mangakakalot.com/thumb/one-piece.jpg");
        assert_eq!(
            record.url,
            "https://mangakakalot.com/manga/one-piece/chapter-1100"
        );
        assert_eq!(record.rating, 0.0);
    }

    #[test]
    fn test_mangakakalot_singular_author_label() {
        let html = KAKALOT_PAGE.replace("Author(s) :", "Author :");
        let page = Page::parse("https://mangakakalot.com/manga/one-piece", &html).unwrap();
        assert_eq!(MangaExtractor::default().extract(&page).author, "Oda Eiichiro");
    }

    #[test]
    fn test_profile_selection_ignores_path_and_query() {
        let extractor = MangaExtractor::default();
        for url in [
            "https://mangakakalot.com/",
            "https://mangakakalot.com/manga/abc?page=2",
            "https://mangakakalot.com/chapter/xyz/chapter_5#top",
        ] {
            let page = Page::parse(url, "<h1>Title</h1>").unwrap();
            assert_eq!(extractor.extract(&page).source, "Mangakakalot", "{url}");
        }
    }

    #[test]
    fn test_generic_extraction() {
        let html = r#"
            <html><head><title>Omniscient Reader - FreeReads</title></head>
            <body>
                <h1> Omniscient Reader </h1>
                <p class="synopsis">Only I know the ending.</p>
                <span class="creator">Sing Shong</span>
                <span class="genre">Action</span><span class="genre">Fantasy</span>
                <span class="status">Completed</span>
                <img src="/cover.webp" width="400" height="600">
            </body></html>
        "#;
        let page = Page::parse("https://freereads.example/orv/episode-551", html).unwrap();
        let record = MangaExtractor::default().extract(&page);

        assert_eq!(record.title, "Omniscient Reader");
        assert_eq!(record.description, "Only I know the ending.");
        assert_eq!(record.author, "Sing Shong");
        assert_eq!(record.genres, vec!["Action", "Fantasy"]);
        assert_eq!(record.status, "completed");
        assert_eq!(record.current_chapter, "551");
        assert_eq!(record.img_path, "https://freereads.example/cover.webp");
        assert_eq!(record.source, "freereads.example");
    }

    #[test]
    fn test_empty_page_yields_defaults() {
        let page = Page::parse("https://blank.example/", "").unwrap();
        let record = MangaExtractor::default().extract(&page);
        assert_eq!(record.title, "Unknown Title");
        assert_eq!(record.current_chapter, "1");
        assert_eq!(record.status, "ongoing");
        assert_eq!(record.source, "blank.example");
        assert!(record.genres.is_empty());
    }

    #[test]
    fn test_fixed_status_profile() {
        let html = r#"
            <div class="DetailHeader"><img src="https://swebtoon.example/tog.jpg"></div>
            <h1 class="subj">Tower of God</h1>
            <p class="summary">What do you desire?</p>
            <div class="author">SIU</div>
            <div class="genre_list"><a>Fantasy</a></div>
        "#;
        let page = Page::parse(
            "https://www.webtoons.com/en/fantasy/tower-of-god/list?title_no=95",
            html,
        )
        .unwrap();
        let record = MangaExtractor::default().extract(&page);
        assert_eq!(record.title, "Tower of God");
        assert_eq!(record.status, "ongoing");
        assert_eq!(record.source, "Webtoons");
        assert_eq!(record.genres, vec!["Fantasy"]);
        assert_eq!(record.current_chapter, "1");
        assert_eq!(record.img_path, "https://swebtoon.example/tog.jpg");
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let page = Page::parse("https://mangakakalot.com/manga/one-piece/chapter-1100", KAKALOT_PAGE)
            .unwrap();
        let extractor = MangaExtractor::default();
        assert_eq!(extractor.extract(&page), extractor.extract(&page));
    }
}
