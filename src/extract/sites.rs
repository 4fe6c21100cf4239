//! Declarative per-site selector profiles.
//!
//! Each supported site is described by a [`SiteProfile`]: one rule per
//! field, evaluated by the same routine for every site. Profiles can also
//! be declared in the config file to add sites or override built-in ones.

use super::RawExtraction;
use super::chapter::chapter_from_url;
use super::finder::FieldFinder;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// How to find a single-valued text field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TextRule {
    /// First non-empty text among candidate selectors.
    First { selectors: Vec<String> },
    /// Value of the first row whose text contains `label`.
    Labelled {
        rows: String,
        label: String,
        #[serde(default)]
        value: Option<String>,
    },
    /// Constant value.
    Fixed { value: String },
    /// The site never shows this field.
    #[default]
    Absent,
}

impl TextRule {
    fn apply(&self, finder: &FieldFinder<'_>) -> Option<String> {
        match self {
            TextRule::First { selectors } => finder.first_text(selectors),
            TextRule::Labelled { rows, label, value } => {
                finder.labelled(rows, label, value.as_deref())
            }
            TextRule::Fixed { value } => Some(value.clone()),
            TextRule::Absent => None,
        }
    }
}

/// How to collect a multi-valued field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ListRule {
    /// Every element matched by every selector.
    All { selectors: Vec<String> },
    /// Every `items` element inside the first row containing `label`.
    Labelled {
        rows: String,
        label: String,
        items: String,
    },
    #[default]
    Absent,
}

impl ListRule {
    fn apply(&self, finder: &FieldFinder<'_>) -> Vec<String> {
        match self {
            ListRule::All { selectors } => finder.all_texts(selectors),
            ListRule::Labelled { rows, label, items } => finder.labelled_all(rows, label, items),
            ListRule::Absent => Vec::new(),
        }
    }
}

/// How to find the cover image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageRule {
    /// `src` of the first candidate that has one.
    First { selectors: Vec<String> },
    #[default]
    Absent,
}

impl ImageRule {
    fn apply(&self, finder: &FieldFinder<'_>) -> Option<String> {
        match self {
            ImageRule::First { selectors } => finder.first_src(selectors),
            ImageRule::Absent => None,
        }
    }
}

/// Selector configuration for one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteProfile {
    /// Matched as a substring of the page hostname.
    pub host: String,
    /// Stored as the record's source.
    pub label: String,
    #[serde(default)]
    pub title: TextRule,
    #[serde(default)]
    pub description: TextRule,
    #[serde(default)]
    pub author: TextRule,
    #[serde(default)]
    pub status: TextRule,
    #[serde(default)]
    pub genres: ListRule,
    #[serde(default)]
    pub cover: ImageRule,
}

impl SiteProfile {
    /// Runs every rule against the page. The chapter always comes from the URL.
    pub fn extract(&self, finder: &FieldFinder<'_>) -> RawExtraction {
        RawExtraction {
            title: self.title.apply(finder),
            description: self.description.apply(finder),
            author: self.author.apply(finder),
            genres: self.genres.apply(finder),
            status: self.status.apply(finder),
            current_chapter: chapter_from_url(finder.url().as_str()),
            img_path: self.cover.apply(finder),
            source: Some(self.label.clone()),
            url: Some(finder.url().to_string()),
        }
    }
}

fn first(selectors: &[&str]) -> TextRule {
    TextRule::First {
        selectors: selectors.iter().map(|s| s.to_string()).collect(),
    }
}

fn all(selectors: &[&str]) -> ListRule {
    ListRule::All {
        selectors: selectors.iter().map(|s| s.to_string()).collect(),
    }
}

fn image(selectors: &[&str]) -> ImageRule {
    ImageRule::First {
        selectors: selectors.iter().map(|s| s.to_string()).collect(),
    }
}

fn labelled(rows: &str, label: &str, value: Option<&str>) -> TextRule {
    TextRule::Labelled {
        rows: rows.to_string(),
        label: label.to_string(),
        value: value.map(str::to_string),
    }
}

fn ongoing() -> TextRule {
    TextRule::Fixed {
        value: "ongoing".to_string(),
    }
}

/// Built-in profiles, in lookup order.
static BUILTIN_PROFILES: LazyLock<Vec<SiteProfile>> = LazyLock::new(|| {
    const KAKALOT_ROWS: &str = ".manga-info-text li";
    const NATO_ROWS: &str = ".variations-tableInfo tr";

    vec![
        SiteProfile {
            host: "mangadex.org".to_string(),
            label: "MangaDex".to_string(),
            title: first(&[".manga-title", "h1"]),
            description: first(&[".manga-desc", ".description"]),
            author: first(&[".manga-author", ".author"]),
            status: first(&[".status"]),
            genres: all(&[".genre", ".tag"]),
            cover: image(&[".manga-cover img", ".cover img"]),
        },
        SiteProfile {
            host: "mangakakalot.com".to_string(),
            label: "Mangakakalot".to_string(),
            title: first(&[".manga-info-text h1", ".info-title"]),
            description: first(&[".panel-story-info-description", ".description"]),
            author: labelled(KAKALOT_ROWS, "Author", None),
            status: labelled(KAKALOT_ROWS, "Status", None),
            genres: all(&[r#".manga-info-text li a[href*="genre"]"#]),
            cover: image(&[".manga-info-pic img"]),
        },
        SiteProfile {
            host: "manganato.com".to_string(),
            label: "Manganato".to_string(),
            title: first(&[".story-info-right h1"]),
            description: first(&[".panel-story-info-description"]),
            author: labelled(NATO_ROWS, "Author", Some("td:last-child")),
            status: labelled(NATO_ROWS, "Status", Some("td:last-child")),
            genres: ListRule::Labelled {
                rows: NATO_ROWS.to_string(),
                label: "Genres".to_string(),
                items: "td:last-child a".to_string(),
            },
            cover: image(&[".story-info-left .info-image img"]),
        },
        SiteProfile {
            host: "webtoons.com".to_string(),
            label: "Webtoons".to_string(),
            title: first(&[".subj"]),
            description: first(&[".summary"]),
            author: first(&[".author"]),
            status: ongoing(),
            genres: all(&[".genre_list a"]),
            cover: image(&[".DetailHeader img"]),
        },
        SiteProfile {
            host: "mangaplus.shueisha.co.jp".to_string(),
            label: "MangaPlus".to_string(),
            title: first(&[".TitleDetailHeader-module_title"]),
            description: first(&[".TitleDetailHeader-module_overview"]),
            author: first(&[".TitleDetailHeader-module_author"]),
            status: ongoing(),
            genres: ListRule::Absent,
            cover: image(&[".TitleDetailHeader-module_imageWrapper img"]),
        },
        SiteProfile {
            host: "viz.com".to_string(),
            label: "VIZ".to_string(),
            title: first(&[".product-title", "h1"]),
            description: first(&[".product-description", ".synopsis"]),
            author: first(&[".product-creator", ".author"]),
            status: ongoing(),
            genres: ListRule::Absent,
            cover: image(&[".product-image img", ".cover img"]),
        },
    ]
});

/// Ordered mapping from hostnames to site profiles.
pub struct SiteRegistry {
    profiles: Vec<SiteProfile>,
}

impl Default for SiteRegistry {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl SiteRegistry {
    /// Creates a registry with `custom` profiles ahead of the built-in ones.
    pub fn new(custom: &[SiteProfile]) -> Self {
        let profiles = custom
            .iter()
            .chain(BUILTIN_PROFILES.iter())
            .cloned()
            .collect();
        Self { profiles }
    }

    /// Finds the first profile whose host is contained in `hostname`.
    pub fn find_for_host(&self, hostname: &str) -> Option<&SiteProfile> {
        self.profiles
            .iter()
            .find(|profile| !profile.host.is_empty() && hostname.contains(profile.host.as_str()))
    }

    /// Returns all registered profiles.
    pub fn all(&self) -> &[SiteProfile] {
        &self.profiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_host_substring() {
        let registry = SiteRegistry::default();
        assert_eq!(
            registry.find_for_host("mangadex.org").map(|p| p.label.as_str()),
            Some("MangaDex")
        );
        assert_eq!(
            registry.find_for_host("www.webtoons.com").map(|p| p.label.as_str()),
            Some("Webtoons")
        );
        assert_eq!(
            registry
                .find_for_host("chapmanganato.com")
                .map(|p| p.label.as_str()),
            Some("Manganato")
        );
        assert!(registry.find_for_host("example.com").is_none());
    }

    #[test]
    fn test_builtin_order() {
        let registry = SiteRegistry::default();
        let hosts: Vec<&str> = registry.all().iter().map(|p| p.host.as_str()).collect();
        assert_eq!(
            hosts,
            vec![
                "mangadex.org",
                "mangakakalot.com",
                "manganato.com",
                "webtoons.com",
                "mangaplus.shueisha.co.jp",
                "viz.com",
            ]
        );
    }

    #[test]
    fn test_custom_profiles_take_precedence() {
        let custom = SiteProfile {
            host: "viz.com".to_string(),
            label: "VIZ Media".to_string(),
            title: first(&["h2"]),
            description: TextRule::Absent,
            author: TextRule::Absent,
            status: TextRule::Absent,
            genres: ListRule::Absent,
            cover: ImageRule::Absent,
        };
        let registry = SiteRegistry::new(&[custom]);
        assert_eq!(
            registry.find_for_host("www.viz.com").map(|p| p.label.as_str()),
            Some("VIZ Media")
        );
        assert_eq!(registry.all().len(), 7);
    }

    #[test]
    fn test_profile_from_toml() {
        let profile: SiteProfile = toml::from_str(
            r#"
            host = "asura.gg"
            label = "Asura"
            title = { kind = "first", selectors = ["h1.entry-title"] }
            status = { kind = "labelled", rows = ".imptdt", label = "Status", value = "i" }
            genres = { kind = "all", selectors = [".mgen a"] }
            "#,
        )
        .unwrap();
        assert_eq!(profile.label, "Asura");
        assert_eq!(profile.author, TextRule::Absent);
        assert_eq!(profile.cover, ImageRule::Absent);
        assert_eq!(
            profile.status,
            TextRule::Labelled {
                rows: ".imptdt".to_string(),
                label: "Status".to_string(),
                value: Some("i".to_string()),
            }
        );
    }
}
