//! Canonical manga records and the shapes derived from them.

use serde::{Deserialize, Serialize};

pub const DEFAULT_TITLE: &str = "Unknown Title";
pub const DEFAULT_STATUS: &str = "ongoing";
pub const DEFAULT_CHAPTER: &str = "1";

/// Normalized metadata for one series, as extracted from a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MangaRecord {
    pub title: String,
    pub description: String,
    pub author: String,
    pub genres: Vec<String>,
    pub status: String,
    pub current_chapter: String,
    pub img_path: String,
    pub source: String,
    pub url: String,
    pub rating: f64,
}

impl MangaRecord {
    /// Minimal record built from what any tab exposes: its title and URL.
    pub fn from_tab(tab_title: &str, url: &url::Url) -> Self {
        let title = tab_title
            .split(" - ")
            .next()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TITLE);

        Self {
            title: title.to_string(),
            description: String::new(),
            author: String::new(),
            genres: Vec::new(),
            status: DEFAULT_STATUS.to_string(),
            current_chapter: DEFAULT_CHAPTER.to_string(),
            img_path: String::new(),
            source: url.host_str().unwrap_or_default().to_string(),
            url: url.to_string(),
            rating: 0.0,
        }
    }

    /// Applies reviewer edits in place.
    pub fn apply(&mut self, edits: &ReviewEdits) {
        let fields = [
            (&mut self.title, &edits.title),
            (&mut self.current_chapter, &edits.current_chapter),
            (&mut self.status, &edits.status),
            (&mut self.description, &edits.description),
            (&mut self.author, &edits.author),
            (&mut self.source, &edits.source),
            (&mut self.img_path, &edits.img_path),
        ];
        for (field, edit) in fields {
            if let Some(value) = edit {
                *field = value.trim().to_string();
            }
        }
        if let Some(genres) = &edits.genres {
            self.genres = genres.clone();
        }
        if let Some(rating) = edits.rating {
            self.rating = rating;
        }
    }

    /// Body for the creation endpoint.
    pub fn to_submission(&self) -> MangaSubmission {
        MangaSubmission {
            title: self.title.clone(),
            current_chapter: self.current_chapter.clone(),
            status: self.status.clone(),
            img_path: self.img_path.clone(),
            rating: self.rating,
            source: self.source.clone(),
            description: self.description.clone(),
            genres: self.genres.clone(),
            author: self.author.clone(),
        }
    }
}

/// Creation endpoint request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MangaSubmission {
    pub title: String,
    pub current_chapter: String,
    pub status: String,
    pub img_path: String,
    pub rating: f64,
    pub source: String,
    pub description: String,
    pub genres: Vec<String>,
    pub author: String,
}

/// Field overrides entered while reviewing a record.
///
/// `Some("")` clears a field; `None` leaves it as extracted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewEdits {
    pub title: Option<String>,
    pub current_chapter: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub source: Option<String>,
    pub img_path: Option<String>,
    pub genres: Option<Vec<String>>,
    pub rating: Option<f64>,
}

impl ReviewEdits {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Record returned by the creation endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedManga {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub current_chapter: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MangaRecord {
        MangaRecord {
            title: "One Piece".to_string(),
            description: "Pirates".to_string(),
            author: "Oda".to_string(),
            genres: vec!["Action".to_string()],
            status: "ongoing".to_string(),
            current_chapter: "1100".to_string(),
            img_path: String::new(),
            source: "Mangakakalot".to_string(),
            url: "https://mangakakalot.com/manga/one-piece/chapter-1100".to_string(),
            rating: 0.0,
        }
    }

    #[test]
    fn test_record_json_is_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["currentChapter"], "1100");
        assert_eq!(json["imgPath"], "");
        assert_eq!(json["rating"], 0.0);
    }

    #[test]
    fn test_submission_drops_url() {
        let json = serde_json::to_value(sample().to_submission()).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert!(!keys.contains(&"url"));
        assert!(keys.contains(&"genres"));
        assert_eq!(json["title"], "One Piece");
    }

    #[test]
    fn test_apply_edits() {
        let mut record = sample();
        let edits = ReviewEdits {
            current_chapter: Some(" 1101 ".to_string()),
            author: Some(String::new()),
            rating: Some(4.5),
            ..Default::default()
        };
        assert!(!edits.is_empty());
        record.apply(&edits);
        assert_eq!(record.current_chapter, "1101");
        assert_eq!(record.author, "");
        assert_eq!(record.title, "One Piece");
        assert_eq!(record.rating, 4.5);
    }

    #[test]
    fn test_from_tab() {
        let url = url::Url::parse("https://example.com/read/solo-leveling").unwrap();
        let record = MangaRecord::from_tab("Solo Leveling - Example Reader", &url);
        assert_eq!(record.title, "Solo Leveling");
        assert_eq!(record.source, "example.com");
        assert_eq!(record.current_chapter, "1");

        let record = MangaRecord::from_tab("", &url);
        assert_eq!(record.title, DEFAULT_TITLE);
    }

    #[test]
    fn test_created_manga_tolerates_extra_fields() {
        let created: CreatedManga = serde_json::from_str(
            r#"{"id":"ck1","title":"One Piece","currentChapter":"1100","userId":"u1","genres":[]}"#,
        )
        .unwrap();
        assert_eq!(created.id.as_deref(), Some("ck1"));
        assert_eq!(created.title, "One Piece");
    }
}
