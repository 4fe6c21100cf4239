//! Pages to extract metadata from.
//!
//! A [`Page`] pairs an HTML document with the URL it was loaded from,
//! which is all the extractor needs to know about "the current tab".

use crate::config::ScrapingConfig;
use crate::error::PageError;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").unwrap());

/// A loaded page: raw HTML plus its URL.
///
/// The HTML is kept as text and parsed on demand so that pages can move
/// freely between tasks.
#[derive(Debug, Clone)]
pub struct Page {
    url: Url,
    html: String,
}

impl Page {
    /// Creates a page from HTML and the URL it belongs to.
    pub fn from_html(url: Url, html: impl Into<String>) -> Self {
        Self {
            url,
            html: html.into(),
        }
    }

    /// Parses a URL string and pairs it with HTML.
    pub fn parse(url: &str, html: impl Into<String>) -> Result<Self, PageError> {
        let url = Url::parse(url).map_err(|e| PageError::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self::from_html(url, html))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Hostname of the page, or an empty string for host-less URLs.
    pub fn hostname(&self) -> &str {
        self.url.host_str().unwrap_or("")
    }

    /// Parses the HTML into a document.
    pub fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }

    /// Text of the `<title>` element.
    pub fn document_title(&self) -> String {
        let doc = self.document();
        doc.select(&TITLE_SELECTOR)
            .next()
            .map(|elem| elem.text().collect::<String>().trim().to_string())
            .unwrap_or_default()
    }
}

/// Somewhere pages can be loaded from.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Loads the page at `url`.
    async fn load(&self, url: &str) -> Result<Page, PageError>;
}

/// Common HTTP client configuration for page fetching.
pub fn create_http_client(config: &ScrapingConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .cookie_store(true)
        .timeout(Duration::from_secs(config.timeout_sec))
        .build()
}

/// Loads pages over HTTP.
pub struct HttpPageSource {
    client: reqwest::Client,
}

impl HttpPageSource {
    pub fn new(config: &ScrapingConfig) -> Result<Self, PageError> {
        Ok(Self {
            client: create_http_client(config)?,
        })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn load(&self, url: &str) -> Result<Page, PageError> {
        let response = self.client.get(url).send().await?.error_for_status()?;

        // Redirects change the URL the page actually lives at.
        let final_url = response.url().clone();
        let text = response.text().await?;
        tracing::debug!(url = %final_url, bytes = text.len(), "fetched page");

        Ok(Page::from_html(final_url, text))
    }
}

/// Loads a saved HTML snapshot and pretends it was served from `url`.
pub struct FilePageSource {
    path: PathBuf,
}

impl FilePageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PageSource for FilePageSource {
    async fn load(&self, url: &str) -> Result<Page, PageError> {
        let html = tokio::fs::read_to_string(&self.path).await?;
        Page::parse(url, html)
    }
}
