//! HTTP client for the host application's API.

use crate::auth::AuthToken;
use crate::config::{ScrapingConfig, ServerConfig};
use crate::error::SubmissionError;
use crate::record::{CreatedManga, MangaSubmission};
use serde::Deserialize;
use url::Url;

/// Message used when the server gives no reason for a rejection.
const FALLBACK_ERROR: &str = "Failed to add manga";

/// Error body returned by the API.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Turns a non-2xx response into a rejection carrying the server's message.
async fn check_response_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, SubmissionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body: ApiErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let message = body
        .error
        .or(body.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("{FALLBACK_ERROR} (HTTP {})", status.as_u16()));

    Err(SubmissionError::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// HTTP client for API calls. Unlike page fetching, no request timeout is set.
pub fn create_api_client(config: &ScrapingConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .build()
}

/// Client for one host application instance.
#[derive(Debug, Clone)]
pub struct LibraryClient {
    http: reqwest::Client,
    base_url: String,
    server: ServerConfig,
}

impl LibraryClient {
    /// Creates a client for `base_url` using the endpoint paths in `server`.
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        server: &ServerConfig,
    ) -> Result<Self, SubmissionError> {
        Url::parse(base_url).map_err(|e| SubmissionError::InvalidUrl(format!("{base_url}: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            server: server.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Page that issues an extension token after sign-in.
    pub fn sign_in_url(&self) -> String {
        self.endpoint(&self.server.sign_in_path)
    }

    /// Creates a library entry. No deadline is applied to this call.
    pub async fn create_manga(
        &self,
        token: &AuthToken,
        submission: &MangaSubmission,
    ) -> Result<CreatedManga, SubmissionError> {
        let url = self.endpoint(&self.server.create_path);
        tracing::debug!(url = %url, title = %submission.title, "submitting manga");

        let response = self
            .http
            .post(&url)
            .header("Authorization", token.bearer())
            .header("Content-Type", "application/json")
            .json(submission)
            .send()
            .await?;
        let response = check_response_status(response).await?;

        // The entry exists once the server says so, even if the body is odd.
        let text = response.text().await.unwrap_or_default();
        Ok(
            serde_json::from_str(&text).unwrap_or_else(|_| CreatedManga {
                id: None,
                title: submission.title.clone(),
                current_chapter: Some(submission.current_chapter.clone()),
            }),
        )
    }

    /// Checks whether the server accepts `token`. Faults count as rejection.
    pub async fn probe_session(&self, token: &AuthToken) -> bool {
        let url = self.endpoint(&self.server.session_path);
        match self
            .http
            .get(&url)
            .header("Authorization", token.bearer())
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, "session probe failed");
                false
            }
        }
    }
}
