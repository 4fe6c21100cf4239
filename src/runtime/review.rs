//! The popup: review, edit and submit one record.

use super::{Inbox, Message, Port, Reply};
use crate::auth::{AuthToken, SignInLauncher, TokenMonitor};
use crate::client::LibraryClient;
use crate::config::{AuthConfig, Config, ServerConfig};
use crate::error::{ReviewError, RuntimeError, SubmissionError};
use crate::flow::{FlowState, SubmissionFlow};
use crate::record::{CreatedManga, MangaRecord, ReviewEdits};
use crate::store::{ExtensionStore, HandoffSlot, ScopedStore, StoreScope};
use std::sync::Arc;
use tokio::task::JoinHandle;
use url::Url;

/// Handoff monitor for one sign-in attempt, stopped when dropped.
struct HandoffWatch(Option<JoinHandle<()>>);

impl HandoffWatch {
    /// True once the monitor has relayed its token.
    fn is_spent(&self) -> bool {
        self.0.as_ref().is_some_and(JoinHandle::is_finished)
    }
}

impl Drop for HandoffWatch {
    fn drop(&mut self) {
        if let Some(handle) = &self.0 {
            handle.abort();
        }
    }
}

/// The tab the popup was opened on.
#[derive(Debug, Clone, PartialEq)]
pub struct TabInfo {
    pub title: String,
    pub url: Url,
}

pub struct ReviewSession {
    store: ScopedStore,
    server: ServerConfig,
    auth: AuthConfig,
    http: reqwest::Client,
    content: Option<Port>,
    handoff: Option<(Arc<HandoffSlot>, Port)>,
    inbox: Inbox,
    launcher: Arc<dyn SignInLauncher>,
    tab: TabInfo,
    flow: SubmissionFlow,
}

impl ReviewSession {
    pub fn new(
        store: &Arc<ExtensionStore>,
        config: &Config,
        http: reqwest::Client,
        inbox: Inbox,
        launcher: Arc<dyn SignInLauncher>,
        tab: TabInfo,
    ) -> Self {
        Self {
            store: store.scoped(StoreScope::Popup),
            server: config.server.clone(),
            auth: config.auth.clone(),
            http,
            content: None,
            handoff: None,
            inbox,
            launcher,
            tab,
            flow: SubmissionFlow::new(),
        }
    }

    /// Content script of the tab, asked for an extraction when nothing is pending.
    pub fn with_content(mut self, content: Port) -> Self {
        self.content = Some(content);
        self
    }

    /// Handoff slot watched during sign-in, relaying tokens to `background`.
    pub fn with_handoff(mut self, slot: Arc<HandoffSlot>, background: Port) -> Self {
        self.handoff = Some((slot, background));
        self
    }

    pub fn state(&self) -> &FlowState {
        self.flow.state()
    }

    /// Stored server URL, or the configured default.
    pub async fn server_url(&self) -> String {
        match self.store.server_url().await {
            Ok(Some(url)) => url,
            Ok(None) => self.server.base_url.clone(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read server URL");
                self.server.base_url.clone()
            }
        }
    }

    async fn client(&self) -> Result<LibraryClient, SubmissionError> {
        LibraryClient::new(self.http.clone(), &self.server_url().await, &self.server)
    }

    /// The stored token, if the server still accepts it.
    pub async fn check_authentication(&self) -> Option<AuthToken> {
        let token = match self.store.auth_token().await {
            Ok(Some(token)) => token,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read auth token");
                return None;
            }
        };
        let client = self.client().await.ok()?;
        if client.probe_session(&token).await {
            Some(token)
        } else {
            tracing::info!("stored token was rejected");
            None
        }
    }

    async fn request_extraction(&self) -> Option<MangaRecord> {
        let content = self.content.as_ref()?;
        match content.request(Message::ExtractPageData).await {
            Ok(Reply::Extracted(record)) => Some(record),
            Ok(_) => {
                let err = RuntimeError::UnexpectedReply("extractPageData");
                tracing::warn!(error = %err, "extraction failed");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "extraction failed");
                None
            }
        }
    }

    /// Fills the form: the pending record for this tab first, then a fresh
    /// extraction, then whatever the tab title and host give.
    ///
    /// A pending record from another page is replaced.
    pub async fn load_record(&mut self) -> Result<MangaRecord, ReviewError> {
        self.flow.begin_extraction()?;

        let pending = self
            .store
            .pending_manga()
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "ignoring unreadable pending record");
                None
            })
            .filter(|record| {
                let same_page = record.url == self.tab.url.as_str();
                if !same_page {
                    tracing::debug!(pending = %record.url, "pending record is for another page");
                }
                same_page
            });
        let record = match pending {
            Some(record) => record,
            None => match self.request_extraction().await {
                Some(record) => record,
                None => MangaRecord::from_tab(&self.tab.title, &self.tab.url),
            },
        };

        if let Err(e) = self.store.set_pending_manga(&record).await {
            tracing::warn!(error = %e, "failed to cache pending record");
        }
        self.flow.extracted(record.clone())?;
        Ok(record)
    }

    /// Opens the sign-in page and waits for a token the server accepts.
    ///
    /// `server_url` replaces the stored server URL before signing in.
    pub async fn sign_in(&mut self, server_url: Option<&str>) -> Result<AuthToken, ReviewError> {
        self.flow.begin_authentication()?;
        let result = self.authenticate(server_url).await;
        self.flow.end_authentication()?;
        result
    }

    /// Starts a monitor on the handoff slot, if one is attached.
    fn watch_handoff(&self) -> HandoffWatch {
        HandoffWatch(self.handoff.as_ref().map(|(slot, background)| {
            TokenMonitor::new(
                Arc::clone(slot),
                background.clone(),
                self.auth.monitor_interval(),
            )
            .spawn()
        }))
    }

    /// Sign-in without a record under review.
    pub async fn authenticate(&mut self, server_url: Option<&str>) -> Result<AuthToken, ReviewError> {
        if let Some(url) = server_url {
            self.store
                .set_server_url(url.trim().trim_end_matches('/'))
                .await?;
        }
        let client = self.client().await?;
        let mut watch = self.watch_handoff();
        self.launcher.open(&client.sign_in_url()).await?;

        let mut ticker = tokio::time::interval(self.auth.poll_interval());
        let mut listening = true;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                envelope = self.inbox.recv(), if listening => match envelope {
                    Some(envelope) if envelope.message == Message::AuthTokenUpdated => {}
                    Some(_) => continue,
                    None => listening = false,
                },
            }

            if let Some(token) = self.store.auth_token().await? {
                if client.probe_session(&token).await {
                    tracing::info!("signed in");
                    return Ok(token);
                }
            }

            // The last relayed token was not accepted; wait for another one.
            if watch.is_spent() {
                tracing::debug!("watching for another sign-in token");
                watch = self.watch_handoff();
            }
        }
    }

    /// Applies `edits` and sends the record, signing in first when needed.
    pub async fn submit(&mut self, edits: &ReviewEdits) -> Result<CreatedManga, ReviewError> {
        self.flow.edit(edits)?;
        let token = match self.check_authentication().await {
            Some(token) => token,
            None => self.sign_in(None).await?,
        };

        let record = self.flow.begin_submission()?;
        if let Err(e) = self.store.set_pending_manga(&record).await {
            tracing::warn!(error = %e, "failed to cache edited record");
        }

        let result = match self.client().await {
            Ok(client) => client.create_manga(&token, &record.to_submission()).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(created) => {
                self.flow.succeeded(created.clone())?;
                if let Err(e) = self.store.clear_pending_manga().await {
                    tracing::warn!(error = %e, "failed to clear pending record");
                }
                Ok(created)
            }
            Err(e) => {
                // The record stays pending for a manual retry.
                self.flow.failed(e.to_string())?;
                Err(e.into())
            }
        }
    }

    /// Returns a failed record to review.
    pub fn retry(&mut self) -> Result<(), ReviewError> {
        Ok(self.flow.retry()?)
    }

    /// Closes the form and forgets the pending record.
    pub async fn dismiss(&mut self) -> Result<(), ReviewError> {
        self.flow.dismiss()?;
        self.store.clear_pending_manga().await?;
        Ok(())
    }
}
