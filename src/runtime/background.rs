//! The coordinator: owns the token, the pending record and the network.

use super::{Envelope, Inbox, Message, Notice, Port, Reply};
use crate::client::LibraryClient;
use crate::config::ServerConfig;
use crate::error::SubmissionError;
use crate::record::MangaRecord;
use crate::store::{ExtensionStore, ScopedStore, StoreScope};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct Coordinator {
    store: ScopedStore,
    server: ServerConfig,
    http: reqwest::Client,
    content: Option<Port>,
    popup: Option<Port>,
    notices: mpsc::UnboundedSender<Notice>,
}

impl Coordinator {
    pub fn new(
        store: &Arc<ExtensionStore>,
        server: ServerConfig,
        http: reqwest::Client,
        notices: mpsc::UnboundedSender<Notice>,
    ) -> Self {
        Self {
            store: store.scoped(StoreScope::Background),
            server,
            http,
            content: None,
            popup: None,
            notices,
        }
    }

    /// Content script of the active page, for context-menu extractions.
    pub fn with_content(mut self, content: Port) -> Self {
        self.content = Some(content);
        self
    }

    /// Popup to notify about token changes.
    pub fn with_popup(mut self, popup: Port) -> Self {
        self.popup = Some(popup);
        self
    }

    fn notify(&self, notice: Notice) {
        // Nobody listening is fine.
        let _ = self.notices.send(notice);
    }

    async fn client(&self) -> Result<LibraryClient, SubmissionError> {
        let base_url = self
            .store
            .server_url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| self.server.base_url.clone());
        LibraryClient::new(self.http.clone(), &base_url, &self.server)
    }

    async fn handle(&self, envelope: Envelope) {
        let Envelope { message, reply } = envelope;
        match message {
            Message::AuthTokenReceived { token } => {
                if let Err(e) = self.store.set_auth_token(&token).await {
                    tracing::error!(error = %e, "failed to store auth token");
                } else if let Some(popup) = &self.popup {
                    popup.post(Message::AuthTokenUpdated);
                }
                Envelope::respond(reply, Reply::Ack);
            }
            Message::AddToTheLib { data } => {
                if let Err(e) = self.store.set_pending_manga(&data).await {
                    tracing::error!(error = %e, "failed to cache pending record");
                }
                // Answer before the network call so the sender is not held up.
                Envelope::respond(reply, Reply::Ack);
                self.send_to_library(data).await;
            }
            Message::GetAuthToken => {
                let token = self.store.auth_token().await.unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "failed to read auth token");
                    None
                });
                Envelope::respond(reply, Reply::Token(token));
            }
            Message::ExtractPageData => {
                let Some(content) = &self.content else {
                    tracing::debug!("no page to extract from");
                    return;
                };
                match content.request(Message::ExtractPageData).await {
                    Ok(extracted) => Envelope::respond(reply, extracted),
                    Err(e) => tracing::warn!(error = %e, "extraction request failed"),
                }
            }
            Message::AuthTokenUpdated => {}
        }
    }

    /// Submits straight away when signed in, otherwise asks for a review.
    async fn send_to_library(&self, record: MangaRecord) {
        let token = match self.store.auth_token().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                self.notify(Notice::ReviewRequested {
                    reason: "Sign in to add manga to your library".to_string(),
                });
                return;
            }
            Err(e) => {
                self.notify(Notice::ReviewRequested {
                    reason: e.to_string(),
                });
                return;
            }
        };

        let result = match self.client().await {
            Ok(client) => client.create_manga(&token, &record.to_submission()).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(created) => {
                tracing::info!(title = %created.title, "added to library");
                if let Err(e) = self.store.clear_pending_manga().await {
                    tracing::warn!(error = %e, "failed to clear pending record");
                }
                self.notify(Notice::Added {
                    title: record.title,
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "submission failed");
                self.notify(Notice::ReviewRequested {
                    reason: e.to_string(),
                });
            }
        }
    }

    pub fn spawn(self, mut inbox: Inbox) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(envelope) = inbox.recv().await {
                self.handle(envelope).await;
            }
        })
    }
}
