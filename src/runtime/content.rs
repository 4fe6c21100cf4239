//! The context with access to the loaded page.

use super::{Envelope, Inbox, Message, Port, Reply};
use crate::auth::TokenMonitor;
use crate::config::AuthConfig;
use crate::extract::MangaExtractor;
use crate::page::Page;
use crate::record::MangaRecord;
use crate::store::HandoffSlot;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// One-click "add to library" control shown after an extraction.
#[derive(Debug, Clone)]
pub struct Offer {
    record: MangaRecord,
    expires_at: Instant,
    background: Port,
}

impl Offer {
    pub fn record(&self) -> &MangaRecord {
        &self.record
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Sends the record to the coordinator. Expired offers do nothing.
    pub fn accept(self) -> bool {
        if self.is_expired() {
            tracing::debug!("offer expired before it was accepted");
            return false;
        }
        self.background.post(Message::AddToTheLib { data: self.record })
    }
}

pub struct ContentScript {
    page: Page,
    extractor: Arc<MangaExtractor>,
    background: Port,
    offer_timeout: Duration,
    offers: watch::Sender<Option<Offer>>,
    monitor: Option<TokenMonitor>,
}

impl ContentScript {
    pub fn new(
        page: Page,
        extractor: Arc<MangaExtractor>,
        background: Port,
        offer_timeout: Duration,
    ) -> Self {
        let (offers, _) = watch::channel(None);
        Self {
            page,
            extractor,
            background,
            offer_timeout,
            offers,
            monitor: None,
        }
    }

    /// Watches the handoff slot when the page belongs to the host application.
    pub fn watch_for_token(mut self, auth: &AuthConfig, slot: Arc<HandoffSlot>) -> Self {
        if auth.is_host_page(self.page.hostname()) {
            self.monitor = Some(TokenMonitor::new(
                slot,
                self.background.clone(),
                auth.monitor_interval(),
            ));
        }
        self
    }

    /// Floating offers published after each extraction.
    pub fn offers(&self) -> watch::Receiver<Option<Offer>> {
        self.offers.subscribe()
    }

    fn handle(&self, envelope: Envelope) {
        match envelope.message {
            Message::ExtractPageData => {
                let record = self.extractor.extract(&self.page);
                // A new offer replaces whatever was shown before.
                self.offers.send_replace(Some(Offer {
                    record: record.clone(),
                    expires_at: Instant::now() + self.offer_timeout,
                    background: self.background.clone(),
                }));
                Envelope::respond(envelope.reply, Reply::Extracted(record));
            }
            other => {
                tracing::debug!(action = other.action(), "content script ignoring message");
            }
        }
    }

    pub fn spawn(mut self, mut inbox: Inbox) -> JoinHandle<()> {
        if let Some(monitor) = self.monitor.take() {
            monitor.spawn();
        }
        tokio::spawn(async move {
            while let Some(envelope) = inbox.recv().await {
                self.handle(envelope);
            }
        })
    }
}
