//! Message passing between the extension contexts.
//!
//! The content script, the background coordinator and the review popup
//! each run as their own task. They share nothing but the durable store
//! and talk only through [`Port`]s; every context handles its inbox in
//! arrival order.

mod background;
mod content;
mod review;

pub use background::Coordinator;
pub use content::{ContentScript, Offer};
pub use review::{ReviewSession, TabInfo};

use crate::auth::AuthToken;
use crate::error::RuntimeError;
use crate::record::MangaRecord;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

/// Cross-context message, tagged by its action name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    /// Ask the content script to extract the current page.
    ExtractPageData,
    /// Hand a record to the coordinator for submission.
    AddToTheLib { data: MangaRecord },
    /// A token was picked up from the handoff slot.
    AuthTokenReceived { token: AuthToken },
    /// The stored token changed.
    AuthTokenUpdated,
    /// Ask the coordinator for the stored token.
    GetAuthToken,
}

impl Message {
    pub fn action(&self) -> &'static str {
        match self {
            Message::ExtractPageData => "extractPageData",
            Message::AddToTheLib { .. } => "addToTheLib",
            Message::AuthTokenReceived { .. } => "authTokenReceived",
            Message::AuthTokenUpdated => "authTokenUpdated",
            Message::GetAuthToken => "getAuthToken",
        }
    }
}

/// Response to a [`Port::request`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Extracted(MangaRecord),
    Ack,
    Token(Option<AuthToken>),
}

/// A message plus the channel its answer goes back on.
#[derive(Debug)]
pub struct Envelope {
    pub message: Message,
    pub reply: Option<oneshot::Sender<Reply>>,
}

impl Envelope {
    /// Answers the sender, if it is still waiting.
    pub fn respond(reply: Option<oneshot::Sender<Reply>>, value: Reply) {
        if let Some(tx) = reply {
            let _ = tx.send(value);
        }
    }
}

/// Sending half of a context's inbox.
#[derive(Debug, Clone)]
pub struct Port {
    name: &'static str,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl Port {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Sends without waiting for an answer. Returns false if nobody listens.
    pub fn post(&self, message: Message) -> bool {
        let action = message.action();
        let delivered = self
            .tx
            .send(Envelope {
                message,
                reply: None,
            })
            .is_ok();
        if !delivered {
            tracing::debug!(context = self.name, action, "context not listening");
        }
        delivered
    }

    /// Sends and waits for the receiving context to answer.
    pub async fn request(&self, message: Message) -> Result<Reply, RuntimeError> {
        let action = message.action();
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                message,
                reply: Some(tx),
            })
            .map_err(|_| RuntimeError::ContextClosed(self.name))?;
        rx.await.map_err(|_| RuntimeError::NoReply(action))
    }
}

/// Receiving half of a context's inbox.
#[derive(Debug)]
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl Inbox {
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Envelope, mpsc::error::TryRecvError> {
        self.rx.try_recv()
    }
}

/// Creates the inbox of a context called `name`.
pub fn channel(name: &'static str) -> (Port, Inbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Port { name, tx }, Inbox { rx })
}

/// User-facing notifications raised by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// A record was added to the library.
    Added { title: String },
    /// The record needs manual review (no token, or submission failed).
    ReviewRequested { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_format() {
        let json = serde_json::to_value(Message::ExtractPageData).unwrap();
        assert_eq!(json, serde_json::json!({"action": "extractPageData"}));

        let json = serde_json::to_value(Message::AuthTokenReceived {
            token: AuthToken::new("abc"),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"action": "authTokenReceived", "token": "abc"})
        );

        let parsed: Message = serde_json::from_str(r#"{"action":"getAuthToken"}"#).unwrap();
        assert_eq!(parsed, Message::GetAuthToken);
        assert_eq!(parsed.action(), "getAuthToken");
    }

    #[test]
    fn test_add_message_carries_record() {
        let url = url::Url::parse("https://viz.com/shonenjump/chapter/1").unwrap();
        let record = MangaRecord::from_tab("Chainsaw Man - VIZ", &url);
        let json = serde_json::to_value(Message::AddToTheLib {
            data: record.clone(),
        })
        .unwrap();
        assert_eq!(json["action"], "addToTheLib");
        assert_eq!(json["data"]["title"], "Chainsaw Man");
    }

    #[tokio::test]
    async fn test_request_reply() {
        let (port, mut inbox) = channel("content");
        tokio::spawn(async move {
            while let Some(env) = inbox.recv().await {
                Envelope::respond(env.reply, Reply::Ack);
            }
        });
        assert_eq!(port.request(Message::GetAuthToken).await.unwrap(), Reply::Ack);
    }

    #[tokio::test]
    async fn test_closed_context() {
        let (port, inbox) = channel("popup");
        drop(inbox);
        assert!(!port.post(Message::AuthTokenUpdated));
        assert!(matches!(
            port.request(Message::GetAuthToken).await,
            Err(RuntimeError::ContextClosed("popup"))
        ));
    }

    #[tokio::test]
    async fn test_dropped_reply() {
        let (port, mut inbox) = channel("content");
        tokio::spawn(async move {
            // Receive and drop without answering.
            let _ = inbox.recv().await;
        });
        assert!(matches!(
            port.request(Message::ExtractPageData).await,
            Err(RuntimeError::NoReply("extractPageData"))
        ));
    }
}
