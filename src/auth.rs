//! Bearer tokens and the sign-in handshake with the host application.
//!
//! Signing in happens in the user's browser. The host application's token
//! page deposits a fresh token into the [`HandoffSlot`]; a
//! [`TokenMonitor`] notices it, relays it to the coordinator and clears
//! the slot.

use crate::error::AuthError;
use crate::runtime::{Message, Port};
use crate::store::HandoffSlot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Browser openers tried in order when none is configured.
const BROWSER_OPENERS: &[&str] = &["xdg-open", "open", "wslview"];

/// Opaque bearer credential issued by the host application.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

/// Opens the host application's sign-in page for the user.
#[async_trait]
pub trait SignInLauncher: Send + Sync {
    async fn open(&self, url: &str) -> Result<(), AuthError>;
}

/// Opens URLs with a browser command.
pub struct BrowserLauncher {
    command: Option<String>,
}

impl BrowserLauncher {
    /// Uses `command` when given, otherwise auto-detects an opener.
    pub fn new(command: Option<String>) -> Self {
        Self { command }
    }

    fn resolve_command(&self) -> Result<String, AuthError> {
        if let Some(command) = self.command.as_ref().filter(|c| !c.trim().is_empty()) {
            return Ok(command.clone());
        }
        BROWSER_OPENERS
            .iter()
            .find_map(|opener| which::which(opener).ok())
            .map(|path| path.to_string_lossy().into_owned())
            .ok_or(AuthError::NoBrowser)
    }

    /// Starts the opener and a thread that waits for it to exit.
    fn launch(&self, url: &str) -> Result<thread::JoinHandle<Option<ExitStatus>>, AuthError> {
        let command = self.resolve_command()?;
        let mut parts = command.split_whitespace();
        let program = parts.next().ok_or(AuthError::NoBrowser)?;

        tracing::debug!(program, url, "opening sign-in page");
        let mut child = Command::new(program)
            .args(parts)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AuthError::LaunchFailed(format!("{program}: {e}")))?;

        // Reaps the opener; a browser started directly may outlive the run.
        Ok(thread::spawn(move || match child.wait() {
            Ok(status) => Some(status),
            Err(e) => {
                tracing::debug!(error = %e, "failed to wait for browser opener");
                None
            }
        }))
    }
}

#[async_trait]
impl SignInLauncher for BrowserLauncher {
    async fn open(&self, url: &str) -> Result<(), AuthError> {
        self.launch(url)?;
        Ok(())
    }
}

/// Watches the handoff slot until a token shows up.
///
/// A monitor stops after relaying one token; start another to wait for
/// the next deposit.
pub struct TokenMonitor {
    slot: Arc<HandoffSlot>,
    background: Port,
    interval: Duration,
}

impl TokenMonitor {
    pub fn new(slot: Arc<HandoffSlot>, background: Port, interval: Duration) -> Self {
        Self {
            slot,
            background,
            interval,
        }
    }

    /// Checks the slot once. Returns true when a token was relayed.
    pub async fn check(&self) -> bool {
        match self.slot.ready_token().await {
            Ok(Some(token)) => {
                tracing::info!("sign-in token received");
                self.background.post(Message::AuthTokenReceived { token });
                if let Err(e) = self.slot.clear().await {
                    tracing::warn!(error = %e, "failed to clear handoff slot");
                }
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read handoff slot");
                false
            }
        }
    }

    /// Polls right away and then every interval, stopping after the first token.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                if self.check().await {
                    break;
                }
            }
        })
    }
}
