//! MangaClip - save manga you are reading to a personal library.
//!
//! This library provides functionality for:
//! - Extracting series metadata from manga reader pages (per-site profiles
//!   with a generic fallback)
//! - Reviewing and submitting records to the library's creation endpoint
//! - Signing in through the library's token handoff page

pub mod auth;
pub mod client;
pub mod config;
pub mod console;
pub mod error;
pub mod extract;
pub mod flow;
pub mod page;
pub mod record;
pub mod runtime;
pub mod store;
pub mod telemetry;

// Re-export commonly used types
pub use auth::{AuthToken, BrowserLauncher, SignInLauncher, TokenMonitor};
pub use client::LibraryClient;
pub use config::Config;
pub use console::Console;
pub use error::{
    AuthError, ConfigError, FlowError, PageError, ReviewError, RuntimeError, StoreError,
    SubmissionError,
};
pub use extract::{MangaExtractor, SiteProfile, SiteRegistry};
pub use flow::{FlowState, SubmissionFlow};
pub use page::{FilePageSource, HttpPageSource, Page, PageSource};
pub use record::{CreatedManga, MangaRecord, MangaSubmission, ReviewEdits};
pub use runtime::{ContentScript, Coordinator, Message, Notice, Port, ReviewSession, TabInfo};
pub use store::{ExtensionStore, HandoffSlot, ScopedStore, StoreScope};
