//! MangaClip CLI - save the manga you are reading to your library.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mangaclip::auth::{AuthToken, BrowserLauncher, SignInLauncher};
use mangaclip::client;
use mangaclip::config::Config;
use mangaclip::console::Console;
use mangaclip::error::AuthError;
use mangaclip::extract::MangaExtractor;
use mangaclip::page::{FilePageSource, HttpPageSource, Page, PageSource};
use mangaclip::record::{MangaRecord, ReviewEdits};
use mangaclip::runtime::{
    self, ContentScript, Coordinator, Message, Notice, Offer, Port, ReviewSession, TabInfo,
};
use mangaclip::store::{ExtensionStore, HandoffSlot, StoreScope};
use mangaclip::telemetry;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};
use url::Url;

/// Save manga you are reading to your library.
#[derive(Parser, Debug)]
#[command(name = "mangaclip")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file to use instead of the default location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Library server URL. Remembered for later runs.
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract metadata from a page and print it.
    Extract {
        /// URL of the page.
        url: String,

        /// Read the page from a saved HTML file instead of fetching it.
        #[arg(long)]
        html: Option<PathBuf>,

        /// Print the record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Extract a page, review the record and add it to the library.
    Add {
        /// URL of the page.
        url: String,

        /// Read the page from a saved HTML file instead of fetching it.
        #[arg(long)]
        html: Option<PathBuf>,

        /// Submit without asking for confirmation.
        #[arg(long, short)]
        yes: bool,

        /// One-click add: submit the extracted record as is when signed in.
        #[arg(long)]
        quick: bool,

        #[command(flatten)]
        edits: EditArgs,
    },

    /// Sign in to the library.
    Login,

    /// Deposit a token shown by the library's sign-in page.
    Handoff {
        /// The token to deposit.
        token: String,
    },

    /// Forget the stored token.
    Logout,

    /// Show the record waiting for review.
    Pending {
        /// Discard the record instead.
        #[arg(long)]
        clear: bool,
    },

    /// List the sites with dedicated extraction.
    Sites,
}

/// Field overrides applied before submitting.
#[derive(clap::Args, Debug, Default)]
struct EditArgs {
    #[arg(long)]
    title: Option<String>,

    /// Current chapter.
    #[arg(long)]
    chapter: Option<String>,

    #[arg(long)]
    status: Option<String>,

    #[arg(long)]
    author: Option<String>,

    #[arg(long)]
    description: Option<String>,

    #[arg(long)]
    source: Option<String>,

    /// Cover image URL.
    #[arg(long)]
    cover: Option<String>,

    /// Genre; repeat to give several. Replaces the extracted genres.
    #[arg(long = "genre")]
    genres: Vec<String>,

    #[arg(long)]
    rating: Option<f64>,
}

impl EditArgs {
    fn to_edits(&self) -> ReviewEdits {
        ReviewEdits {
            title: self.title.clone(),
            current_chapter: self.chapter.clone(),
            status: self.status.clone(),
            description: self.description.clone(),
            author: self.author.clone(),
            source: self.source.clone(),
            img_path: self.cover.clone(),
            genres: (!self.genres.is_empty()).then(|| self.genres.clone()),
            rating: self.rating,
        }
    }
}

/// Opens the sign-in page, falling back to printing the link, and accepts
/// tokens pasted on stdin.
struct CliLauncher {
    browser: BrowserLauncher,
    slot: Arc<HandoffSlot>,
    console: Console,
    reading_stdin: AtomicBool,
}

impl CliLauncher {
    /// Deposits every non-empty line read from stdin until it closes.
    fn read_pasted_tokens(&self) {
        if self.reading_stdin.swap(true, Ordering::SeqCst) {
            return;
        }
        let slot = Arc::clone(&self.slot);
        let runtime = tokio::runtime::Handle::current();
        // Detached: the process may exit without the user ever pasting.
        std::thread::spawn(move || {
            let mut line = String::new();
            loop {
                line.clear();
                match std::io::stdin().read_line(&mut line) {
                    Ok(0) | Err(_) => return,
                    Ok(_) => {}
                }
                let token = AuthToken::new(line.as_str());
                if token.is_empty() {
                    continue;
                }
                if let Err(e) = runtime.block_on(slot.deposit(&token)) {
                    tracing::warn!(error = %e, "failed to deposit pasted token");
                }
            }
        });
    }
}

#[async_trait]
impl SignInLauncher for CliLauncher {
    async fn open(&self, url: &str) -> Result<(), AuthError> {
        self.console
            .step(&format!("Sign in at {}", self.console.link(url)));
        if let Err(e) = self.browser.open(url).await {
            self.console
                .warning(&format!("{e}. Open the link in your browser."));
        }
        self.console.info(
            "Paste the token shown after signing in, or run `mangaclip handoff <TOKEN>`.",
        );
        self.read_pasted_tokens();
        Ok(())
    }
}

/// The extension contexts, wired together for one run.
struct Contexts {
    background: Port,
    session: ReviewSession,
    offers: Option<watch::Receiver<Option<Offer>>>,
    notices: mpsc::UnboundedReceiver<Notice>,
}

/// Starts the coordinator, a content script for `page` (if any) and a
/// review session that watches the handoff slot while signing in.
fn start_contexts(
    config: &Config,
    store: &Arc<ExtensionStore>,
    slot: &Arc<HandoffSlot>,
    page: Option<Page>,
) -> Result<Contexts> {
    let http = client::create_api_client(&config.scraping).context("Failed to create HTTP client")?;
    let (background, background_inbox) = runtime::channel("background");
    let (popup, popup_inbox) = runtime::channel("popup");
    let (notice_tx, notices) = mpsc::unbounded_channel();

    let mut coordinator = Coordinator::new(store, config.server.clone(), http.clone(), notice_tx)
        .with_popup(popup);

    let (tab, content, offers) = match page {
        Some(page) => {
            let tab = TabInfo {
                title: page.document_title(),
                url: page.url().clone(),
            };
            let (content, content_inbox) = runtime::channel("content");
            let script = ContentScript::new(
                page,
                Arc::new(MangaExtractor::new(&config.extraction)),
                background.clone(),
                Duration::from_secs(config.extraction.offer_timeout_sec),
            )
            .watch_for_token(&config.auth, Arc::clone(slot));
            let offers = script.offers();
            script.spawn(content_inbox);
            coordinator = coordinator.with_content(content.clone());
            (tab, Some(content), Some(offers))
        }
        None => {
            let url = Url::parse(&config.server.base_url).context("Invalid server URL")?;
            let tab = TabInfo {
                title: String::new(),
                url,
            };
            (tab, None, None)
        }
    };
    coordinator.spawn(background_inbox);

    let launcher = Arc::new(CliLauncher {
        browser: BrowserLauncher::new(config.auth.browser_command.clone()),
        slot: Arc::clone(slot),
        console: Console::new(),
        reading_stdin: AtomicBool::new(false),
    });
    let mut session = ReviewSession::new(store, config, http, popup_inbox, launcher, tab)
        .with_handoff(Arc::clone(slot), background.clone());
    if let Some(content) = content {
        session = session.with_content(content);
    }

    Ok(Contexts {
        background,
        session,
        offers,
        notices,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let console = Console::new();

    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    telemetry::init_tracing(config.extraction.debug);

    let data_dir = config.data_dir()?;
    let store = ExtensionStore::in_dir(&data_dir);
    let slot = HandoffSlot::in_dir(&data_dir);

    if let Some(server) = &args.server {
        let server = server.trim().trim_end_matches('/');
        Url::parse(server).with_context(|| format!("Invalid server URL: {server}"))?;
        store
            .scoped(StoreScope::Popup)
            .set_server_url(server)
            .await
            .context("Failed to save server URL")?;
    }

    match args.command {
        Command::Extract { url, html, json } => {
            extract(&console, &config, &url, html, json).await
        }
        Command::Add {
            url,
            html,
            yes,
            quick,
            edits,
        } => {
            let page = load_page(&console, &config, &url, html).await?;
            let contexts = start_contexts(&config, &store, &slot, Some(page))?;
            add(&console, contexts, &edits.to_edits(), yes, quick).await
        }
        Command::Login => {
            let contexts = start_contexts(&config, &store, &slot, None)?;
            login(&console, contexts).await
        }
        Command::Handoff { token } => {
            let token = AuthToken::new(token);
            if token.is_empty() {
                anyhow::bail!("Token is empty");
            }
            slot.deposit(&token).await.context("Failed to deposit token")?;
            console.success("Token deposited");
            Ok(())
        }
        Command::Logout => {
            store
                .scoped(StoreScope::Background)
                .clear_auth_token()
                .await
                .context("Failed to remove token")?;
            console.success("Signed out");
            Ok(())
        }
        Command::Pending { clear } => {
            let popup = store.scoped(StoreScope::Popup);
            if clear {
                popup.clear_pending_manga().await.context("Failed to clear pending record")?;
                console.success("Pending record discarded");
                return Ok(());
            }
            match popup.pending_manga().await.context("Failed to read pending record")? {
                Some(record) => {
                    console.section(&record.title);
                    print_record(&console, &record);
                }
                None => console.info("No pending record"),
            }
            Ok(())
        }
        Command::Sites => {
            let extractor = MangaExtractor::new(&config.extraction);
            console.section("Sites with dedicated extraction");
            for profile in extractor.registry().all() {
                console.field(&profile.label, &profile.host);
            }
            console.info("Other sites use generic lookups.");
            Ok(())
        }
    }
}

async fn load_page(
    console: &Console,
    config: &Config,
    url: &str,
    html: Option<PathBuf>,
) -> Result<Page> {
    let page = match html {
        Some(path) => {
            console.step(&format!("Reading {}", path.display()));
            FilePageSource::new(path).load(url).await
        }
        None => {
            console.step(&format!("Fetching {}", console.link(url)));
            HttpPageSource::new(&config.scraping)?.load(url).await
        }
    };
    page.with_context(|| format!("Failed to load {url}"))
}

fn print_record(console: &Console, record: &MangaRecord) {
    console.field("Title", &record.title);
    console.field("Chapter", &record.current_chapter);
    console.field("Status", &record.status);
    console.field("Author", &record.author);
    console.field("Genres", &record.genres.join(", "));
    console.field("Source", &record.source);
    console.field("Cover", &record.img_path);
    console.field("URL", &record.url);
    console.field("Description", &record.description);
}

async fn extract(
    console: &Console,
    config: &Config,
    url: &str,
    html: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let page = load_page(console, config, url, html).await?;
    let extractor = MangaExtractor::new(&config.extraction);
    let record = extractor.extract(&page);

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    match extractor.registry().find_for_host(page.hostname()) {
        Some(profile) => console.info(&format!("Using the {} profile", profile.label)),
        None => console.info("No dedicated profile; using generic lookups"),
    }
    console.section(&record.title);
    print_record(console, &record);
    Ok(())
}

async fn confirm(question: &str) -> Result<bool> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(format!("{question} [Y/n] ").as_bytes()).await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(!line.trim().to_lowercase().starts_with('n'))
}

async fn add(
    console: &Console,
    mut contexts: Contexts,
    edits: &ReviewEdits,
    yes: bool,
    quick: bool,
) -> Result<()> {
    if quick && edits.is_empty() {
        // Same path as the page's floating button: the coordinator submits
        // directly and asks for a review only when it cannot.
        contexts
            .background
            .request(Message::ExtractPageData)
            .await
            .context("Extraction failed")?;
        let offer = contexts
            .offers
            .as_ref()
            .and_then(|offers| offers.borrow().clone());
        if offer.is_some_and(Offer::accept) {
            match contexts.notices.recv().await {
                Some(Notice::Added { title }) => {
                    console.success(&format!("Added {} to your library", console.highlight(&title)));
                    return Ok(());
                }
                Some(Notice::ReviewRequested { reason }) => console.warning(&reason),
                None => anyhow::bail!("Background coordinator stopped"),
            }
        }
    } else if quick {
        console.warning("Ignoring --quick because field overrides were given");
    }

    let record = contexts.session.load_record().await?;
    console.section(&record.title);
    print_record(console, &record);

    if !edits.is_empty() {
        let mut edited = record.clone();
        edited.apply(edits);
        console.section("With your changes");
        print_record(console, &edited);
    }

    if !yes && !confirm("Add to your library?").await? {
        console.info("Not added. Run `mangaclip pending --clear` to discard the record.");
        return Ok(());
    }

    match contexts.session.submit(edits).await {
        Ok(created) => {
            console.success(&format!(
                "Added {} to your library",
                console.highlight(&created.title)
            ));
            Ok(())
        }
        Err(e) => {
            console.info("The record stays pending; run `mangaclip add` again to retry.");
            Err(e.into())
        }
    }
}

async fn login(console: &Console, mut contexts: Contexts) -> Result<()> {
    if contexts.session.check_authentication().await.is_some() {
        console.success(&format!(
            "Already signed in to {}",
            console.link(&contexts.session.server_url().await)
        ));
        return Ok(());
    }

    contexts.session.authenticate(None).await?;
    console.success(&format!(
        "Signed in to {}",
        console.link(&contexts.session.server_url().await)
    ));
    Ok(())
}
