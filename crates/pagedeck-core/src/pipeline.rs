use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::aggregate::{self, ImportOutcome};
use crate::anki::{self, AnkiClient, BatchRequest};
use crate::completion::CompletionClient;
use crate::config::AppConfig;
use crate::error::{CoreError, Result};
use crate::mapper;
use crate::normalize;
use crate::prompt;

/// Host capability that returns the visible text of a page.
///
/// `tab` identifies the page in whatever way the host understands
/// (a file path, a URL, a browser tab id).
#[async_trait]
pub trait PageTextProvider: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &'static str;

    /// Capture the page's full text. Failures are `CoreError::Extraction`.
    async fn capture(&self, tab: &str) -> Result<String>;
}

/// Progress and outcome events for the user-facing status surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    ReadingPage,
    GeneratingCards,
    ImportingCards(usize),
    Finished(ImportOutcome),
    Failed(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::ReadingPage => write!(f, "reading page..."),
            Status::GeneratingCards => write!(f, "generating cards..."),
            Status::ImportingCards(n) => {
                let noun = if *n == 1 { "card" } else { "cards" };
                write!(f, "importing {n} {noun}...")
            }
            Status::Finished(outcome) => write!(f, "{outcome}"),
            Status::Failed(message) => write!(f, "error: {message}"),
        }
    }
}

pub trait StatusSink: Send + Sync {
    fn report(&self, status: &Status);
}

/// Run capture, generation, normalization and mapping; stop before import.
pub async fn prepare_batch(
    config: &AppConfig,
    provider: &dyn PageTextProvider,
    tab: &str,
    status: &dyn StatusSink,
) -> Result<BatchRequest> {
    if config.ai.api_key.trim().is_empty() {
        return Err(CoreError::MissingApiKey);
    }

    status.report(&Status::ReadingPage);
    let page_text = provider.capture(tab).await?;
    let snippet = prompt::truncate_snippet(&page_text, config.page.max_chars);
    info!(
        provider = provider.name(),
        page_chars = page_text.chars().count(),
        snippet_chars = snippet.chars().count(),
        "page captured"
    );

    status.report(&Status::GeneratingCards);
    let prompt = prompt::build_prompt(snippet);
    let raw = CompletionClient::new(&config.ai).complete(&prompt).await?;
    debug!(reply_chars = raw.chars().count(), "completion received");

    let cards = normalize::normalize(&raw)?;
    info!(cards = cards.len(), "cards generated");

    let actions = mapper::map_cards(cards, &config.anki);
    Ok(anki::build_batch(actions))
}

/// The full single-shot chain: page → model → cards → one bulk import.
///
/// Any failing stage aborts the rest. The final status event is always
/// reported, success or not.
pub async fn run_pipeline(
    config: &AppConfig,
    provider: &dyn PageTextProvider,
    tab: &str,
    status: &dyn StatusSink,
) -> Result<ImportOutcome> {
    let result = import_page(config, provider, tab, status).await;
    match &result {
        Ok(outcome) => status.report(&Status::Finished(outcome.clone())),
        Err(e) => {
            error!(error = %e, "run failed");
            status.report(&Status::Failed(e.to_string()));
        }
    }
    result
}

/// Like [`run_pipeline`] but stops before import and yields the batch.
///
/// A failure is reported as the final status event; success reports nothing
/// further since no import happened.
pub async fn preview_batch(
    config: &AppConfig,
    provider: &dyn PageTextProvider,
    tab: &str,
    status: &dyn StatusSink,
) -> Result<BatchRequest> {
    let result = prepare_batch(config, provider, tab, status).await;
    if let Err(e) = &result {
        error!(error = %e, "dry run failed");
        status.report(&Status::Failed(e.to_string()));
    }
    result
}

async fn import_page(
    config: &AppConfig,
    provider: &dyn PageTextProvider,
    tab: &str,
    status: &dyn StatusSink,
) -> Result<ImportOutcome> {
    let batch = prepare_batch(config, provider, tab, status).await?;
    let total = batch.len();

    status.report(&Status::ImportingCards(total));
    let client = AnkiClient::new(&config.anki);
    let response = client.submit(&batch).await?;

    aggregate::aggregate(response, total, &config.anki)
}

/// Allows at most one run in flight.
#[derive(Clone, Default)]
pub struct Runner {
    busy: Arc<AtomicBool>,
}

/// Held for the duration of a run; releases the runner when dropped.
pub struct RunGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn try_begin(&self) -> Result<RunGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| CoreError::Busy)?;
        Ok(RunGuard {
            busy: self.busy.clone(),
        })
    }

    pub async fn run(
        &self,
        config: &AppConfig,
        provider: &dyn PageTextProvider,
        tab: &str,
        status: &dyn StatusSink,
    ) -> Result<ImportOutcome> {
        let _guard = self.try_begin()?;
        run_pipeline(config, provider, tab, status).await
    }
}
