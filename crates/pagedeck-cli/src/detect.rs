use std::path::PathBuf;

use pagedeck_core::PageTextProvider;
use tracing::debug;

use crate::page::{FilePage, StdinPage, UrlPage};

/// What a tab handle on the command line refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabHandle {
    Stdin,
    Url(String),
    File(PathBuf),
}

impl TabHandle {
    /// `-` is stdin, `http(s)://…` is a URL, anything else is a file path.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed == "-" {
            return TabHandle::Stdin;
        }

        let lower = trimmed.to_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return TabHandle::Url(trimmed.to_string());
        }

        TabHandle::File(PathBuf::from(trimmed))
    }
}

/// Create the page text provider for a tab handle.
pub fn create_page_provider(tab: &TabHandle) -> Box<dyn PageTextProvider> {
    let provider: Box<dyn PageTextProvider> = match tab {
        TabHandle::Stdin => Box::new(StdinPage),
        TabHandle::Url(_) => Box::new(UrlPage::new()),
        TabHandle::File(path) => Box::new(FilePage::new(path.clone())),
    };
    debug!(provider = provider.name(), tab = ?tab, "selected page provider");
    provider
}
