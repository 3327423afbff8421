// Test mocks for the lead pipeline.
//
// MockContentFetcher (ContentFetcher): HashMap-based URL→page/feed, with
// optional per-URL failures. MemoryStore (LeadStore) is reused as-is.
//
// Plus helpers for constructing sources and feed entries.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use leadsignal_common::{FetchMode, HtmlSelectors, Source, SourceType};

use crate::fetcher::FetchError;
use crate::traits::{ContentFetcher, FeedEntry};

pub use crate::store::MemoryStore;

// ---------------------------------------------------------------------------
// MockContentFetcher
// ---------------------------------------------------------------------------

/// Returns `Err` for unregistered URLs.
/// Builder pattern: `.on_page()`, `.on_feed()`, `.on_status()`.
#[derive(Default)]
pub struct MockContentFetcher {
    pages: HashMap<String, String>,
    feeds: HashMap<String, Vec<FeedEntry>>,
    statuses: HashMap<String, u16>,
}

impl MockContentFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn on_feed(mut self, url: &str, entries: Vec<FeedEntry>) -> Self {
        self.feeds.insert(url.to_string(), entries);
        self
    }

    /// Make any request to `url` fail with an HTTP status.
    pub fn on_status(mut self, url: &str, status: u16) -> Self {
        self.statuses.insert(url.to_string(), status);
        self
    }

    fn check_status(&self, url: &str) -> Result<(), FetchError> {
        match self.statuses.get(url) {
            Some(status) => Err(FetchError::Http {
                url: url.to_string(),
                status: *status,
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ContentFetcher for MockContentFetcher {
    async fn page(
        &self,
        url: &str,
        _headers: &BTreeMap<String, String>,
    ) -> Result<String, FetchError> {
        self.check_status(url)?;
        self.pages.get(url).cloned().ok_or_else(|| FetchError::Http {
            url: url.to_string(),
            status: 404,
        })
    }

    async fn feed(&self, url: &str) -> Result<Vec<FeedEntry>, FetchError> {
        self.check_status(url)?;
        self.feeds.get(url).cloned().ok_or_else(|| FetchError::FeedParse {
            url: url.to_string(),
            message: "MockContentFetcher: no feed registered".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn rss_source(name: &str, url: &str, source_type: SourceType) -> Source {
    Source::new(name, url, source_type, FetchMode::Rss)
}

pub fn html_source(name: &str, url: &str, source_type: SourceType, selectors: HtmlSelectors) -> Source {
    Source::new(name, url, source_type, FetchMode::Html(selectors))
}

pub fn feed_entry(title: &str, summary: &str, link: &str) -> FeedEntry {
    FeedEntry {
        title: Some(title.to_string()),
        summary: Some(summary.to_string()),
        content: None,
        link: Some(link.to_string()),
        published: None,
    }
}
