// Source fetcher: turns one configured Source into a list of raw items.
//
// RSS sources go through feed-rs; HTML sources are fetched with reqwest and
// walked with CSS selectors. DOM parsing is synchronous and happens after the
// network await so the parsed document never crosses a suspension point.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use leadsignal_common::{FetchMode, HtmlSelectors, Source};

use crate::traits::{ContentFetcher, FeedEntry};

/// Container-text fallback length for items without a title selector.
const TITLE_FALLBACK_CHARS: usize = 200;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("failed to parse feed at {url}: {message}")]
    FeedParse { url: String, message: String },

    #[error("invalid CSS selector {selector:?}: {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("invalid url: {url}")]
    InvalidUrl { url: String },
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// One raw item pulled from a source, before resolution and inference.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchedItem {
    pub title: String,
    pub description: String,
    /// Empty when the source does not name a company.
    pub company: String,
    pub date: Option<String>,
    pub url: String,
}

// ---------------------------------------------------------------------------
// SourceFetcher
// ---------------------------------------------------------------------------

pub struct SourceFetcher {
    content: Arc<dyn ContentFetcher>,
}

impl SourceFetcher {
    pub fn new(content: Arc<dyn ContentFetcher>) -> Self {
        Self { content }
    }

    /// Fetch a source, logging and swallowing any failure.
    pub async fn fetch(&self, source: &Source) -> Vec<FetchedItem> {
        match self.try_fetch(source).await {
            Ok(items) => items,
            Err(e) => {
                warn!(source = %source.name, url = %source.url, error = %e, "Source fetch failed");
                Vec::new()
            }
        }
    }

    /// Fetch a source, surfacing the failure to the caller.
    pub async fn try_fetch(&self, source: &Source) -> Result<Vec<FetchedItem>, FetchError> {
        let items = match &source.fetch {
            FetchMode::Rss => {
                let entries = self.content.feed(&source.url).await?;
                feed_entries_to_items(entries, &source.url)
            }
            FetchMode::Html(selectors) => {
                let html = self.content.page(&source.url, &source.headers).await?;
                parse_html_items(&html, &source.url, selectors)?
            }
        };
        info!(source = %source.name, items = items.len(), "Fetched source");
        Ok(items)
    }
}

/// Setup-time check that a source's URL and selectors are usable.
pub fn validate_source(source: &Source) -> Result<(), FetchError> {
    Url::parse(&source.url).map_err(|_| FetchError::InvalidUrl {
        url: source.url.clone(),
    })?;
    if let FetchMode::Html(selectors) = &source.fetch {
        CompiledSelectors::compile(selectors)?;
    }
    Ok(())
}

// --- RSS ---

pub fn feed_entries_to_items(entries: Vec<FeedEntry>, source_url: &str) -> Vec<FetchedItem> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let title = entry.title.map(|t| strip_html(&t)).unwrap_or_default();
            let description = entry
                .summary
                .filter(|s| !s.trim().is_empty())
                .or(entry.content)
                .map(|s| strip_html(&s))
                .unwrap_or_default();
            if title.is_empty() && description.is_empty() {
                return None;
            }
            Some(FetchedItem {
                title,
                description,
                company: String::new(),
                date: entry.published.map(|d| d.to_rfc3339()),
                url: entry
                    .link
                    .filter(|l| !l.trim().is_empty())
                    .unwrap_or_else(|| source_url.to_string()),
            })
        })
        .collect()
}

fn strip_html(fragment: &str) -> String {
    let doc = Html::parse_fragment(fragment);
    collapse_whitespace(doc.root_element().text())
}

// --- HTML ---

struct CompiledSelectors {
    container: Selector,
    title: Option<Selector>,
    description: Option<Selector>,
    company: Option<Selector>,
    date: Option<Selector>,
    link: Option<Selector>,
}

impl CompiledSelectors {
    fn compile(selectors: &HtmlSelectors) -> Result<Self, FetchError> {
        Ok(Self {
            container: parse_selector(selectors.container.as_deref().unwrap_or("html"))?,
            title: parse_optional(selectors.title.as_deref())?,
            description: parse_optional(selectors.description.as_deref())?,
            company: parse_optional(selectors.company.as_deref())?,
            date: parse_optional(selectors.date.as_deref())?,
            link: parse_optional(selectors.link.as_deref())?,
        })
    }
}

fn parse_selector(raw: &str) -> Result<Selector, FetchError> {
    Selector::parse(raw).map_err(|e| FetchError::InvalidSelector {
        selector: raw.to_string(),
        message: e.to_string(),
    })
}

fn parse_optional(raw: Option<&str>) -> Result<Option<Selector>, FetchError> {
    raw.filter(|s| !s.trim().is_empty())
        .map(parse_selector)
        .transpose()
}

/// Extract one item per container match. Items with no title are dropped.
pub fn parse_html_items(
    html: &str,
    base_url: &str,
    selectors: &HtmlSelectors,
) -> Result<Vec<FetchedItem>, FetchError> {
    let compiled = CompiledSelectors::compile(selectors)?;
    let base = Url::parse(base_url).map_err(|_| FetchError::InvalidUrl {
        url: base_url.to_string(),
    })?;
    let document = Html::parse_document(html);

    let mut items = Vec::new();
    for container in document.select(&compiled.container) {
        let title = match &compiled.title {
            Some(sel) => select_text(container, sel),
            None => truncate_chars(&element_text(container), TITLE_FALLBACK_CHARS),
        };
        if title.is_empty() {
            continue;
        }

        let url = compiled
            .link
            .as_ref()
            .and_then(|sel| container.select(sel).next())
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| resolve_link(&base, href))
            .unwrap_or_else(|| base_url.to_string());

        items.push(FetchedItem {
            title,
            description: compiled
                .description
                .as_ref()
                .map(|sel| select_text(container, sel))
                .unwrap_or_default(),
            company: compiled
                .company
                .as_ref()
                .map(|sel| select_text(container, sel))
                .unwrap_or_default(),
            date: compiled
                .date
                .as_ref()
                .map(|sel| select_text(container, sel))
                .filter(|d| !d.is_empty()),
            url,
        });
    }

    debug!(url = base_url, items = items.len(), "Parsed HTML items");
    Ok(items)
}

fn select_text(container: ElementRef<'_>, selector: &Selector) -> String {
    container
        .select(selector)
        .next()
        .map(element_text)
        .unwrap_or_default()
}

fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(el.text())
}

fn collapse_whitespace<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}

// ---------------------------------------------------------------------------
// HttpContentFetcher
// ---------------------------------------------------------------------------

/// reqwest-backed fetcher used in production runs.
pub struct HttpContentFetcher {
    client: reqwest::Client,
}

impl HttpContentFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.to_string())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))?;
        Ok(Self { client })
    }

    async fn get(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<reqwest::Response, FetchError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.send().await.map_err(|e| request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

fn request_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Request {
            url: url.to_string(),
            source: e,
        }
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn page(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<String, FetchError> {
        let response = self.get(url, headers).await?;
        response.text().await.map_err(|e| request_error(url, e))
    }

    async fn feed(&self, url: &str) -> Result<Vec<FeedEntry>, FetchError> {
        let response = self.get(url, &BTreeMap::new()).await?;
        let bytes = response.bytes().await.map_err(|e| request_error(url, e))?;
        let feed = feed_rs::parser::parse(&bytes[..]).map_err(|e| FetchError::FeedParse {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(feed
            .entries
            .into_iter()
            .map(|entry| FeedEntry {
                title: entry.title.map(|t| t.content),
                summary: entry.summary.map(|s| s.content),
                content: entry.content.and_then(|c| c.body),
                link: entry.links.first().map(|l| l.href.clone()),
                published: entry
                    .published
                    .or(entry.updated)
                    .map(|dt| dt.with_timezone(&chrono::Utc)),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadsignal_common::SourceType;

    const TENDER_PAGE: &str = r##"
<html><body>
  <table id="tenders">
    <tr class="row">
      <td class="title"><a href="/tender/101">Supply of   Furnace Oil</a></td>
      <td class="org">NTPC Limited</td>
      <td class="closing">2026-11-30</td>
    </tr>
    <tr class="row">
      <td class="title"><a href="https://other.example.com/t/7">Bitumen for road works</a></td>
      <td class="org">NHAI</td>
    </tr>
    <tr class="row">
      <td class="title"><a href="#">   </a></td>
      <td class="org">Nobody</td>
    </tr>
  </table>
</body></html>
"##;

    fn tender_selectors() -> HtmlSelectors {
        HtmlSelectors {
            container: Some("tr.row".to_string()),
            title: Some("td.title a".to_string()),
            company: Some("td.org".to_string()),
            date: Some("td.closing".to_string()),
            link: Some("td.title a".to_string()),
            description: None,
        }
    }

    #[test]
    fn html_items_resolve_relative_links_and_skip_untitled_rows() {
        let items =
            parse_html_items(TENDER_PAGE, "https://eproc.example.gov/list", &tender_selectors())
                .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Supply of Furnace Oil");
        assert_eq!(items[0].company, "NTPC Limited");
        assert_eq!(items[0].date.as_deref(), Some("2026-11-30"));
        assert_eq!(items[0].url, "https://eproc.example.gov/tender/101");
        assert_eq!(items[1].url, "https://other.example.com/t/7");
        assert!(items[1].date.is_none());
    }

    #[test]
    fn missing_title_selector_falls_back_to_truncated_container_text() {
        let long = "x".repeat(300);
        let html = format!("<div class='card'>Diesel {long}</div>");
        let selectors = HtmlSelectors {
            container: Some("div.card".to_string()),
            ..Default::default()
        };
        let items = parse_html_items(&html, "https://example.com/", &selectors).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title.chars().count(), TITLE_FALLBACK_CHARS);
        assert!(items[0].title.starts_with("Diesel x"));
        assert_eq!(items[0].url, "https://example.com/");
    }

    #[test]
    fn invalid_selector_is_reported() {
        let selectors = HtmlSelectors {
            container: Some("tr[[".to_string()),
            ..Default::default()
        };
        let err = parse_html_items("<html></html>", "https://example.com", &selectors).unwrap_err();
        assert!(matches!(err, FetchError::InvalidSelector { .. }));

        let source = Source::new(
            "broken",
            "https://example.com",
            SourceType::Website,
            FetchMode::Html(selectors),
        );
        assert!(validate_source(&source).is_err());
    }

    #[tokio::test]
    async fn fetch_degrades_to_empty_on_failure() {
        use crate::testing::{html_source, rss_source, MockContentFetcher};

        let mock = MockContentFetcher::new()
            .on_status("https://down.example.com/rss", 503)
            .on_page("https://eproc.example.gov/list", TENDER_PAGE);
        let fetcher = SourceFetcher::new(Arc::new(mock));

        let down = rss_source("Down", "https://down.example.com/rss", SourceType::News);
        assert!(fetcher.fetch(&down).await.is_empty());
        assert!(matches!(
            fetcher.try_fetch(&down).await,
            Err(FetchError::Http { status: 503, .. })
        ));

        let broken = html_source(
            "Broken selectors",
            "https://eproc.example.gov/list",
            SourceType::Tender,
            HtmlSelectors {
                container: Some("tr[[".to_string()),
                ..Default::default()
            },
        );
        assert!(fetcher.fetch(&broken).await.is_empty());

        let working = html_source(
            "Tenders",
            "https://eproc.example.gov/list",
            SourceType::Tender,
            tender_selectors(),
        );
        assert_eq!(fetcher.fetch(&working).await.len(), 2);
    }

    #[test]
    fn feed_entries_prefer_summary_and_fall_back_to_source_url() {
        let entries = vec![
            FeedEntry {
                title: Some("Refinery expansion".to_string()),
                summary: Some("<p>New <b>LPG</b> unit</p>".to_string()),
                content: Some("ignored".to_string()),
                link: None,
                published: None,
            },
            FeedEntry {
                title: Some("Cement plant order".to_string()),
                summary: None,
                content: Some("Bulk supply of pet coke".to_string()),
                link: Some("https://news.example.com/a/2".to_string()),
                published: None,
            },
            FeedEntry::default(),
        ];
        let items = feed_entries_to_items(entries, "https://news.example.com/rss");

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].description, "New LPG unit");
        assert_eq!(items[0].url, "https://news.example.com/rss");
        assert!(items[0].company.is_empty());
        assert_eq!(items[1].description, "Bulk supply of pet coke");
        assert_eq!(items[1].url, "https://news.example.com/a/2");
    }
}
