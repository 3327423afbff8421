// Trait seams for the lead pipeline's external collaborators.
//
// LeadStore: the document store holding companies, leads and sources.
// ContentFetcher: raw HTTP GET and RSS/Atom parsing.
//
// In-process implementations: MemoryStore, MockContentFetcher (test-support).

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use leadsignal_common::{Company, Lead, Source};

use crate::fetcher::FetchError;

// ---------------------------------------------------------------------------
// LeadStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait LeadStore: Send + Sync {
    // --- Companies ---

    /// Case-insensitive exact match on the primary name.
    async fn find_company_by_exact_name(&self, name: &str) -> Result<Option<Company>>;

    /// Case-insensitive exact match on any alias.
    async fn find_company_by_alias(&self, alias: &str) -> Result<Option<Company>>;

    async fn find_company_by_id(&self, id: Uuid) -> Result<Option<Company>>;

    /// Most recently created companies first, at most `limit`.
    async fn list_companies_for_fuzzy_match(&self, limit: usize) -> Result<Vec<Company>>;

    /// Insert a new company. Fails if the primary name is already taken.
    async fn create_company(&self, company: Company) -> Result<Company>;

    async fn save_company(&self, company: &Company) -> Result<()>;

    // --- Leads ---

    async fn find_lead_by_company_and_source_url(
        &self,
        company_name: &str,
        source_url: &str,
    ) -> Result<Option<Lead>>;

    /// Insert a new lead. Fails on a duplicate `(company_name, source.url)`.
    async fn create_lead(&self, lead: Lead) -> Result<Lead>;

    async fn save_lead(&self, lead: &Lead) -> Result<()>;

    async fn list_leads(&self) -> Result<Vec<Lead>>;

    // --- Sources ---

    /// Sources with the active flag set, ordered by priority then creation.
    async fn list_active_sources(&self) -> Result<Vec<Source>>;

    async fn save_source(&self, source: &Source) -> Result<()>;
}

// ---------------------------------------------------------------------------
// ContentFetcher
// ---------------------------------------------------------------------------

/// One RSS/Atom entry as handed over by the feed parser.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// GET a page and return the document text.
    async fn page(&self, url: &str, headers: &BTreeMap<String, String>)
        -> Result<String, FetchError>;

    /// Fetch and parse an RSS/Atom feed, preserving entry order.
    async fn feed(&self, url: &str) -> Result<Vec<FeedEntry>, FetchError>;
}
