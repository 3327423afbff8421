// In-process LeadStore. Backs dry runs without DATABASE_URL and every test.

use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use leadsignal_common::{Company, Lead, Source};

use crate::traits::LeadStore;

#[derive(Default)]
struct Inner {
    companies: Vec<Company>,
    leads: Vec<Lead>,
    sources: Vec<Source>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sources(sources: Vec<Source>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                sources,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Snapshots ---

    pub fn companies(&self) -> Vec<Company> {
        self.lock().companies.clone()
    }

    pub fn leads(&self) -> Vec<Lead> {
        self.lock().leads.clone()
    }

    pub fn sources(&self) -> Vec<Source> {
        self.lock().sources.clone()
    }

    pub fn source(&self, name: &str) -> Option<Source> {
        self.lock().sources.iter().find(|s| s.name == name).cloned()
    }
}

#[async_trait]
impl LeadStore for MemoryStore {
    async fn find_company_by_exact_name(&self, name: &str) -> Result<Option<Company>> {
        let name = name.to_lowercase();
        Ok(self
            .lock()
            .companies
            .iter()
            .find(|c| c.name.to_lowercase() == name)
            .cloned())
    }

    async fn find_company_by_alias(&self, alias: &str) -> Result<Option<Company>> {
        Ok(self
            .lock()
            .companies
            .iter()
            .find(|c| c.has_alias(alias))
            .cloned())
    }

    async fn find_company_by_id(&self, id: Uuid) -> Result<Option<Company>> {
        Ok(self.lock().companies.iter().find(|c| c.id == id).cloned())
    }

    async fn list_companies_for_fuzzy_match(&self, limit: usize) -> Result<Vec<Company>> {
        let mut companies = self.lock().companies.clone();
        companies.reverse();
        companies.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        companies.truncate(limit);
        Ok(companies)
    }

    async fn create_company(&self, company: Company) -> Result<Company> {
        let mut inner = self.lock();
        let name = company.name.to_lowercase();
        if inner.companies.iter().any(|c| c.name.to_lowercase() == name) {
            bail!("company name already exists: {}", company.name);
        }
        inner.companies.push(company.clone());
        Ok(company)
    }

    async fn save_company(&self, company: &Company) -> Result<()> {
        let mut inner = self.lock();
        if let Some(clash) = inner
            .companies
            .iter()
            .find(|c| c.id != company.id && company.has_alias(&c.name))
        {
            bail!("alias collides with company name: {}", clash.name);
        }
        match inner.companies.iter_mut().find(|c| c.id == company.id) {
            Some(existing) => {
                *existing = company.clone();
                Ok(())
            }
            None => bail!("company not found: {}", company.id),
        }
    }

    async fn find_lead_by_company_and_source_url(
        &self,
        company_name: &str,
        source_url: &str,
    ) -> Result<Option<Lead>> {
        Ok(self
            .lock()
            .leads
            .iter()
            .find(|l| l.company_name == company_name && l.source.url == source_url)
            .cloned())
    }

    async fn create_lead(&self, lead: Lead) -> Result<Lead> {
        let mut inner = self.lock();
        if inner
            .leads
            .iter()
            .any(|l| l.company_name == lead.company_name && l.source.url == lead.source.url)
        {
            bail!(
                "lead already exists for {} at {}",
                lead.company_name,
                lead.source.url
            );
        }
        inner.leads.push(lead.clone());
        Ok(lead)
    }

    async fn save_lead(&self, lead: &Lead) -> Result<()> {
        let mut inner = self.lock();
        match inner.leads.iter_mut().find(|l| l.id == lead.id) {
            Some(existing) => {
                *existing = lead.clone();
                Ok(())
            }
            None => bail!("lead not found: {}", lead.id),
        }
    }

    async fn list_leads(&self) -> Result<Vec<Lead>> {
        Ok(self.lock().leads.clone())
    }

    async fn list_active_sources(&self) -> Result<Vec<Source>> {
        let mut sources: Vec<Source> = self
            .lock()
            .sources
            .iter()
            .filter(|s| s.active)
            .cloned()
            .collect();
        sources.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(sources)
    }

    async fn save_source(&self, source: &Source) -> Result<()> {
        let mut inner = self.lock();
        match inner.sources.iter_mut().find(|s| s.id == source.id) {
            Some(existing) => *existing = source.clone(),
            None => inner.sources.push(source.clone()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadsignal_common::{FetchMode, SourceType};

    #[tokio::test]
    async fn company_names_are_unique_ignoring_case() {
        let store = MemoryStore::new();
        store.create_company(Company::new("Adani Power", "Power")).await.unwrap();
        assert!(store.create_company(Company::new("ADANI POWER", "Power")).await.is_err());
        assert!(store.find_company_by_exact_name("adani power").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn alias_may_not_shadow_another_company() {
        let store = MemoryStore::new();
        store.create_company(Company::new("Adani Power", "Power")).await.unwrap();
        let mut other = store
            .create_company(Company::new("Adani Green", "Power"))
            .await
            .unwrap();
        other.aliases.push("adani power".to_string());
        assert!(store.save_company(&other).await.is_err());
    }

    #[tokio::test]
    async fn fuzzy_pool_is_most_recent_first_and_bounded() {
        let store = MemoryStore::new();
        let base = chrono::Utc::now();
        for (i, name) in ["Alpha", "Beta", "Gamma"].iter().enumerate() {
            let mut c = Company::new(*name, "Other");
            c.created_at = base + chrono::Duration::seconds(i as i64);
            store.create_company(c).await.unwrap();
        }
        let pool = store.list_companies_for_fuzzy_match(2).await.unwrap();
        let names: Vec<_> = pool.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Gamma", "Beta"]);
    }

    #[tokio::test]
    async fn active_sources_ordered_by_priority_then_age() {
        let base = chrono::Utc::now();
        let mut a = Source::new("a", "https://a.example.com", SourceType::News, FetchMode::Rss);
        a.priority = 2;
        let mut b = Source::new("b", "https://b.example.com", SourceType::News, FetchMode::Rss);
        b.priority = 1;
        b.created_at = base + chrono::Duration::seconds(1);
        let mut c = Source::new("c", "https://c.example.com", SourceType::News, FetchMode::Rss);
        c.priority = 1;
        c.created_at = base;
        let mut d = Source::new("d", "https://d.example.com", SourceType::News, FetchMode::Rss);
        d.active = false;

        let store = MemoryStore::with_sources(vec![a, b, c, d]);
        let names: Vec<_> = store
            .list_active_sources()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["c", "b", "a"]);
    }
}
