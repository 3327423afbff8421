// Postgres-backed LeadStore.
//
// Nested value objects (aliases, locations, breakdown, dossier, selectors) live
// in JSONB columns; enums are stored as their snake_case text form.
// Unique indexes on lower(companies.name) and (leads.company_name, leads.source_url)
// back the uniqueness rules the pipeline relies on.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use leadsignal_common::{
    Company, CompanySize, CompanyStatus, Contact, Dossier, FetchMode, InferredProduct, Lead,
    LeadSignalError, LeadSource, LeadStatus, Location, Priority, ScoreBreakdown, Source,
    SourceStatus, SourceType,
};

use crate::traits::LeadStore;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, LeadSignalError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| LeadSignalError::Database(e.to_string()))?;
        Ok(Self::new(pool))
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<(), LeadSignalError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| LeadSignalError::Database(e.to_string()))?;
        Ok(())
    }

    /// Upsert configured sources by name. Crawl counters and status are kept.
    pub async fn sync_sources(&self, sources: &[Source]) -> Result<()> {
        for source in sources {
            sqlx::query(
                r#"
                INSERT INTO sources
                    (id, name, url, source_type, fetch, headers, active, schedule_enabled,
                     status, priority, reliability_score, crawl_count, error_count,
                     leads_generated, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 0, 0, 0, $12)
                ON CONFLICT (name) DO UPDATE SET
                    url = EXCLUDED.url,
                    source_type = EXCLUDED.source_type,
                    fetch = EXCLUDED.fetch,
                    headers = EXCLUDED.headers,
                    active = EXCLUDED.active,
                    schedule_enabled = EXCLUDED.schedule_enabled,
                    priority = EXCLUDED.priority,
                    reliability_score = EXCLUDED.reliability_score
                "#,
            )
            .bind(source.id)
            .bind(&source.name)
            .bind(&source.url)
            .bind(source.source_type.to_string())
            .bind(Json(&source.fetch))
            .bind(Json(&source.headers))
            .bind(source.active)
            .bind(source.schedule_enabled)
            .bind(source.status.to_string())
            .bind(source.priority)
            .bind(source.reliability_score)
            .bind(source.created_at)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to sync source {}", source.name))?;
        }
        info!(count = sources.len(), "Synced sources");
        Ok(())
    }
}

// --- Rows ---

#[derive(Debug, sqlx::FromRow)]
struct CompanyRow {
    id: Uuid,
    name: String,
    aliases: Json<Vec<String>>,
    industry: String,
    size: Option<String>,
    status: String,
    headquarters: Option<Json<Location>>,
    locations: Json<Vec<Location>>,
    contacts: Json<Vec<Contact>>,
    product_needs: Json<Vec<String>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CompanyRow> for Company {
    fn from(row: CompanyRow) -> Self {
        Company {
            id: row.id,
            name: row.name,
            aliases: row.aliases.0,
            industry: row.industry,
            size: row.size.as_deref().and_then(CompanySize::from_str_loose),
            status: CompanyStatus::from_str_loose(&row.status),
            headquarters: row.headquarters.map(|j| j.0),
            locations: row.locations.0,
            contacts: row.contacts.0,
            product_needs: row.product_needs.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LeadRow {
    id: Uuid,
    title: String,
    company_id: Option<Uuid>,
    company_name: String,
    status: String,
    priority: String,
    score: i32,
    breakdown: Json<ScoreBreakdown>,
    explanation: String,
    inferred_products: Json<Vec<InferredProduct>>,
    source_type: String,
    source_name: String,
    source_url: String,
    scraped_at: DateTime<Utc>,
    raw_snippet: String,
    dossier: Json<Dossier>,
    location: Option<Json<Location>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LeadRow> for Lead {
    fn from(row: LeadRow) -> Self {
        Lead {
            id: row.id,
            title: row.title,
            company_id: row.company_id,
            company_name: row.company_name,
            status: LeadStatus::from_str_loose(&row.status),
            priority: Priority::from_str_loose(&row.priority),
            score: row.score.clamp(0, 100) as u32,
            breakdown: row.breakdown.0,
            explanation: row.explanation,
            inferred_products: row.inferred_products.0,
            source: LeadSource {
                source_type: SourceType::from_str_loose(&row.source_type),
                name: row.source_name,
                url: row.source_url,
                scraped_at: row.scraped_at,
                raw_snippet: row.raw_snippet,
            },
            dossier: row.dossier.0,
            location: row.location.map(|j| j.0),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SourceRow {
    id: Uuid,
    name: String,
    url: String,
    source_type: String,
    fetch: Json<FetchMode>,
    headers: Json<BTreeMap<String, String>>,
    active: bool,
    schedule_enabled: bool,
    status: String,
    priority: i32,
    reliability_score: f64,
    crawl_count: i32,
    error_count: i32,
    leads_generated: i32,
    last_crawled: Option<DateTime<Utc>>,
    last_success: Option<DateTime<Utc>>,
    last_error: Option<String>,
    last_error_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<SourceRow> for Source {
    fn from(row: SourceRow) -> Self {
        Source {
            id: row.id,
            name: row.name,
            url: row.url,
            source_type: SourceType::from_str_loose(&row.source_type),
            fetch: row.fetch.0,
            headers: row.headers.0,
            active: row.active,
            schedule_enabled: row.schedule_enabled,
            status: SourceStatus::from_str_loose(&row.status),
            priority: row.priority,
            reliability_score: row.reliability_score,
            crawl_count: row.crawl_count.max(0) as u32,
            error_count: row.error_count.max(0) as u32,
            leads_generated: row.leads_generated.max(0) as u32,
            last_crawled: row.last_crawled,
            last_success: row.last_success,
            last_error: row.last_error,
            last_error_at: row.last_error_at,
            created_at: row.created_at,
        }
    }
}

fn counter(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

// --- LeadStore ---

#[async_trait]
impl LeadStore for PgStore {
    async fn find_company_by_exact_name(&self, name: &str) -> Result<Option<Company>> {
        let row = sqlx::query_as::<_, CompanyRow>(
            "SELECT * FROM companies WHERE lower(name) = lower($1) LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up company by name")?;
        Ok(row.map(Company::from))
    }

    async fn find_company_by_alias(&self, alias: &str) -> Result<Option<Company>> {
        let row = sqlx::query_as::<_, CompanyRow>(
            r#"
            SELECT * FROM companies
            WHERE EXISTS (
                SELECT 1 FROM jsonb_array_elements_text(aliases) AS a(alias)
                WHERE lower(a.alias) = lower($1)
            )
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(alias)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up company by alias")?;
        Ok(row.map(Company::from))
    }

    async fn find_company_by_id(&self, id: Uuid) -> Result<Option<Company>> {
        let row = sqlx::query_as::<_, CompanyRow>("SELECT * FROM companies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to look up company by id")?;
        Ok(row.map(Company::from))
    }

    async fn list_companies_for_fuzzy_match(&self, limit: usize) -> Result<Vec<Company>> {
        let rows = sqlx::query_as::<_, CompanyRow>(
            "SELECT * FROM companies ORDER BY created_at DESC LIMIT $1",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list companies")?;
        Ok(rows.into_iter().map(Company::from).collect())
    }

    async fn create_company(&self, company: Company) -> Result<Company> {
        sqlx::query(
            r#"
            INSERT INTO companies
                (id, name, aliases, industry, size, status, headquarters, locations,
                 contacts, product_needs, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(company.id)
        .bind(&company.name)
        .bind(Json(&company.aliases))
        .bind(&company.industry)
        .bind(company.size.map(|s| s.to_string()))
        .bind(company.status.to_string())
        .bind(company.headquarters.as_ref().map(Json))
        .bind(Json(&company.locations))
        .bind(Json(&company.contacts))
        .bind(Json(&company.product_needs))
        .bind(company.created_at)
        .bind(company.updated_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to create company {}", company.name))?;
        Ok(company)
    }

    async fn save_company(&self, company: &Company) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE companies SET
                name = $2, aliases = $3, industry = $4, size = $5, status = $6,
                headquarters = $7, locations = $8, contacts = $9, product_needs = $10,
                updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(company.id)
        .bind(&company.name)
        .bind(Json(&company.aliases))
        .bind(&company.industry)
        .bind(company.size.map(|s| s.to_string()))
        .bind(company.status.to_string())
        .bind(company.headquarters.as_ref().map(Json))
        .bind(Json(&company.locations))
        .bind(Json(&company.contacts))
        .bind(Json(&company.product_needs))
        .bind(company.updated_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save company {}", company.name))?;
        Ok(())
    }

    async fn find_lead_by_company_and_source_url(
        &self,
        company_name: &str,
        source_url: &str,
    ) -> Result<Option<Lead>> {
        let row = sqlx::query_as::<_, LeadRow>(
            "SELECT * FROM leads WHERE company_name = $1 AND source_url = $2 LIMIT 1",
        )
        .bind(company_name)
        .bind(source_url)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up lead")?;
        Ok(row.map(Lead::from))
    }

    async fn create_lead(&self, lead: Lead) -> Result<Lead> {
        sqlx::query(
            r#"
            INSERT INTO leads
                (id, title, company_id, company_name, status, priority, score, breakdown,
                 explanation, inferred_products, source_type, source_name, source_url,
                 scraped_at, raw_snippet, dossier, location, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                    $16, $17, $18, $19)
            "#,
        )
        .bind(lead.id)
        .bind(&lead.title)
        .bind(lead.company_id)
        .bind(&lead.company_name)
        .bind(lead.status.to_string())
        .bind(lead.priority.to_string())
        .bind(counter(lead.score))
        .bind(Json(&lead.breakdown))
        .bind(&lead.explanation)
        .bind(Json(&lead.inferred_products))
        .bind(lead.source.source_type.to_string())
        .bind(&lead.source.name)
        .bind(&lead.source.url)
        .bind(lead.source.scraped_at)
        .bind(&lead.source.raw_snippet)
        .bind(Json(&lead.dossier))
        .bind(lead.location.as_ref().map(Json))
        .bind(lead.created_at)
        .bind(lead.updated_at)
        .execute(&self.pool)
        .await
        .with_context(|| {
            format!(
                "Failed to create lead for {} at {}",
                lead.company_name, lead.source.url
            )
        })?;
        Ok(lead)
    }

    async fn save_lead(&self, lead: &Lead) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE leads SET
                title = $2, status = $3, priority = $4, score = $5, breakdown = $6,
                explanation = $7, inferred_products = $8, dossier = $9, location = $10,
                updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(lead.id)
        .bind(&lead.title)
        .bind(lead.status.to_string())
        .bind(lead.priority.to_string())
        .bind(counter(lead.score))
        .bind(Json(&lead.breakdown))
        .bind(&lead.explanation)
        .bind(Json(&lead.inferred_products))
        .bind(Json(&lead.dossier))
        .bind(lead.location.as_ref().map(Json))
        .bind(lead.updated_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save lead {}", lead.id))?;
        Ok(())
    }

    async fn list_leads(&self) -> Result<Vec<Lead>> {
        let rows = sqlx::query_as::<_, LeadRow>("SELECT * FROM leads ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list leads")?;
        Ok(rows.into_iter().map(Lead::from).collect())
    }

    async fn list_active_sources(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query_as::<_, SourceRow>(
            "SELECT * FROM sources WHERE active ORDER BY priority, created_at",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list sources")?;
        Ok(rows.into_iter().map(Source::from).collect())
    }

    async fn save_source(&self, source: &Source) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sources SET
                status = $2, crawl_count = $3, error_count = $4, leads_generated = $5,
                last_crawled = $6, last_success = $7, last_error = $8, last_error_at = $9
            WHERE id = $1
            "#,
        )
        .bind(source.id)
        .bind(source.status.to_string())
        .bind(counter(source.crawl_count))
        .bind(counter(source.error_count))
        .bind(counter(source.leads_generated))
        .bind(source.last_crawled)
        .bind(source.last_success)
        .bind(&source.last_error)
        .bind(source.last_error_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save source {}", source.name))?;
        Ok(())
    }
}
