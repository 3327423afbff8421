use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Company ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanySize {
    Startup,
    Small,
    Medium,
    Large,
    Enterprise,
}

impl std::fmt::Display for CompanySize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompanySize::Startup => write!(f, "startup"),
            CompanySize::Small => write!(f, "small"),
            CompanySize::Medium => write!(f, "medium"),
            CompanySize::Large => write!(f, "large"),
            CompanySize::Enterprise => write!(f, "enterprise"),
        }
    }
}

impl CompanySize {
    /// Unrecognised values map to `None` so scoring falls back to its default addend.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "startup" => Some(Self::Startup),
            "small" => Some(Self::Small),
            "medium" => Some(Self::Medium),
            "large" => Some(Self::Large),
            "enterprise" => Some(Self::Enterprise),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyStatus {
    Prospect,
    Customer,
    Inactive,
}

impl std::fmt::Display for CompanyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompanyStatus::Prospect => write!(f, "prospect"),
            CompanyStatus::Customer => write!(f, "customer"),
            CompanyStatus::Inactive => write!(f, "inactive"),
        }
    }
}

impl CompanyStatus {
    pub fn from_str_loose(s: &str) -> Self {
        match s {
            "customer" => Self::Customer,
            "inactive" => Self::Inactive,
            _ => Self::Prospect,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

impl Location {
    pub fn in_state(state: impl Into<String>) -> Self {
        Self {
            state: Some(state.into()),
            city: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    #[serde(default)]
    pub designation: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Canonical organization record. Primary names are unique case-insensitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    /// Alternate spellings seen in the wild. Never equal to another company's name.
    pub aliases: Vec<String>,
    pub industry: String,
    pub size: Option<CompanySize>,
    pub status: CompanyStatus,
    pub headquarters: Option<Location>,
    pub locations: Vec<Location>,
    pub contacts: Vec<Contact>,
    pub product_needs: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    /// A fresh prospect as first sighted by the pipeline.
    pub fn new(name: impl Into<String>, industry: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            aliases: Vec::new(),
            industry: industry.into(),
            size: Some(CompanySize::Medium),
            status: CompanyStatus::Prospect,
            headquarters: None,
            locations: Vec::new(),
            contacts: Vec::new(),
            product_needs: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_alias(&self, candidate: &str) -> bool {
        let candidate = candidate.to_lowercase();
        self.aliases.iter().any(|a| a.to_lowercase() == candidate)
    }

    pub fn headquarters_state(&self) -> Option<&str> {
        self.headquarters
            .as_ref()
            .and_then(|hq| hq.state.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

// --- Lead ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Proposal,
    Negotiation,
    Won,
    Lost,
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeadStatus::New => write!(f, "new"),
            LeadStatus::Contacted => write!(f, "contacted"),
            LeadStatus::Qualified => write!(f, "qualified"),
            LeadStatus::Proposal => write!(f, "proposal"),
            LeadStatus::Negotiation => write!(f, "negotiation"),
            LeadStatus::Won => write!(f, "won"),
            LeadStatus::Lost => write!(f, "lost"),
        }
    }
}

impl LeadStatus {
    pub fn from_str_loose(s: &str) -> Self {
        match s {
            "contacted" => Self::Contacted,
            "qualified" => Self::Qualified,
            "proposal" => Self::Proposal,
            "negotiation" => Self::Negotiation,
            "won" => Self::Won,
            "lost" => Self::Lost,
            _ => Self::New,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

impl Priority {
    /// Tier boundaries are inclusive: 80 is critical, 60 high, 40 medium.
    pub fn from_score(total: u32) -> Self {
        match total {
            80.. => Self::Critical,
            60..=79 => Self::High,
            40..=59 => Self::Medium,
            _ => Self::Low,
        }
    }

    pub fn from_str_loose(s: &str) -> Self {
        match s {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" => Self::Medium,
            _ => Self::Low,
        }
    }
}

/// Per-dimension sub-scores, each in `0..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub company_fit: u32,
    pub signal_strength: u32,
    pub urgency: u32,
    pub volume_potential: u32,
    pub geographic_fit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredProduct {
    pub code: String,
    pub name: String,
    /// 0-100.
    pub confidence: u32,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadSource {
    pub source_type: SourceType,
    pub name: String,
    pub url: String,
    pub scraped_at: DateTime<Utc>,
    pub raw_snippet: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dossier {
    pub procurement_clues: Vec<String>,
    pub urgency_indicators: Vec<String>,
    pub next_action: Option<String>,
}

/// A single sales opportunity. `(company_name, source.url)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub title: String,
    pub company_id: Option<Uuid>,
    /// Denormalized for listing and dedup.
    pub company_name: String,
    pub status: LeadStatus,
    pub priority: Priority,
    pub score: u32,
    pub breakdown: ScoreBreakdown,
    pub explanation: String,
    pub inferred_products: Vec<InferredProduct>,
    pub source: LeadSource,
    pub dossier: Dossier,
    pub location: Option<Location>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn state(&self) -> Option<&str> {
        self.location
            .as_ref()
            .and_then(|l| l.state.as_deref())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn max_product_confidence(&self) -> Option<u32> {
        self.inferred_products.iter().map(|p| p.confidence).max()
    }
}

// --- Source ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Tender,
    News,
    Directory,
    Website,
    Social,
    Referral,
    Manual,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Tender => write!(f, "tender"),
            SourceType::News => write!(f, "news"),
            SourceType::Directory => write!(f, "directory"),
            SourceType::Website => write!(f, "website"),
            SourceType::Social => write!(f, "social"),
            SourceType::Referral => write!(f, "referral"),
            SourceType::Manual => write!(f, "manual"),
        }
    }
}

impl SourceType {
    pub fn from_str_loose(s: &str) -> Self {
        match s {
            "tender" => Self::Tender,
            "news" | "rss" => Self::News,
            "directory" => Self::Directory,
            "social" => Self::Social,
            "referral" => Self::Referral,
            "manual" => Self::Manual,
            _ => Self::Website,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Active,
    Paused,
    Error,
}

impl std::fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceStatus::Active => write!(f, "active"),
            SourceStatus::Paused => write!(f, "paused"),
            SourceStatus::Error => write!(f, "error"),
        }
    }
}

impl SourceStatus {
    pub fn from_str_loose(s: &str) -> Self {
        match s {
            "paused" => Self::Paused,
            "error" => Self::Error,
            _ => Self::Active,
        }
    }
}

/// CSS selectors for HTML sources. Unset selectors fall back to the container's own text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlSelectors {
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FetchMode {
    Rss,
    Html(HtmlSelectors),
}

/// A crawl target plus its governance counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub source_type: SourceType,
    pub fetch: FetchMode,
    pub headers: BTreeMap<String, String>,
    pub active: bool,
    pub schedule_enabled: bool,
    pub status: SourceStatus,
    /// Lower runs first.
    pub priority: i32,
    pub reliability_score: f64,
    pub crawl_count: u32,
    pub error_count: u32,
    pub leads_generated: u32,
    pub last_crawled: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Source {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        source_type: SourceType,
        fetch: FetchMode,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            url: url.into(),
            source_type,
            fetch,
            headers: BTreeMap::new(),
            active: true,
            schedule_enabled: true,
            status: SourceStatus::Active,
            priority: 0,
            reliability_score: 0.5,
            crawl_count: 0,
            error_count: 0,
            leads_generated: 0,
            last_crawled: None,
            last_success: None,
            last_error: None,
            last_error_at: None,
            created_at: Utc::now(),
        }
    }

    /// Whether a scheduled full run should visit this source.
    pub fn is_schedulable(&self) -> bool {
        self.active && self.schedule_enabled && self.status != SourceStatus::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_boundaries_are_inclusive() {
        assert_eq!(Priority::from_score(100), Priority::Critical);
        assert_eq!(Priority::from_score(80), Priority::Critical);
        assert_eq!(Priority::from_score(79), Priority::High);
        assert_eq!(Priority::from_score(60), Priority::High);
        assert_eq!(Priority::from_score(59), Priority::Medium);
        assert_eq!(Priority::from_score(40), Priority::Medium);
        assert_eq!(Priority::from_score(39), Priority::Low);
        assert_eq!(Priority::from_score(0), Priority::Low);
    }

    #[test]
    fn enum_display_round_trips_through_loose_parse() {
        for status in [
            LeadStatus::New,
            LeadStatus::Contacted,
            LeadStatus::Qualified,
            LeadStatus::Proposal,
            LeadStatus::Negotiation,
            LeadStatus::Won,
            LeadStatus::Lost,
        ] {
            assert_eq!(LeadStatus::from_str_loose(&status.to_string()), status);
        }
        for kind in [
            SourceType::Tender,
            SourceType::News,
            SourceType::Directory,
            SourceType::Website,
            SourceType::Social,
            SourceType::Referral,
            SourceType::Manual,
        ] {
            assert_eq!(SourceType::from_str_loose(&kind.to_string()), kind);
        }
        assert_eq!(CompanySize::from_str_loose("Enterprise"), Some(CompanySize::Enterprise));
        assert_eq!(CompanySize::from_str_loose("huge"), None);
    }

    #[test]
    fn company_alias_check_ignores_case() {
        let mut company = Company::new("Tata Steel Limited", "Steel");
        company.aliases.push("Tata Steel Ltd.".to_string());
        assert!(company.has_alias("TATA STEEL LTD."));
        assert!(!company.has_alias("Tata Steel"));
    }

    #[test]
    fn error_status_excludes_source_from_schedule() {
        let mut source = Source::new("cppp", "https://example.gov/tenders", SourceType::Tender, FetchMode::Rss);
        assert!(source.is_schedulable());
        source.status = SourceStatus::Error;
        assert!(!source.is_schedulable());
        source.status = SourceStatus::Active;
        source.schedule_enabled = false;
        assert!(!source.is_schedulable());
    }

    #[test]
    fn fetch_mode_is_tagged_by_mode() {
        let json = r#"{"mode":"html","container":".row","title":"a"}"#;
        let mode: FetchMode = serde_json::from_str(json).unwrap();
        match mode {
            FetchMode::Html(sel) => {
                assert_eq!(sel.container.as_deref(), Some(".row"));
                assert_eq!(sel.title.as_deref(), Some("a"));
                assert!(sel.link.is_none());
            }
            FetchMode::Rss => panic!("expected html mode"),
        }
    }
}
