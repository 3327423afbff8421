// Entity resolution: map a free-text company name to a canonical Company.
//
// Exact name, then exact alias, then token-set Jaccard over a bounded pool of
// recent companies. Anything below the fuzzy threshold becomes a new prospect.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use anyhow::Result;
use chrono::Utc;
use regex::Regex;
use tracing::{debug, info};

use leadsignal_common::Company;

use crate::traits::LeadStore;

/// Minimum Jaccard similarity for two names to be the same entity.
pub const FUZZY_MATCH_THRESHOLD: f64 = 0.7;

pub const DEFAULT_CANDIDATE_LIMIT: usize = 500;

pub const UNKNOWN_COMPANY: &str = "Unknown Company";

const CORPORATE_SUFFIXES: &[&str] = &[
    "ltd",
    "limited",
    "pvt",
    "private",
    "inc",
    "incorporated",
    "corp",
    "corporation",
    "co",
    "company",
    "llp",
    "llc",
    "plc",
    "group",
    "holdings",
];

/// Ordered label → keyword table. First hit wins.
const INDUSTRY_KEYWORDS: &[(&str, &[&str])] = &[
    ("Steel", &["steel", "ispat", "iron", "metal", "alloy"]),
    ("Cement", &["cement", "concrete"]),
    ("Power", &["power", "energy", "electric", "thermal", "solar"]),
    ("Mining", &["mining", "mines", "minerals", "coal"]),
    ("Oil & Gas", &["petroleum", "refinery", "oil", "gas"]),
    ("Chemicals", &["chemical", "petrochem", "polymer", "plastics"]),
    ("Fertilizers", &["fertilizer", "fertiliser"]),
    ("Logistics", &["logistics", "transport", "shipping", "freight", "cargo", "carriers"]),
    ("Aviation", &["aviation", "airline", "airways", "airport"]),
    ("Construction", &["construction", "infra", "builders", "engineering", "projects"]),
    ("Textiles", &["textile", "spinning", "fabrics", "garments"]),
    ("Pharmaceuticals", &["pharma", "drugs", "healthcare"]),
    ("Food Processing", &["food", "dairy", "beverages", "sugar", "agro"]),
    ("Automotive", &["automobile", "automotive", "motors", "auto"]),
    ("Hospitality", &["hotel", "resorts", "hospitality"]),
    ("Manufacturing", &["industries", "manufacturing", "udyog", "mills", "works"]),
];

static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9\s]").unwrap());

/// Lowercase, drop punctuation and corporate suffix tokens, collapse whitespace.
pub fn normalize_name(raw: &str) -> String {
    let lower = raw.to_lowercase();
    let cleaned = NON_ALNUM.replace_all(&lower, "");
    cleaned
        .split_whitespace()
        .filter(|token| !CORPORATE_SUFFIXES.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Token-set Jaccard similarity. Two empty inputs score 0.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let a_tokens: HashSet<&str> = a.split_whitespace().collect();
    let b_tokens: HashSet<&str> = b.split_whitespace().collect();
    let intersection = a_tokens.intersection(&b_tokens).count();
    let union = a_tokens.union(&b_tokens).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

pub fn infer_industry(raw_name: &str) -> &'static str {
    let lower = raw_name.to_lowercase();
    INDUSTRY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(label, _)| *label)
        .unwrap_or("Other")
}

/// How a name was resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchKind {
    Exact,
    Alias,
    Fuzzy { similarity: f64 },
    Created,
}

pub struct EntityResolver {
    store: Arc<dyn LeadStore>,
    candidate_limit: usize,
}

impl EntityResolver {
    pub fn new(store: Arc<dyn LeadStore>) -> Self {
        Self {
            store,
            candidate_limit: DEFAULT_CANDIDATE_LIMIT,
        }
    }

    pub fn with_candidate_limit(mut self, limit: usize) -> Self {
        self.candidate_limit = limit;
        self
    }

    pub async fn resolve(&self, raw_name: &str) -> Result<Company> {
        self.resolve_with_match(raw_name).await.map(|(c, _)| c)
    }

    pub async fn resolve_with_match(&self, raw_name: &str) -> Result<(Company, MatchKind)> {
        let trimmed = raw_name.trim();
        let name = if trimmed.chars().count() < 2 {
            UNKNOWN_COMPANY
        } else {
            trimmed
        };

        if let Some(company) = self.store.find_company_by_exact_name(name).await? {
            return Ok((company, MatchKind::Exact));
        }
        if let Some(company) = self.store.find_company_by_alias(name).await? {
            return Ok((company, MatchKind::Alias));
        }

        let normalized = normalize_name(name);
        let candidates = self
            .store
            .list_companies_for_fuzzy_match(self.candidate_limit)
            .await?;

        let mut best: Option<(Company, f64)> = None;
        for candidate in candidates {
            let similarity = std::iter::once(&candidate.name)
                .chain(candidate.aliases.iter())
                .map(|n| jaccard_similarity(&normalized, &normalize_name(n)))
                .fold(0.0_f64, f64::max);
            if best.as_ref().map_or(true, |(_, s)| similarity > *s) {
                best = Some((candidate, similarity));
            }
        }

        if let Some((mut company, similarity)) = best {
            if similarity >= FUZZY_MATCH_THRESHOLD {
                if !company.has_alias(name) && !company.name.eq_ignore_ascii_case(name) {
                    company.aliases.push(name.to_string());
                    company.updated_at = Utc::now();
                    self.store.save_company(&company).await?;
                    info!(company = %company.name, alias = name, similarity, "Added alias from fuzzy match");
                } else {
                    debug!(company = %company.name, similarity, "Fuzzy match");
                }
                return Ok((company, MatchKind::Fuzzy { similarity }));
            }
        }

        let company = self
            .store
            .create_company(Company::new(name, infer_industry(name)))
            .await?;
        info!(company = %company.name, industry = %company.industry, "Created company");
        Ok((company, MatchKind::Created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn normalize_strips_punctuation_and_suffixes() {
        assert_eq!(normalize_name("Tata Steel Ltd."), "tata steel");
        assert_eq!(normalize_name("Tata Steel Limited"), "tata steel");
        assert_eq!(normalize_name("  Reliance   Industries Pvt. Ltd "), "reliance industries");
        assert_eq!(normalize_name("Coal India"), "coal india");
    }

    #[test]
    fn jaccard_handles_empty_and_partial_overlap() {
        assert_eq!(jaccard_similarity("", ""), 0.0);
        assert_eq!(jaccard_similarity("tata steel", "tata steel"), 1.0);
        assert!((jaccard_similarity("jsw steel", "tata steel") - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn industry_table_first_hit_wins() {
        assert_eq!(infer_industry("JSW Ispat Special Products"), "Steel");
        assert_eq!(infer_industry("UltraTech Cement"), "Cement");
        assert_eq!(infer_industry("Adani Power"), "Power");
        assert_eq!(infer_industry("Shree Udyog"), "Manufacturing");
        assert_eq!(infer_industry("Zeta Consulting"), "Other");
    }

    #[tokio::test]
    async fn fuzzy_match_appends_alias() {
        let store = Arc::new(MemoryStore::new());
        let existing = store
            .create_company(Company::new("Tata Steel Limited", "Steel"))
            .await
            .unwrap();
        let resolver = EntityResolver::new(store.clone());

        let (company, kind) = resolver.resolve_with_match("Tata Steel Ltd.").await.unwrap();
        assert_eq!(company.id, existing.id);
        assert!(matches!(kind, MatchKind::Fuzzy { similarity } if similarity == 1.0));
        assert_eq!(company.aliases, vec!["Tata Steel Ltd.".to_string()]);

        let stored = store.find_company_by_id(existing.id).await.unwrap().unwrap();
        assert_eq!(stored.aliases, vec!["Tata Steel Ltd.".to_string()]);

        // Second sighting now hits the alias path and leaves aliases unchanged.
        let (again, kind) = resolver.resolve_with_match("tata steel ltd.").await.unwrap();
        assert_eq!(again.id, existing.id);
        assert_eq!(kind, MatchKind::Alias);
        assert_eq!(again.aliases.len(), 1);
    }

    #[tokio::test]
    async fn resolution_is_idempotent_for_new_names() {
        let store = Arc::new(MemoryStore::new());
        let resolver = EntityResolver::new(store.clone());

        let (first, kind) = resolver.resolve_with_match("  Bharat Cement Works ").await.unwrap();
        assert_eq!(kind, MatchKind::Created);
        assert_eq!(first.name, "Bharat Cement Works");
        assert_eq!(first.industry, "Cement");

        let (second, kind) = resolver.resolve_with_match("BHARAT CEMENT WORKS").await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(kind, MatchKind::Exact);
        assert_eq!(store.companies().len(), 1);
    }

    #[tokio::test]
    async fn short_or_empty_names_become_unknown_company() {
        let store = Arc::new(MemoryStore::new());
        let resolver = EntityResolver::new(store.clone());

        let a = resolver.resolve("").await.unwrap();
        let b = resolver.resolve(" x ").await.unwrap();
        assert_eq!(a.name, UNKNOWN_COMPANY);
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn below_threshold_creates_new_company() {
        let store = Arc::new(MemoryStore::new());
        store
            .create_company(Company::new("Tata Steel Limited", "Steel"))
            .await
            .unwrap();
        let resolver = EntityResolver::new(store.clone());

        let (company, kind) = resolver.resolve_with_match("JSW Steel").await.unwrap();
        assert_eq!(kind, MatchKind::Created);
        assert_eq!(company.name, "JSW Steel");
        assert_eq!(store.companies().len(), 2);
    }

    #[tokio::test]
    async fn fuzzy_ties_keep_the_first_candidate() {
        let store = Arc::new(MemoryStore::new());
        let older = store
            .create_company(Company::new("Apex Fuels Private Limited", "Other"))
            .await
            .unwrap();
        let mut newer = Company::new("Apex Fuels LLP", "Other");
        newer.created_at = older.created_at + chrono::Duration::seconds(5);
        let newer = store.create_company(newer).await.unwrap();
        let resolver = EntityResolver::new(store.clone());

        // Candidates come most-recent first, so the newer record is seen first.
        let company = resolver.resolve("Apex Fuels Inc").await.unwrap();
        assert_eq!(company.id, newer.id);
        let again = resolver.resolve("Apex Fuels Corp").await.unwrap();
        assert_eq!(again.id, newer.id);
    }
}
