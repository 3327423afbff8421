// Multi-factor lead scoring.
//
// Five dimensions, each built from additive rules and clamped to 0..=100, then
// combined with fixed weights. Every rule that moves a dimension is recorded
// as a ScoreFactor; the explanation is rendered from the final breakdown.

use std::sync::LazyLock;

use anyhow::Result;
use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

use leadsignal_common::{Company, CompanySize, Lead, Priority, ScoreBreakdown, SourceType};

use crate::traits::LeadStore;

// --- Weights and tables ---

const W_COMPANY_FIT: f64 = 0.25;
const W_SIGNAL_STRENGTH: f64 = 0.25;
const W_URGENCY: f64 = 0.20;
const W_VOLUME: f64 = 0.15;
const W_GEOGRAPHIC: f64 = 0.15;

/// Flat company fit when the lead has no resolved company.
const NO_COMPANY_FIT: i32 = 30;

/// Industry keyword → fit. First substring hit wins.
const INDUSTRY_FIT: &[(&str, i32)] = &[
    ("steel", 90),
    ("cement", 90),
    ("power", 85),
    ("mining", 85),
    ("logistics", 85),
    ("aviation", 85),
    ("shipping", 85),
    ("marine", 85),
    ("chemical", 80),
    ("fertilizer", 80),
    ("construction", 80),
    ("infrastructure", 80),
    ("railway", 80),
    ("manufacturing", 75),
    ("textile", 70),
    ("automotive", 70),
    ("pharma", 65),
    ("food", 65),
    ("oil & gas", 60),
    ("hospitality", 55),
];

/// States and union territories served by the distribution network.
const SUPPORTED_TERRITORIES: &[&str] = &[
    "maharashtra",
    "gujarat",
    "karnataka",
    "tamil nadu",
    "andhra pradesh",
    "telangana",
    "kerala",
    "rajasthan",
    "madhya pradesh",
    "uttar pradesh",
    "west bengal",
    "odisha",
    "punjab",
    "haryana",
    "delhi",
    "goa",
    "bihar",
    "jharkhand",
    "chhattisgarh",
    "assam",
];

fn size_fit_bonus(size: Option<CompanySize>) -> i32 {
    match size {
        Some(CompanySize::Enterprise) => 20,
        Some(CompanySize::Large) => 15,
        Some(CompanySize::Medium) => 10,
        Some(CompanySize::Small) => 5,
        Some(CompanySize::Startup) => 3,
        None => 8,
    }
}

fn size_volume_addend(size: Option<CompanySize>) -> i32 {
    match size {
        Some(CompanySize::Enterprise) => 40,
        Some(CompanySize::Large) => 30,
        Some(CompanySize::Medium) => 20,
        Some(CompanySize::Small) => 10,
        Some(CompanySize::Startup) => 5,
        None => 15,
    }
}

pub fn source_reliability(source_type: SourceType) -> i32 {
    match source_type {
        SourceType::Tender => 90,
        SourceType::Referral => 80,
        SourceType::Manual => 70,
        SourceType::News => 60,
        SourceType::Website => 55,
        SourceType::Directory => 50,
        SourceType::Social => 40,
    }
}

static DEADLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(deadline|last date|closing date|due date|bid submission|submission date|on or before)\b").unwrap()
});
static URGENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(urgent|urgently|immediate|immediately|asap|at the earliest)\b").unwrap()
});
static EXPANSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(expansion|expand|expanding|new plant|new unit|capacity addition|greenfield|brownfield)\b").unwrap()
});
static BULK_TERMS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(bulk|annual|long[- ]?term|yearly)\b").unwrap());
static LARGE_QUANTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{3,}\s*(mt|mmt|kl|kilolitres?|litres?|liters?|tons?|tonnes?|barrels?|bbl)\b").unwrap()
});

// --- Result types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    CompanyFit,
    SignalStrength,
    Urgency,
    VolumePotential,
    GeographicFit,
}

/// One rule that contributed to a dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreFactor {
    pub dimension: Dimension,
    pub rule: String,
    pub delta: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadScore {
    pub total: u32,
    pub breakdown: ScoreBreakdown,
    pub priority: Priority,
    pub explanation: String,
    pub factors: Vec<ScoreFactor>,
}

/// Accumulates one dimension and clamps once at the end.
struct Tally<'a> {
    dimension: Dimension,
    value: i32,
    factors: &'a mut Vec<ScoreFactor>,
}

impl<'a> Tally<'a> {
    fn new(dimension: Dimension, base: i32, factors: &'a mut Vec<ScoreFactor>) -> Self {
        factors.push(ScoreFactor {
            dimension,
            rule: "base".to_string(),
            delta: base,
        });
        Self {
            dimension,
            value: base,
            factors,
        }
    }

    fn add(&mut self, rule: impl Into<String>, delta: i32) {
        if delta == 0 {
            return;
        }
        self.value += delta;
        self.factors.push(ScoreFactor {
            dimension: self.dimension,
            rule: rule.into(),
            delta,
        });
    }

    fn raise_to(&mut self, rule: impl Into<String>, floor: i32) {
        if floor > self.value {
            let delta = floor - self.value;
            self.add(rule, delta);
        }
    }

    fn finish(self) -> u32 {
        self.value.clamp(0, 100) as u32
    }
}

// --- Scoring ---

/// Score a lead against its company. Pure; the lead is not modified.
pub fn score_lead(lead: &Lead, company: Option<&Company>) -> LeadScore {
    let mut factors = Vec::new();
    let breakdown = ScoreBreakdown {
        company_fit: company_fit(company, &mut factors),
        signal_strength: signal_strength(lead, &mut factors),
        urgency: urgency(lead, &mut factors),
        volume_potential: volume_potential(lead, company, &mut factors),
        geographic_fit: geographic_fit(lead, company, &mut factors),
    };
    let total = weighted_total(&breakdown);
    let priority = Priority::from_score(total);

    LeadScore {
        total,
        breakdown,
        priority,
        explanation: explain(&breakdown, lead, total),
        factors,
    }
}

pub fn weighted_total(b: &ScoreBreakdown) -> u32 {
    let sum = W_COMPANY_FIT * b.company_fit as f64
        + W_SIGNAL_STRENGTH * b.signal_strength as f64
        + W_URGENCY * b.urgency as f64
        + W_VOLUME * b.volume_potential as f64
        + W_GEOGRAPHIC * b.geographic_fit as f64;
    (sum.round() as u32).min(100)
}

fn company_fit(company: Option<&Company>, factors: &mut Vec<ScoreFactor>) -> u32 {
    let Some(company) = company else {
        return Tally::new(Dimension::CompanyFit, NO_COMPANY_FIT, factors).finish();
    };
    let mut tally = Tally::new(Dimension::CompanyFit, 40, factors);

    let industry = company.industry.to_lowercase();
    if let Some((keyword, fit)) = INDUSTRY_FIT.iter().find(|(k, _)| industry.contains(k)) {
        tally.raise_to(format!("industry fit: {keyword}"), *fit);
    }
    let size = company
        .size
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    tally.add(format!("size: {size}"), size_fit_bonus(company.size));
    if !company.contacts.is_empty() {
        tally.add("has contact", 5);
    }
    if company.locations.len() > 1 {
        tally.add("multiple locations", 5);
    }
    tally.finish()
}

fn signal_strength(lead: &Lead, factors: &mut Vec<ScoreFactor>) -> u32 {
    let mut tally = Tally::new(Dimension::SignalStrength, 30, factors);
    let source_type = lead.source.source_type;
    tally.raise_to(
        format!("source reliability: {source_type}"),
        source_reliability(source_type),
    );

    if let Some(max_confidence) = lead.max_product_confidence() {
        let bonus = (max_confidence as f64 * 0.2).round() as i32;
        let capped = (tally.value + bonus).min(100) - tally.value;
        tally.add("product confidence", capped.max(0));
    }
    if lead.inferred_products.len() > 1 {
        tally.add("multiple products", 10);
    }
    tally.finish()
}

fn urgency(lead: &Lead, factors: &mut Vec<ScoreFactor>) -> u32 {
    let mut tally = Tally::new(Dimension::Urgency, 20, factors);
    let indicators = lead.dossier.urgency_indicators.len() as i32;
    tally.add(format!("{indicators} urgency indicators"), indicators * 15);
    if lead.source.source_type == SourceType::Tender {
        tally.add("tender source", 30);
    }

    let snippet = &lead.source.raw_snippet;
    if DEADLINE_RE.is_match(snippet) {
        tally.add("deadline language", 15);
    }
    if URGENT_RE.is_match(snippet) {
        tally.add("urgent language", 20);
    }
    if EXPANSION_RE.is_match(snippet) {
        tally.add("expansion language", 10);
    }
    tally.finish()
}

fn volume_potential(lead: &Lead, company: Option<&Company>, factors: &mut Vec<ScoreFactor>) -> u32 {
    let mut tally = Tally::new(Dimension::VolumePotential, 30, factors);
    let size = company.and_then(|c| c.size);
    tally.add("size addend", size_volume_addend(size));

    let products = lead.inferred_products.len() as i32;
    tally.add(format!("{products} inferred products"), (products * 8).min(30));

    let dossier = serde_json::to_string(&lead.dossier)
        .unwrap_or_default()
        .to_lowercase();
    if BULK_TERMS_RE.is_match(&dossier) {
        tally.add("bulk/annual language", 15);
    }
    if LARGE_QUANTITY_RE.is_match(&dossier) {
        tally.add("large quantity", 10);
    }
    tally.finish()
}

fn geographic_fit(lead: &Lead, company: Option<&Company>, factors: &mut Vec<ScoreFactor>) -> u32 {
    let mut tally = Tally::new(Dimension::GeographicFit, 30, factors);
    let state = lead
        .state()
        .or_else(|| company.and_then(Company::headquarters_state));

    if let Some(state) = state {
        let normalized = state.trim().to_lowercase();
        if SUPPORTED_TERRITORIES.contains(&normalized.as_str()) {
            tally.add(format!("supported territory: {normalized}"), 50);
        } else {
            tally.add(format!("known state: {normalized}"), 20);
        }
    }
    if company.is_some_and(|c| c.locations.len() > 2) {
        tally.add("multi-site presence", 10);
    }
    tally.finish()
}

fn explain(b: &ScoreBreakdown, lead: &Lead, total: u32) -> String {
    let mut parts = Vec::new();
    match b.company_fit {
        70.. => parts.push("Strong company fit"),
        50..=69 => parts.push("Good company fit"),
        _ => {}
    }
    match b.signal_strength {
        80.. => parts.push("high-confidence signal"),
        60..=79 => parts.push("solid signal"),
        _ => {}
    }
    match b.urgency {
        60.. => parts.push("urgent timeline"),
        40..=59 => parts.push("near-term opportunity"),
        _ => {}
    }
    match b.volume_potential {
        70.. => parts.push("high volume potential"),
        50..=69 => parts.push("moderate volume potential"),
        _ => {}
    }
    match b.geographic_fit {
        70.. => parts.push("core territory"),
        50..=69 => parts.push("serviceable territory"),
        _ => {}
    }

    let mut text = if parts.is_empty() {
        "Weak signal across all dimensions.".to_string()
    } else {
        let mut sentence = parts.join(", ");
        if let Some(first) = sentence.get(..1) {
            sentence = first.to_uppercase() + &sentence[1..];
        }
        sentence + "."
    };

    let top_confidence = lead.max_product_confidence();
    if let Some(top) = lead
        .inferred_products
        .iter()
        .find(|p| Some(p.confidence) == top_confidence)
    {
        text.push_str(&format!(
            " Top product need: {} ({}% confidence).",
            top.name, top.confidence
        ));
    }
    text.push_str(&format!(" Score: {total}/100."));
    text
}

// --- Next action ---

/// Suggested follow-up for the sales desk, by tier and source kind.
pub fn next_action(priority: Priority, source_type: SourceType) -> &'static str {
    match (source_type, priority) {
        (SourceType::Tender, Priority::Critical) => {
            "Prepare bid response immediately and confirm tender documents"
        }
        (SourceType::Tender, Priority::High) => {
            "Review tender documents and prepare a bid response this week"
        }
        (SourceType::Tender, Priority::Medium) => "Track the tender and check bid eligibility",
        (SourceType::Tender, Priority::Low) => "Log the tender for reference",
        (_, Priority::Critical) => "Call the procurement head within a day",
        (_, Priority::High) => "Reach out to the procurement team this week",
        (_, Priority::Medium) => "Add to nurture sequence and qualify the need",
        (_, Priority::Low) => "Monitor for further signals",
    }
}

/// Write a score and its derived fields onto the lead.
pub fn apply_score(lead: &mut Lead, score: &LeadScore) {
    lead.score = score.total;
    lead.breakdown = score.breakdown;
    lead.priority = score.priority;
    lead.explanation = score.explanation.clone();
    lead.dossier.next_action = Some(next_action(score.priority, lead.source.source_type).to_string());
    lead.updated_at = Utc::now();
}

// --- Bulk re-scoring ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RescoreSummary {
    pub rescored: u32,
    pub priority_changed: u32,
    pub failed: u32,
}

/// Recompute and persist the score of every stored lead.
pub async fn rescore_all(store: &dyn LeadStore) -> Result<RescoreSummary> {
    let leads = store.list_leads().await?;
    let mut summary = RescoreSummary::default();

    for mut lead in leads {
        let company = match lead.company_id {
            Some(id) => match store.find_company_by_id(id).await {
                Ok(company) => company,
                Err(e) => {
                    warn!(lead_id = %lead.id, error = %e, "Failed to load company for rescoring");
                    summary.failed += 1;
                    continue;
                }
            },
            None => None,
        };

        let previous = lead.priority;
        let score = score_lead(&lead, company.as_ref());
        apply_score(&mut lead, &score);

        if let Err(e) = store.save_lead(&lead).await {
            warn!(lead_id = %lead.id, error = %e, "Failed to save rescored lead");
            summary.failed += 1;
            continue;
        }
        summary.rescored += 1;
        if previous != lead.priority {
            summary.priority_changed += 1;
        }
    }

    info!(
        rescored = summary.rescored,
        priority_changed = summary.priority_changed,
        failed = summary.failed,
        "Rescoring complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadsignal_common::{
        Contact, Dossier, InferredProduct, LeadSource, LeadStatus, Location,
    };
    use uuid::Uuid;

    fn product(code: &str, name: &str, confidence: u32) -> InferredProduct {
        InferredProduct {
            code: code.to_string(),
            name: name.to_string(),
            confidence,
            reason: String::new(),
        }
    }

    fn lead(source_type: SourceType, products: Vec<InferredProduct>, state: Option<&str>) -> Lead {
        let now = Utc::now();
        Lead {
            id: Uuid::new_v4(),
            title: "Supply of furnace oil".to_string(),
            company_id: None,
            company_name: "Acme".to_string(),
            status: LeadStatus::New,
            priority: Priority::Low,
            score: 0,
            breakdown: ScoreBreakdown::default(),
            explanation: String::new(),
            inferred_products: products,
            source: LeadSource {
                source_type,
                name: "test".to_string(),
                url: "https://example.com/t/1".to_string(),
                scraped_at: now,
                raw_snippet: "Supply of furnace oil".to_string(),
            },
            dossier: Dossier {
                procurement_clues: vec!["Supply of furnace oil".to_string()],
                urgency_indicators: Vec::new(),
                next_action: None,
            },
            location: state.map(Location::in_state),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn tender_enterprise_in_core_territory() {
        let mut company = Company::new("Acme Holdings", "Other");
        company.size = Some(CompanySize::Enterprise);
        let lead = lead(
            SourceType::Tender,
            vec![product("FO", "Furnace Oil", 85)],
            Some("Maharashtra"),
        );

        let score = score_lead(&lead, Some(&company));
        assert_eq!(score.breakdown.company_fit, 60);
        assert_eq!(score.breakdown.signal_strength, 100);
        assert_eq!(score.breakdown.urgency, 50);
        assert_eq!(score.breakdown.volume_potential, 78);
        assert_eq!(score.breakdown.geographic_fit, 80);
        // round(15 + 25 + 10 + 11.7 + 12) = 74
        assert_eq!(score.total, 74);
        assert_eq!(score.priority, Priority::High);
        assert!(score.explanation.ends_with("Score: 74/100."));
        assert!(score
            .explanation
            .contains("Top product need: Furnace Oil (85% confidence)."));
    }

    #[test]
    fn missing_company_gives_flat_fit() {
        let lead = lead(SourceType::News, Vec::new(), None);
        let score = score_lead(&lead, None);
        assert_eq!(score.breakdown.company_fit, 30);
        assert_eq!(score.breakdown.signal_strength, 60);
        assert_eq!(score.breakdown.urgency, 20);
        assert_eq!(score.breakdown.volume_potential, 45);
        assert_eq!(score.breakdown.geographic_fit, 30);
        assert_eq!(score.priority, Priority::Low);
    }

    #[test]
    fn industry_fit_raises_and_extras_clamp() {
        let mut company = Company::new("Jindal Steel", "Steel");
        company.size = Some(CompanySize::Enterprise);
        company.contacts.push(Contact {
            name: "Procurement".to_string(),
            ..Default::default()
        });
        company.locations = vec![
            Location::in_state("Odisha"),
            Location::in_state("Chhattisgarh"),
            Location::in_state("Jharkhand"),
        ];
        company.headquarters = Some(Location::in_state("Odisha"));
        let lead = lead(SourceType::Website, vec![product("FO", "Furnace Oil", 60)], None);

        let score = score_lead(&lead, Some(&company));
        // 90 + 20 + 5 + 5 clamps to 100.
        assert_eq!(score.breakdown.company_fit, 100);
        // HQ state used when the lead has none: 30 + 50 + 10.
        assert_eq!(score.breakdown.geographic_fit, 90);
    }

    #[test]
    fn out_of_territory_state_still_counts() {
        let lead = lead(SourceType::News, Vec::new(), Some("Sikkim"));
        let score = score_lead(&lead, None);
        assert_eq!(score.breakdown.geographic_fit, 50);
    }

    #[test]
    fn urgency_stacks_indicators_and_snippet_language() {
        let mut lead = lead(SourceType::Tender, Vec::new(), None);
        lead.dossier.urgency_indicators =
            vec!["Urgent requirement".to_string(), "Has deadline".to_string()];
        lead.source.raw_snippet =
            "Urgent: bid submission deadline 30 Nov for new plant expansion".to_string();

        let score = score_lead(&lead, None);
        // 20 + 30 + 30 + 15 + 20 + 10 clamps to 100.
        assert_eq!(score.breakdown.urgency, 100);
    }

    #[test]
    fn dossier_language_lifts_volume() {
        let mut lead = lead(SourceType::News, vec![product("HSD", "High Speed Diesel", 75)], None);
        lead.dossier.procurement_clues =
            vec!["Annual rate contract for 1200 KL diesel".to_string()];
        let score = score_lead(&lead, None);
        // 30 + 15 + 8 + 15 + 10
        assert_eq!(score.breakdown.volume_potential, 78);
    }

    #[test]
    fn scores_stay_in_bounds_and_match_priority() {
        let sizes = [
            None,
            Some(CompanySize::Startup),
            Some(CompanySize::Small),
            Some(CompanySize::Medium),
            Some(CompanySize::Large),
            Some(CompanySize::Enterprise),
        ];
        let source_types = [
            SourceType::Tender,
            SourceType::News,
            SourceType::Directory,
            SourceType::Website,
            SourceType::Social,
            SourceType::Referral,
            SourceType::Manual,
        ];
        let catalog = [
            product("FO", "Furnace Oil", 95),
            product("HSD", "High Speed Diesel", 80),
            product("LDO", "Light Diesel Oil", 60),
            product("BIT", "Bitumen", 45),
            product("LPG", "LPG", 30),
        ];

        let mut companies: Vec<Option<Company>> = vec![None];
        for size in sizes {
            let mut company = Company::new("Mega Cement Corp", "Cement");
            company.size = size;
            company.contacts.push(Contact {
                name: "Purchase".to_string(),
                ..Default::default()
            });
            company.locations = vec![
                Location::in_state("Gujarat"),
                Location::in_state("Rajasthan"),
                Location::in_state("Madhya Pradesh"),
            ];
            companies.push(Some(company));
        }

        for company in &companies {
            for source_type in source_types {
                for count in 0..=catalog.len() {
                    for state in [None, Some("Gujarat"), Some("Atlantis")] {
                        let mut lead = lead(source_type, catalog[..count].to_vec(), state);
                        lead.dossier.urgency_indicators =
                            vec!["Urgent requirement".to_string(); 6];
                        lead.dossier.procurement_clues = vec![
                            "Annual bulk contract for 50000 MT, long-term".to_string(),
                        ];
                        lead.source.raw_snippet =
                            "Urgent: deadline 30 Nov, capacity expansion".to_string();

                        let score = score_lead(&lead, company.as_ref());
                        let b = &score.breakdown;
                        for dim in [
                            b.company_fit,
                            b.signal_strength,
                            b.urgency,
                            b.volume_potential,
                            b.geographic_fit,
                        ] {
                            assert!(dim <= 100, "dimension {dim} out of bounds for {source_type}");
                        }
                        assert!(score.total <= 100);
                        assert_eq!(score.total, weighted_total(b));
                        assert_eq!(score.priority, Priority::from_score(score.total));
                    }
                }
            }
        }
    }

    #[test]
    fn factors_sum_to_unclamped_dimension() {
        let lead = lead(SourceType::News, vec![product("FO", "Furnace Oil", 70)], Some("Kerala"));
        let score = score_lead(&lead, None);
        let geo: i32 = score
            .factors
            .iter()
            .filter(|f| f.dimension == Dimension::GeographicFit)
            .map(|f| f.delta)
            .sum();
        assert_eq!(geo, score.breakdown.geographic_fit as i32);
    }

    #[test]
    fn next_action_does_not_change_volume_on_rescore() {
        let lead_before = lead(SourceType::Tender, vec![product("FO", "Furnace Oil", 85)], None);
        let first = score_lead(&lead_before, None);
        let mut lead_after = lead_before.clone();
        apply_score(&mut lead_after, &first);
        assert!(lead_after.dossier.next_action.is_some());
        let second = score_lead(&lead_after, None);
        assert_eq!(first.breakdown, second.breakdown);
        assert_eq!(first.total, second.total);
    }
}
