// Lead assembly: one fetched item in, at most one scored lead out.
//
// resolve company → infer products → dedup on (company name, item url) →
// build dossier → score → single insert. Items with no product signal are
// dropped before anything is written apart from the company record.

use std::sync::{Arc, LazyLock};

use anyhow::Result;
use chrono::Utc;
use regex::Regex;
use tracing::debug;
use uuid::Uuid;

use leadsignal_common::{
    Dossier, Lead, LeadSource, LeadStatus, Priority, ScoreBreakdown, Source,
};

use crate::fetcher::FetchedItem;
use crate::inference::ProductInference;
use crate::resolver::EntityResolver;
use crate::scoring::{apply_score, score_lead};
use crate::traits::LeadStore;

const RAW_SNIPPET_CHARS: usize = 500;

/// Ordered label table. Every matching label is kept, in this order.
static URGENCY_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)\b(urgent|urgently|immediate|immediately|asap)\b", "Urgent requirement"),
        (r"(?i)tender|bid|rfq|rfp|eoi", "Active tender/RFQ"),
        (r"(?i)\b(deadline|last date|closing date)\b", "Has deadline"),
        (r"(?i)\b(expansion|new plant|capacity)\b", "Expansion activity"),
        (r"(?i)contract.*expir|renewal", "Contract renewal"),
        (r"(?i)\b(shortage|supply issues?)\b", "Supply shortage"),
        (r"(?i)\b(commissioning|commissioned|startup|start-up|launch|launched)\b", "New commissioning"),
    ]
    .into_iter()
    .map(|(pattern, label)| (Regex::new(pattern).unwrap(), label))
    .collect()
});

pub fn extract_urgency_indicators(text: &str) -> Vec<String> {
    URGENCY_RULES
        .iter()
        .filter(|(re, _)| re.is_match(text))
        .map(|(_, label)| label.to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssemblyOutcome {
    Created(Box<Lead>),
    Duplicate { lead_id: Uuid },
    NoSignal,
}

pub struct LeadAssembler {
    store: Arc<dyn LeadStore>,
    resolver: EntityResolver,
    inference: ProductInference,
}

impl LeadAssembler {
    pub fn new(
        store: Arc<dyn LeadStore>,
        resolver: EntityResolver,
        inference: ProductInference,
    ) -> Self {
        Self {
            store,
            resolver,
            inference,
        }
    }

    pub async fn assemble(&self, item: &FetchedItem, source: &Source) -> Result<AssemblyOutcome> {
        let raw_company = if item.company.trim().is_empty() {
            &item.title
        } else {
            &item.company
        };
        let company = self.resolver.resolve(raw_company).await?;

        let text = format!("{} {} {}", item.title, item.description, company.name);
        let products = self.inference.infer_products(&text, Some(&company.industry));
        if products.is_empty() {
            debug!(title = %item.title, "No product signal, skipping item");
            return Ok(AssemblyOutcome::NoSignal);
        }

        if let Some(existing) = self
            .store
            .find_lead_by_company_and_source_url(&company.name, &item.url)
            .await?
        {
            debug!(company = %company.name, url = %item.url, "Duplicate lead, skipping");
            return Ok(AssemblyOutcome::Duplicate {
                lead_id: existing.id,
            });
        }

        let now = Utc::now();
        let clue = if item.description.trim().is_empty() {
            item.title.clone()
        } else {
            item.description.clone()
        };
        let signal_text = format!("{} {}", item.title, item.description);
        let snippet: String = signal_text.trim().chars().take(RAW_SNIPPET_CHARS).collect();

        let mut lead = Lead {
            id: Uuid::new_v4(),
            title: item.title.clone(),
            company_id: Some(company.id),
            company_name: company.name.clone(),
            status: LeadStatus::New,
            priority: Priority::Low,
            score: 0,
            breakdown: ScoreBreakdown::default(),
            explanation: String::new(),
            inferred_products: products,
            source: LeadSource {
                source_type: source.source_type,
                name: source.name.clone(),
                url: item.url.clone(),
                scraped_at: now,
                raw_snippet: snippet,
            },
            dossier: Dossier {
                procurement_clues: vec![clue],
                urgency_indicators: extract_urgency_indicators(&signal_text),
                next_action: None,
            },
            location: company.headquarters.clone(),
            created_at: now,
            updated_at: now,
        };

        let score = score_lead(&lead, Some(&company));
        apply_score(&mut lead, &score);

        let lead = self.store.create_lead(lead).await?;
        debug!(
            company = %lead.company_name,
            score = lead.score,
            priority = %lead.priority,
            "Created lead"
        );
        Ok(AssemblyOutcome::Created(Box::new(lead)))
    }
}
