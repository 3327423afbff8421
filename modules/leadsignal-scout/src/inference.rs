// Rule-based product-need inference.
//
// Each product carries primary keywords, secondary signals, related industries
// and a base confidence. Rules fire in a fixed order and every firing is kept
// as a RuleTrigger so the reason text can be rendered at the boundary.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use leadsignal_common::{InferredProduct, ProductCatalog};

/// Matches below this confidence are dropped.
pub const CONFIDENCE_FLOOR: u32 = 30;
pub const CONFIDENCE_CAP: u32 = 95;

const INDUSTRY_BONUS: u32 = 15;
const VOLUME_BONUS: u32 = 10;
const SECONDARY_PER_HIT: u32 = 5;

struct ProductRule {
    code: &'static str,
    base_confidence: u32,
    primary: &'static [&'static str],
    secondary: &'static [&'static str],
    related_industries: &'static [&'static str],
}

static PRODUCT_RULES: &[ProductRule] = &[
    ProductRule {
        code: "HSD",
        base_confidence: 75,
        primary: &["high speed diesel", "hsd", "diesel"],
        secondary: &["generator", "dg set", "fleet", "trucks", "earthmoving", "locomotive"],
        related_industries: &["logistics", "transport", "mining", "construction", "infrastructure", "railway", "shipping"],
    },
    ProductRule {
        code: "MS",
        base_confidence: 65,
        primary: &["motor spirit", "petrol", "gasoline"],
        secondary: &["two-wheeler", "car fleet", "retail outlet", "fuel station"],
        related_industries: &["automotive", "logistics", "hospitality"],
    },
    ProductRule {
        code: "LDO",
        base_confidence: 70,
        primary: &["light diesel oil"],
        secondary: &["burner", "dryer", "standby boiler"],
        related_industries: &["manufacturing", "textile", "food", "ceramic"],
    },
    ProductRule {
        code: "FO",
        base_confidence: 70,
        primary: &["furnace oil", "heavy fuel oil", "fo 180", "fo 380"],
        secondary: &["boiler", "furnace", "kiln", "thermic fluid", "steam", "heating"],
        related_industries: &["manufacturing", "cement", "steel", "textile", "chemical", "power", "ceramic", "glass", "paper"],
    },
    ProductRule {
        code: "LSHS",
        base_confidence: 70,
        primary: &["low sulphur heavy stock", "lshs"],
        secondary: &["captive power", "steam generation", "boiler"],
        related_industries: &["power", "fertilizer", "chemical", "textile"],
    },
    ProductRule {
        code: "LPG",
        base_confidence: 70,
        primary: &["lpg", "liquefied petroleum gas", "propane", "butane"],
        secondary: &["canteen", "kitchen", "heat treatment", "gas cutting", "annealing"],
        related_industries: &["hospitality", "food", "glass", "ceramic", "automotive"],
    },
    ProductRule {
        code: "ATF",
        base_confidence: 80,
        primary: &["aviation turbine fuel", "jet fuel", "jet a-1"],
        secondary: &["airport", "aircraft", "airline", "helicopter", "flight"],
        related_industries: &["aviation", "airline", "defence"],
    },
    ProductRule {
        code: "BITUMEN",
        base_confidence: 75,
        primary: &["bitumen", "asphalt", "vg-30", "vg 30", "crmb"],
        secondary: &["road construction", "highway", "resurfacing", "paving", "nhai"],
        related_industries: &["construction", "infrastructure", "roads"],
    },
    ProductRule {
        code: "SKO",
        base_confidence: 60,
        primary: &["superior kerosene oil", "kerosene"],
        secondary: &["lamp", "stove", "public distribution"],
        related_industries: &["hospitality"],
    },
    ProductRule {
        code: "LUBES",
        base_confidence: 60,
        primary: &["lubricant", "lube oil", "lubes", "grease", "hydraulic oil", "gear oil", "engine oil"],
        secondary: &["maintenance", "machinery", "gearbox", "compressor"],
        related_industries: &["manufacturing", "automotive", "mining", "steel", "cement", "power"],
    },
    ProductRule {
        code: "NAPHTHA",
        base_confidence: 70,
        primary: &["naphtha"],
        secondary: &["cracker", "feedstock", "reformer", "hydrogen plant"],
        related_industries: &["fertilizer", "chemical", "petrochemical", "power"],
    },
    ProductRule {
        code: "MTO",
        base_confidence: 60,
        primary: &["mineral turpentine oil", "turpentine"],
        secondary: &["paint", "thinner", "solvent", "varnish"],
        related_industries: &["paint", "chemical", "construction"],
    },
];

static VOLUME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\d+\s*(mt|kl|litre|ton|barrel|bbl)",
        r"bulk (supply|order|procurement)",
        r"annual (contract|requirement|demand)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

// --- Results ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceRule {
    Keyword,
    Secondary,
    Industry,
    Volume,
}

/// One rule that moved a product's confidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleTrigger {
    pub rule: InferenceRule,
    pub detail: String,
    pub delta: i32,
}

impl RuleTrigger {
    pub fn describe(&self) -> String {
        match self.rule {
            InferenceRule::Keyword => format!("Keyword match: {}", self.detail),
            InferenceRule::Secondary => format!("Secondary signals: {} hits", self.detail),
            InferenceRule::Industry => format!("Industry match: {}", self.detail),
            InferenceRule::Volume => "Volume/urgency signal".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductMatch {
    pub code: String,
    pub name: String,
    pub confidence: u32,
    pub triggers: Vec<RuleTrigger>,
}

impl ProductMatch {
    pub fn reason(&self) -> String {
        self.triggers
            .iter()
            .map(RuleTrigger::describe)
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn into_inferred(self) -> InferredProduct {
        let reason = self.reason();
        InferredProduct {
            code: self.code,
            name: self.name,
            confidence: self.confidence,
            reason,
        }
    }
}

// --- Engine ---

#[derive(Debug, Clone, Default)]
pub struct ProductInference {
    catalog: ProductCatalog,
}

impl ProductInference {
    pub fn new(catalog: ProductCatalog) -> Self {
        Self { catalog }
    }

    /// Ranked product needs for `text`, highest confidence first.
    pub fn infer(&self, text: &str, industry: Option<&str>) -> Vec<ProductMatch> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let lower = text.to_lowercase();
        let industry = industry
            .map(str::to_lowercase)
            .filter(|i| !i.trim().is_empty());
        let has_volume_signal = VOLUME_PATTERNS.iter().any(|re| re.is_match(&lower));

        let mut matches: Vec<ProductMatch> = PRODUCT_RULES
            .iter()
            .filter_map(|rule| self.apply(rule, &lower, industry.as_deref(), has_volume_signal))
            .collect();
        matches.sort_by(|a, b| b.confidence.cmp(&a.confidence));
        matches
    }

    pub fn infer_products(&self, text: &str, industry: Option<&str>) -> Vec<InferredProduct> {
        self.infer(text, industry)
            .into_iter()
            .map(ProductMatch::into_inferred)
            .collect()
    }

    fn apply(
        &self,
        rule: &ProductRule,
        lower: &str,
        industry: Option<&str>,
        has_volume_signal: bool,
    ) -> Option<ProductMatch> {
        let mut confidence = 0u32;
        let mut triggers = Vec::new();
        let mut bump = |confidence: &mut u32, to: u32, kind: InferenceRule, detail: String| {
            let delta = to as i32 - *confidence as i32;
            *confidence = to;
            triggers.push(RuleTrigger {
                rule: kind,
                detail,
                delta,
            });
        };

        if let Some(keyword) = rule.primary.iter().find(|k| lower.contains(*k)) {
            let to = confidence.max(rule.base_confidence);
            bump(&mut confidence, to, InferenceRule::Keyword, keyword.to_string());
        }

        let hits = rule.secondary.iter().filter(|k| lower.contains(*k)).count() as u32;
        if hits >= 1 && (confidence == 0 || hits > 1) {
            let mut to = confidence;
            if to == 0 {
                to = rule.base_confidence.saturating_sub(15).min(50);
            }
            if hits > 1 {
                to = (to + hits * SECONDARY_PER_HIT).min(CONFIDENCE_CAP);
            }
            bump(&mut confidence, to, InferenceRule::Secondary, hits.to_string());
        }

        if let Some(industry) = industry {
            if let Some(related) = rule.related_industries.iter().find(|r| industry.contains(*r)) {
                let to = (confidence + INDUSTRY_BONUS).min(CONFIDENCE_CAP);
                bump(&mut confidence, to, InferenceRule::Industry, related.to_string());
            }
        }

        if confidence > 0 && has_volume_signal {
            let to = (confidence + VOLUME_BONUS).min(CONFIDENCE_CAP);
            bump(&mut confidence, to, InferenceRule::Volume, String::new());
        }

        (confidence >= CONFIDENCE_FLOOR).then(|| ProductMatch {
            code: rule.code.to_string(),
            name: self.catalog.name(rule.code).to_string(),
            confidence,
            triggers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> ProductInference {
        ProductInference::default()
    }

    #[test]
    fn furnace_oil_tender_for_steel_hits_cap() {
        let matches = engine().infer(
            "Tender for 50,000 KL Furnace Oil supply for blast furnace",
            Some("Steel"),
        );
        let fo = matches.iter().find(|m| m.code == "FO").unwrap();
        assert_eq!(fo.confidence, 95);
        assert_eq!(fo.name, "Furnace Oil");
        assert_eq!(
            fo.reason(),
            "Keyword match: furnace oil; Industry match: steel; Volume/urgency signal"
        );
        assert_eq!(matches[0].code, "FO");
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(engine().infer("", Some("Steel")).is_empty());
        assert!(engine().infer("   ", None).is_empty());
    }

    #[test]
    fn single_secondary_hit_uses_reduced_base() {
        // "kiln" alone: min(70 - 15, 50) = 50.
        let matches = engine().infer("New rotary kiln commissioned", None);
        let fo = matches.iter().find(|m| m.code == "FO").unwrap();
        assert_eq!(fo.confidence, 50);
        assert_eq!(fo.reason(), "Secondary signals: 1 hits");
    }

    #[test]
    fn multiple_secondary_hits_add_per_hit() {
        // boiler + steam + heating: 50 + 3 * 5 = 65.
        let matches = engine().infer("Boiler for steam and process heating", None);
        let fo = matches.iter().find(|m| m.code == "FO").unwrap();
        assert_eq!(fo.confidence, 65);
        assert_eq!(fo.triggers.len(), 1);
        assert_eq!(fo.triggers[0].delta, 65);
    }

    #[test]
    fn results_never_fall_below_floor() {
        // SKO base 60: one secondary hit gives 45, still kept; nothing under 30 appears.
        let matches = engine().infer("Hurricane lamp distribution drive", None);
        assert!(matches.iter().all(|m| m.confidence >= CONFIDENCE_FLOOR));
        assert_eq!(matches.iter().find(|m| m.code == "SKO").map(|m| m.confidence), Some(45));
    }

    #[test]
    fn ordering_is_by_confidence_descending() {
        let matches = engine().infer(
            "Annual contract for jet fuel and diesel at the airport",
            Some("Aviation"),
        );
        let codes: Vec<_> = matches.iter().map(|m| m.code.as_str()).collect();
        assert_eq!(codes[0], "ATF");
        assert!(codes.contains(&"HSD"));
        for pair in matches.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn volume_bonus_needs_an_existing_signal() {
        let matches = engine().infer("Bulk supply of 500 MT cement bags", None);
        assert!(matches.is_empty());
    }

    #[test]
    fn catalog_overrides_rename_products() {
        let mut overrides = std::collections::BTreeMap::new();
        overrides.insert("HSD".to_string(), "Diesel (BS-VI)".to_string());
        let engine = ProductInference::new(ProductCatalog::default().with_overrides(&overrides));
        let products = engine.infer_products("HSD requirement for DG set", None);
        assert_eq!(products[0].code, "HSD");
        assert_eq!(products[0].name, "Diesel (BS-VI)");
        assert_eq!(products[0].reason, "Keyword match: hsd");
    }
}
