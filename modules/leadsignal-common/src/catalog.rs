use std::collections::BTreeMap;

/// Built-in display names for product codes the inference engine emits.
const DEFAULT_PRODUCTS: &[(&str, &str)] = &[
    ("HSD", "High Speed Diesel"),
    ("MS", "Motor Spirit (Petrol)"),
    ("LDO", "Light Diesel Oil"),
    ("FO", "Furnace Oil"),
    ("LSHS", "Low Sulphur Heavy Stock"),
    ("LPG", "Commercial LPG"),
    ("ATF", "Aviation Turbine Fuel"),
    ("BITUMEN", "Bitumen"),
    ("SKO", "Superior Kerosene Oil"),
    ("LUBES", "Industrial Lubricants"),
    ("NAPHTHA", "Naphtha"),
    ("MTO", "Mineral Turpentine Oil"),
];

/// Product code → display name mapping, with config overrides layered on the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductCatalog {
    names: BTreeMap<String, String>,
}

impl Default for ProductCatalog {
    fn default() -> Self {
        Self {
            names: DEFAULT_PRODUCTS
                .iter()
                .map(|(code, name)| (code.to_string(), name.to_string()))
                .collect(),
        }
    }
}

impl ProductCatalog {
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, String>) -> Self {
        for (code, name) in overrides {
            self.names.insert(code.to_uppercase(), name.clone());
        }
        self
    }

    /// Display name for a code. Unknown codes render as the code itself.
    pub fn name<'a>(&'a self, code: &'a str) -> &'a str {
        self.names.get(code).map(String::as_str).unwrap_or(code)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_defaults_and_unknown_codes_fall_back() {
        let mut overrides = BTreeMap::new();
        overrides.insert("fo".to_string(), "Furnace Oil (FO 180)".to_string());
        let catalog = ProductCatalog::default().with_overrides(&overrides);

        assert_eq!(catalog.name("FO"), "Furnace Oil (FO 180)");
        assert_eq!(catalog.name("HSD"), "High Speed Diesel");
        assert_eq!(catalog.name("XYZ"), "XYZ");
        assert_eq!(catalog.len(), DEFAULT_PRODUCTS.len());
    }
}
