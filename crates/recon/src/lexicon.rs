//! Compiled keyword lists.
//!
//! [`KeywordConfig`] is what operators edit; [`Lexicon`] is the lowercased,
//! regex-compiled form every classifier pass and the fractional dedup pass read.

use std::collections::HashMap;

use regex::Regex;

use crate::config::KeywordConfig;
use crate::error::ReconError;
use crate::model::PropertyType;

#[derive(Debug, Clone)]
pub struct Lexicon {
    pub version: u32,
    fractional: Vec<String>,
    fractional_anti: Vec<String>,
    fractional_codes: Vec<String>,
    unit_fraction: Regex,
    unit_code: Regex,
    land: Vec<String>,
    land_anti: Vec<String>,
    conveyance: Vec<String>,
    lease: Vec<String>,
    unit_markers: Option<Regex>,
    unknown_markers: Vec<String>,
    placeholder_names: Vec<String>,
    type_labels: HashMap<String, PropertyType>,
}

impl Lexicon {
    pub fn compile(config: &KeywordConfig) -> Result<Self, ReconError> {
        let unit_fraction = compile_pattern("unit_fraction_pattern", &config.unit_fraction_pattern, true)?;
        let unit_code = compile_pattern("unit_code_pattern", &config.unit_code_pattern, false)?;

        let markers = lowered(&config.unit_markers);
        let unit_markers = if markers.is_empty() {
            None
        } else {
            let alternation = markers
                .iter()
                .map(|m| regex::escape(m))
                .collect::<Vec<_>>()
                .join("|");
            Some(compile_pattern("unit_markers", &format!(r"\b(?:{alternation})\b"), true)?)
        };

        let type_labels = config
            .type_labels
            .iter()
            .map(|(label, ty)| (label.trim().to_lowercase(), *ty))
            .collect();

        Ok(Self {
            version: config.version,
            fractional: lowered(&config.fractional_keywords),
            fractional_anti: lowered(&config.fractional_anti_keywords),
            fractional_codes: config.fractional_codes.iter().map(|c| c.trim().to_string()).collect(),
            unit_fraction,
            unit_code,
            land: lowered(&config.land_keywords),
            land_anti: lowered(&config.land_anti_keywords),
            conveyance: lowered(&config.conveyance_keywords),
            lease: lowered(&config.lease_keywords),
            unit_markers,
            unknown_markers: lowered(&config.unknown_markers),
            placeholder_names: lowered(&config.placeholder_names),
            type_labels,
        })
    }

    pub fn bundled() -> Result<Self, ReconError> {
        Self::compile(&KeywordConfig::bundled()?)
    }

    /// Fraction vocabulary or a `1/Nth` pattern.
    pub fn is_fractional_text(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        contains_any(&lower, &self.fractional) || self.unit_fraction.is_match(&lower)
    }

    pub fn is_fractional_anti(&self, text: &str) -> bool {
        contains_any(&text.to_lowercase(), &self.fractional_anti)
    }

    /// Allow-listed compound codes, compared against normalized codes.
    pub fn is_fractional_code(&self, code: &str) -> bool {
        self.fractional_codes.iter().any(|c| c == code)
    }

    /// Raw identifier text mentioning an allow-listed code.
    pub fn mentions_fractional_code(&self, text: &str) -> bool {
        self.fractional_codes.iter().any(|c| text.contains(c.as_str()))
    }

    pub fn is_land_text(&self, text: &str) -> bool {
        contains_any(&text.to_lowercase(), &self.land)
    }

    pub fn is_land_anti(&self, text: &str) -> bool {
        contains_any(&text.to_lowercase(), &self.land_anti)
    }

    pub fn has_conveyance(&self, text: &str) -> bool {
        contains_any(&text.to_lowercase(), &self.conveyance)
    }

    pub fn has_lease(&self, text: &str) -> bool {
        contains_any(&text.to_lowercase(), &self.lease)
    }

    pub fn has_unit_marker(&self, text: &str) -> bool {
        self.unit_markers.as_ref().is_some_and(|re| re.is_match(text))
    }

    /// Identifier cells meaning "unknown": empty, all zeros, or a listed marker.
    pub fn is_unknown_marker(&self, raw: &str) -> bool {
        let lower = raw.trim().to_lowercase();
        lower.is_empty()
            || lower.chars().all(|c| c == '0')
            || self.unknown_markers.iter().any(|m| *m == lower)
    }

    pub fn is_placeholder_name(&self, name: &str) -> bool {
        let lower = name.trim().to_lowercase();
        lower.is_empty() || self.placeholder_names.iter().any(|m| *m == lower)
    }

    /// Map a feed's free-text type label. Unlisted labels are `Unknown`.
    pub fn label_type(&self, label: &str) -> PropertyType {
        self.type_labels
            .get(&label.trim().to_lowercase())
            .copied()
            .unwrap_or(PropertyType::Unknown)
    }

    /// Unit identifiers in a building name, in order of appearance.
    pub fn unit_codes(&self, building_name: &str) -> Vec<String> {
        self.unit_code
            .find_iter(building_name)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

fn lowered(list: &[String]) -> Vec<String> {
    list.iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.iter().any(|n| haystack.contains(n.as_str()))
}

fn compile_pattern(field: &str, pattern: &str, case_insensitive: bool) -> Result<Regex, ReconError> {
    let source = if case_insensitive {
        format!("(?i){pattern}")
    } else {
        pattern.to_string()
    };
    Regex::new(&source).map_err(|e| {
        ReconError::ConfigValidation(format!("keywords: invalid {field} pattern: {e}"))
    })
}
