use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::ReconError;
use crate::model::PropertyType;

/// Keyword lists shipped with the engine.
pub const BUNDLED_KEYWORDS: &str = include_str!("../keywords.toml");

// Fuzzy matching thresholds, on the 0..=100 similarity scale.
pub const DEFAULT_FUZZY_RATIO: u8 = 80;
pub const DEFAULT_TRUNCATED_RATIO: u8 = 60;
pub const DEFAULT_TRUNCATE_PREFIX_CHARS: usize = 15;
pub const DEFAULT_TAIL_RATIO: u8 = 60;
pub const DEFAULT_TAIL_CHARS: usize = 30;
pub const DEFAULT_NUMBER_OVERLAP: f64 = 0.5;
pub const DEFAULT_REGISTER_NAME_RATIO: u8 = 80;

// Cross-feed closeness.
pub const DEFAULT_PRICE_TOLERANCE: f64 = 0.05;
pub const DEFAULT_PRICE_BAND: f64 = 0.10;
pub const DEFAULT_NEAR_DAYS: i64 = 390;
pub const DEFAULT_NEAR_EXACT_PRICE: i64 = 6_000;
pub const DEFAULT_YEAR_WINDOW: i32 = 1;

pub const DEFAULT_RENT_MULTIPLE: f64 = 3.0;
pub const DEFAULT_MIN_ADDRESS_LENGTH: usize = 10;
pub const DEFAULT_MIN_PRICE: i64 = 1_000;
pub const DEFAULT_MIN_LISTING_SALE_PRICE: i64 = 20_000;
pub const DEFAULT_LISTING_ADDRESS_LENGTH: usize = 10;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    #[serde(default)]
    pub inputs: Option<InputConfig>,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub sanity: SanityConfig,
    #[serde(default)]
    pub address: AddressConfig,
    #[serde(default)]
    pub prefilter: PrefilterConfig,
    #[serde(default)]
    pub listings: ListingConfig,
    #[serde(default)]
    pub trust: TrustPolicy,
    /// Inline keyword lists. Exclusive with `keywords_file`; neither means the bundled lists.
    #[serde(default)]
    pub keywords: Option<KeywordConfig>,
    /// Keyword TOML relative to the config file's directory.
    #[serde(default)]
    pub keywords_file: Option<String>,
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// CSV paths, relative to the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    pub registry: String,
    pub register: String,
    #[serde(default)]
    pub register_previous: Option<String>,
    pub parcels: String,
    #[serde(default)]
    pub brokerage: Option<String>,
    #[serde(default)]
    pub listings: Option<String>,
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub fuzzy_ratio: u8,
    pub truncated_ratio: u8,
    pub truncate_prefix_chars: usize,
    pub tail_ratio: u8,
    pub tail_chars: usize,
    /// Share of numeric tokens that must agree when the ratio alone passes.
    pub number_overlap: f64,
    /// Relative price tolerance for "same sale" (0.05 = ±5%).
    pub price_tolerance: f64,
    /// Wider band used to narrow several address hits.
    pub price_band: f64,
    /// Dates closer than this many days count as the same sale.
    pub near_days: i64,
    /// Absolute dollar difference accepted when dates disagree.
    pub near_exact_price: i64,
    pub year_window: i32,
    /// Building-name similarity above which register duplicates are the same row.
    pub register_name_ratio: u8,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fuzzy_ratio: DEFAULT_FUZZY_RATIO,
            truncated_ratio: DEFAULT_TRUNCATED_RATIO,
            truncate_prefix_chars: DEFAULT_TRUNCATE_PREFIX_CHARS,
            tail_ratio: DEFAULT_TAIL_RATIO,
            tail_chars: DEFAULT_TAIL_CHARS,
            number_overlap: DEFAULT_NUMBER_OVERLAP,
            price_tolerance: DEFAULT_PRICE_TOLERANCE,
            price_band: DEFAULT_PRICE_BAND,
            near_days: DEFAULT_NEAR_DAYS,
            near_exact_price: DEFAULT_NEAR_EXACT_PRICE,
            year_window: DEFAULT_YEAR_WINDOW,
            register_name_ratio: DEFAULT_REGISTER_NAME_RATIO,
        }
    }
}

impl MatchingConfig {
    pub fn near_exact_price_cents(&self) -> i64 {
        self.near_exact_price * 100
    }
}

// ---------------------------------------------------------------------------
// Sanity, address, prefilter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SanityConfig {
    /// Sales priced under `rent_multiple` × combined rental value are discarded.
    pub rent_multiple: f64,
}

impl Default for SanityConfig {
    fn default() -> Self {
        Self {
            rent_multiple: DEFAULT_RENT_MULTIPLE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AddressConfig {
    /// Addresses shorter than this look like bare parcel codes.
    pub min_length: usize,
    /// Appended to derived full addresses and to fuzzy comparisons.
    pub country: String,
    /// A parcel reference's assessment number is adopted only up to this many codes.
    pub max_adopted_codes: usize,
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_ADDRESS_LENGTH,
            country: "Bermuda".into(),
            max_adopted_codes: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrefilterConfig {
    /// Dollars. Registry sales below it are nominal (government leases etc.).
    pub min_price: i64,
    /// Rows with no identifier and an address shorter than this are unidentifiable.
    pub unidentifiable_address_length: usize,
    pub parish_aliases: BTreeMap<String, String>,
}

impl Default for PrefilterConfig {
    fn default() -> Self {
        let parish_aliases = [
            ("Town of St. George", "St. George's"),
            ("City of Hamilton", "Pembroke"),
            ("City Of Hamilton", "Pembroke"),
            ("CIty of Hamilton", "Pembroke"),
            ("Hamilton Parish", "Hamilton"),
            ("St. Georges", "St. George's"),
            ("Smith's", "Smiths"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self {
            min_price: DEFAULT_MIN_PRICE,
            unidentifiable_address_length: 5,
            parish_aliases,
        }
    }
}

impl PrefilterConfig {
    pub fn min_price_cents(&self) -> i64 {
        self.min_price * 100
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Dollars. Sale listings cheaper than this are flagged `PRICE`.
    pub min_sale_price: i64,
    /// Listing addresses shorter than this can't locate a property on their own.
    pub min_address_length: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            min_sale_price: DEFAULT_MIN_LISTING_SALE_PRICE,
            min_address_length: DEFAULT_LISTING_ADDRESS_LENGTH,
        }
    }
}

impl ListingConfig {
    pub fn min_sale_price_cents(&self) -> i64 {
        self.min_sale_price * 100
    }
}

// ---------------------------------------------------------------------------
// Trust
// ---------------------------------------------------------------------------

/// Which feed wins when the register and a sale feed disagree on property type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustPolicy {
    #[default]
    RegisterPreferred,
    SaleFeedPreferred,
}

impl std::fmt::Display for TrustPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RegisterPreferred => write!(f, "register_preferred"),
            Self::SaleFeedPreferred => write!(f, "sale_feed_preferred"),
        }
    }
}

// ---------------------------------------------------------------------------
// Keywords
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordConfig {
    pub version: u32,
    pub fractional_keywords: Vec<String>,
    #[serde(default)]
    pub fractional_anti_keywords: Vec<String>,
    #[serde(default)]
    pub fractional_codes: Vec<String>,
    #[serde(default = "default_unit_fraction_pattern")]
    pub unit_fraction_pattern: String,
    #[serde(default = "default_unit_code_pattern")]
    pub unit_code_pattern: String,
    pub land_keywords: Vec<String>,
    #[serde(default)]
    pub land_anti_keywords: Vec<String>,
    pub conveyance_keywords: Vec<String>,
    pub lease_keywords: Vec<String>,
    #[serde(default)]
    pub unit_markers: Vec<String>,
    #[serde(default)]
    pub unknown_markers: Vec<String>,
    #[serde(default)]
    pub placeholder_names: Vec<String>,
    #[serde(default)]
    pub type_labels: BTreeMap<String, PropertyType>,
}

fn default_unit_fraction_pattern() -> String {
    r"1/(?:[2-9]|1[0-9]|20) ?th".into()
}

fn default_unit_code_pattern() -> String {
    r"(\d+/\d+|\d+[A-Z]|[A-Z]-\d+|\d{3})".into()
}

impl KeywordConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: KeywordConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// The lists compiled into the binary.
    pub fn bundled() -> Result<Self, ReconError> {
        Self::from_toml(BUNDLED_KEYWORDS)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let required = [
            ("fractional_keywords", &self.fractional_keywords),
            ("land_keywords", &self.land_keywords),
            ("conveyance_keywords", &self.conveyance_keywords),
            ("lease_keywords", &self.lease_keywords),
        ];
        for (name, list) in required {
            if list.iter().all(|k| k.trim().is_empty()) {
                return Err(ReconError::ConfigValidation(format!(
                    "keywords: '{name}' must not be empty"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl PipelineConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: PipelineConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Config with every default and no inputs; tables are supplied directly.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: None,
            matching: MatchingConfig::default(),
            sanity: SanityConfig::default(),
            address: AddressConfig::default(),
            prefilter: PrefilterConfig::default(),
            listings: ListingConfig::default(),
            trust: TrustPolicy::default(),
            keywords: None,
            keywords_file: None,
        }
    }

    /// Inline keywords, else the bundled lists.
    ///
    /// A `keywords_file` is relative to the config's directory, which this
    /// config does not know; it is rejected here and read by `load::load_keywords`.
    pub fn resolve_keywords(&self) -> Result<KeywordConfig, ReconError> {
        if let Some(file) = &self.keywords_file {
            return Err(ReconError::ConfigValidation(format!(
                "keywords_file '{file}' must be read relative to the config directory"
            )));
        }
        match &self.keywords {
            Some(k) => Ok(k.clone()),
            None => KeywordConfig::bundled(),
        }
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.name.trim().is_empty() {
            return Err(ReconError::ConfigValidation("name must not be empty".into()));
        }

        if let Some(ref inputs) = self.inputs {
            let mut paths = vec![
                ("registry", Some(&inputs.registry)),
                ("register", Some(&inputs.register)),
                ("parcels", Some(&inputs.parcels)),
            ];
            paths.push(("register_previous", inputs.register_previous.as_ref()));
            paths.push(("brokerage", inputs.brokerage.as_ref()));
            paths.push(("listings", inputs.listings.as_ref()));
            for (name, path) in paths {
                if matches!(path, Some(p) if p.trim().is_empty()) {
                    return Err(ReconError::ConfigValidation(format!(
                        "inputs.{name} must not be empty"
                    )));
                }
            }
        }

        if self.keywords.is_some() && self.keywords_file.is_some() {
            return Err(ReconError::ConfigValidation(
                "set either [keywords] or keywords_file, not both".into(),
            ));
        }

        let m = &self.matching;
        for (name, ratio) in [
            ("fuzzy_ratio", m.fuzzy_ratio),
            ("truncated_ratio", m.truncated_ratio),
            ("tail_ratio", m.tail_ratio),
            ("register_name_ratio", m.register_name_ratio),
        ] {
            if ratio > 100 {
                return Err(ReconError::ConfigValidation(format!(
                    "matching.{name} must be within 0..=100, got {ratio}"
                )));
            }
        }
        for (name, tol) in [
            ("price_tolerance", m.price_tolerance),
            ("price_band", m.price_band),
        ] {
            if !(0.0..1.0).contains(&tol) {
                return Err(ReconError::ConfigValidation(format!(
                    "matching.{name} must be within [0, 1), got {tol}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&m.number_overlap) {
            return Err(ReconError::ConfigValidation(format!(
                "matching.number_overlap must be within [0, 1], got {}",
                m.number_overlap
            )));
        }
        if m.near_days <= 0 {
            return Err(ReconError::ConfigValidation(
                "matching.near_days must be positive".into(),
            ));
        }

        if self.sanity.rent_multiple.is_nan() || self.sanity.rent_multiple <= 0.0 {
            return Err(ReconError::ConfigValidation(format!(
                "sanity.rent_multiple must be positive, got {}",
                self.sanity.rent_multiple
            )));
        }

        if self.address.min_length == 0 {
            return Err(ReconError::ConfigValidation(
                "address.min_length must be positive".into(),
            ));
        }

        if self.listings.min_sale_price < 0 {
            return Err(ReconError::ConfigValidation(format!(
                "listings.min_sale_price must not be negative, got {}",
                self.listings.min_sale_price
            )));
        }

        if let Some(ref keywords) = self.keywords {
            keywords.validate()?;
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
