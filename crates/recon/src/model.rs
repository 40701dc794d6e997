use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::assessment::AssessmentKey;

// ---------------------------------------------------------------------------
// Property type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Land,
    House,
    Condo,
    Fractional,
    #[default]
    Unknown,
}

impl PropertyType {
    /// Conflict priority: Fractional > Land > House = Condo > Unknown.
    pub fn priority(self) -> u8 {
        match self {
            Self::Fractional => 3,
            Self::Land => 2,
            Self::House | Self::Condo => 1,
            Self::Unknown => 0,
        }
    }

    /// Merge a vote into the current type. Only a strictly higher priority wins.
    pub fn resolve(self, vote: PropertyType) -> PropertyType {
        if vote.priority() > self.priority() {
            vote
        } else {
            self
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Land => "land",
            Self::House => "house",
            Self::Condo => "condo",
            Self::Fractional => "fractional",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Sales
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleSource {
    #[default]
    Registry,
    Brokerage,
}

impl std::fmt::Display for SaleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registry => write!(f, "registry"),
            Self::Brokerage => write!(f, "brokerage"),
        }
    }
}

/// One canonical sale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleRecord {
    pub application_number: String,
    pub source: SaleSource,
    pub registration_date: NaiveDate,
    pub acquisition_date: Option<NaiveDate>,
    pub parish: String,
    pub address: String,
    pub full_address: String,
    /// Identifier text exactly as ingested; classification and consolidation read it.
    pub assessment_raw: String,
    pub assessment: AssessmentKey,
    pub price_cents: i64,
    pub property_type: PropertyType,
    pub parcel_area: String,
    pub parcel_area_ha: Option<f64>,
    pub acquisition_mode: String,
    pub nature_of_interest: String,
    /// One entry per code of `assessment`, 0 where the register has no match.
    pub rental_values: Vec<i64>,
    pub combined_rental_value: i64,
}

impl SaleRecord {
    /// Registry sale with everything downstream of ingestion left at defaults.
    pub fn new(application_number: impl Into<String>, registration_date: NaiveDate) -> Self {
        Self {
            application_number: application_number.into(),
            source: SaleSource::Registry,
            registration_date,
            acquisition_date: None,
            parish: String::new(),
            address: String::new(),
            full_address: String::new(),
            assessment_raw: String::new(),
            assessment: AssessmentKey::Absent,
            price_cents: 0,
            property_type: PropertyType::Unknown,
            parcel_area: String::new(),
            parcel_area_ha: None,
            acquisition_mode: String::new(),
            nature_of_interest: String::new(),
            rental_values: Vec::new(),
            combined_rental_value: 0,
        }
    }
}

/// A closed transaction reported by the brokerage feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrokerageSale {
    pub reference: String,
    pub application_number: String,
    pub transaction_date: NaiveDate,
    pub price_cents: i64,
    pub assessment_raw: String,
    pub assessment: AssessmentKey,
    pub address_line: String,
    pub building_name: String,
    pub parish: String,
    pub postcode: String,
    pub property_label: String,
    pub property_type: PropertyType,
    pub is_land: bool,
    pub is_fractional: bool,
}

impl BrokerageSale {
    pub fn new(reference: impl Into<String>, transaction_date: NaiveDate, price_cents: i64) -> Self {
        Self {
            reference: reference.into(),
            application_number: String::new(),
            transaction_date,
            price_cents,
            assessment_raw: String::new(),
            assessment: AssessmentKey::Absent,
            address_line: String::new(),
            building_name: String::new(),
            parish: String::new(),
            postcode: String::new(),
            property_label: String::new(),
            property_type: PropertyType::Unknown,
            is_land: false,
            is_fractional: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// Data-quality problems that keep a listing from being tied to a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingFlag {
    /// Too short or numberless to locate the property without a key.
    Address,
    /// A built property (not land, not a share) with no usable key.
    AssessmentNumber,
    /// Missing, or too cheap for a sale.
    Price,
    /// Listed outside the configured country.
    Country,
}

impl std::fmt::Display for ListingFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Address => write!(f, "ADDRESS"),
            Self::AssessmentNumber => write!(f, "ASSN#"),
            Self::Price => write!(f, "PRICE"),
            Self::Country => write!(f, "COUNTRY"),
        }
    }
}

/// A property offered on the brokerage's listing feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
    pub reference: String,
    pub date_added: Option<NaiveDate>,
    pub is_sale: bool,
    pub is_rent: bool,
    pub price_cents: i64,
    pub assessment_raw: String,
    pub assessment: AssessmentKey,
    pub address: String,
    /// Building name taken from the register once the key resolves.
    pub property_name: String,
    pub parish: String,
    pub postcode: String,
    pub country: String,
    pub property_label: String,
    pub property_type: PropertyType,
    pub is_land: bool,
    pub url: String,
    pub description: String,
    pub flags: Vec<ListingFlag>,
}

impl Listing {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            date_added: None,
            is_sale: true,
            is_rent: false,
            price_cents: 0,
            assessment_raw: String::new(),
            assessment: AssessmentKey::Absent,
            address: String::new(),
            property_name: String::new(),
            parish: String::new(),
            postcode: String::new(),
            country: String::new(),
            property_label: String::new(),
            property_type: PropertyType::Unknown,
            is_land: false,
            url: String::new(),
            description: String::new(),
            flags: Vec::new(),
        }
    }

    /// Flags as the feed's reviewers read them: `"ADDRESS ASSN#"`.
    pub fn flag_text(&self) -> String {
        self.flags
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ---------------------------------------------------------------------------
// Reference tables
// ---------------------------------------------------------------------------

/// One valuation-register entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyRecord {
    pub assessment_number: String,
    pub rental_value_cents: i64,
    pub tax_code: String,
    pub property_type: PropertyType,
    pub address: String,
    pub building_name: String,
    pub parish: String,
    pub grid: String,
}

impl PropertyRecord {
    pub fn new(assessment_number: impl Into<String>) -> Self {
        Self {
            assessment_number: assessment_number.into(),
            rental_value_cents: 0,
            tax_code: String::new(),
            property_type: PropertyType::Unknown,
            address: String::new(),
            building_name: String::new(),
            parish: String::new(),
            grid: String::new(),
        }
    }
}

/// Parcel code → street address lookup row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParcelReference {
    pub parcel_code: String,
    pub street_address: String,
    pub parish: String,
    pub postcode: String,
    pub assessment_number: String,
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Pre-loaded tables for one run.
#[derive(Debug, Clone, Default)]
pub struct ReconInput {
    pub registry: Vec<SaleRecord>,
    pub register: Vec<PropertyRecord>,
    /// Prior register snapshot; the current one overwrites it field by field.
    pub register_previous: Option<Vec<PropertyRecord>>,
    pub parcels: Vec<ParcelReference>,
    pub brokerage: Vec<BrokerageSale>,
    pub listings: Vec<Listing>,
}

// ---------------------------------------------------------------------------
// Stage outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct PrefilterReport {
    pub below_min_price: usize,
    pub unidentifiable: usize,
    pub exact_duplicates: usize,
}

/// A duplicate group nobody could arbitrate. Kept whole for a human.
#[derive(Debug, Clone, Serialize)]
pub struct UnresolvedGroup {
    pub application_number: String,
    pub members: Vec<SaleRecord>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsolidationReport {
    pub duplicate_groups: usize,
    pub merged_groups: usize,
    pub rows_removed: usize,
    pub unresolved: Vec<UnresolvedGroup>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EnrichmentReport {
    pub singleton_matched: usize,
    pub multi_matched: usize,
    pub unmatched: usize,
    pub retyped: usize,
    /// Codes referenced by sales but missing from every register snapshot.
    pub ghost_codes: Vec<String>,
    /// Application numbers dropped by the price / rental sanity filter.
    pub sanity_discarded: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressIssue {
    /// Key present, none of its codes are in the register.
    NoRegisterMatch,
    /// Text is not a parcel code.
    NotAParcelCode,
    /// Parcel code unknown to the reference table.
    NoParcelMatch,
    /// Parcel code maps to several references.
    AmbiguousParcel,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnresolvedAddress {
    pub application_number: String,
    pub address: String,
    pub issue: AddressIssue,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AddressReport {
    pub deficient: usize,
    pub resolved_from_register: usize,
    pub resolved_from_parcels: usize,
    pub unresolved: Vec<UnresolvedAddress>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPass {
    Date,
    Address,
    Fractional,
}

impl std::fmt::Display for DedupPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Date => write!(f, "date"),
            Self::Address => write!(f, "address"),
            Self::Fractional => write!(f, "fractional"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateMatch {
    pub application_number: String,
    pub registry_application_number: String,
    pub pass: DedupPass,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DedupReport {
    pub examined: usize,
    pub duplicates: Vec<DuplicateMatch>,
}

impl DedupReport {
    pub fn count(&self, pass: DedupPass) -> usize {
        self.duplicates.iter().filter(|d| d.pass == pass).count()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RegisterReport {
    pub carried_from_previous: usize,
    pub updated_fields: usize,
    pub collapsed_duplicates: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ListingReport {
    pub examined: usize,
    pub retyped: usize,
    pub named_from_register: usize,
    pub flagged: usize,
    pub address_flags: usize,
    pub assessment_flags: usize,
    pub price_flags: usize,
    pub country_flags: usize,
}

// ---------------------------------------------------------------------------
// Manual review
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewKind {
    UnresolvedDuplicateGroup,
    UnresolvedAddress,
    GhostAssessment,
}

impl std::fmt::Display for ReviewKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnresolvedDuplicateGroup => write!(f, "unresolved_duplicate_group"),
            Self::UnresolvedAddress => write!(f, "unresolved_address"),
            Self::GhostAssessment => write!(f, "ghost_assessment"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewItem {
    pub kind: ReviewKind,
    pub application_number: String,
    pub address: String,
    pub assessment_raw: String,
    pub detail: String,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub registry_prefilter: PrefilterReport,
    pub brokerage_prefilter: PrefilterReport,
    pub register: RegisterReport,
    pub consolidation: ConsolidationReport,
    pub enrichment: EnrichmentReport,
    pub address: AddressReport,
    pub dedup: DedupReport,
    pub listings: ListingReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconSummary {
    pub registry_in: usize,
    pub brokerage_in: usize,
    pub registry_sales: usize,
    pub brokerage_sales: usize,
    pub properties: usize,
    pub duplicates_removed: usize,
    pub manual_review: usize,
    pub listings_in: usize,
    pub listings_flagged: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub keywords_version: u32,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub sales: Vec<SaleRecord>,
    pub properties: Vec<PropertyRecord>,
    pub listings: Vec<Listing>,
    pub manual_review: Vec<ReviewItem>,
    pub report: RunReport,
}
