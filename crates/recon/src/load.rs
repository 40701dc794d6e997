//! CSV table loading.
//!
//! Each loader resolves its columns by header name, so column order in the
//! feed doesn't matter. Missing required columns and unparseable required
//! dates fail the load; everything else degrades to an empty or zero value.

use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::assessment::normalize;
use crate::config::{InputConfig, KeywordConfig, PipelineConfig};
use crate::error::ReconError;
use crate::lexicon::Lexicon;
use crate::model::{
    BrokerageSale, Listing, ParcelReference, PropertyRecord, ReconInput, SaleRecord,
};

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%d-%b-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

// ---------------------------------------------------------------------------
// Cell parsing
// ---------------------------------------------------------------------------

/// Parse a date in any of the formats the feeds have used.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| chrono::NaiveDateTime::parse_from_str(s, f).ok())
                .map(|dt| dt.date())
        })
}

/// `"$1,250,000.50"` → `125_000_050`. Unparseable amounts are 0.
pub fn parse_amount_cents(raw: &str) -> i64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map_or(0, |v| (v * 100.0).round() as i64)
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "true" | "t" | "yes" | "y" | "1"
    )
}

/// Stable id for a brokerage transaction: `skip-` and the first 8 hex chars
/// of SHA-256 over `reference|date|building|price_cents`.
///
/// Ids are stable across runs of this tool but are not comparable with ids
/// minted by other systems from the same feed.
pub fn brokerage_application_number(
    reference: &str,
    transaction_date: NaiveDate,
    building_name: &str,
    price_cents: i64,
) -> String {
    let digest = Sha256::digest(format!(
        "{reference}|{transaction_date}|{building_name}|{price_cents}"
    ));
    let hex = format!("{digest:x}");
    format!("skip-{}", &hex[..8])
}

// ---------------------------------------------------------------------------
// Header resolution
// ---------------------------------------------------------------------------

struct Table {
    name: &'static str,
    headers: Vec<String>,
}

impl Table {
    fn open<'a>(
        name: &'static str,
        csv_data: &'a str,
    ) -> Result<(Self, csv::Reader<&'a [u8]>), ReconError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(csv_data.as_bytes());
        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();
        Ok((Self { name, headers }, reader))
    }

    fn required(&self, column: &str) -> Result<usize, ReconError> {
        self.optional(column).ok_or_else(|| ReconError::MissingColumn {
            table: self.name.into(),
            column: column.into(),
        })
    }

    fn optional(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    fn date(&self, record_id: &str, raw: &str) -> Result<NaiveDate, ReconError> {
        parse_date(raw).ok_or_else(|| ReconError::DateParse {
            table: self.name.into(),
            record_id: record_id.into(),
            value: raw.into(),
        })
    }
}

fn cell(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("").trim()
}

fn opt_cell(record: &StringRecord, idx: Option<usize>) -> &str {
    idx.map_or("", |i| cell(record, i))
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

/// Land-title registry sales.
pub fn load_registry(csv_data: &str) -> Result<Vec<SaleRecord>, ReconError> {
    let (table, mut reader) = Table::open("registry", csv_data)?;
    let app_idx = table.required("application_number")?;
    let reg_idx = table.required("registration_date")?;
    let acq_idx = table.required("acquisition_date")?;
    let parish_idx = table.required("parish")?;
    let area_idx = table.required("parcel_area")?;
    let assessment_idx = table.required("assessment_number")?;
    let address_idx = table.required("address")?;
    let mode_idx = table.required("acquisition_mode")?;
    let nature_idx = table.required("nature_of_interest")?;
    let price_idx = table.required("price")?;
    let area_ha_idx = table.optional("parcel_area_ha");

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let app = cell(&record, app_idx);
        let registration_date = table.date(app, cell(&record, reg_idx))?;

        let acquired_raw = cell(&record, acq_idx);
        let acquisition_date = parse_date(acquired_raw);
        if acquisition_date.is_none() && !acquired_raw.is_empty() && acquired_raw != "0" {
            debug!(application_number = app, value = acquired_raw, "acquisition date ignored");
        }

        let mut sale = SaleRecord::new(app, registration_date);
        sale.acquisition_date = acquisition_date;
        sale.parish = cell(&record, parish_idx).to_string();
        sale.parcel_area = cell(&record, area_idx).to_string();
        sale.parcel_area_ha = opt_cell(&record, area_ha_idx).parse().ok();
        sale.assessment_raw = cell(&record, assessment_idx).to_string();
        sale.assessment = normalize(&sale.assessment_raw);
        sale.address = cell(&record, address_idx).to_string();
        sale.acquisition_mode = cell(&record, mode_idx).to_string();
        sale.nature_of_interest = cell(&record, nature_idx).to_string();
        sale.price_cents = parse_amount_cents(cell(&record, price_idx));
        rows.push(sale);
    }
    Ok(rows)
}

/// Valuation register snapshot. Type labels go through the lexicon.
pub fn load_register(csv_data: &str, lexicon: &Lexicon) -> Result<Vec<PropertyRecord>, ReconError> {
    let (table, mut reader) = Table::open("register", csv_data)?;
    let number_idx = table.required("assessment_number")?;
    let rent_idx = table.required("rental_value")?;
    let tax_idx = table.required("tax_code")?;
    let type_idx = table.required("property_type")?;
    let address_idx = table.required("address")?;
    let building_idx = table.required("building_name")?;
    let parish_idx = table.required("parish")?;
    let grid_idx = table.required("grid")?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut property = PropertyRecord::new(cell(&record, number_idx));
        property.rental_value_cents = parse_amount_cents(cell(&record, rent_idx));
        property.tax_code = cell(&record, tax_idx).to_string();
        property.property_type = lexicon.label_type(cell(&record, type_idx));
        property.address = cell(&record, address_idx).to_string();
        property.building_name = cell(&record, building_idx).to_string();
        property.parish = cell(&record, parish_idx).to_string();
        property.grid = cell(&record, grid_idx).to_string();
        rows.push(property);
    }
    Ok(rows)
}

/// Parcel-code reference table.
pub fn load_parcels(csv_data: &str) -> Result<Vec<ParcelReference>, ReconError> {
    let (table, mut reader) = Table::open("parcels", csv_data)?;
    let code_idx = table.required("parcel_code")?;
    let street_idx = table.required("street_address")?;
    let parish_idx = table.required("parish")?;
    let postcode_idx = table.required("postcode")?;
    let number_idx = table.required("assessment_number")?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(ParcelReference {
            parcel_code: cell(&record, code_idx).to_string(),
            street_address: cell(&record, street_idx).to_string(),
            parish: cell(&record, parish_idx).to_string(),
            postcode: cell(&record, postcode_idx).to_string(),
            assessment_number: cell(&record, number_idx).to_string(),
        });
    }
    Ok(rows)
}

/// Brokerage closed transactions. Rows without a reference use their row number.
pub fn load_brokerage(csv_data: &str) -> Result<Vec<BrokerageSale>, ReconError> {
    let (table, mut reader) = Table::open("brokerage", csv_data)?;
    let date_idx = table.required("transaction_date")?;
    let price_idx = table.required("price")?;
    let assessment_idx = table.required("assessment_number")?;
    let line_idx = table.required("address_line")?;
    let building_idx = table.required("building_name")?;
    let parish_idx = table.required("parish")?;
    let type_idx = table.required("property_type")?;
    let land_idx = table.required("is_land")?;
    let fractional_idx = table.required("is_fractional")?;
    let reference_idx = table.optional("reference");
    let postcode_idx = table.optional("postcode");

    let mut rows = Vec::new();
    for (n, record) in reader.records().enumerate() {
        let record = record?;
        let reference = match opt_cell(&record, reference_idx) {
            "" => format!("row {}", n + 1),
            r => r.to_string(),
        };
        let date = table.date(&reference, cell(&record, date_idx))?;
        let price_cents = parse_amount_cents(cell(&record, price_idx));

        let mut sale = BrokerageSale::new(reference, date, price_cents);
        sale.assessment_raw = cell(&record, assessment_idx).to_string();
        sale.assessment = normalize(&sale.assessment_raw);
        sale.address_line = cell(&record, line_idx).to_string();
        sale.building_name = cell(&record, building_idx).to_string();
        sale.parish = cell(&record, parish_idx).to_string();
        sale.postcode = opt_cell(&record, postcode_idx).to_string();
        sale.property_label = cell(&record, type_idx).to_string();
        sale.is_land = parse_flag(cell(&record, land_idx));
        sale.is_fractional = parse_flag(cell(&record, fractional_idx));
        sale.application_number =
            brokerage_application_number(&sale.reference, date, &sale.building_name, price_cents);
        rows.push(sale);
    }
    Ok(rows)
}

/// Brokerage listing feed. `is_sale` defaults to true when the column is absent.
pub fn load_listings(csv_data: &str) -> Result<Vec<Listing>, ReconError> {
    let (table, mut reader) = Table::open("listings", csv_data)?;
    let reference_idx = table.required("reference")?;
    let price_idx = table.required("price")?;
    let assessment_idx = table.required("assessment_number")?;
    let address_idx = table.required("address")?;
    let type_idx = table.required("property_type")?;
    let parish_idx = table.optional("parish");
    let postcode_idx = table.optional("postcode");
    let country_idx = table.optional("country");
    let added_idx = table.optional("date_added");
    let sale_idx = table.optional("is_sale");
    let rent_idx = table.optional("is_rent");
    let land_idx = table.optional("is_land");
    let url_idx = table.optional("url");
    let short_idx = table.optional("short_description");
    let long_idx = table.optional("long_description");

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut listing = Listing::new(cell(&record, reference_idx));
        listing.price_cents = parse_amount_cents(cell(&record, price_idx));
        listing.assessment_raw = cell(&record, assessment_idx).to_string();
        listing.assessment = normalize(&listing.assessment_raw);
        listing.address = cell(&record, address_idx).to_string();
        listing.property_label = cell(&record, type_idx).to_string();
        listing.parish = opt_cell(&record, parish_idx).to_string();
        listing.postcode = opt_cell(&record, postcode_idx).to_string();
        listing.country = opt_cell(&record, country_idx).to_string();
        listing.date_added = parse_date(opt_cell(&record, added_idx));
        listing.is_sale = sale_idx.map_or(true, |i| parse_flag(cell(&record, i)));
        listing.is_rent = parse_flag(opt_cell(&record, rent_idx));
        listing.is_land = parse_flag(opt_cell(&record, land_idx));
        listing.url = opt_cell(&record, url_idx).to_string();
        // feed text carries stray carriage returns
        listing.description = [opt_cell(&record, short_idx), opt_cell(&record, long_idx)]
            .iter()
            .filter(|t| !t.is_empty())
            .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>()
            .join(" ");
        rows.push(listing);
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

fn read(base: &Path, file: &str) -> Result<String, ReconError> {
    let path = base.join(file);
    std::fs::read_to_string(&path)
        .map_err(|e| ReconError::Io(format!("{}: {e}", path.display())))
}

/// Read every configured table, resolving paths against `base`.
pub fn load_input(inputs: &InputConfig, base: &Path, lexicon: &Lexicon) -> Result<ReconInput, ReconError> {
    let registry = load_registry(&read(base, &inputs.registry)?)?;
    let register = load_register(&read(base, &inputs.register)?, lexicon)?;
    let register_previous = match &inputs.register_previous {
        Some(file) => Some(load_register(&read(base, file)?, lexicon)?),
        None => None,
    };
    let parcels = load_parcels(&read(base, &inputs.parcels)?)?;
    let brokerage = match &inputs.brokerage {
        Some(file) => load_brokerage(&read(base, file)?)?,
        None => Vec::new(),
    };
    let listings = match &inputs.listings {
        Some(file) => load_listings(&read(base, file)?)?,
        None => Vec::new(),
    };
    Ok(ReconInput {
        registry,
        register,
        register_previous,
        parcels,
        brokerage,
        listings,
    })
}

/// Inline `[keywords]`, else `keywords_file` relative to `base`, else the bundled lists.
pub fn load_keywords(config: &PipelineConfig, base: &Path) -> Result<KeywordConfig, ReconError> {
    match &config.keywords_file {
        Some(file) => KeywordConfig::from_toml(&read(base, file)?),
        None => config.resolve_keywords(),
    }
}
