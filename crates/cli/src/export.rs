//! Output tables: `sales.csv`, `properties.csv`, `listings.csv`,
//! `manual_review.csv` and `report.json`, all written into one directory.

use std::path::{Path, PathBuf};

use serde::Serialize;

use parcel_recon::model::{ReconMeta, ReconSummary, RunReport};
use parcel_recon::ReconResult;

pub const SALES_FILE: &str = "sales.csv";
pub const PROPERTIES_FILE: &str = "properties.csv";
pub const LISTINGS_FILE: &str = "listings.csv";
pub const REVIEW_FILE: &str = "manual_review.csv";
pub const REPORT_FILE: &str = "report.json";

const SALES_HEADERS: [&str; 17] = [
    "application_number",
    "source",
    "registration_date",
    "acquisition_date",
    "parish",
    "address",
    "full_address",
    "assessment_number",
    "assessment_raw",
    "price",
    "property_type",
    "parcel_area",
    "parcel_area_ha",
    "acquisition_mode",
    "nature_of_interest",
    "rental_values",
    "combined_rental_value",
];

const PROPERTY_HEADERS: [&str; 8] = [
    "assessment_number",
    "rental_value",
    "tax_code",
    "property_type",
    "address",
    "building_name",
    "parish",
    "grid",
];

const LISTING_HEADERS: [&str; 13] = [
    "reference",
    "date_added",
    "is_sale",
    "is_rent",
    "price",
    "assessment_number",
    "address",
    "property_name",
    "parish",
    "postcode",
    "country",
    "property_type",
    "flag",
];

const REVIEW_HEADERS: [&str; 5] = ["kind", "application_number", "address", "assessment_raw", "detail"];

/// The JSON run report: everything except the tables themselves.
#[derive(Serialize)]
pub struct RunDocument<'a> {
    pub meta: &'a ReconMeta,
    pub summary: &'a ReconSummary,
    pub report: &'a RunReport,
}

impl<'a> RunDocument<'a> {
    pub fn of(result: &'a ReconResult) -> Self {
        Self {
            meta: &result.meta,
            summary: &result.summary,
            report: &result.report,
        }
    }
}

/// Write every output into `dir`, creating it if needed.
pub fn write_outputs(dir: &Path, result: &ReconResult) -> Result<Vec<PathBuf>, String> {
    std::fs::create_dir_all(dir).map_err(|e| format!("cannot create {}: {e}", dir.display()))?;

    let sales = dir.join(SALES_FILE);
    write_sales(&sales, result).map_err(|e| format!("{}: {e}", sales.display()))?;

    let properties = dir.join(PROPERTIES_FILE);
    write_properties(&properties, result).map_err(|e| format!("{}: {e}", properties.display()))?;

    let listings = dir.join(LISTINGS_FILE);
    write_listings(&listings, result).map_err(|e| format!("{}: {e}", listings.display()))?;

    let review = dir.join(REVIEW_FILE);
    write_review(&review, result).map_err(|e| format!("{}: {e}", review.display()))?;

    let report = dir.join(REPORT_FILE);
    let json = serde_json::to_string_pretty(&RunDocument::of(result))
        .map_err(|e| format!("JSON serialization error: {e}"))?;
    std::fs::write(&report, json).map_err(|e| format!("cannot write {}: {e}", report.display()))?;

    Ok(vec![sales, properties, listings, review, report])
}

fn write_sales(path: &Path, result: &ReconResult) -> Result<(), csv::Error> {
    let mut w = csv::Writer::from_path(path)?;
    w.write_record(SALES_HEADERS)?;
    for s in &result.sales {
        let rental_values: Vec<String> = s.rental_values.iter().map(|v| dollars(*v)).collect();
        w.write_record([
            s.application_number.clone(),
            s.source.to_string(),
            s.registration_date.to_string(),
            s.acquisition_date.map(|d| d.to_string()).unwrap_or_default(),
            s.parish.clone(),
            s.address.clone(),
            s.full_address.clone(),
            s.assessment.to_string(),
            s.assessment_raw.clone(),
            dollars(s.price_cents),
            s.property_type.to_string(),
            s.parcel_area.clone(),
            s.parcel_area_ha.map(|h| h.to_string()).unwrap_or_default(),
            s.acquisition_mode.clone(),
            s.nature_of_interest.clone(),
            rental_values.join(";"),
            dollars(s.combined_rental_value),
        ])?;
    }
    w.flush()?;
    Ok(())
}

fn write_properties(path: &Path, result: &ReconResult) -> Result<(), csv::Error> {
    let mut w = csv::Writer::from_path(path)?;
    w.write_record(PROPERTY_HEADERS)?;
    for p in &result.properties {
        w.write_record([
            p.assessment_number.as_str(),
            &dollars(p.rental_value_cents),
            &p.tax_code,
            p.property_type.as_str(),
            &p.address,
            &p.building_name,
            &p.parish,
            &p.grid,
        ])?;
    }
    w.flush()?;
    Ok(())
}

fn write_listings(path: &Path, result: &ReconResult) -> Result<(), csv::Error> {
    let mut w = csv::Writer::from_path(path)?;
    w.write_record(LISTING_HEADERS)?;
    for l in &result.listings {
        w.write_record([
            l.reference.clone(),
            l.date_added.map(|d| d.to_string()).unwrap_or_default(),
            l.is_sale.to_string(),
            l.is_rent.to_string(),
            dollars(l.price_cents),
            l.assessment.to_string(),
            l.address.clone(),
            l.property_name.clone(),
            l.parish.clone(),
            l.postcode.clone(),
            l.country.clone(),
            l.property_type.to_string(),
            l.flag_text(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

fn write_review(path: &Path, result: &ReconResult) -> Result<(), csv::Error> {
    let mut w = csv::Writer::from_path(path)?;
    w.write_record(REVIEW_HEADERS)?;
    for item in &result.manual_review {
        w.write_record([
            item.kind.to_string().as_str(),
            &item.application_number,
            &item.address,
            &item.assessment_raw,
            &item.detail,
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// Cents as a plain decimal dollar amount.
fn dollars(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
