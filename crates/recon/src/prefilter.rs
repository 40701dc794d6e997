use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;

use crate::config::PrefilterConfig;
use crate::lexicon::Lexicon;
use crate::model::{BrokerageSale, PrefilterReport, SaleRecord};

/// Map a parish spelling onto its canonical name.
pub fn canonical_parish(parish: &str, aliases: &BTreeMap<String, String>) -> String {
    let trimmed = parish.trim();
    aliases
        .get(trimmed)
        .cloned()
        .unwrap_or_else(|| trimmed.to_string())
}

/// Drop nominal-price, unidentifiable and repeated registry rows.
pub fn prefilter_registry(
    rows: &[SaleRecord],
    config: &PrefilterConfig,
    lexicon: &Lexicon,
) -> (Vec<SaleRecord>, PrefilterReport) {
    let min_price = config.min_price_cents();
    let mut report = PrefilterReport::default();
    let mut seen: HashSet<(String, NaiveDate, Option<NaiveDate>, String, i64)> = HashSet::new();
    let mut out = Vec::with_capacity(rows.len());

    for row in rows {
        if row.price_cents < min_price {
            report.below_min_price += 1;
            continue;
        }
        if row.address.trim().chars().count() < config.unidentifiable_address_length
            && lexicon.is_unknown_marker(&row.assessment_raw)
        {
            report.unidentifiable += 1;
            continue;
        }
        let key = (
            row.application_number.clone(),
            row.registration_date,
            row.acquisition_date,
            row.assessment_raw.trim().to_string(),
            row.price_cents,
        );
        if !seen.insert(key) {
            report.exact_duplicates += 1;
            continue;
        }

        let mut row = row.clone();
        row.parish = canonical_parish(&row.parish, &config.parish_aliases);
        out.push(row);
    }
    (out, report)
}

/// Drop nominal-price and repeated brokerage rows.
pub fn prefilter_brokerage(
    rows: &[BrokerageSale],
    config: &PrefilterConfig,
) -> (Vec<BrokerageSale>, PrefilterReport) {
    let min_price = config.min_price_cents();
    let mut report = PrefilterReport::default();
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(rows.len());

    for row in rows {
        if row.price_cents <= min_price {
            report.below_min_price += 1;
            continue;
        }
        let mut row = row.clone();
        row.parish = canonical_parish(&row.parish, &config.parish_aliases);

        let key = (
            row.transaction_date,
            row.parish.clone(),
            row.building_name.trim().to_string(),
            row.address_line.trim().to_string(),
            row.postcode.trim().to_string(),
            row.price_cents,
            row.assessment_raw.trim().to_string(),
        );
        if !seen.insert(key) {
            report.exact_duplicates += 1;
            continue;
        }
        out.push(row);
    }
    (out, report)
}
