use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::assessment::{normalize, AssessmentKey};
use crate::config::AddressConfig;
use crate::enrich::index_register;
use crate::lexicon::Lexicon;
use crate::model::{
    AddressIssue, AddressReport, BrokerageSale, ParcelReference, PropertyRecord, SaleRecord,
    UnresolvedAddress,
};

fn parcel_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z]{2}-\d{1,6}(/\S+)?$").expect("static pattern"))
}

pub fn is_parcel_code(text: &str) -> bool {
    parcel_pattern().is_match(text)
}

/// `address, parish, country`, skipping empty parts.
///
/// A country the address already names is not repeated. When it closes the
/// address it moves after the parish.
pub fn full_address(address: &str, parish: &str, country: &str) -> String {
    let country = country.trim();
    if country.is_empty() || !address.to_lowercase().contains(&country.to_lowercase()) {
        return join_present(&[address, parish, country], ", ");
    }
    match strip_country(address, country) {
        Some(head) => join_present(&[head, parish, country], ", "),
        None => join_present(&[address, parish], ", "),
    }
}

fn strip_country<'a>(address: &'a str, country: &str) -> Option<&'a str> {
    let trimmed = address.trim_end().trim_end_matches(',').trim_end();
    let cut = trimmed.len().checked_sub(country.len())?;
    if !trimmed.is_char_boundary(cut) || !trimmed[cut..].eq_ignore_ascii_case(country) {
        return None;
    }
    Some(trimmed[..cut].trim_end().trim_end_matches(',').trim_end())
}

/// Replace deficient addresses from the register (keyed sales) or the parcel
/// reference (unkeyed sales), then derive `full_address` for every sale.
///
/// A sale that cannot be repaired keeps its address and is listed in the report.
pub fn normalize_addresses(
    sales: &[SaleRecord],
    register: &[PropertyRecord],
    parcels: &[ParcelReference],
    lexicon: &Lexicon,
    config: &AddressConfig,
) -> (Vec<SaleRecord>, AddressReport) {
    let index = index_register(register);
    let mut by_code: HashMap<String, Vec<&ParcelReference>> = HashMap::new();
    for parcel in parcels {
        by_code
            .entry(parcel.parcel_code.trim().to_uppercase())
            .or_default()
            .push(parcel);
    }

    let mut report = AddressReport::default();
    let mut out = Vec::with_capacity(sales.len());

    for sale in sales {
        let mut sale = sale.clone();
        if sale.address.trim().chars().count() < config.min_length {
            report.deficient += 1;
            let unkeyed = sale.assessment.is_absent();
            let outcome = if unkeyed {
                from_parcels(&mut sale, &by_code, config.max_adopted_codes)
            } else {
                from_register(&mut sale, &index, lexicon)
            };
            match outcome {
                Ok(()) if unkeyed => report.resolved_from_parcels += 1,
                Ok(()) => report.resolved_from_register += 1,
                Err(issue) => {
                    warn!(
                        application_number = %sale.application_number,
                        address = %sale.address,
                        ?issue,
                        "deficient address left unchanged"
                    );
                    report.unresolved.push(UnresolvedAddress {
                        application_number: sale.application_number.clone(),
                        address: sale.address.clone(),
                        issue,
                    });
                }
            }
        }
        sale.full_address = full_address(&sale.address, &sale.parish, &config.country);
        out.push(sale);
    }

    debug!(
        deficient = report.deficient,
        register = report.resolved_from_register,
        parcels = report.resolved_from_parcels,
        unresolved = report.unresolved.len(),
        "normalized addresses"
    );
    (out, report)
}

fn from_register(
    sale: &mut SaleRecord,
    index: &HashMap<&str, &PropertyRecord>,
    lexicon: &Lexicon,
) -> Result<(), AddressIssue> {
    let parts: Vec<String> = sale
        .assessment
        .codes()
        .iter()
        .filter_map(|code| index.get(code.as_str()))
        .map(|p| {
            if lexicon.is_placeholder_name(&p.building_name) {
                p.address.trim().to_string()
            } else {
                join_present(&[p.building_name.as_str(), p.address.as_str()], ", ")
            }
        })
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        return Err(AddressIssue::NoRegisterMatch);
    }
    sale.address = parts.join(" + ");
    Ok(())
}

fn from_parcels(
    sale: &mut SaleRecord,
    by_code: &HashMap<String, Vec<&ParcelReference>>,
    max_adopted_codes: usize,
) -> Result<(), AddressIssue> {
    let original = sale.address.trim().to_string();
    let code = original.to_uppercase();
    if !is_parcel_code(&code) {
        return Err(AddressIssue::NotAParcelCode);
    }

    let mut hits = by_code.get(&code).map(Vec::as_slice).unwrap_or_default();
    if hits.is_empty() {
        if let Some((prefix, _)) = code.split_once('/') {
            hits = by_code.get(prefix).map(Vec::as_slice).unwrap_or_default();
        }
    }

    let parcel = match hits {
        [] => return Err(AddressIssue::NoParcelMatch),
        [one] => *one,
        _ => return Err(AddressIssue::AmbiguousParcel),
    };

    let location = join_present(
        &[
            parcel.street_address.as_str(),
            parcel.parish.as_str(),
            parcel.postcode.as_str(),
        ],
        ", ",
    );
    sale.address = format!("{location} ({original})");

    if let key @ AssessmentKey::Codes(_) = normalize(&parcel.assessment_number) {
        if key.len() <= max_adopted_codes {
            sale.assessment = key;
        }
    }
    Ok(())
}

/// Name unnamed brokerage buildings: the register's name for a single-code
/// key when it has one, else `"<type> at <street>"`.
pub fn repair_building_names(
    sales: &[BrokerageSale],
    register: &[PropertyRecord],
    lexicon: &Lexicon,
) -> (Vec<BrokerageSale>, usize) {
    let index = index_register(register);
    let mut repaired = 0;
    let out = sales
        .iter()
        .map(|sale| {
            let mut sale = sale.clone();
            if !lexicon.is_placeholder_name(&sale.building_name) {
                return sale;
            }
            let registered = sale
                .assessment
                .singleton()
                .and_then(|code| index.get(code))
                .map(|p| p.building_name.trim())
                .filter(|name| name.chars().count() > 2 && !lexicon.is_placeholder_name(name));
            let street = sale.address_line.split(',').next().unwrap_or("").trim();
            let name = match registered {
                Some(name) => name.to_string(),
                None if !street.is_empty() => format!("{} at {street}", sale.property_type),
                None => return sale,
            };
            sale.building_name = name;
            repaired += 1;
            sale
        })
        .collect();
    (out, repaired)
}

fn join_present(parts: &[&str], sep: &str) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}
