//! Valuation register maintenance: snapshot merging and duplicate collapse.

use std::collections::HashMap;

use tracing::warn;

use crate::assessment::normalize;
use crate::fuzzy::ratio;
use crate::model::{PropertyRecord, PropertyType, RegisterReport};

/// Rental values above this are almost certainly keying errors ($10M, in cents).
const ARV_CEILING_CENTS: i64 = 1_000_000_000;

/// Building names shorter than this carry no identity worth keeping.
const SHORT_NAME_CHARS: usize = 5;

/// Clean both snapshots, then lay the latest over the previous one.
pub fn prepare(
    previous: Option<&[PropertyRecord]>,
    latest: &[PropertyRecord],
    name_ratio: u8,
) -> (Vec<PropertyRecord>, RegisterReport) {
    let mut report = RegisterReport::default();

    let latest = canonical_rows(latest, &mut report);
    let (latest, collapsed) = dedupe(&latest, name_ratio);
    report.collapsed_duplicates += collapsed;

    let merged = match previous {
        Some(previous) => {
            let previous = canonical_rows(previous, &mut report);
            let (previous, collapsed) = dedupe(&previous, name_ratio);
            report.collapsed_duplicates += collapsed;
            let (merged, carried, updated) = merge_snapshots(&previous, &latest);
            report.carried_from_previous = carried;
            report.updated_fields = updated;
            merged
        }
        None => latest,
    };

    for record in &merged {
        if record.rental_value_cents < 0 || record.rental_value_cents > ARV_CEILING_CENTS {
            warn!(
                assessment_number = %record.assessment_number,
                rental_value_cents = record.rental_value_cents,
                "implausible annual rental value"
            );
        }
    }
    (merged, report)
}

/// Keep rows whose number reduces to exactly one code, rewritten to that code.
fn canonical_rows(rows: &[PropertyRecord], report: &mut RegisterReport) -> Vec<PropertyRecord> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        match normalize(&row.assessment_number).singleton() {
            Some(code) => {
                let mut row = row.clone();
                row.assessment_number = code.to_string();
                out.push(row);
            }
            None => {
                warn!(assessment_number = %row.assessment_number, "register row rejected");
                report.rejected += 1;
            }
        }
    }
    out
}

/// Union of both snapshots by assessment number.
///
/// A field from `latest` replaces the previous value only when it is present
/// and different; blank text, zero rent and `Unknown` type keep the old value.
/// Returns the merged rows, how many rows only the previous snapshot had, and
/// how many fields changed.
pub fn merge_snapshots(
    previous: &[PropertyRecord],
    latest: &[PropertyRecord],
) -> (Vec<PropertyRecord>, usize, usize) {
    let mut merged: Vec<PropertyRecord> = previous.to_vec();
    let mut position: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, r)| (r.assessment_number.clone(), i))
        .collect();

    let mut seen_in_latest = vec![false; merged.len()];
    let mut updated = 0;

    for row in latest {
        match position.get(&row.assessment_number) {
            Some(&i) => {
                seen_in_latest[i] = true;
                updated += overlay(&mut merged[i], row);
            }
            None => {
                position.insert(row.assessment_number.clone(), merged.len());
                merged.push(row.clone());
            }
        }
    }

    let carried = seen_in_latest.iter().filter(|seen| !**seen).count();
    (merged, carried, updated)
}

fn overlay(target: &mut PropertyRecord, newer: &PropertyRecord) -> usize {
    let mut changed = 0;
    let mut text = |old: &mut String, new: &String| {
        if !new.trim().is_empty() && old != new {
            *old = new.clone();
            changed += 1;
        }
    };
    text(&mut target.tax_code, &newer.tax_code);
    text(&mut target.address, &newer.address);
    text(&mut target.building_name, &newer.building_name);
    text(&mut target.parish, &newer.parish);
    text(&mut target.grid, &newer.grid);

    if newer.rental_value_cents != 0 && newer.rental_value_cents != target.rental_value_cents {
        target.rental_value_cents = newer.rental_value_cents;
        changed += 1;
    }
    if newer.property_type != PropertyType::Unknown && newer.property_type != target.property_type {
        target.property_type = newer.property_type;
        changed += 1;
    }
    changed
}

/// Collapse rows sharing an assessment number, first row first.
///
/// Building names above `name_ratio` similarity are the same building; a
/// short first name gives way to the next one; otherwise both are kept,
/// joined with `" -- "`. Returns the rows and how many were folded away.
pub fn dedupe(records: &[PropertyRecord], name_ratio: u8) -> (Vec<PropertyRecord>, usize) {
    let mut out: Vec<PropertyRecord> = Vec::with_capacity(records.len());
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut collapsed = 0;

    for record in records {
        let Some(&i) = position.get(record.assessment_number.as_str()) else {
            position.insert(record.assessment_number.as_str(), out.len());
            out.push(record.clone());
            continue;
        };
        collapsed += 1;

        let kept = &mut out[i];
        let other = record.building_name.trim();
        if other.is_empty() || ratio(&kept.building_name, other) > name_ratio {
            continue;
        }
        if kept.building_name.trim().chars().count() < SHORT_NAME_CHARS {
            kept.building_name = other.to_string();
        } else {
            kept.building_name = format!("{} -- {}", kept.building_name.trim(), other);
        }
    }
    (out, collapsed)
}
