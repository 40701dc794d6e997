use std::collections::HashMap;

use tracing::{debug, warn};

use crate::lexicon::Lexicon;
use crate::model::{ConsolidationReport, PropertyType, SaleRecord, UnresolvedGroup};

/// Collapse rows sharing an application number to at most one row.
///
/// Groups are visited in first-seen order and each group is decided once:
/// - every member keyed: merge into the first member,
/// - a fractional member present: keep the first fractional member,
/// - no member keyed: keep the first member whose identifier is not an
///   unknown marker; with none, the whole group goes to the report,
/// - mixed: drop the unkeyed members and merge what is left.
pub fn consolidate(records: &[SaleRecord], lexicon: &Lexicon) -> (Vec<SaleRecord>, ConsolidationReport) {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&SaleRecord>> = HashMap::new();
    for record in records {
        let members = groups.entry(record.application_number.as_str()).or_default();
        if members.is_empty() {
            order.push(record.application_number.as_str());
        }
        members.push(record);
    }

    let mut report = ConsolidationReport::default();
    let mut out = Vec::with_capacity(order.len());
    let mut unresolved_rows = 0;

    for app in order {
        let members = &groups[app];
        if members.len() == 1 {
            out.push(members[0].clone());
            continue;
        }
        report.duplicate_groups += 1;

        match resolve_group(members, lexicon) {
            Resolution::Keep(record) => out.push(record.clone()),
            Resolution::Merge(keyed) => {
                report.merged_groups += 1;
                out.push(merge(&keyed));
            }
            Resolution::Unresolved => {
                warn!(
                    application_number = app,
                    members = members.len(),
                    "duplicate group has no usable identifier, sent to manual review"
                );
                unresolved_rows += members.len();
                report.unresolved.push(UnresolvedGroup {
                    application_number: app.to_string(),
                    members: members.iter().map(|r| (*r).clone()).collect(),
                });
            }
        }
    }

    report.rows_removed = records.len() - out.len() - unresolved_rows;
    debug!(
        groups = report.duplicate_groups,
        merged = report.merged_groups,
        removed = report.rows_removed,
        "consolidated duplicate application numbers"
    );
    (out, report)
}

enum Resolution<'a> {
    Keep(&'a SaleRecord),
    Merge(Vec<&'a SaleRecord>),
    Unresolved,
}

fn resolve_group<'a>(members: &[&'a SaleRecord], lexicon: &Lexicon) -> Resolution<'a> {
    if members.iter().all(|r| !r.assessment.is_absent()) {
        return Resolution::Merge(members.to_vec());
    }

    if let Some(first) = members
        .iter()
        .copied()
        .find(|r| r.property_type == PropertyType::Fractional)
    {
        return Resolution::Keep(first);
    }

    let keyed: Vec<&SaleRecord> = members
        .iter()
        .copied()
        .filter(|r| !r.assessment.is_absent())
        .collect();

    match keyed.len() {
        0 => members
            .iter()
            .copied()
            .find(|r| !lexicon.is_unknown_marker(&r.assessment_raw))
            .map_or(Resolution::Unresolved, Resolution::Keep),
        1 => Resolution::Keep(keyed[0]),
        _ => Resolution::Merge(keyed),
    }
}

/// First member wins every field but the key (union) and address (distinct, joined).
fn merge(members: &[&SaleRecord]) -> SaleRecord {
    let mut merged = members[0].clone();
    let mut addresses: Vec<&str> = Vec::new();
    for member in members {
        merged.assessment = merged.assessment.union(&member.assessment);
        let address = member.address.trim();
        if !address.is_empty() && !addresses.contains(&address) {
            addresses.push(address);
        }
    }
    merged.address = addresses.join(" + ");
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::normalize;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn lexicon() -> Lexicon {
        Lexicon::bundled().unwrap()
    }

    fn row(app: &str, raw: &str, address: &str, ty: PropertyType) -> SaleRecord {
        let mut r = SaleRecord::new(app, NaiveDate::from_ymd_opt(2022, 5, 1).unwrap());
        r.assessment_raw = raw.into();
        r.assessment = normalize(raw);
        r.address = address.into();
        r.property_type = ty;
        r
    }

    #[test]
    fn keyed_duplicates_merge() {
        let rows = vec![
            row("A1", "012345678", "Seaview, 12 Main Rd", PropertyType::House),
            row("A2", "099999999", "Elsewhere", PropertyType::House),
            row("A1", "023456789", "Harbour View, 14 Main Rd", PropertyType::House),
        ];
        let (out, report) = consolidate(&rows, &lexicon());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].application_number, "A1");
        assert_eq!(out[0].assessment, normalize("012345678,023456789"));
        assert_eq!(out[0].address, "Seaview, 12 Main Rd + Harbour View, 14 Main Rd");
        assert_eq!(out[1].application_number, "A2");
        assert_eq!(report.merged_groups, 1);
        assert_eq!(report.rows_removed, 1);
    }

    #[test]
    fn same_address_is_not_repeated() {
        let rows = vec![
            row("A1", "012345678", "Seaview", PropertyType::House),
            row("A1", "023456789", "Seaview", PropertyType::House),
        ];
        let (out, _) = consolidate(&rows, &lexicon());
        assert_eq!(out[0].address, "Seaview");
    }

    #[test]
    fn fractional_member_survives() {
        let rows = vec![
            row("A100", "012345678", "Villa 4", PropertyType::Unknown),
            row("A100", "0", "1/10th share Villa 4", PropertyType::Fractional),
        ];
        let (out, report) = consolidate(&rows, &lexicon());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].property_type, PropertyType::Fractional);
        assert!(report.unresolved.is_empty());
    }

    #[test]
    fn all_absent_keeps_first_informative() {
        let rows = vec![
            row("A1", "unknown", "Seaview", PropertyType::Unknown),
            row("A1", "Land", "Lot 3, South Rd", PropertyType::Land),
        ];
        let (out, _) = consolidate(&rows, &lexicon());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].assessment_raw, "Land");
    }

    #[test]
    fn all_unknown_markers_go_to_review() {
        let rows = vec![
            row("A1", "0", "Seaview", PropertyType::Unknown),
            row("A1", "unknown", "Seaview", PropertyType::Unknown),
            row("A2", "012345678", "Elsewhere", PropertyType::House),
        ];
        let (out, report) = consolidate(&rows, &lexicon());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].application_number, "A2");
        assert_eq!(report.unresolved.len(), 1);
        assert_eq!(report.unresolved[0].members.len(), 2);
        assert_eq!(report.rows_removed, 0);
    }

    #[test]
    fn mixed_group_drops_unkeyed() {
        let rows = vec![
            row("A1", "unknown", "Seaview", PropertyType::Unknown),
            row("A1", "012345678", "Seaview, 12 Main Rd", PropertyType::House),
            row("A1", "023456789", "Harbour View", PropertyType::House),
        ];
        let (out, report) = consolidate(&rows, &lexicon());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].assessment.len(), 2);
        assert_eq!(out[0].address, "Seaview, 12 Main Rd + Harbour View");
        assert_eq!(report.merged_groups, 1);
    }

    fn any_row() -> impl Strategy<Value = SaleRecord> {
        (
            prop::sample::select(vec!["A1", "A2", "A3"]),
            prop::sample::select(vec!["0", "unknown", "Land", "012345678", "023456789"]),
            prop::sample::select(vec![PropertyType::Unknown, PropertyType::House, PropertyType::Fractional]),
        )
            .prop_map(|(app, raw, ty)| row(app, raw, "Seaview", ty))
    }

    proptest! {
        #[test]
        fn at_most_one_row_per_application(rows in prop::collection::vec(any_row(), 0..12)) {
            let (out, report) = consolidate(&rows, &lexicon());
            prop_assert!(out.len() <= rows.len());
            let mut seen = HashSet::new();
            for r in &out {
                prop_assert!(seen.insert(r.application_number.clone()));
            }
            for g in &report.unresolved {
                prop_assert!(!seen.contains(&g.application_number));
            }
        }
    }
}
