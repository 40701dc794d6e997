use std::collections::BTreeSet;

use crate::model::{
    AddressIssue, AddressReport, ConsolidationReport, EnrichmentReport, ReviewItem, ReviewKind,
    SaleRecord,
};

/// Everything the pipeline declined to decide, one row per record.
pub fn collect_review_items(
    consolidation: &ConsolidationReport,
    address: &AddressReport,
    enrichment: &EnrichmentReport,
    sales: &[SaleRecord],
) -> Vec<ReviewItem> {
    let mut items = Vec::new();

    for group in &consolidation.unresolved {
        for member in &group.members {
            items.push(ReviewItem {
                kind: ReviewKind::UnresolvedDuplicateGroup,
                application_number: group.application_number.clone(),
                address: member.address.clone(),
                assessment_raw: member.assessment_raw.clone(),
                detail: format!("{} rows, no usable assessment number", group.members.len()),
            });
        }
    }

    for unresolved in &address.unresolved {
        let raw = sales
            .iter()
            .find(|s| s.application_number == unresolved.application_number)
            .map(|s| s.assessment_raw.clone())
            .unwrap_or_default();
        items.push(ReviewItem {
            kind: ReviewKind::UnresolvedAddress,
            application_number: unresolved.application_number.clone(),
            address: unresolved.address.clone(),
            assessment_raw: raw,
            detail: issue_label(&unresolved.issue).to_string(),
        });
    }

    let ghosts: BTreeSet<&str> = enrichment.ghost_codes.iter().map(String::as_str).collect();
    for sale in sales {
        let missing: Vec<&str> = sale
            .assessment
            .codes()
            .iter()
            .map(String::as_str)
            .filter(|c| ghosts.contains(c))
            .collect();
        if !missing.is_empty() {
            items.push(ReviewItem {
                kind: ReviewKind::GhostAssessment,
                application_number: sale.application_number.clone(),
                address: sale.address.clone(),
                assessment_raw: sale.assessment_raw.clone(),
                detail: format!("not in register: {}", missing.join(",")),
            });
        }
    }

    items
}

fn issue_label(issue: &AddressIssue) -> &'static str {
    match issue {
        AddressIssue::NoRegisterMatch => "no register entry for any assessment number",
        AddressIssue::NotAParcelCode => "address is not a parcel code",
        AddressIssue::NoParcelMatch => "parcel code not in reference table",
        AddressIssue::AmbiguousParcel => "parcel code matches several references",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::normalize;
    use crate::model::{UnresolvedAddress, UnresolvedGroup};
    use chrono::NaiveDate;

    fn sale(app: &str, raw: &str) -> SaleRecord {
        let mut r = SaleRecord::new(app, NaiveDate::from_ymd_opt(2022, 5, 1).unwrap());
        r.assessment_raw = raw.into();
        r.assessment = normalize(raw);
        r.address = "x".into();
        r
    }

    #[test]
    fn every_open_case_becomes_an_item() {
        let consolidation = ConsolidationReport {
            unresolved: vec![UnresolvedGroup {
                application_number: "A9".into(),
                members: vec![sale("A9", "0"), sale("A9", "unknown")],
            }],
            ..Default::default()
        };
        let address = AddressReport {
            unresolved: vec![UnresolvedAddress {
                application_number: "A1".into(),
                address: "x".into(),
                issue: AddressIssue::NoRegisterMatch,
            }],
            ..Default::default()
        };
        let enrichment = EnrichmentReport {
            ghost_codes: vec!["099999999".into()],
            ..Default::default()
        };
        let sales = vec![sale("A1", "099999999"), sale("A2", "012345678")];

        let items = collect_review_items(&consolidation, &address, &enrichment, &sales);
        let kinds: Vec<_> = items.iter().map(|i| i.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                ReviewKind::UnresolvedDuplicateGroup,
                ReviewKind::UnresolvedDuplicateGroup,
                ReviewKind::UnresolvedAddress,
                ReviewKind::GhostAssessment,
            ]
        );
        assert_eq!(items[2].assessment_raw, "099999999");
        assert_eq!(items[3].detail, "not in register: 099999999");
    }
}
