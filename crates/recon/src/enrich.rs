use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::assessment::AssessmentKey;
use crate::config::TrustPolicy;
use crate::model::{EnrichmentReport, PropertyRecord, PropertyType, SaleRecord};

/// Register rows by assessment number.
pub fn index_register(register: &[PropertyRecord]) -> HashMap<&str, &PropertyRecord> {
    register
        .iter()
        .map(|p| (p.assessment_number.as_str(), p))
        .collect()
}

/// Attach rental values from the register and reconcile property types,
/// then drop sales priced implausibly low against their rental value.
pub fn enrich(
    sales: &[SaleRecord],
    register: &[PropertyRecord],
    trust: TrustPolicy,
    rent_multiple: f64,
) -> (Vec<SaleRecord>, EnrichmentReport) {
    let index = index_register(register);
    let mut report = EnrichmentReport::default();
    let mut ghosts: BTreeSet<String> = BTreeSet::new();

    let mut enriched = Vec::with_capacity(sales.len());
    for sale in sales {
        let mut out = sale.clone();
        let codes = match &sale.assessment {
            AssessmentKey::Absent => {
                out.rental_values.clear();
                out.combined_rental_value = 0;
                enriched.push(out);
                continue;
            }
            key => key.codes(),
        };

        let matched: Vec<Option<&PropertyRecord>> =
            codes.iter().map(|c| index.get(c.as_str()).copied()).collect();
        for (code, hit) in codes.iter().zip(&matched) {
            if hit.is_none() {
                ghosts.insert(code.clone());
            }
        }

        out.rental_values = matched
            .iter()
            .map(|m| m.map_or(0, |p| p.rental_value_cents))
            .collect();
        out.combined_rental_value = out.rental_values.iter().sum();

        let hits: Vec<&PropertyRecord> = matched.iter().flatten().copied().collect();
        match (codes.len(), hits.len()) {
            (_, 0) => report.unmatched += 1,
            (1, _) => report.singleton_matched += 1,
            _ => report.multi_matched += 1,
        }

        if let Some(vote) = register_vote(codes.len(), &hits) {
            let resolved = apply_vote(out.property_type, vote, trust);
            if resolved != out.property_type {
                report.retyped += 1;
                out.property_type = resolved;
            }
        }
        enriched.push(out);
    }
    report.ghost_codes = ghosts.into_iter().collect();

    let (kept, discarded) = sanity_filter(&enriched, rent_multiple);
    report.sanity_discarded = discarded;

    debug!(
        singleton = report.singleton_matched,
        multi = report.multi_matched,
        unmatched = report.unmatched,
        retyped = report.retyped,
        ghosts = report.ghost_codes.len(),
        discarded = report.sanity_discarded.len(),
        "enriched sales from register"
    );
    (kept, report)
}

#[derive(Debug, Clone, Copy)]
enum Vote {
    Register(PropertyType),
    Forced(PropertyType),
}

fn register_vote(codes: usize, hits: &[&PropertyRecord]) -> Option<Vote> {
    match (codes, hits.len()) {
        // several codes and none known: the feed's type can't be trusted either
        (_, 0) => (codes > 1).then_some(Vote::Forced(PropertyType::Unknown)),
        (1, _) => Some(Vote::Register(hits[0].property_type)),
        _ => Some(Vote::Register(register_type(hits))),
    }
}

/// Reconcile one record's type with the register the way [`enrich`] does,
/// for feeds that carry no rental values of their own.
pub fn register_retype(
    current: PropertyType,
    key: &AssessmentKey,
    index: &HashMap<&str, &PropertyRecord>,
    trust: TrustPolicy,
) -> PropertyType {
    let codes = key.codes();
    if codes.is_empty() {
        return current;
    }
    let hits: Vec<&PropertyRecord> = codes
        .iter()
        .filter_map(|c| index.get(c.as_str()).copied())
        .collect();
    match register_vote(codes.len(), &hits) {
        Some(vote) => apply_vote(current, vote, trust),
        None => current,
    }
}

/// One distinct type wins outright; otherwise the type of the highest rental
/// value, earliest code first on ties.
fn register_type(hits: &[&PropertyRecord]) -> PropertyType {
    let first = hits[0].property_type;
    if hits.iter().all(|p| p.property_type == first) {
        return first;
    }
    let mut best = hits[0];
    for p in &hits[1..] {
        if p.rental_value_cents > best.rental_value_cents {
            best = p;
        }
    }
    best.property_type
}

fn apply_vote(current: PropertyType, vote: Vote, trust: TrustPolicy) -> PropertyType {
    if current == PropertyType::Fractional {
        return current;
    }
    match (trust, vote) {
        (TrustPolicy::RegisterPreferred, Vote::Forced(ty)) => ty,
        (TrustPolicy::RegisterPreferred, Vote::Register(ty)) if ty != PropertyType::Unknown => ty,
        (TrustPolicy::SaleFeedPreferred, Vote::Register(ty)) if current == PropertyType::Unknown => ty,
        _ => current,
    }
}

/// Split sales into those priced at or above `rent_multiple` × combined
/// rental value and the application numbers of those below it.
pub fn sanity_filter(sales: &[SaleRecord], rent_multiple: f64) -> (Vec<SaleRecord>, Vec<String>) {
    let mut kept = Vec::with_capacity(sales.len());
    let mut discarded = Vec::new();
    for sale in sales {
        let floor = rent_multiple * sale.combined_rental_value as f64;
        if (sale.price_cents as f64) < floor {
            discarded.push(sale.application_number.clone());
        } else {
            kept.push(sale.clone());
        }
    }
    (kept, discarded)
}
