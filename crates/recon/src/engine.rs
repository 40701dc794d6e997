use tracing::info;

use crate::address::{full_address, normalize_addresses, repair_building_names};
use crate::classify::{classify_brokerage, classify_sales};
use crate::config::PipelineConfig;
use crate::consolidate::consolidate;
use crate::dedup::{deduplicate, DedupContext};
use crate::enrich::enrich;
use crate::error::ReconError;
use crate::lexicon::Lexicon;
use crate::listing::{process_listings, ListingContext};
use crate::model::{
    BrokerageSale, DedupPass, ReconInput, ReconMeta, ReconResult, ReconSummary, RunReport,
    SaleRecord, SaleSource,
};
use crate::prefilter::{prefilter_brokerage, prefilter_registry};
use crate::register;
use crate::review::collect_review_items;

/// Run the pipeline with the config's inline keywords (or the bundled lists).
///
/// Configs naming a `keywords_file` fail with `ConfigValidation`; load the
/// lists with `load::load_keywords` and call `run_with_lexicon`.
pub fn run(config: &PipelineConfig, input: &ReconInput) -> Result<ReconResult, ReconError> {
    let lexicon = Lexicon::compile(&config.resolve_keywords()?)?;
    run_with_lexicon(config, &lexicon, input)
}

/// Run every stage in order. Stages never fail; the only errors come from
/// config that slipped past validation.
pub fn run_with_lexicon(
    config: &PipelineConfig,
    lexicon: &Lexicon,
    input: &ReconInput,
) -> Result<ReconResult, ReconError> {
    config.validate()?;
    let mut report = RunReport::default();

    // Reference tables
    let (properties, register_report) = register::prepare(
        input.register_previous.as_deref(),
        &input.register,
        config.matching.register_name_ratio,
    );
    report.register = register_report;
    info!(
        properties = properties.len(),
        rejected = report.register.rejected,
        collapsed = report.register.collapsed_duplicates,
        carried = report.register.carried_from_previous,
        "register prepared"
    );

    // Registry sales
    let (registry, prefiltered) = prefilter_registry(&input.registry, &config.prefilter, lexicon);
    report.registry_prefilter = prefiltered;
    info!(
        rows = input.registry.len(),
        kept = registry.len(),
        "registry prefiltered"
    );

    let registry = classify_sales(&registry, lexicon);

    let (registry, consolidation) = consolidate(&registry, lexicon);
    info!(
        sales = registry.len(),
        merged = consolidation.merged_groups,
        removed = consolidation.rows_removed,
        unresolved = consolidation.unresolved.len(),
        "duplicate applications consolidated"
    );
    report.consolidation = consolidation;

    let (registry, enrichment) = enrich(
        &registry,
        &properties,
        config.trust,
        config.sanity.rent_multiple,
    );
    info!(
        sales = registry.len(),
        retyped = enrichment.retyped,
        ghost_codes = enrichment.ghost_codes.len(),
        discarded = enrichment.sanity_discarded.len(),
        trust = %config.trust,
        "sales enriched from register"
    );
    report.enrichment = enrichment;

    let (registry, address) = normalize_addresses(
        &registry,
        &properties,
        &input.parcels,
        lexicon,
        &config.address,
    );
    info!(
        deficient = address.deficient,
        resolved = address.resolved_from_register + address.resolved_from_parcels,
        unresolved = address.unresolved.len(),
        "addresses normalized"
    );
    report.address = address;

    // Listings
    let ctx = ListingContext {
        register: &properties,
        lexicon,
        config: &config.listings,
        parish_aliases: &config.prefilter.parish_aliases,
        country: &config.address.country,
        trust: config.trust,
    };
    let (listings, listing_report) = process_listings(&input.listings, &ctx);
    if !listings.is_empty() {
        info!(
            listings = listings.len(),
            retyped = listing_report.retyped,
            flagged = listing_report.flagged,
            "listings checked"
        );
    }
    report.listings = listing_report;

    // Brokerage sales
    let (brokerage, prefiltered) = prefilter_brokerage(&input.brokerage, &config.prefilter);
    report.brokerage_prefilter = prefiltered;

    let brokerage = classify_brokerage(&brokerage, lexicon);
    let ctx = DedupContext {
        registry: &registry,
        lexicon,
        matching: &config.matching,
        country: &config.address.country,
    };
    let (brokerage, dedup) = deduplicate(&brokerage, &ctx);
    info!(
        examined = dedup.examined,
        by_date = dedup.count(DedupPass::Date),
        by_address = dedup.count(DedupPass::Address),
        fractional = dedup.count(DedupPass::Fractional),
        "brokerage duplicates removed"
    );
    report.dedup = dedup;

    let (brokerage, renamed) = repair_building_names(&brokerage, &properties, lexicon);
    if renamed > 0 {
        info!(renamed, "unnamed brokerage buildings named");
    }

    let manual_review =
        collect_review_items(&report.consolidation, &report.address, &report.enrichment, &registry);

    let registry_sales = registry.len();
    let brokerage_sales = brokerage.len();
    let mut sales = registry;
    sales.extend(
        brokerage
            .iter()
            .map(|b| brokerage_to_sale(b, lexicon, &config.address.country)),
    );

    let summary = ReconSummary {
        registry_in: input.registry.len(),
        brokerage_in: input.brokerage.len(),
        registry_sales,
        brokerage_sales,
        properties: properties.len(),
        duplicates_removed: report.dedup.duplicates.len(),
        manual_review: manual_review.len(),
        listings_in: input.listings.len(),
        listings_flagged: report.listings.flagged,
    };

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            keywords_version: lexicon.version,
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        sales,
        properties,
        listings,
        manual_review,
        report,
    })
}

/// A surviving brokerage sale as a row of the canonical sales table.
fn brokerage_to_sale(sale: &BrokerageSale, lexicon: &Lexicon, country: &str) -> SaleRecord {
    let mut out = SaleRecord::new(sale.application_number.clone(), sale.transaction_date);
    out.source = SaleSource::Brokerage;
    out.parish = sale.parish.clone();
    let building = if lexicon.is_placeholder_name(&sale.building_name) {
        ""
    } else {
        sale.building_name.trim()
    };
    out.address = [building, sale.address_line.trim()]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    out.full_address = full_address(&out.address, &sale.parish, country);
    out.assessment_raw = sale.assessment_raw.clone();
    out.assessment = sale.assessment.clone();
    out.price_cents = sale.price_cents;
    out.property_type = sale.property_type;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::normalize;
    use crate::model::{Listing, ListingFlag, PropertyRecord, PropertyType};
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn registry_sale(app: &str, raw: &str, address: &str, price: i64, mode: &str) -> SaleRecord {
        let mut r = SaleRecord::new(app, d("2022-05-01"));
        r.assessment_raw = raw.into();
        r.assessment = normalize(raw);
        r.address = address.into();
        r.parish = "Paget".into();
        r.price_cents = price * 100;
        r.acquisition_mode = mode.into();
        r
    }

    fn input() -> ReconInput {
        let mut seaview = PropertyRecord::new("012345678");
        seaview.building_name = "Seaview".into();
        seaview.address = "12 Main Rd".into();
        seaview.rental_value_cents = 3_000_000;
        seaview.property_type = PropertyType::House;

        let mut offer = BrokerageSale::new("SK-1", d("2022-05-01"), 50_000_000);
        offer.application_number = "skip-00000001".into();
        offer.assessment_raw = "0".into();
        offer.address_line = "12 Main Rd".into();
        offer.building_name = "Seaview".into();
        let mut fresh = BrokerageSale::new("SK-2", d("2021-01-15"), 40_000_000);
        fresh.application_number = "skip-00000002".into();
        fresh.assessment_raw = "045678901".into();
        fresh.assessment = normalize("045678901");
        fresh.address_line = "9 Bay Rd, Sandys".into();
        fresh.property_label = "Cottage".into();
        let mut listed = Listing::new("SK-77");
        listed.assessment_raw = "012345678".into();
        listed.assessment = normalize("012345678");
        listed.property_label = "Apartment".into();
        listed.price_cents = 1_000_000;

        ReconInput {
            registry: vec![
                registry_sale("A1", "12345678", "Seaview, 12 Main Rd, Bermuda", 500_000, "Conveyance"),
                registry_sale("A1", "12345678", "Seaview, 12 Main Rd, Bermuda", 500_000, "Conveyance"),
                registry_sale("A2", "012345678", "Seaview, 12 Main Rd, Bermuda", 50_000, "Conveyance"),
                registry_sale("A3", "0", "Lot 4, South Rd", 120_000, "Conveyance"),
                registry_sale("A4", "0", "n/a", 90_000, "Conveyance"),
            ],
            register: vec![seaview],
            register_previous: None,
            parcels: Vec::new(),
            brokerage: vec![offer, fresh],
            listings: vec![listed],
        }
    }

    #[test]
    fn end_to_end_pipeline() {
        let result = run(&PipelineConfig::named("unit"), &input()).unwrap();

        assert_eq!(result.meta.config_name, "unit");
        assert_eq!(result.summary.registry_in, 5);
        assert_eq!(result.report.registry_prefilter.exact_duplicates, 1);
        assert_eq!(result.report.registry_prefilter.unidentifiable, 1);
        // A2 sold for less than 3x its rental value
        assert_eq!(result.report.enrichment.sanity_discarded, vec!["A2".to_string()]);

        let apps: Vec<_> = result.sales.iter().map(|s| s.application_number.as_str()).collect();
        assert_eq!(apps, vec!["A1", "A3", "skip-00000002"]);

        let a1 = &result.sales[0];
        assert_eq!(a1.property_type, PropertyType::House);
        assert_eq!(a1.combined_rental_value, 3_000_000);
        assert_eq!(a1.full_address, "Seaview, 12 Main Rd, Paget, Bermuda");

        let a3 = &result.sales[1];
        assert_eq!(a3.property_type, PropertyType::Land);

        let brokered = &result.sales[2];
        assert_eq!(brokered.source, SaleSource::Brokerage);
        assert_eq!(brokered.property_type, PropertyType::House);
        assert_eq!(brokered.address, "house at 9 Bay Rd, 9 Bay Rd, Sandys");

        assert_eq!(result.summary.duplicates_removed, 1);
        assert_eq!(result.summary.registry_sales, 2);
        assert_eq!(result.summary.brokerage_sales, 1);
        assert_eq!(result.summary.manual_review, 0);

        // listings never become sales
        assert_eq!(result.summary.listings_in, 1);
        assert_eq!(result.listings[0].property_type, PropertyType::House);
        assert_eq!(result.listings[0].property_name, "Seaview");
        assert_eq!(result.listings[0].flags, vec![ListingFlag::Price]);
        assert_eq!(result.summary.listings_flagged, 1);
    }

    #[test]
    fn keywords_file_is_not_silently_ignored() {
        let mut config = PipelineConfig::named("unit");
        config.keywords_file = Some("words.toml".into());
        assert!(matches!(run(&config, &input()), Err(ReconError::ConfigValidation(_))));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = PipelineConfig::named("bad");
        config.sanity.rent_multiple = -1.0;
        assert!(matches!(run(&config, &input()), Err(ReconError::ConfigValidation(_))));
    }
}
