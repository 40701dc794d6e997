//! Brokerage listing feed: classification, register lookups and data-quality flags.
//!
//! Listings are not sales and never enter the sales table. They are cleaned
//! with the same lexicon and register as the sale feeds so that each one
//! either points at a register property or carries flags saying why it can't.

use std::collections::BTreeMap;

use tracing::debug;

use crate::classify::classify_listing;
use crate::config::{ListingConfig, TrustPolicy};
use crate::enrich::{index_register, register_retype};
use crate::lexicon::Lexicon;
use crate::model::{Listing, ListingFlag, ListingReport, PropertyRecord, PropertyType};
use crate::prefilter::canonical_parish;

/// Everything the listing stage reads besides the listings themselves.
pub struct ListingContext<'a> {
    pub register: &'a [PropertyRecord],
    pub lexicon: &'a Lexicon,
    pub config: &'a ListingConfig,
    pub parish_aliases: &'a BTreeMap<String, String>,
    pub country: &'a str,
    pub trust: TrustPolicy,
}

/// Clean every listing and flag the ones a human has to look at.
///
/// Per listing, in order: canonical parish, bare-number addresses cleared,
/// keyword classification, register type correction, register building
/// name, flags. Nothing is dropped.
pub fn process_listings(listings: &[Listing], ctx: &ListingContext<'_>) -> (Vec<Listing>, ListingReport) {
    let index = index_register(ctx.register);
    let mut report = ListingReport {
        examined: listings.len(),
        ..Default::default()
    };

    let mut out = Vec::with_capacity(listings.len());
    for listing in listings {
        let mut cleaned = listing.clone();
        cleaned.parish = canonical_parish(&cleaned.parish, ctx.parish_aliases);
        if is_bare_number(&cleaned.address) {
            cleaned.address.clear();
        }

        let mut cleaned = classify_listing(&cleaned, ctx.lexicon);
        let retyped = register_retype(cleaned.property_type, &cleaned.assessment, &index, ctx.trust);
        if retyped != cleaned.property_type {
            report.retyped += 1;
            cleaned.property_type = retyped;
        }

        let named = cleaned
            .assessment
            .singleton()
            .and_then(|code| index.get(code))
            .map(|p| p.building_name.trim())
            .filter(|name| !ctx.lexicon.is_placeholder_name(name));
        if let Some(name) = named {
            cleaned.property_name = name.to_string();
            report.named_from_register += 1;
        }

        cleaned.flags = flag_listing(&cleaned, ctx.config, ctx.country);
        if !cleaned.flags.is_empty() {
            report.flagged += 1;
            for flag in &cleaned.flags {
                match flag {
                    ListingFlag::Address => report.address_flags += 1,
                    ListingFlag::AssessmentNumber => report.assessment_flags += 1,
                    ListingFlag::Price => report.price_flags += 1,
                    ListingFlag::Country => report.country_flags += 1,
                }
            }
            debug!(
                reference = %cleaned.reference,
                flags = %cleaned.flag_text(),
                "listing flagged"
            );
        }
        out.push(cleaned);
    }

    (out, report)
}

/// Flags for one classified listing, in a fixed order.
pub fn flag_listing(listing: &Listing, config: &ListingConfig, country: &str) -> Vec<ListingFlag> {
    let mut flags = Vec::new();

    if address_is_weak(listing, config.min_address_length) {
        flags.push(ListingFlag::Address);
    }

    // land and shares are located by address, not by key
    let keyless = matches!(listing.property_type, PropertyType::Land | PropertyType::Fractional);
    if !keyless && listing.assessment.is_absent() {
        flags.push(ListingFlag::AssessmentNumber);
    }

    if listing.price_cents <= 0
        || (listing.is_sale && listing.price_cents < config.min_sale_price_cents())
    {
        flags.push(ListingFlag::Price);
    }

    let listed_in = listing.country.trim();
    if !listed_in.is_empty() && !listed_in.eq_ignore_ascii_case(country.trim()) {
        flags.push(ListingFlag::Country);
    }

    flags
}

/// An empty address is fine: the register supplies one once the key resolves.
fn address_is_weak(listing: &Listing, min_length: usize) -> bool {
    let address = listing.address.trim();
    if address.is_empty() {
        return false;
    }
    let short = address.chars().count() < min_length;
    let numbered = address.chars().any(|c| c.is_ascii_digit());
    match listing.property_type {
        PropertyType::Land | PropertyType::Fractional => short || !numbered,
        _ if listing.assessment.is_absent() => short || !numbered,
        _ => short && !numbered,
    }
}

fn is_bare_number(address: &str) -> bool {
    let trimmed = address.trim();
    !trimmed.is_empty() && trimmed.parse::<i64>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::normalize;
    use crate::config::PrefilterConfig;

    fn register() -> Vec<PropertyRecord> {
        let mut seaview = PropertyRecord::new("012345678");
        seaview.building_name = "Seaview".into();
        seaview.property_type = PropertyType::House;
        let mut flats = PropertyRecord::new("023456789");
        flats.building_name = "N/A".into();
        flats.property_type = PropertyType::Condo;
        vec![seaview, flats]
    }

    fn listing(reference: &str, raw: &str, address: &str, price: i64) -> Listing {
        let mut l = Listing::new(reference);
        l.assessment_raw = raw.into();
        l.assessment = normalize(raw);
        l.address = address.into();
        l.price_cents = price * 100;
        l
    }

    fn run(listings: &[Listing]) -> (Vec<Listing>, ListingReport) {
        let register = register();
        let lexicon = Lexicon::bundled().unwrap();
        let config = ListingConfig::default();
        let prefilter = PrefilterConfig::default();
        let ctx = ListingContext {
            register: &register,
            lexicon: &lexicon,
            config: &config,
            parish_aliases: &prefilter.parish_aliases,
            country: "Bermuda",
            trust: TrustPolicy::RegisterPreferred,
        };
        process_listings(listings, &ctx)
    }

    #[test]
    fn keyed_listing_takes_register_type_and_name() {
        let mut l = listing("L1", "12345678", "12 Main Rd, Paget", 950_000);
        l.property_label = "Condo".into();
        l.parish = "City of Hamilton".into();
        let (out, report) = run(&[l]);

        assert_eq!(out[0].property_type, PropertyType::House);
        assert_eq!(out[0].property_name, "Seaview");
        assert_eq!(out[0].parish, "Pembroke");
        assert!(out[0].flags.is_empty());
        assert_eq!(report.retyped, 1);
        assert_eq!(report.named_from_register, 1);
        assert_eq!(report.flagged, 0);
    }

    #[test]
    fn placeholder_register_name_is_not_copied() {
        let (out, report) = run(&[listing("L1", "023456789", "Flat 2, 8 Front St", 400_000)]);
        assert_eq!(out[0].property_name, "");
        assert_eq!(out[0].property_type, PropertyType::Condo);
        assert_eq!(report.named_from_register, 0);
    }

    #[test]
    fn unkeyed_house_is_flagged_for_number_and_address() {
        let mut l = listing("L1", "", "Hilltop", 800_000);
        l.property_label = "House".into();
        let (out, report) = run(&[l]);
        assert_eq!(
            out[0].flags,
            vec![ListingFlag::Address, ListingFlag::AssessmentNumber]
        );
        assert_eq!(out[0].flag_text(), "ADDRESS ASSN#");
        assert_eq!(report.address_flags, 1);
        assert_eq!(report.assessment_flags, 1);
    }

    #[test]
    fn land_needs_a_numbered_address_but_no_key() {
        let mut numbered = listing("L1", "0", "Lot on 14 Middle Road", 250_000);
        numbered.is_land = true;
        let mut vague = listing("L2", "0", "Land off Middle Road", 250_000);
        vague.is_land = true;
        let (out, _) = run(&[numbered, vague]);
        assert_eq!(out[0].property_type, PropertyType::Land);
        assert!(out[0].flags.is_empty());
        assert_eq!(out[1].flags, vec![ListingFlag::Address]);
    }

    #[test]
    fn bare_number_address_is_cleared() {
        let (out, _) = run(&[listing("L1", "012345678", "42", 700_000)]);
        assert_eq!(out[0].address, "");
        assert!(out[0].flags.is_empty());
    }

    #[test]
    fn price_rules_depend_on_sale_or_rent() {
        let cheap_sale = listing("L1", "012345678", "12 Main Rd, Paget", 15_000);
        let mut rental = listing("L2", "012345678", "12 Main Rd, Paget", 4_500);
        rental.is_sale = false;
        rental.is_rent = true;
        let mut unpriced = listing("L3", "012345678", "12 Main Rd, Paget", 0);
        unpriced.is_sale = false;

        let (out, report) = run(&[cheap_sale, rental, unpriced]);
        assert_eq!(out[0].flags, vec![ListingFlag::Price]);
        assert!(out[1].flags.is_empty());
        assert_eq!(out[2].flags, vec![ListingFlag::Price]);
        assert_eq!(report.price_flags, 2);
    }

    #[test]
    fn foreign_country_is_flagged() {
        let mut abroad = listing("L1", "012345678", "12 Main Rd, Paget", 900_000);
        abroad.country = "Turks and Caicos".into();
        let mut local = listing("L2", "012345678", "12 Main Rd, Paget", 900_000);
        local.country = "bermuda".into();
        let (out, report) = run(&[abroad, local]);
        assert_eq!(out[0].flags, vec![ListingFlag::Country]);
        assert!(out[1].flags.is_empty());
        assert_eq!(report.country_flags, 1);
    }

    #[test]
    fn fractional_listing_is_located_by_address() {
        let mut share = listing("L1", "012345678", "Villa 2/14, Tucker's Town Rd", 90_000);
        share.description = "1/10th share".into();
        let (out, _) = run(&[share]);
        assert_eq!(out[0].property_type, PropertyType::Fractional);
        assert!(out[0].assessment.is_absent());
        assert!(out[0].flags.is_empty());
    }
}
