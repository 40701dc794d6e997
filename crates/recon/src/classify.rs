use crate::assessment::AssessmentKey;
use crate::lexicon::Lexicon;
use crate::model::{BrokerageSale, Listing, PropertyType, SaleRecord};

/// Classify every registry sale. See [`classify_sale`].
pub fn classify_sales(records: &[SaleRecord], lexicon: &Lexicon) -> Vec<SaleRecord> {
    records.iter().map(|r| classify_sale(r, lexicon)).collect()
}

/// Run the keyword cascade over one sale.
///
/// Passes run in order (fractional, land, house, condo). Each may cast a
/// vote which is merged through [`PropertyType::resolve`], so a vote never
/// displaces an equal or more specific type. Fractional and land votes also
/// clear the assessment key: those sales describe a share or a plot, not the
/// assessed unit the key points at.
pub fn classify_sale(record: &SaleRecord, lexicon: &Lexicon) -> SaleRecord {
    let mut out = record.clone();

    if fractional_vote(&out, lexicon) {
        out.property_type = out.property_type.resolve(PropertyType::Fractional);
        out.assessment = AssessmentKey::Absent;
    }
    if out.property_type == PropertyType::Fractional {
        return out;
    }

    if land_vote(&out, lexicon) {
        out.property_type = out.property_type.resolve(PropertyType::Land);
        out.assessment = AssessmentKey::Absent;
    }

    let mode = &out.acquisition_mode;
    let conveyance = lexicon.has_conveyance(mode);
    let leasehold = lexicon.has_lease(mode) || lexicon.has_unit_marker(&out.address);

    if conveyance && !leasehold {
        out.property_type = out.property_type.resolve(PropertyType::House);
    }
    if leasehold && !conveyance {
        out.property_type = out.property_type.resolve(PropertyType::Condo);
    }

    out
}

fn fractional_vote(record: &SaleRecord, lexicon: &Lexicon) -> bool {
    if lexicon.is_fractional_anti(&record.assessment_raw) {
        return false;
    }
    let text_hit = [
        &record.acquisition_mode,
        &record.assessment_raw,
        &record.address,
        &record.nature_of_interest,
    ]
    .into_iter()
    .any(|field| lexicon.is_fractional_text(field));

    text_hit
        || lexicon.mentions_fractional_code(&record.assessment_raw)
        || record
            .assessment
            .codes()
            .iter()
            .any(|c| lexicon.is_fractional_code(c))
}

fn land_vote(record: &SaleRecord, lexicon: &Lexicon) -> bool {
    let fields = [&record.address, &record.assessment_raw];
    fields.iter().any(|f| lexicon.is_land_text(f)) && !fields.iter().any(|f| lexicon.is_land_anti(f))
}

// ---------------------------------------------------------------------------
// Brokerage
// ---------------------------------------------------------------------------

pub fn classify_brokerage(sales: &[BrokerageSale], lexicon: &Lexicon) -> Vec<BrokerageSale> {
    sales.iter().map(|s| classify_brokerage_sale(s, lexicon)).collect()
}

/// Same priorities as the registry cascade, but the feed's own flags and
/// type label stand in for the conveyance / lease text.
pub fn classify_brokerage_sale(sale: &BrokerageSale, lexicon: &Lexicon) -> BrokerageSale {
    let mut out = sale.clone();

    let fractional = out.is_fractional
        || (!lexicon.is_fractional_anti(&out.assessment_raw)
            && [
                &out.building_name,
                &out.assessment_raw,
                &out.address_line,
                &out.property_label,
            ]
            .into_iter()
            .any(|f| lexicon.is_fractional_text(f)));
    if fractional {
        out.property_type = out.property_type.resolve(PropertyType::Fractional);
        out.assessment = AssessmentKey::Absent;
        return out;
    }
    if out.property_type == PropertyType::Fractional {
        return out;
    }

    let named = [&out.address_line, &out.building_name];
    let land = out.is_land
        || (named.iter().any(|f| lexicon.is_land_text(f))
            && !named.iter().any(|f| lexicon.is_land_anti(f)));
    if land {
        out.property_type = out.property_type.resolve(PropertyType::Land);
        out.assessment = AssessmentKey::Absent;
        return out;
    }

    out.property_type = out.property_type.resolve(lexicon.label_type(&out.property_label));
    out
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// Listings describe the property in free text, so the fractional pass also
/// reads the URL slug and description. Land is decided on the address only.
pub fn classify_listing(listing: &Listing, lexicon: &Lexicon) -> Listing {
    let mut out = listing.clone();

    let text_hit = [
        &out.url,
        &out.address,
        &out.description,
        &out.property_label,
        &out.assessment_raw,
    ]
    .into_iter()
    .any(|f| lexicon.is_fractional_text(f));
    let code_hit = lexicon.mentions_fractional_code(&out.assessment_raw)
        || out.assessment.codes().iter().any(|c| lexicon.is_fractional_code(c));
    let fractional = (text_hit || code_hit) && !lexicon.is_fractional_anti(&out.assessment_raw);
    if fractional {
        out.property_type = out.property_type.resolve(PropertyType::Fractional);
        out.assessment = AssessmentKey::Absent;
        return out;
    }
    if out.property_type == PropertyType::Fractional {
        return out;
    }

    let land = out.is_land
        || (lexicon.is_land_text(&out.address) && !lexicon.is_land_anti(&out.address));
    if land {
        out.property_type = out.property_type.resolve(PropertyType::Land);
        out.assessment = AssessmentKey::Absent;
        return out;
    }

    out.property_type = out.property_type.resolve(lexicon.label_type(&out.property_label));
    out
}
