use tracing::debug;

use crate::config::MatchingConfig;
use crate::lexicon::Lexicon;
use crate::matcher::{addresses_close, dates_close, fuzzy_address_match, prices_close, within_years};
use crate::model::{BrokerageSale, DedupPass, DedupReport, DuplicateMatch, PropertyType, SaleRecord};

/// Everything a pass needs besides the record under test.
pub struct DedupContext<'a> {
    pub registry: &'a [SaleRecord],
    pub lexicon: &'a Lexicon,
    pub matching: &'a MatchingConfig,
    pub country: &'a str,
}

/// Drop brokerage sales that already appear in the registry.
///
/// Three passes run in order (date, address, fractional); a pass only sees
/// records no earlier pass matched. A record is removed only when exactly one
/// registry sale (or, for fractional shares, one consistent group) explains it.
pub fn deduplicate(incoming: &[BrokerageSale], ctx: &DedupContext<'_>) -> (Vec<BrokerageSale>, DedupReport) {
    let mut report = DedupReport {
        examined: incoming.len(),
        ..Default::default()
    };

    let mut survivors: Vec<&BrokerageSale> = incoming.iter().collect();
    for pass in [DedupPass::Date, DedupPass::Address, DedupPass::Fractional] {
        let mut kept = Vec::with_capacity(survivors.len());
        for sale in survivors {
            let hit = match pass {
                DedupPass::Date => date_match(sale, ctx),
                DedupPass::Address => address_match(sale, ctx),
                DedupPass::Fractional => fractional_match(sale, ctx),
            };
            match hit {
                Some(registry) => {
                    debug!(
                        application_number = %sale.application_number,
                        registry = %registry.application_number,
                        %pass,
                        "brokerage sale already registered"
                    );
                    report.duplicates.push(DuplicateMatch {
                        application_number: sale.application_number.clone(),
                        registry_application_number: registry.application_number.clone(),
                        pass,
                    });
                }
                None => kept.push(sale),
            }
        }
        survivors = kept;
    }

    (survivors.into_iter().cloned().collect(), report)
}

// ---------------------------------------------------------------------------
// Date pass
// ---------------------------------------------------------------------------

fn date_match<'a>(sale: &BrokerageSale, ctx: &DedupContext<'a>) -> Option<&'a SaleRecord> {
    let date = sale.transaction_date;
    let tolerance = ctx.matching.price_tolerance;
    let candidates: Vec<&SaleRecord> = ctx
        .registry
        .iter()
        .filter(|r| r.registration_date == date || r.acquisition_date == Some(date))
        .collect();

    match candidates.as_slice() {
        [] => None,
        [one] => {
            let same = prices_close(sale.price_cents, one.price_cents, tolerance)
                && if sale.assessment.is_absent() {
                    fuzzy_address_match(&composed_address(sale, ctx.lexicon), &one.address, ctx.country, ctx.matching)
                        .matched
                } else {
                    sale.assessment.overlaps(&one.assessment)
                };
            same.then_some(*one)
        }
        many => {
            let exact: Vec<&SaleRecord> = many
                .iter()
                .copied()
                .filter(|r| r.price_cents == sale.price_cents)
                .collect();
            let priced: Vec<&SaleRecord> = if exact.is_empty() {
                many.iter()
                    .copied()
                    .filter(|r| prices_close(sale.price_cents, r.price_cents, tolerance))
                    .collect()
            } else {
                exact
            };

            let composed = composed_address(sale, ctx.lexicon);
            let narrowed: Vec<&SaleRecord> = priced
                .into_iter()
                .filter(|r| {
                    if sale.assessment.is_absent() {
                        fuzzy_address_match(&composed, &r.address, ctx.country, ctx.matching).matched
                    } else {
                        sale.assessment.is_contained_in(&r.assessment)
                    }
                })
                .collect();
            unique(narrowed)
        }
    }
}

// ---------------------------------------------------------------------------
// Address pass
// ---------------------------------------------------------------------------

fn address_match<'a>(sale: &BrokerageSale, ctx: &DedupContext<'a>) -> Option<&'a SaleRecord> {
    let line = sale.address_line.trim();
    let building = sale.building_name.trim();
    if line.is_empty() || ctx.lexicon.is_placeholder_name(building) {
        return None;
    }
    let m = ctx.matching;
    let (line_lc, building_lc) = (line.to_lowercase(), building.to_lowercase());

    let partial: Vec<&SaleRecord> = ctx
        .registry
        .iter()
        .filter(|r| {
            let address = r.address.to_lowercase();
            address.contains(&line_lc) && address.contains(&building_lc)
        })
        .collect();

    match partial.as_slice() {
        [one] => {
            let accepted = if dates_close(sale.transaction_date, one.registration_date, one.acquisition_date, m.near_days) {
                prices_close(sale.price_cents, one.price_cents, m.price_tolerance)
            } else {
                // same price years apart: the feed mislabelled the date
                (sale.price_cents - one.price_cents).abs() <= m.near_exact_price_cents()
            };
            accepted.then_some(*one)
        }
        [] => {
            let composed = composed_address(sale, ctx.lexicon);
            let fuzzy: Vec<&SaleRecord> = ctx
                .registry
                .iter()
                .filter(|r| addresses_close(&composed, &r.address, m))
                .collect();
            unique(fuzzy).filter(|r| {
                prices_close(sale.price_cents, r.price_cents, m.price_tolerance)
                    && dates_close(sale.transaction_date, r.registration_date, r.acquisition_date, m.near_days)
            })
        }
        many => unique(
            many.iter()
                .copied()
                .filter(|r| {
                    within_years(sale.transaction_date, r.registration_date, r.acquisition_date, m.year_window)
                        && prices_close(sale.price_cents, r.price_cents, m.price_band)
                })
                .collect(),
        ),
    }
}

// ---------------------------------------------------------------------------
// Fractional pass
// ---------------------------------------------------------------------------

fn fractional_match<'a>(sale: &BrokerageSale, ctx: &DedupContext<'a>) -> Option<&'a SaleRecord> {
    let line = sale.address_line.trim().to_lowercase();
    if sale.property_type != PropertyType::Fractional || line.is_empty() {
        return None;
    }

    let codes = ctx.lexicon.unit_codes(&sale.building_name);
    let needles: Vec<String> = match codes.len() {
        0 => vec![line, sale.building_name.trim().to_lowercase()],
        1 | 2 => std::iter::once(line)
            .chain(codes.iter().map(|c| c.to_lowercase()))
            .collect(),
        _ => return None,
    };

    let candidates: Vec<&SaleRecord> = ctx
        .registry
        .iter()
        .filter(|r| r.property_type == PropertyType::Fractional)
        .filter(|r| {
            let address = r.address.to_lowercase();
            needles.iter().all(|n| address.contains(n.as_str()))
        })
        .collect();

    match candidates.as_slice() {
        [] => None,
        [one] => (one.price_cents == sale.price_cents).then_some(*one),
        many => many
            .iter()
            .all(|r| prices_close(sale.price_cents, r.price_cents, ctx.matching.price_tolerance))
            .then_some(many[0]),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `building, address line, parish postcode` with empty or placeholder parts left out.
pub fn composed_address(sale: &BrokerageSale, lexicon: &Lexicon) -> String {
    let locality = format!("{} {}", sale.parish.trim(), sale.postcode.trim());
    let building = if lexicon.is_placeholder_name(&sale.building_name) {
        ""
    } else {
        sale.building_name.trim()
    };
    [building, sale.address_line.trim(), locality.trim()]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn unique(mut candidates: Vec<&SaleRecord>) -> Option<&SaleRecord> {
    if candidates.len() == 1 {
        candidates.pop()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::normalize;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn registered(app: &str, date: &str, price: i64, raw: &str, address: &str) -> SaleRecord {
        let mut r = SaleRecord::new(app, d(date));
        r.price_cents = price * 100;
        r.assessment_raw = raw.into();
        r.assessment = normalize(raw);
        r.address = address.into();
        r
    }

    fn offered(reference: &str, date: &str, price: i64, raw: &str, line: &str, building: &str) -> BrokerageSale {
        let mut s = BrokerageSale::new(reference, d(date), price * 100);
        s.application_number = format!("skip-{reference}");
        s.assessment_raw = raw.into();
        s.assessment = normalize(raw);
        s.address_line = line.into();
        s.building_name = building.into();
        s
    }

    fn run(incoming: &[BrokerageSale], registry: &[SaleRecord]) -> (Vec<BrokerageSale>, DedupReport) {
        let lexicon = Lexicon::bundled().unwrap();
        let matching = MatchingConfig::default();
        let ctx = DedupContext {
            registry,
            lexicon: &lexicon,
            matching: &matching,
            country: "Bermuda",
        };
        deduplicate(incoming, &ctx)
    }

    #[test]
    fn same_day_same_price_fuzzy_address() {
        let registry = vec![registered("A1", "2022-05-01", 500_000, "0", "Seaview, 12 Main Rd, Bermuda")];
        let incoming = vec![offered("R1", "2022-05-01", 500_000, "0", "12 Main Rd", "")];
        let (out, report) = run(&incoming, &registry);
        assert!(out.is_empty());
        assert_eq!(report.count(DedupPass::Date), 1);
        assert_eq!(report.duplicates[0].registry_application_number, "A1");
    }

    #[test]
    fn same_day_key_overlap_within_tolerance() {
        let registry = vec![registered("A1", "2022-05-01", 500_000, "012345678,023456789", "Seaview")];
        let incoming = vec![offered("R1", "2022-05-01", 520_000, "012345678", "", "")];
        let (out, _) = run(&incoming, &registry);
        assert!(out.is_empty());
    }

    #[test]
    fn same_day_price_too_far_is_kept() {
        let registry = vec![registered("A1", "2022-05-01", 500_000, "012345678", "Seaview")];
        let incoming = vec![offered("R1", "2022-05-01", 600_000, "012345678", "", "")];
        let (out, report) = run(&incoming, &registry);
        assert_eq!(out.len(), 1);
        assert!(report.duplicates.is_empty());
    }

    #[test]
    fn several_same_day_candidates_narrow_by_price_then_key() {
        let registry = vec![
            registered("A1", "2022-05-01", 500_000, "012345678", "Seaview"),
            registered("A2", "2022-05-01", 500_000, "023456789", "Harbour View"),
            registered("A3", "2022-05-01", 800_000, "012345678", "Seaview"),
        ];
        let incoming = vec![offered("R1", "2022-05-01", 500_000, "012345678", "", "")];
        let (out, report) = run(&incoming, &registry);
        assert!(out.is_empty());
        assert_eq!(report.duplicates[0].registry_application_number, "A1");
    }

    #[test]
    fn several_candidates_that_stay_ambiguous_keep_the_record() {
        let registry = vec![
            registered("A1", "2022-05-01", 500_000, "012345678", "Seaview"),
            registered("A2", "2022-05-01", 500_000, "012345678", "Seaview"),
        ];
        let incoming = vec![offered("R1", "2022-05-01", 500_000, "012345678", "", "")];
        let (out, _) = run(&incoming, &registry);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn address_pass_close_dates() {
        let registry = vec![registered("A1", "2022-03-01", 500_000, "0", "Seaview, 12 Main Rd, Paget")];
        let incoming = vec![offered("R1", "2022-05-01", 510_000, "0", "12 Main Rd", "Seaview")];
        let (out, report) = run(&incoming, &registry);
        assert!(out.is_empty());
        assert_eq!(report.count(DedupPass::Address), 1);
    }

    #[test]
    fn address_pass_far_dates_need_near_exact_price() {
        let registry = vec![registered("A1", "2019-03-01", 500_000, "0", "Seaview, 12 Main Rd, Paget")];
        let near = vec![offered("R1", "2022-05-01", 504_000, "0", "12 Main Rd", "Seaview")];
        let far = vec![offered("R2", "2022-05-01", 520_000, "0", "12 Main Rd", "Seaview")];
        assert!(run(&near, &registry).0.is_empty());
        assert_eq!(run(&far, &registry).0.len(), 1);
    }

    #[test]
    fn address_pass_narrows_several_hits() {
        let registry = vec![
            registered("A1", "2015-03-01", 300_000, "0", "Seaview, 12 Main Rd, Paget"),
            registered("A2", "2022-03-01", 505_000, "0", "Seaview, 12 Main Rd, Paget"),
        ];
        let incoming = vec![offered("R1", "2022-05-01", 540_000, "0", "12 Main Rd", "Seaview")];
        let (out, report) = run(&incoming, &registry);
        assert!(out.is_empty());
        assert_eq!(report.duplicates[0].registry_application_number, "A2");
    }

    #[test]
    fn fractional_pass_uses_unit_codes() {
        let mut reg = registered("A1", "2020-01-10", 90_000, "0", "Unit 2/14, Tucker's Town Rd, St. George's");
        reg.property_type = PropertyType::Fractional;
        let mut sale = offered("R1", "2021-06-01", 90_000, "0", "Tucker's Town Rd", "Villa 2/14");
        sale.property_type = PropertyType::Fractional;
        let (out, report) = run(&[sale], &[reg]);
        assert!(out.is_empty());
        assert_eq!(report.count(DedupPass::Fractional), 1);
    }

    #[test]
    fn fractional_pass_needs_address_line() {
        let mut reg = registered("A1", "2020-01-10", 90_000, "0", "Villa 2/14, Tucker's Town Rd");
        reg.property_type = PropertyType::Fractional;
        let mut sale = offered("R1", "2021-06-01", 90_000, "0", "", "Villa 2/14");
        sale.property_type = PropertyType::Fractional;
        assert_eq!(run(&[sale], &[reg]).0.len(), 1);
    }

    #[test]
    fn fractional_group_must_agree_on_price() {
        let mut a = registered("A1", "2020-01-10", 90_000, "0", "Unit 2/14, Tucker's Town Rd");
        let mut b = registered("A2", "2020-02-10", 130_000, "0", "Unit 2/14, Tucker's Town Rd");
        a.property_type = PropertyType::Fractional;
        b.property_type = PropertyType::Fractional;
        let mut sale = offered("R1", "2021-06-01", 90_000, "0", "Tucker's Town Rd", "Villa 2/14");
        sale.property_type = PropertyType::Fractional;
        assert_eq!(run(&[sale], &[a, b]).0.len(), 1);
    }

    #[test]
    fn unmatched_sale_survives_every_pass() {
        let registry = vec![registered("A1", "2022-05-01", 500_000, "012345678", "Seaview, 12 Main Rd")];
        let incoming = vec![offered("R1", "2020-01-01", 250_000, "099999999", "3 Hill Rd", "Hilltop")];
        let (out, report) = run(&incoming, &registry);
        assert_eq!(out.len(), 1);
        assert_eq!(report.examined, 1);
    }

    #[test]
    fn deduplication_is_idempotent() {
        let registry = vec![
            registered("A1", "2022-05-01", 500_000, "0", "Seaview, 12 Main Rd, Bermuda"),
            registered("A2", "2022-03-01", 700_000, "0", "Hilltop, 3 Hill Rd, Paget"),
        ];
        let incoming = vec![
            offered("R1", "2022-05-01", 500_000, "0", "12 Main Rd", ""),
            offered("R2", "2022-04-01", 700_000, "0", "3 Hill Rd", "Hilltop"),
            offered("R3", "2018-01-01", 150_000, "045678901", "9 Bay Rd", "Bayside"),
        ];
        let (once, _) = run(&incoming, &registry);
        let (twice, report) = run(&once, &registry);
        assert_eq!(once, twice);
        assert!(report.duplicates.is_empty());
        assert_eq!(once.len(), 1);
    }

    #[test]
    fn composed_address_skips_placeholders() {
        let lexicon = Lexicon::bundled().unwrap();
        let mut s = offered("R1", "2022-05-01", 1, "0", "12 Main Rd", "N/A");
        s.parish = "Paget".into();
        s.postcode = "PG 01".into();
        assert_eq!(composed_address(&s, &lexicon), "12 Main Rd, Paget PG 01");
        s.building_name = "Seaview".into();
        assert_eq!(composed_address(&s, &lexicon), "Seaview, 12 Main Rd, Paget PG 01");
    }

    // Small pools so generated rows collide with the registry often.
    const STREETS: &[&str] = &["12 Main Rd", "3 Hill Rd", "Tucker's Town Rd", ""];
    const BUILDINGS: &[&str] = &["Seaview", "Hilltop", "Villa 2/14", "N/A", ""];
    const KEYS: &[&str] = &["0", "012345678", "023456789", "012345678,023456789"];
    const DATES: &[&str] = &["2019-03-01", "2022-03-01", "2022-05-01"];
    const PRICES: &[i64] = &[90_000, 500_000, 505_000, 520_000];

    fn any_type() -> impl Strategy<Value = PropertyType> {
        prop::sample::select(vec![PropertyType::House, PropertyType::Fractional, PropertyType::Unknown])
    }

    prop_compose! {
        fn any_registered()(
            n in 0u32..1000,
            date in prop::sample::select(DATES),
            price in prop::sample::select(PRICES),
            key in prop::sample::select(KEYS),
            building in prop::sample::select(BUILDINGS),
            street in prop::sample::select(STREETS),
            ty in any_type(),
        ) -> SaleRecord {
            let address = [building, street, "Paget"]
                .into_iter()
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            let mut r = registered(&format!("A{n}"), date, price, key, &address);
            r.property_type = ty;
            r
        }
    }

    prop_compose! {
        fn any_offered()(
            n in 0u32..1000,
            date in prop::sample::select(DATES),
            price in prop::sample::select(PRICES),
            key in prop::sample::select(KEYS),
            building in prop::sample::select(BUILDINGS),
            street in prop::sample::select(STREETS),
            ty in any_type(),
        ) -> BrokerageSale {
            let mut s = offered(&format!("R{n}"), date, price, key, street, building);
            s.parish = "Paget".into();
            s.property_type = ty;
            s
        }
    }

    proptest! {
        #[test]
        fn deduplicating_twice_changes_nothing(
            registry in prop::collection::vec(any_registered(), 0..6),
            incoming in prop::collection::vec(any_offered(), 0..8),
        ) {
            let (once, first) = run(&incoming, &registry);
            let (twice, second) = run(&once, &registry);
            prop_assert_eq!(&once, &twice);
            prop_assert!(second.duplicates.is_empty());
            prop_assert_eq!(once.len() + first.duplicates.len(), incoming.len());
        }
    }
}
