use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::config::MatchingConfig;
use crate::fuzzy::{numeric_tokens, ratio, ratio_of_tails, ratio_skipping};

/// Outcome of a fuzzy address comparison, with the score that decided it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressMatch {
    pub matched: bool,
    pub score: u8,
}

impl AddressMatch {
    fn yes(score: u8) -> Self {
        Self { matched: true, score }
    }

    fn no(score: u8) -> Self {
        Self { matched: false, score }
    }
}

/// Compare a composed brokerage address against a registry address.
///
/// Both sides need at least one numeric token. Passes when the full ratio
/// clears `fuzzy_ratio` and the numbers agree (equal sets, or enough overlap);
/// failing that, when the numbers are identical, a match on the address minus
/// its leading name or on its tail is accepted at the lower thresholds.
pub fn fuzzy_address_match(
    incoming: &str,
    registry: &str,
    country: &str,
    m: &MatchingConfig,
) -> AddressMatch {
    let a = prepare(incoming, country);
    let b = prepare(registry, country);

    let nums_a = numeric_tokens(&a);
    let nums_b = numeric_tokens(&b);
    if nums_a.is_empty() || nums_b.is_empty() {
        return AddressMatch::no(0);
    }
    let shared = nums_a.intersection(&nums_b).count();
    let overlap = shared as f64 / nums_a.len() as f64;
    let same_numbers = nums_a == nums_b;

    let score = ratio(&a, &b);
    if score >= m.fuzzy_ratio && (same_numbers || overlap >= m.number_overlap) {
        return AddressMatch::yes(score);
    }
    if !same_numbers {
        return AddressMatch::no(score);
    }

    let truncated = ratio_skipping(&a, &b, m.truncate_prefix_chars);
    if truncated >= m.truncated_ratio {
        return AddressMatch::yes(truncated);
    }
    let tails = ratio_of_tails(&a, &b, m.tail_chars);
    if tails >= m.tail_ratio {
        AddressMatch::yes(tails)
    } else {
        AddressMatch::no(tails)
    }
}

/// Strict variant: ratio at or above `fuzzy_ratio` and identical numeric tokens.
pub fn addresses_close(a: &str, b: &str, m: &MatchingConfig) -> bool {
    let nums_a = numeric_tokens(a);
    !nums_a.is_empty() && nums_a == numeric_tokens(b) && ratio(a, b) >= m.fuzzy_ratio
}

/// `other` within `reference × (1 ± tolerance)`, bounds inclusive.
pub fn prices_close(reference_cents: i64, other_cents: i64, tolerance: f64) -> bool {
    let reference = reference_cents as f64;
    let other = other_cents as f64;
    reference * (1.0 - tolerance) <= other && other <= reference * (1.0 + tolerance)
}

/// Smallest distance in days from `date` to either registry date.
pub fn min_day_distance(date: NaiveDate, registered: NaiveDate, acquired: Option<NaiveDate>) -> i64 {
    let reg = (date - registered).num_days().abs();
    match acquired {
        Some(acq) => reg.min((date - acq).num_days().abs()),
        None => reg,
    }
}

pub fn dates_close(
    date: NaiveDate,
    registered: NaiveDate,
    acquired: Option<NaiveDate>,
    near_days: i64,
) -> bool {
    min_day_distance(date, registered, acquired) < near_days
}

/// Either registry date falls within `window` calendar years of `date`.
pub fn within_years(
    date: NaiveDate,
    registered: NaiveDate,
    acquired: Option<NaiveDate>,
    window: i32,
) -> bool {
    let near = |d: NaiveDate| (d.year() - date.year()).abs() <= window;
    near(registered) || acquired.is_some_and(near)
}

fn prepare(address: &str, country: &str) -> String {
    let mut out = spelled_fractions(address.trim());
    if !country.is_empty() && !out.to_lowercase().contains(&country.to_lowercase()) {
        out.push_str(", ");
        out.push_str(country);
    }
    out
}

fn spelled_fractions(s: &str) -> String {
    static TENTH: OnceLock<Regex> = OnceLock::new();
    static SIXTH: OnceLock<Regex> = OnceLock::new();
    let tenth = TENTH.get_or_init(|| Regex::new(r"(?i)one tenth").expect("static pattern"));
    let sixth = SIXTH.get_or_init(|| Regex::new(r"(?i)one sixth").expect("static pattern"));
    let s = tenth.replace_all(s, "1/10th");
    sixth.replace_all(&s, "1/6th").into_owned()
}
