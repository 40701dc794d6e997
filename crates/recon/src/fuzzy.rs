//! Character-level string similarity on a 0..=100 scale.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use rapidfuzz::fuzz;
use regex::Regex;

/// Indel similarity, `round(100 * 2 * LCS / (len_a + len_b))` over chars.
///
/// Either side empty scores 0.
pub fn ratio(a: &str, b: &str) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    (fuzz::ratio(a.chars(), b.chars()) * 100.0).round() as u8
}

/// Ratio after dropping the first `skip` chars of both strings.
pub fn ratio_skipping(a: &str, b: &str, skip: usize) -> u8 {
    let a: String = a.chars().skip(skip).collect();
    let b: String = b.chars().skip(skip).collect();
    ratio(&a, &b)
}

/// Ratio over the last `keep` chars of both strings.
pub fn ratio_of_tails(a: &str, b: &str, keep: usize) -> u8 {
    ratio(tail(a, keep), tail(b, keep))
}

/// Maximal runs of ASCII digits.
pub fn numeric_tokens(s: &str) -> BTreeSet<String> {
    digits()
        .find_iter(s)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn digits() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"[0-9]+").expect("static pattern"))
}

fn tail(s: &str, keep: usize) -> &str {
    let count = s.chars().count();
    if count <= keep {
        return s;
    }
    match s.char_indices().nth(count - keep) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_score_100() {
        assert_eq!(ratio("12 Main Rd", "12 Main Rd"), 100);
    }

    #[test]
    fn empty_scores_zero() {
        assert_eq!(ratio("", "abc"), 0);
        assert_eq!(ratio("abc", ""), 0);
    }

    #[test]
    fn known_values() {
        // LCS("kitten", "sitting") = 4 -> 2*4/13
        assert_eq!(ratio("kitten", "sitting"), 62);
        // subsequence of a longer address: 2*19/47
        assert_eq!(ratio("12 Main Rd, Bermuda", "Seaview, 12 Main Rd, Bermuda"), 81);
        assert_eq!(ratio("this is a test", "this is a test!"), 97);
    }

    #[test]
    fn ratio_is_symmetric() {
        let a = "Harbour Court, 8 Harbour Rd";
        let b = "8 Harbour Road, Harbour Court";
        assert_eq!(ratio(a, b), ratio(b, a));
    }

    #[test]
    fn skipping_and_tails() {
        let a = "Somewhere House, 4 Cedar Lane, Paget PG 01";
        let b = "Elsewhere Villa, 4 Cedar Lane, Paget PG 01";
        assert!(ratio_skipping(a, b, 15) > ratio(a, b));
        assert_eq!(ratio_of_tails(a, b, 26), 100);
        assert_eq!(tail("abc", 10), "abc");
        assert_eq!(tail("abcdef", 2), "ef");
    }

    #[test]
    fn numeric_token_extraction() {
        let tokens = numeric_tokens("Unit 12, 4 Front St, HM 11");
        let expected: BTreeSet<String> = ["12", "4", "11"].iter().map(|s| s.to_string()).collect();
        assert_eq!(tokens, expected);
        assert!(numeric_tokens("Harbour Court").is_empty());
    }
}
