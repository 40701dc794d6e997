//! Assessment-number normalization.
//!
//! Registry and brokerage feeds carry the assessment number as free text:
//! integers that lost their leading zero, list reprs (`"['12345678', '023456789']"`),
//! prose joiners (`"122674022 and 122674111"`), or descriptors (`"Land"`, `"Dock"`).
//! [`normalize`] reduces all of these to an [`AssessmentKey`] and never fails.

use std::fmt;

use serde::{Serialize, Serializer};

/// Number of digits in a canonical assessment code.
pub const CODE_DIGITS: usize = 9;

const MIN_TOKEN_DIGITS: usize = 7;
const MAX_TOKEN_DIGITS: usize = 10;

/// Canonical identifier: absent, or a non-empty set of 9-digit codes.
///
/// Equality ignores code order; first-seen order is kept for display.
#[derive(Debug, Clone, Default)]
pub enum AssessmentKey {
    #[default]
    Absent,
    Codes(CodeSet),
}

/// Non-empty, duplicate-free list of `^\d{9}$` codes. Only built by this module.
#[derive(Debug, Clone)]
pub struct CodeSet(Vec<String>);

impl CodeSet {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.0.iter().any(|c| c == code)
    }
}

impl PartialEq for CodeSet {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().all(|c| other.contains(c))
    }
}

impl Eq for CodeSet {}

impl AssessmentKey {
    /// Build a key from already-collected codes. Invalid codes are dropped.
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for code in codes {
            if let Some(c) = canonical_code(code.as_ref()) {
                if !out.contains(&c) {
                    out.push(c);
                }
            }
        }
        if out.is_empty() {
            Self::Absent
        } else {
            Self::Codes(CodeSet(out))
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn codes(&self) -> &[String] {
        match self {
            Self::Absent => &[],
            Self::Codes(set) => set.as_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.codes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_absent()
    }

    /// The single code, when the key has exactly one.
    pub fn singleton(&self) -> Option<&str> {
        match self.codes() {
            [only] => Some(only.as_str()),
            _ => None,
        }
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes().iter().any(|c| c == code)
    }

    /// At least one code in common.
    pub fn overlaps(&self, other: &AssessmentKey) -> bool {
        self.codes().iter().any(|c| other.contains(c))
    }

    /// Every code of `self` appears in `other`. `Absent` is contained in nothing.
    pub fn is_contained_in(&self, other: &AssessmentKey) -> bool {
        !self.is_absent() && self.codes().iter().all(|c| other.contains(c))
    }

    /// Union, `self`'s codes first.
    pub fn union(&self, other: &AssessmentKey) -> AssessmentKey {
        AssessmentKey::from_codes(self.codes().iter().chain(other.codes()))
    }
}

impl PartialEq for AssessmentKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Absent, Self::Absent) => true,
            (Self::Codes(a), Self::Codes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for AssessmentKey {}

/// Codes joined by `,`; `Absent` renders as the empty string.
impl fmt::Display for AssessmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.codes().join(","))
    }
}

impl Serialize for AssessmentKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Normalize a raw identifier cell.
pub fn normalize(raw: &str) -> AssessmentKey {
    let cleaned = normalize_joiners(&strip_decoration(raw));
    let mut codes = Vec::new();
    for fragment in cleaned.split(',') {
        collect_codes(fragment, &mut codes);
    }
    AssessmentKey::from_codes(codes)
}

/// Normalize an integer cell (spreadsheets drop the leading zero).
pub fn normalize_int(raw: i64) -> AssessmentKey {
    normalize(&raw.to_string())
}

/// Reduce one token to a 9-digit code, if it can be.
pub fn canonical_code(token: &str) -> Option<String> {
    let digits: String = token.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() || digits.chars().all(|c| c == '0') {
        return None;
    }
    match digits.len() {
        // leading digit is a known data-entry artifact
        MAX_TOKEN_DIGITS => Some(digits[1..].to_string()),
        CODE_DIGITS => Some(digits),
        n if (MIN_TOKEN_DIGITS..CODE_DIGITS).contains(&n) => {
            Some(format!("{digits:0>width$}", width = CODE_DIGITS))
        }
        _ => None,
    }
}

fn strip_decoration(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '[' | ']' | '\'' | '"' | '(' | ')'))
        .collect::<String>()
        .trim()
        .to_string()
}

fn normalize_joiners(s: &str) -> String {
    let lowered = s.to_lowercase();
    let replaced = lowered.replace(['&', ';', '/'], ",");
    // `and` as a standalone word only; "Sandys" must survive untouched
    replaced
        .split_whitespace()
        .map(|w| if w == "and" || w == ",and" { "," } else { w })
        .collect::<Vec<_>>()
        .join(" ")
}

fn collect_codes(fragment: &str, out: &mut Vec<String>) {
    let fragment = fragment.trim();
    if fragment.is_empty() {
        return;
    }
    let parts: Vec<&str> = fragment.split_whitespace().collect();
    if parts.len() > 1 {
        for part in parts {
            collect_codes(part, out);
        }
        return;
    }
    // purely textual tokens ("land", "dock", "unknown") carry no code
    if !fragment.chars().any(|c| c.is_ascii_digit()) {
        return;
    }
    if let Some(code) = canonical_code(fragment) {
        out.push(code);
    }
}
