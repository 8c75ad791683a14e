//! Fuzzy keyword classification of cause-of-death strings.
//!
//! Period death certificates come through OCR with frequent misspellings
//! ("choleraa", "colera"), so keyword matching accepts both exact
//! substrings and close single-token matches. Negative keywords are
//! checked first: an explicit unambiguous cause must never land in the
//! positive set even when a positive keyword also fuzzily matches
//! elsewhere in the string.

use strsim::normalized_levenshtein;

use crate::models::Classification;

/// Minimum normalized similarity for a token to count as a keyword hit.
const SIMILARITY_THRESHOLD: f64 = 0.8;

/// Causes that rule a record out regardless of other matches.
const NEGATIVE_KEYWORDS: &[&str] = &[
    "hanging",
    "convulsions",
    "head injury",
    "typhoid fever",
    "diptheria",
    "epilepsy",
    "old age",
];

/// Causes considered cholera-related in the 1865–1867 record set.
const POSITIVE_KEYWORDS: &[&str] = &[
    "cholera",
    "asiatic cholera",
    "cholera morbus",
    "cholera infantum",
    "chronic diarrhea",
    "diarrhoea",
    "diarrhea",
    "vomiting",
    "exhaustion",
];

/// Derive the categorical label for a free-text cause string.
///
/// Empty input is `Unknown`. Otherwise the negative list is evaluated in
/// order and wins outright, then the positive list; first match in either
/// list decides, there is no scoring.
pub fn classify_cause(cause: &str) -> Classification {
    if cause.is_empty() {
        return Classification::Unknown;
    }
    let lower = cause.to_lowercase();

    if NEGATIVE_KEYWORDS.iter().any(|kw| fuzzy_contains(kw, &lower)) {
        return Classification::Negative;
    }
    if POSITIVE_KEYWORDS.iter().any(|kw| fuzzy_contains(kw, &lower)) {
        return Classification::Positive;
    }
    Classification::Unknown
}

/// True if `keyword` occurs as an exact substring of `text`, or any
/// punctuation-delimited token of `text` is within the similarity
/// threshold of it. Multi-word keywords only ever match as substrings
/// since tokens are single words.
pub fn fuzzy_contains(keyword: &str, text: &str) -> bool {
    if text.contains(keyword) {
        return true;
    }
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .any(|token| normalized_levenshtein(token, keyword) >= SIMILARITY_THRESHOLD)
}
