//! Similarity scorers for comparing documented and physical column names.
//!
//! Every scorer returns a value in `0.0..=100.0`. They are all built on the
//! Indel distance from `rapidfuzz`, with token handling split on whitespace.
//! Blank input on either side always scores 0.
//!
//! Ratios are computed as `100 * matches / total` from integer counts, so a
//! ratio that is mathematically a whole number comes out as exactly that
//! number and compares correctly against an integer threshold.

use std::collections::BTreeSet;

use rapidfuzz::distance::indel;
use recon_model::MatchStrategy;

const TOKEN_SCALE: f64 = 0.95;
const PARTIAL_SCALE: f64 = 0.90;
const LONG_PARTIAL_SCALE: f64 = 0.60;
const PARTIAL_LENGTH_RATIO: f64 = 1.5;
const LONG_LENGTH_RATIO: f64 = 8.0;

/// Score `a` against `b` with the given strategy.
pub fn score(strategy: MatchStrategy, a: &str, b: &str) -> f64 {
    match strategy {
        MatchStrategy::Ratio => ratio(a, b),
        MatchStrategy::PartialRatio => partial_ratio(a, b),
        MatchStrategy::TokenSortRatio => token_sort_ratio(a, b),
        MatchStrategy::TokenSetRatio => token_set_ratio(a, b),
        MatchStrategy::WRatio => weighted_ratio(a, b),
        MatchStrategy::QRatio => quick_ratio(a, b),
    }
}

/// Plain normalized Indel similarity.
pub fn ratio(a: &str, b: &str) -> f64 {
    if is_blank(a) || is_blank(b) {
        return 0.0;
    }
    raw_ratio(a, b)
}

/// Best ratio of the shorter string against equal-length windows of the longer one.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    if is_blank(a) || is_blank(b) {
        return 0.0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if shorter.len() == longer.len() {
        return indel_ratio(&shorter, &longer);
    }

    let mut best = 0.0_f64;
    for window in longer.windows(shorter.len()) {
        let current = indel_ratio(&shorter, window);
        if current > best {
            best = current;
            if best >= 100.0 {
                break;
            }
        }
    }
    best
}

/// Ratio over whitespace tokens sorted alphabetically.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    if is_blank(a) || is_blank(b) {
        return 0.0;
    }
    raw_ratio(&sorted_tokens(a), &sorted_tokens(b))
}

/// Set-based token comparison.
///
/// Scores 100 when one token set is a non-empty subset of the other; otherwise
/// the best ratio between the shared tokens and each side's full token list.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    if is_blank(a) || is_blank(b) {
        return 0.0;
    }
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();

    let intersection: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let diff_ab: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let diff_ba: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    if !intersection.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
        return 100.0;
    }

    let sect = intersection.join(" ");
    let combined_ab = join_non_empty(&sect, &diff_ab.join(" "));
    let combined_ba = join_non_empty(&sect, &diff_ba.join(" "));

    let mut best = raw_ratio(&combined_ab, &combined_ba);
    if !sect.is_empty() {
        best = best
            .max(raw_ratio(&sect, &combined_ab))
            .max(raw_ratio(&sect, &combined_ba));
    }
    best
}

/// Weighted blend of the other scorers, favouring partial matches when the
/// lengths differ a lot.
pub fn weighted_ratio(a: &str, b: &str) -> f64 {
    if is_blank(a) || is_blank(b) {
        return 0.0;
    }
    let len_a = a.chars().count() as f64;
    let len_b = b.chars().count() as f64;
    let length_ratio = len_a.max(len_b) / len_a.min(len_b);

    let base = raw_ratio(a, b);
    if length_ratio < PARTIAL_LENGTH_RATIO {
        let token_best = token_sort_ratio(a, b).max(token_set_ratio(a, b)) * TOKEN_SCALE;
        return base.max(token_best);
    }

    let partial_scale = if length_ratio >= LONG_LENGTH_RATIO {
        LONG_PARTIAL_SCALE
    } else {
        PARTIAL_SCALE
    };
    let partial = partial_ratio(a, b) * partial_scale;
    let partial_tokens =
        partial_ratio(&sorted_tokens(a), &sorted_tokens(b)) * TOKEN_SCALE * partial_scale;
    base.max(partial).max(partial_tokens)
}

/// Plain ratio; blank inputs score 0.
pub fn quick_ratio(a: &str, b: &str) -> f64 {
    ratio(a, b)
}

fn raw_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    indel_ratio(&a, &b)
}

/// `100 * (total - distance) / total`, divided once from exact integers.
fn indel_ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    let distance = indel::distance(a.iter().copied(), b.iter().copied());
    let matches = total.saturating_sub(distance);
    (matches * 100) as f64 / total as f64
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn join_non_empty(left: &str, right: &str) -> String {
    match (left.is_empty(), right.is_empty()) {
        (true, _) => right.to_string(),
        (_, true) => left.to_string(),
        _ => format!("{left} {right}"),
    }
}
