//! Ratcliff/Obershelp similarity ratio, the same algorithm Python's
//! `difflib.SequenceMatcher.ratio()` computes: twice the number of
//! matching characters found by recursively splitting on the longest
//! common substring, divided by the combined length of both strings.
//! No "popular element" junk heuristic is applied, unlike `difflib`'s
//! default `autojunk`; for the short issue titles this compares, that
//! heuristic never triggers anyway.

use std::collections::HashMap;

/// Finds the longest matching run between `a[alo..ahi]` and
/// `b[blo..bhi]`, returning `(start_in_a, start_in_b, length)`. Ties are
/// broken in favor of the earliest match in `a`, then in `b`, matching
/// `difflib`'s own tie-break.
fn longest_match(a: &[char], alo: usize, ahi: usize, b: &[char], blo: usize, bhi: usize) -> (usize, usize, usize) {
    let mut best_i = alo;
    let mut best_j = blo;
    let mut best_size = 0usize;
    let mut j2len: HashMap<usize, usize> = HashMap::new();

    for i in alo..ahi {
        let mut new_j2len: HashMap<usize, usize> = HashMap::new();
        for j in blo..bhi {
            if a[i] == b[j] {
                let k = if j > blo { j2len.get(&(j - 1)).copied().unwrap_or(0) + 1 } else { 1 };
                new_j2len.insert(j, k);
                if k > best_size {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_size = k;
                }
            }
        }
        j2len = new_j2len;
    }

    (best_i, best_j, best_size)
}

fn matching_blocks(a: &[char], alo: usize, ahi: usize, b: &[char], blo: usize, bhi: usize, total: &mut usize) {
    let (i, j, k) = longest_match(a, alo, ahi, b, blo, bhi);
    if k == 0 {
        return;
    }
    *total += k;
    if alo < i && blo < j {
        matching_blocks(a, alo, i, b, blo, j, total);
    }
    if i + k < ahi && j + k < bhi {
        matching_blocks(a, i + k, ahi, b, j + k, bhi, total);
    }
}

/// The raw Ratcliff/Obershelp ratio between two already-tokenized
/// character sequences, in `[0.0, 1.0]`. Two empty sequences are
/// considered identical (ratio `1.0`), matching `difflib`.
fn ratio_chars(a: &[char], b: &[char]) -> f64 {
    let total_len = a.len() + b.len();
    if total_len == 0 {
        return 1.0;
    }
    let mut matched = 0usize;
    matching_blocks(a, 0, a.len(), b, 0, b.len(), &mut matched);
    2.0 * matched as f64 / total_len as f64
}

/// Normalizes case and collapses internal whitespace runs to a single
/// space before scoring, matching `_calculate_text_similarity`'s own
/// normalization.
fn normalize(text: &str) -> Vec<char> {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ").chars().collect()
}

/// Similarity ratio between two free-text strings, normalized for case
/// and whitespace.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    ratio_chars(&normalize(a), &normalize(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_are_fully_similar() {
        assert_eq!(text_similarity("Fix the bug", "Fix the bug"), 1.0);
    }

    #[test]
    fn empty_strings_are_fully_similar() {
        assert_eq!(text_similarity("", ""), 1.0);
    }

    #[test]
    fn completely_disjoint_strings_score_zero() {
        assert_eq!(text_similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn case_and_whitespace_are_normalized() {
        assert_eq!(text_similarity("Fix   the bug", "fix the bug"), 1.0);
    }

    #[test]
    fn near_matches_score_highly_but_not_perfectly() {
        let score = text_similarity("Fix the login bug", "Fix the login bugs");
        assert!(score > 0.9 && score < 1.0);
    }

    #[test]
    fn partial_overlap_scores_between_bounds() {
        let score = text_similarity("hello world", "hello there");
        assert!(score > 0.0 && score < 1.0);
    }
}
