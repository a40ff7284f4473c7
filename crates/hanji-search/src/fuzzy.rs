//! Approximate text matching with weighted fields.
//!
//! Each query word is aligned against the best-matching substring of a field
//! (semi-global edit distance), normalized by word length. A small penalty
//! grows with how far into the field the match starts. An item matches when
//! every word matches at least one field; lower scores are better.

use serde::{Deserialize, Serialize};

/// Penalty added for a match that starts at the very end of a field.
const LOCATION_PENALTY: f64 = 0.1;

/// Floor applied to exact matches before weighting so weights still separate them.
const MIN_FIELD_SCORE: f64 = 1e-6;

/// Something the fuzzy matcher can score.
pub trait Searchable {
    /// Short, heavily weighted text (page title, heading text).
    fn title(&self) -> &str;
    /// Body text.
    fn body(&self) -> &str;
}

/// Tuning knobs for [`fuzzy_search`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyOptions {
    /// Maximum normalized edit distance for a word to count as matched (0.0 = exact).
    pub threshold: f64,
    /// Queries shorter than this (in characters, after trimming) return nothing.
    pub min_query_len: usize,
    pub title_weight: f64,
    pub body_weight: f64,
}

impl Default for FuzzyOptions {
    fn default() -> Self {
        Self {
            threshold: 0.4,
            min_query_len: 2,
            title_weight: 2.0,
            body_weight: 1.0,
        }
    }
}

/// A scored match, pointing back into the searched slice.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FuzzyMatch {
    pub index: usize,
    /// 0.0 is a perfect match, 1.0 the worst accepted.
    pub score: f64,
}

/// Best alignment of a pattern inside a text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Alignment {
    errors: usize,
    start: usize,
}

/// Split a query into lowercase words, dropping words below the minimum length.
pub fn query_words(query: &str, min_len: usize) -> Vec<Vec<char>> {
    let query = query.trim();
    if query.chars().count() < min_len.max(1) {
        return Vec::new();
    }
    query
        .split_whitespace()
        .map(|w| w.to_lowercase().chars().collect::<Vec<char>>())
        .filter(|w| w.len() >= min_len.max(1))
        .collect()
}

/// Score every item against `query` and return matches, best first.
///
/// An empty or too-short query returns no matches. Ties keep input order.
pub fn fuzzy_search<T: Searchable>(
    query: &str,
    items: &[T],
    options: &FuzzyOptions,
) -> Vec<FuzzyMatch> {
    let words = query_words(query, options.min_query_len);
    if words.is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<FuzzyMatch> = items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            score_item(&words, item.title(), item.body(), options)
                .map(|score| FuzzyMatch { index, score })
        })
        .collect();

    matches.sort_by(|a, b| a.score.total_cmp(&b.score).then(a.index.cmp(&b.index)));
    matches
}

/// Score one item against pre-split query words.
///
/// Returns `None` unless every word matches the title or the body.
pub fn score_item(
    words: &[Vec<char>],
    title: &str,
    body: &str,
    options: &FuzzyOptions,
) -> Option<f64> {
    if words.is_empty() {
        return None;
    }
    let title: Vec<char> = title.to_lowercase().chars().collect();
    let body: Vec<char> = body.to_lowercase().chars().collect();

    let mut total = 1.0_f64;
    for word in words {
        let t = field_score(word, &title, options.threshold)
            .map(|s| s.max(MIN_FIELD_SCORE).powf(options.title_weight));
        let b = field_score(word, &body, options.threshold)
            .map(|s| s.max(MIN_FIELD_SCORE).powf(options.body_weight));
        total *= match (t, b) {
            (None, None) => return None,
            (Some(t), None) => t,
            (None, Some(b)) => b,
            (Some(t), Some(b)) => t * b,
        };
    }

    // Geometric mean keeps multi-word scores on the same scale as single words.
    Some(total.powf(1.0 / words.len() as f64).clamp(0.0, 1.0))
}

/// Normalized distance of `word` against its best substring in `field`, with location penalty.
fn field_score(word: &[char], field: &[char], threshold: f64) -> Option<f64> {
    if word.is_empty() || field.is_empty() {
        return None;
    }
    let best = best_alignment(word, field);
    let accuracy = best.errors as f64 / word.len() as f64;
    if accuracy > threshold {
        return None;
    }
    let location = best.start as f64 / field.len() as f64;
    Some((accuracy + LOCATION_PENALTY * location).min(1.0))
}

/// Semi-global edit distance: the pattern must be consumed whole, the text
/// may be entered and left anywhere for free.
///
/// Ties prefer the earliest-ending alignment.
fn best_alignment(pattern: &[char], text: &[char]) -> Alignment {
    let n = text.len();
    // prev[j] / cur[j]: (cost, start) for pattern[..i] ending at text[..j]
    let mut prev: Vec<(usize, usize)> = (0..=n).map(|j| (0, j)).collect();
    let mut cur: Vec<(usize, usize)> = vec![(0, 0); n + 1];

    for (i, &pc) in pattern.iter().enumerate() {
        cur[0] = (i + 1, 0);
        for j in 1..=n {
            let subst = prev[j - 1].0 + usize::from(pc != text[j - 1]);
            let del = prev[j].0 + 1;
            let ins = cur[j - 1].0 + 1;

            cur[j] = if subst <= del && subst <= ins {
                (subst, prev[j - 1].1)
            } else if del <= ins {
                (del, prev[j].1)
            } else {
                (ins, cur[j - 1].1)
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    let mut best = Alignment {
        errors: prev[0].0,
        start: 0,
    };
    for &(errors, start) in prev.iter().skip(1) {
        if errors < best.errors {
            best = Alignment { errors, start };
        }
    }
    best
}
