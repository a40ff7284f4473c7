//! The search pipeline: filter, then fuzzy match, then sort, then truncate.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::corpus::{SearchDocument, SearchId};
use crate::filter::{CompoundFilter, FilterContext, Matcher};
use crate::fuzzy::{FuzzyOptions, fuzzy_search};

/// Default cap on returned results.
pub const DEFAULT_MAX_RESULTS: usize = 50;

/// Secondary sort applied after matching.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum SortKey {
    /// Match score, best first.
    #[default]
    #[strum(serialize = "relevance", serialize = "score")]
    Relevance,
    Title,
    #[strum(serialize = "created", serialize = "created_at")]
    Created,
    #[strum(serialize = "modified", serialize = "modified_at", serialize = "edited")]
    Modified,
}

impl SortKey {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Everything that shapes a search besides the query and corpus.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchOptions {
    pub fuzzy: FuzzyOptions,
    /// Applied before fuzzy matching.
    pub filter: Option<CompoundFilter>,
    pub sort: SortKey,
    pub direction: SortDirection,
    /// Applied after sorting.
    pub max_results: usize,
    /// Clock for relative date filters; `None` reads the system clock.
    pub now: Option<i64>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            fuzzy: FuzzyOptions::default(),
            filter: None,
            sort: SortKey::Relevance,
            direction: SortDirection::Ascending,
            max_results: DEFAULT_MAX_RESULTS,
            now: None,
        }
    }
}

/// One ranked result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchHit<'a> {
    pub item: &'a SearchDocument,
    /// Fuzzy distance, lower is better.
    pub score: f64,
}

/// Owned form of a hit, for results that outlive the corpus borrow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedItem {
    pub id: SearchId,
    pub title: String,
    pub score: f64,
}

impl From<SearchHit<'_>> for RankedItem {
    fn from(hit: SearchHit<'_>) -> Self {
        Self {
            id: hit.item.id,
            title: hit.item.title.clone(),
            score: hit.score,
        }
    }
}

/// Run the full pipeline over `corpus`.
///
/// An empty (or too short) query returns nothing, even when a filter is set.
pub fn search<'a>(
    query: &str,
    corpus: &'a [SearchDocument],
    options: &SearchOptions,
) -> Vec<SearchHit<'a>> {
    let ctx = options.now.map_or_else(FilterContext::now, FilterContext::at);

    let candidates: Vec<&SearchDocument> = match &options.filter {
        Some(filter) => corpus.iter().filter(|d| filter.matches(*d, &ctx)).collect(),
        None => corpus.iter().collect(),
    };

    let matches = fuzzy_search(query, &candidates, &options.fuzzy);
    let mut hits: Vec<SearchHit<'a>> = matches
        .into_iter()
        .map(|m| SearchHit {
            item: candidates[m.index],
            score: m.score,
        })
        .collect();

    // fuzzy_search already ranks by score with ties in corpus order, so every
    // key below sorts stably on top of relevance.
    sort_hits(&mut hits, options.sort, options.direction);
    hits.truncate(options.max_results);

    tracing::debug!(
        query,
        candidates = candidates.len(),
        returned = hits.len(),
        "search evaluated"
    );
    hits
}

/// Stable sort by `key`; equal keys keep their prior relative order.
pub fn sort_hits(hits: &mut [SearchHit<'_>], key: SortKey, direction: SortDirection) {
    let cmp = |a: &SearchHit<'_>, b: &SearchHit<'_>| -> Ordering {
        match key {
            SortKey::Relevance => a.score.total_cmp(&b.score),
            SortKey::Title => a.item.title.to_lowercase().cmp(&b.item.title.to_lowercase()),
            SortKey::Created => a.item.created_at.cmp(&b.item.created_at),
            SortKey::Modified => a.item.modified_at.cmp(&b.item.modified_at),
        }
    };
    match direction {
        SortDirection::Ascending => hits.sort_by(cmp),
        SortDirection::Descending => hits.sort_by(|a, b| cmp(b, a)),
    }
}

impl crate::fuzzy::Searchable for &SearchDocument {
    fn title(&self) -> &str {
        &self.title
    }

    fn body(&self) -> &str {
        &self.body
    }
}
