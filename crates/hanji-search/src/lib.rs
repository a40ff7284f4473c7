//! Search and filtering for Hanji.
//!
//! Two mechanisms that compose into one pipeline:
//!
//! - **Structured filters** ([`filter`]): typed property conditions grouped
//!   with AND/OR. Exact and cheap, so they run first.
//! - **Fuzzy search** ([`fuzzy`]): approximate matching over title and body,
//!   ranked by distance.
//!
//! [`search`] runs filter → fuzzy → stable sort → truncate.
//! [`DebouncedSearch`] wraps it for keystroke-driven use.

pub mod corpus;
pub mod debounce;
pub mod filter;
pub mod fuzzy;
pub mod pipeline;

pub use corpus::{CorpusScope, SearchDocument, SearchId, build_corpus};
pub use debounce::{DEFAULT_SEARCH_DEBOUNCE, DebouncedSearch, SearchResults};
pub use filter::{
    Combinator, CompoundFilter, FilterCondition, FilterContext, FilterError, FilterGroup,
    FilterOperator, FilterValue, Matcher, PropertySource, apply_filter, apply_filter_at,
    infer_schema,
};
pub use fuzzy::{FuzzyMatch, FuzzyOptions, Searchable, fuzzy_search};
pub use pipeline::{
    DEFAULT_MAX_RESULTS, RankedItem, SearchHit, SearchOptions, SortDirection, SortKey, search,
    sort_hits,
};
