//! Session search and ranking.
//!
//! A pure function of `(sessions, filters)` producing ranked
//! [`SearchResult`]s with relevance scores, matched terms, and bounded
//! context windows, plus a [`highlight`] helper that wraps matched
//! substrings for rendering. [`SearchEngine`] adds nothing but retention of
//! the last outcome for UI convenience.

pub mod engine;
pub mod filters;
pub mod score;

pub use engine::{
    highlight, search, SearchEngine, SearchOutcome, SearchResult, SearchStats,
};
pub use filters::{SearchFilters, SearchSortKey};
pub use score::{fuzzy_match, tokenize};
