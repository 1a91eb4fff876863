//! Search filters and sort directives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strata_core::SortDirection;

/// Key to sort search results by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSortKey {
    /// Relevance score; descending by default.
    #[default]
    Relevance,
    /// Message timestamp.
    Date,
    /// Message text length in characters.
    Length,
}

/// Filter and sort directives for one search call.
///
/// All predicate fields are optional; an unset field does not exclude
/// anything. The query string itself is mandatory for a non-empty result
/// set: a blank query matches nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub query: String,
    /// Messages strictly before this instant are excluded.
    pub date_from: Option<DateTime<Utc>>,
    /// Messages strictly after this instant are excluded.
    pub date_to: Option<DateTime<Utc>>,
    /// Exact sender name to match.
    pub sender: Option<String>,
    /// Minimum message text length in characters.
    pub min_length: Option<usize>,
    /// Maximum message text length in characters.
    pub max_length: Option<usize>,
    pub sort_key: SearchSortKey,
    pub sort_direction: SortDirection,
    /// Cap on the number of returned results.
    pub limit: Option<usize>,
}

impl SearchFilters {
    /// Filters with the given query, relevance-descending sort, and no
    /// predicates.
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            date_from: None,
            date_to: None,
            sender: None,
            min_length: None,
            max_length: None,
            sort_key: SearchSortKey::Relevance,
            sort_direction: SortDirection::Descending,
            limit: None,
        }
    }

    /// Restrict matches to a timestamp range (either bound optional).
    pub fn between(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    /// Restrict matches to one sender.
    pub fn from_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Restrict matches by text length.
    pub fn with_length_range(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    /// Set the sort key and direction.
    pub fn sorted_by(mut self, key: SearchSortKey, direction: SortDirection) -> Self {
        self.sort_key = key;
        self.sort_direction = direction;
        self
    }

    /// Cap the result count.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a message passes the date/sender/length predicates.
    pub fn admits(&self, message: &strata_core::ChatMessage) -> bool {
        if let Some(from) = self.date_from {
            if message.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if message.timestamp > to {
                return false;
            }
        }
        if let Some(sender) = &self.sender {
            if &message.sender != sender {
                return false;
            }
        }
        let length = message.text.chars().count();
        if let Some(min) = self.min_length {
            if length < min {
                return false;
            }
        }
        if let Some(max) = self.max_length {
            if length > max {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::ChatMessage;

    #[test]
    fn test_default_sort_is_relevance_descending() {
        let filters = SearchFilters::query("refund");
        assert_eq!(filters.sort_key, SearchSortKey::Relevance);
        assert_eq!(filters.sort_direction, SortDirection::Descending);
    }

    #[test]
    fn test_admits_sender_filter() {
        let filters = SearchFilters::query("x").from_sender("alice");
        assert!(filters.admits(&ChatMessage::new("hi", "alice", false)));
        assert!(!filters.admits(&ChatMessage::new("hi", "bob", false)));
    }

    #[test]
    fn test_admits_length_range() {
        let filters = SearchFilters::query("x").with_length_range(Some(3), Some(5));
        assert!(filters.admits(&ChatMessage::new("abcd", "u", false)));
        assert!(!filters.admits(&ChatMessage::new("ab", "u", false)));
        assert!(!filters.admits(&ChatMessage::new("abcdef", "u", false)));
    }

    #[test]
    fn test_admits_date_range() {
        let now = Utc::now();
        let filters =
            SearchFilters::query("x").between(Some(now - chrono::Duration::hours(1)), Some(now));
        assert!(filters.admits(
            &ChatMessage::new("hi", "u", false).at(now - chrono::Duration::minutes(30))
        ));
        assert!(!filters.admits(
            &ChatMessage::new("hi", "u", false).at(now - chrono::Duration::hours(2))
        ));
        assert!(!filters
            .admits(&ChatMessage::new("hi", "u", false).at(now + chrono::Duration::minutes(1))));
    }
}
