//! Query descriptors for cache scans.
//!
//! A [`CacheQuery`] is a read-only filter: it never mutates cache state.
//! The orchestrator fans the descriptor out to every enabled layer,
//! de-duplicates by key, and applies the sort and pagination directives.

use crate::error::QueryError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Field to sort query results by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Key,
    CreatedAt,
    UpdatedAt,
    LastAccessed,
    AccessCount,
    Size,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Read-only filter descriptor over cache entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheQuery {
    /// Regex matched against entry keys.
    pub key_pattern: Option<String>,
    /// Entries must carry every listed tag.
    pub tags: Vec<String>,
    pub min_size_bytes: Option<u64>,
    pub max_size_bytes: Option<u64>,
    /// Entries older than this are excluded.
    pub max_age: Option<Duration>,
    pub sort_field: SortField,
    pub sort_direction: SortDirection,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl CacheQuery {
    /// A query matching every entry.
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a query matching keys against a regex pattern.
    pub fn matching(pattern: impl Into<String>) -> Self {
        Self {
            key_pattern: Some(pattern.into()),
            ..Self::default()
        }
    }

    /// Require a tag on matched entries.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Restrict matches to entries no older than `max_age`.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Restrict matches by serialized size.
    pub fn with_size_range(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.min_size_bytes = min;
        self.max_size_bytes = max;
        self
    }

    /// Set the sort field and direction.
    pub fn sorted_by(mut self, field: SortField, direction: SortDirection) -> Self {
        self.sort_field = field;
        self.sort_direction = direction;
        self
    }

    /// Set pagination directives.
    pub fn paginate(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    /// Compile the key pattern, if any.
    pub fn compiled_pattern(&self) -> Result<Option<Regex>, QueryError> {
        match &self.key_pattern {
            None => Ok(None),
            Some(pattern) => Regex::new(pattern).map(Some).map_err(|e| {
                QueryError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                }
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_builder() {
        let query = CacheQuery::matching("^session:")
            .with_tag("chat")
            .with_max_age(Duration::from_secs(3600))
            .sorted_by(SortField::AccessCount, SortDirection::Descending)
            .paginate(10, 25);

        assert_eq!(query.key_pattern.as_deref(), Some("^session:"));
        assert_eq!(query.tags, vec!["chat"]);
        assert_eq!(query.max_age, Some(Duration::from_secs(3600)));
        assert_eq!(query.sort_field, SortField::AccessCount);
        assert_eq!(query.sort_direction, SortDirection::Descending);
        assert_eq!(query.offset, 10);
        assert_eq!(query.limit, Some(25));
    }

    #[test]
    fn test_compiled_pattern_valid() {
        let query = CacheQuery::matching("^user:[0-9]+$");
        let regex = query.compiled_pattern().unwrap().unwrap();
        assert!(regex.is_match("user:42"));
        assert!(!regex.is_match("session:42"));
    }

    #[test]
    fn test_compiled_pattern_invalid() {
        let query = CacheQuery::matching("[");
        let err = query.compiled_pattern().unwrap_err();
        assert!(matches!(err, QueryError::InvalidPattern { .. }));
    }

    #[test]
    fn test_all_matches_everything_by_default() {
        let query = CacheQuery::all();
        assert!(query.key_pattern.is_none());
        assert!(query.tags.is_empty());
        assert!(query.limit.is_none());
        assert_eq!(query.offset, 0);
    }
}
