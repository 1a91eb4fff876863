//! Error types for STRATA operations

use thiserror::Error;
use uuid::Uuid;

/// Storage adapter errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    #[error("Layer {layer} is unavailable: {reason}")]
    Unavailable { layer: String, reason: String },

    #[error("Layer {layer} rejected write of {needed_bytes} bytes: capacity exceeded")]
    CapacityExceeded { layer: String, needed_bytes: u64 },

    #[error("I/O error in layer {layer}: {reason}")]
    Io { layer: String, reason: String },

    #[error("Serialization failed for key {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Corrupted entry for key {key}: {reason}")]
    Corruption { key: String, reason: String },

    #[error("Adapter lock poisoned")]
    LockPoisoned,

    #[error("Layer {layer} is closed")]
    Closed { layer: String },
}

/// Transaction lifecycle errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Transaction not found: {id}")]
    NotFound { id: Uuid },

    #[error("Transaction {id} is not open (state: {state})")]
    NotOpen { id: Uuid, state: String },

    #[error("Commit failed for transaction {id}: {reason}")]
    CommitFailed { id: Uuid, reason: String },

    #[error("Transaction {id} timed out and was rolled back")]
    TimedOut { id: Uuid },
}

/// Query descriptor errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Invalid key pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Duplicate layer name: {name}")]
    DuplicateLayerName { name: String },

    #[error("No cache layers configured")]
    NoLayers,

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Session export errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExportError {
    #[error("Unsupported export format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Export serialization failed: {reason}")]
    Serialization { reason: String },
}

/// Master error type for all STRATA errors.
#[derive(Debug, Clone, Error)]
pub enum StrataError {
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

/// Result type alias for STRATA operations.
pub type StrataResult<T> = Result<T, StrataError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_error_display_capacity() {
        let err = AdapterError::CapacityExceeded {
            layer: "memory".to_string(),
            needed_bytes: 4096,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("memory"));
        assert!(msg.contains("4096"));
        assert!(msg.contains("capacity exceeded"));
    }

    #[test]
    fn test_adapter_error_display_corruption() {
        let err = AdapterError::Corruption {
            key: "session:42".to_string(),
            reason: "checksum mismatch".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("session:42"));
        assert!(msg.contains("checksum mismatch"));
    }

    #[test]
    fn test_transaction_error_display_not_open() {
        let err = TransactionError::NotOpen {
            id: Uuid::nil(),
            state: "committed".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("not open"));
        assert!(msg.contains("committed"));
    }

    #[test]
    fn test_query_error_display_invalid_pattern() {
        let err = QueryError::InvalidPattern {
            pattern: "[".to_string(),
            reason: "unclosed character class".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid key pattern"));
        assert!(msg.contains("unclosed character class"));
    }

    #[test]
    fn test_export_error_display_unsupported() {
        let err = ExportError::UnsupportedFormat {
            format: "xml".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Unsupported export format"));
        assert!(msg.contains("xml"));
    }

    #[test]
    fn test_strata_error_from_variants() {
        let adapter = StrataError::from(AdapterError::LockPoisoned);
        assert!(matches!(adapter, StrataError::Adapter(_)));

        let tx = StrataError::from(TransactionError::NotFound { id: Uuid::nil() });
        assert!(matches!(tx, StrataError::Transaction(_)));

        let query = StrataError::from(QueryError::InvalidPattern {
            pattern: "(".to_string(),
            reason: "unclosed group".to_string(),
        });
        assert!(matches!(query, StrataError::Query(_)));

        let config = StrataError::from(ConfigError::NoLayers);
        assert!(matches!(config, StrataError::Config(_)));

        let export = StrataError::from(ExportError::UnsupportedFormat {
            format: "yaml".to_string(),
        });
        assert!(matches!(export, StrataError::Export(_)));
    }
}
