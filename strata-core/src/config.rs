//! Cache-wide configuration types.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How many layers a `set` updates synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WritePolicy {
    /// Write to every enabled layer before returning.
    #[default]
    Through,
    /// Write only to the highest-priority layer; propagate asynchronously.
    Back,
    /// Write to every layer except the highest-priority one, keeping the
    /// small fast tier unpolluted by data unlikely to be re-read soon.
    Around,
}

/// Cross-layer consistency model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsistencyLevel {
    /// Writes are synchronous across layers; the synchronizer is inert.
    Strong,
    /// A periodic synchronizer cascades entries between adjacent layers.
    #[default]
    Eventual,
    /// No synchronizer at all; layers may diverge indefinitely.
    Weak,
}

/// Transaction isolation level, recorded on each transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    #[default]
    ReadCommitted,
    Serializable,
}

/// Cache-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// TTL applied when a `set` does not carry an explicit one.
    pub default_ttl: Duration,
    pub write_policy: WritePolicy,
    pub consistency: ConsistencyLevel,
    /// Interval of the background expiry sweep. Zero disables the task.
    pub cleanup_interval: Duration,
    /// Interval of the synchronizer under eventual consistency.
    pub sync_interval: Duration,
    /// Auto-rollback timeout armed when a transaction begins.
    pub transaction_timeout: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
            write_policy: WritePolicy::Through,
            consistency: ConsistencyLevel::Eventual,
            cleanup_interval: Duration::from_secs(60),
            sync_interval: Duration::from_secs(30),
            transaction_timeout: Duration::from_secs(30),
        }
    }
}

impl CacheSettings {
    /// Create settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the write policy.
    pub fn with_write_policy(mut self, policy: WritePolicy) -> Self {
        self.write_policy = policy;
        self
    }

    /// Set the consistency level.
    pub fn with_consistency(mut self, consistency: ConsistencyLevel) -> Self {
        self.consistency = consistency;
        self
    }

    /// Set the cleanup sweep interval. Zero disables the background sweep.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Set the synchronizer interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Set the transaction auto-rollback timeout.
    pub fn with_transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = timeout;
        self
    }

    /// Validate internal consistency of the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "default_ttl".to_string(),
                value: "0".to_string(),
                reason: "entries would expire immediately".to_string(),
            });
        }
        if self.transaction_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "transaction_timeout".to_string(),
                value: "0".to_string(),
                reason: "transactions would roll back before use".to_string(),
            });
        }
        if self.consistency == ConsistencyLevel::Eventual && self.sync_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "sync_interval".to_string(),
                value: "0".to_string(),
                reason: "eventual consistency requires a sync interval".to_string(),
            });
        }
        if self.consistency == ConsistencyLevel::Strong
            && self.write_policy != WritePolicy::Through
        {
            return Err(ConfigError::InvalidValue {
                field: "write_policy".to_string(),
                value: format!("{:?}", self.write_policy).to_lowercase(),
                reason: "strong consistency requires write-through".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_builder() {
        let settings = CacheSettings::new()
            .with_default_ttl(Duration::from_secs(120))
            .with_write_policy(WritePolicy::Back)
            .with_consistency(ConsistencyLevel::Weak)
            .with_cleanup_interval(Duration::from_secs(5))
            .with_sync_interval(Duration::from_secs(10))
            .with_transaction_timeout(Duration::from_secs(3));

        assert_eq!(settings.default_ttl, Duration::from_secs(120));
        assert_eq!(settings.write_policy, WritePolicy::Back);
        assert_eq!(settings.consistency, ConsistencyLevel::Weak);
        assert_eq!(settings.cleanup_interval, Duration::from_secs(5));
        assert_eq!(settings.sync_interval, Duration::from_secs(10));
        assert_eq!(settings.transaction_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let settings = CacheSettings::new().with_default_ttl(Duration::ZERO);
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_eventual_without_interval() {
        let settings = CacheSettings::new()
            .with_consistency(ConsistencyLevel::Eventual)
            .with_sync_interval(Duration::ZERO);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_strong_without_write_through() {
        for policy in [WritePolicy::Back, WritePolicy::Around] {
            let settings = CacheSettings::new()
                .with_consistency(ConsistencyLevel::Strong)
                .with_write_policy(policy);
            assert!(matches!(
                settings.validate(),
                Err(ConfigError::InvalidValue { ref field, .. }) if field == "write_policy"
            ));
        }
        let settings = CacheSettings::new()
            .with_consistency(ConsistencyLevel::Strong)
            .with_write_policy(WritePolicy::Through);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_default_settings_are_valid() {
        assert!(CacheSettings::default().validate().is_ok());
    }
}
