//! STRATA Test Utilities
//!
//! Centralized test infrastructure for the STRATA workspace:
//! - Fixtures for common session and cache-entry scenarios
//! - Proptest generators for the core entity types

// Re-export core types for convenience
pub use strata_core::{
    CacheEntry, CacheQuery, CacheSettings, ChatMessage, ChatSession, EntryMetadata,
    EntryPriority, LayerConfig, LayerLimits, MediumKind, SortDirection, SortField,
    StrataError, StrataResult, WritePolicy,
};

use chrono::{DateTime, Utc};
use std::time::Duration;

// ============================================================================
// FIXTURES
// ============================================================================

/// A session with the given `(text, sender, from_assistant)` messages,
/// timestamped one minute apart starting an hour ago.
pub fn session_with_messages(
    title: &str,
    messages: &[(&str, &str, bool)],
) -> ChatSession {
    let start = Utc::now() - chrono::Duration::hours(1);
    let mut session = ChatSession::new(title);
    for (i, (text, sender, from_assistant)) in messages.iter().enumerate() {
        session.push(
            ChatMessage::new(*text, *sender, *from_assistant)
                .at(start + chrono::Duration::minutes(i as i64)),
        );
    }
    session
}

/// The canonical three-message support conversation used across the
/// search and export test suites.
pub fn support_session() -> ChatSession {
    session_with_messages(
        "Support",
        &[
            ("My order is broken", "user", false),
            ("Sorry to hear that", "assistant", true),
            ("I need a refund", "user", false),
        ],
    )
}

/// A cache entry for `key` with a 60-second TTL and version 1.
pub fn entry(key: &str, value: impl Into<String>) -> CacheEntry<String> {
    entry_with(key, value, Duration::from_secs(60), 1)
}

/// A cache entry with explicit TTL and version.
pub fn entry_with(
    key: &str,
    value: impl Into<String>,
    ttl: Duration,
    version: u64,
) -> CacheEntry<String> {
    let value = value.into();
    let size = value.len() as u64;
    let metadata = EntryMetadata::new(
        Utc::now(),
        ttl,
        size,
        Vec::new(),
        EntryPriority::Normal,
        version,
    );
    CacheEntry::new(key, value, metadata)
}

/// A memory layer config named `name` at the given priority.
pub fn memory_layer_config(name: &str, priority: u32) -> LayerConfig {
    LayerConfig::new(name, MediumKind::Memory, priority)
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    /// Generate a random v7 UUID.
    pub fn arb_uuid_v7() -> impl Strategy<Value = Uuid> {
        any::<u64>().prop_map(|_| Uuid::now_v7())
    }

    /// Generate a timestamp between 2020 and 2030.
    pub fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
        (1577836800i64..1893456000i64)
            .prop_map(|secs| DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now))
    }

    /// Generate a cache key of safe characters.
    pub fn arb_key() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9:_-]{0,30}"
    }

    /// Generate an EntryPriority variant.
    pub fn arb_priority() -> impl Strategy<Value = EntryPriority> {
        prop_oneof![
            Just(EntryPriority::Low),
            Just(EntryPriority::Normal),
            Just(EntryPriority::High),
        ]
    }

    /// Generate a WritePolicy variant.
    pub fn arb_write_policy() -> impl Strategy<Value = WritePolicy> {
        prop_oneof![
            Just(WritePolicy::Through),
            Just(WritePolicy::Back),
            Just(WritePolicy::Around),
        ]
    }

    /// Generate entry metadata with a bounded TTL and tag set.
    pub fn arb_metadata() -> impl Strategy<Value = EntryMetadata> {
        (
            arb_timestamp(),
            1u64..86_400,
            0u64..4096,
            prop::collection::vec("[a-z]{3,8}", 0..4),
            arb_priority(),
            1u64..1000,
        )
            .prop_map(|(now, ttl_secs, size, tags, priority, version)| {
                EntryMetadata::new(
                    now,
                    Duration::from_secs(ttl_secs),
                    size,
                    tags,
                    priority,
                    version,
                )
            })
    }

    /// Generate a string-valued cache entry.
    pub fn arb_entry() -> impl Strategy<Value = CacheEntry<String>> {
        (arb_key(), "[ -~]{0,64}", arb_metadata())
            .prop_map(|(key, value, metadata)| CacheEntry::new(key, value, metadata))
    }

    /// Generate a chat message.
    pub fn arb_message() -> impl Strategy<Value = ChatMessage> {
        ("[ -~]{1,120}", "[a-z]{3,10}", any::<bool>(), arb_timestamp()).prop_map(
            |(text, sender, from_assistant, timestamp)| {
                ChatMessage::new(text, sender, from_assistant).at(timestamp)
            },
        )
    }

    /// Generate a session with up to eight messages.
    pub fn arb_session() -> impl Strategy<Value = ChatSession> {
        ("[A-Za-z ]{1,30}", prop::collection::vec(arb_message(), 0..8)).prop_map(
            |(title, messages)| {
                let mut session = ChatSession::new(title);
                for message in messages {
                    session.push(message);
                }
                session
            },
        )
    }

    /// Generate a cache query with optional predicates and pagination.
    pub fn arb_query() -> impl Strategy<Value = CacheQuery> {
        (
            prop::option::of(Just("^[a-z]".to_string())),
            prop::collection::vec("[a-z]{3,8}", 0..3),
            0usize..20,
            prop::option::of(1usize..50),
        )
            .prop_map(|(key_pattern, tags, offset, limit)| CacheQuery {
                key_pattern,
                tags,
                offset,
                limit,
                ..CacheQuery::all()
            })
    }
}
