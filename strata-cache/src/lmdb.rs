//! LMDB-backed persistent storage adapter.
//!
//! Uses the heed crate (Rust bindings for LMDB) as the durable tier.
//! Entries are stored as JSON payloads with a sha2 checksum computed at
//! write time and verified on every read: a payload that fails to parse or
//! whose checksum does not match is treated as a cache miss, and the key is
//! queued for removal during the next `cleanup()` pass.

use std::marker::PhantomData;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use regex::Regex;
use sha2::{Digest, Sha256};
use strata_core::{
    AdapterError, CacheEntry, CacheQuery, CacheValue, LayerLimits, StrataResult,
};
use tracing::warn;

use crate::adapter::{entry_matches, StorageAdapter};

/// Error type for LMDB adapter internals.
#[derive(Debug, thiserror::Error)]
pub enum LmdbError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Hex-encoded sha2 digest of a serialized value.
fn value_checksum(value_bytes: &[u8]) -> String {
    let digest = Sha256::digest(value_bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Durable key/value adapter over a memory-mapped LMDB environment.
pub struct LmdbAdapter<V> {
    name: String,
    env: Env,
    db: Database<Str, Bytes>,
    limits: LayerLimits,
    /// Keys whose stored payloads failed to parse or verify, awaiting purge.
    corrupted: RwLock<Vec<String>>,
    closed: AtomicBool,
    _marker: PhantomData<fn() -> V>,
}

impl<V: CacheValue> LmdbAdapter<V> {
    /// Open (or create) an LMDB environment at `path`.
    pub fn open<P: AsRef<Path>>(
        name: impl Into<String>,
        path: P,
        limits: LayerLimits,
        max_size_mb: usize,
    ) -> StrataResult<Self> {
        let name = name.into();
        std::fs::create_dir_all(&path)
            .map_err(|e| Self::adapter_error(&name, LmdbError::Io(e)))?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| Self::adapter_error(&name, LmdbError::EnvOpen(e.to_string())))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| Self::adapter_error(&name, LmdbError::Transaction(e.to_string())))?;
        let db: Database<Str, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| Self::adapter_error(&name, LmdbError::DbOpen(e.to_string())))?;
        wtxn.commit()
            .map_err(|e| Self::adapter_error(&name, LmdbError::Transaction(e.to_string())))?;

        Ok(Self {
            name,
            env,
            db,
            limits,
            corrupted: RwLock::new(Vec::new()),
            closed: AtomicBool::new(false),
            _marker: PhantomData,
        })
    }

    fn adapter_error(layer: &str, e: LmdbError) -> strata_core::StrataError {
        AdapterError::Io {
            layer: layer.to_string(),
            reason: e.to_string(),
        }
        .into()
    }

    fn txn_error(&self, e: heed::Error) -> strata_core::StrataError {
        Self::adapter_error(&self.name, LmdbError::Transaction(e.to_string()))
    }

    fn ensure_open(&self) -> StrataResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AdapterError::Closed {
                layer: self.name.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// Queue a key whose payload failed to parse or verify.
    fn queue_corrupted(&self, key: &str, reason: &str) {
        warn!(layer = %self.name, key, reason, "corrupted cache payload, queued for removal");
        if let Ok(mut queue) = self.corrupted.write() {
            queue.push(key.to_string());
        }
    }

    /// Decode a stored payload, verifying its checksum.
    ///
    /// Returns `None` (a miss) for malformed payloads, queuing the key.
    fn decode(&self, key: &str, bytes: &[u8]) -> Option<CacheEntry<V>> {
        let entry: CacheEntry<V> = match serde_json::from_slice(bytes) {
            Ok(entry) => entry,
            Err(e) => {
                self.queue_corrupted(key, &e.to_string());
                return None;
            }
        };
        if let Some(stored) = &entry.checksum {
            let value_bytes = serde_json::to_vec(&entry.value).ok()?;
            if *stored != value_checksum(&value_bytes) {
                self.queue_corrupted(key, "checksum mismatch");
                return None;
            }
        }
        Some(entry)
    }

    fn encode(&self, entry: &CacheEntry<V>) -> StrataResult<Vec<u8>> {
        serde_json::to_vec(entry).map_err(|e| {
            AdapterError::Serialization {
                key: entry.key.clone(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Read every decodable entry. Corrupt payloads are queued and skipped.
    fn load_all(&self) -> StrataResult<Vec<CacheEntry<V>>> {
        let rtxn = self.env.read_txn().map_err(|e| self.txn_error(e))?;
        let iter = self.db.iter(&rtxn).map_err(|e| self.txn_error(e))?;

        let mut entries = Vec::new();
        for result in iter {
            match result {
                Ok((key, bytes)) => {
                    if let Some(entry) = self.decode(key, bytes) {
                        entries.push(entry);
                    }
                }
                Err(e) => return Err(self.txn_error(e)),
            }
        }
        Ok(entries)
    }

    fn read_one(&self, key: &str) -> StrataResult<Option<CacheEntry<V>>> {
        let rtxn = self.env.read_txn().map_err(|e| self.txn_error(e))?;
        match self.db.get(&rtxn, key) {
            Ok(Some(bytes)) => Ok(self.decode(key, bytes)),
            Ok(None) => Ok(None),
            Err(e) => Err(self.txn_error(e)),
        }
    }

    fn write_one(&self, entry: &CacheEntry<V>) -> Result<(), heed::Error> {
        let bytes = match serde_json::to_vec(entry) {
            Ok(bytes) => bytes,
            // Surfaced by the caller through encode(); unreachable in practice.
            Err(_) => return Ok(()),
        };
        let mut wtxn = self.env.write_txn()?;
        self.db.put(&mut wtxn, &entry.key, &bytes)?;
        wtxn.commit()
    }

    /// Purge expired entries and drain the corruption queue.
    fn purge(&self) -> StrataResult<u64> {
        let now = Utc::now();
        let mut dead: Vec<String> = self
            .load_all()?
            .into_iter()
            .filter(|entry| entry.is_expired(now))
            .map(|entry| entry.key)
            .collect();

        if let Ok(mut queue) = self.corrupted.write() {
            dead.append(&mut queue);
        }
        dead.sort();
        dead.dedup();

        if dead.is_empty() {
            return Ok(0);
        }

        let mut wtxn = self.env.write_txn().map_err(|e| self.txn_error(e))?;
        let mut purged = 0u64;
        for key in &dead {
            if self.db.delete(&mut wtxn, key).map_err(|e| self.txn_error(e))? {
                purged += 1;
            }
        }
        wtxn.commit().map_err(|e| self.txn_error(e))?;
        Ok(purged)
    }

    fn over_entry_limit(&self, replacing_existing: bool) -> StrataResult<bool> {
        if self.limits.max_entries == 0 || replacing_existing {
            return Ok(false);
        }
        let rtxn = self.env.read_txn().map_err(|e| self.txn_error(e))?;
        let count = self.db.len(&rtxn).map_err(|e| self.txn_error(e))?;
        Ok(count as usize >= self.limits.max_entries)
    }
}

#[async_trait]
impl<V: CacheValue> StorageAdapter<V> for LmdbAdapter<V> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> StrataResult<Option<CacheEntry<V>>> {
        self.ensure_open()?;
        let Some(mut entry) = self.read_one(key)? else {
            return Ok(None);
        };
        entry.metadata.touch(Utc::now());
        // Persist the bumped access metadata; the read result stands even
        // if the write-back fails.
        if let Err(e) = self.write_one(&entry) {
            warn!(layer = %self.name, key, error = %e, "failed to persist access metadata");
        }
        Ok(Some(entry))
    }

    async fn peek(&self, key: &str) -> StrataResult<Option<CacheEntry<V>>> {
        self.ensure_open()?;
        self.read_one(key)
    }

    async fn set(&self, mut entry: CacheEntry<V>) -> StrataResult<Vec<String>> {
        self.ensure_open()?;

        let value_bytes = serde_json::to_vec(&entry.value).map_err(|e| {
            strata_core::StrataError::from(AdapterError::Serialization {
                key: entry.key.clone(),
                reason: e.to_string(),
            })
        })?;
        entry.checksum = Some(value_checksum(&value_bytes));
        self.encode(&entry)?;

        let replacing = self.read_one(&entry.key)?.is_some();
        let rejected = self.over_entry_limit(replacing)? || self.write_one(&entry).is_err();
        if rejected {
            // One local cleanup pass, then exactly one retry.
            self.purge()?;
            if self.over_entry_limit(replacing)? {
                return Err(AdapterError::CapacityExceeded {
                    layer: self.name.clone(),
                    needed_bytes: entry.metadata.size_bytes,
                }
                .into());
            }
            self.write_one(&entry).map_err(|_| {
                strata_core::StrataError::from(AdapterError::CapacityExceeded {
                    layer: self.name.clone(),
                    needed_bytes: entry.metadata.size_bytes,
                })
            })?;
        }
        Ok(Vec::new())
    }

    async fn delete(&self, key: &str) -> StrataResult<bool> {
        self.ensure_open()?;
        let mut wtxn = self.env.write_txn().map_err(|e| self.txn_error(e))?;
        let existed = self.db.delete(&mut wtxn, key).map_err(|e| self.txn_error(e))?;
        wtxn.commit().map_err(|e| self.txn_error(e))?;
        Ok(existed)
    }

    async fn clear(&self, pattern: Option<&Regex>) -> StrataResult<u64> {
        self.ensure_open()?;
        match pattern {
            None => {
                let mut wtxn = self.env.write_txn().map_err(|e| self.txn_error(e))?;
                let count = self.db.len(&wtxn).map_err(|e| self.txn_error(e))?;
                self.db.clear(&mut wtxn).map_err(|e| self.txn_error(e))?;
                wtxn.commit().map_err(|e| self.txn_error(e))?;
                Ok(count)
            }
            Some(regex) => {
                let matching: Vec<String> = {
                    let rtxn = self.env.read_txn().map_err(|e| self.txn_error(e))?;
                    let iter = self.db.iter(&rtxn).map_err(|e| self.txn_error(e))?;
                    let mut keys = Vec::new();
                    for result in iter {
                        let (key, _) = result.map_err(|e| self.txn_error(e))?;
                        if regex.is_match(key) {
                            keys.push(key.to_string());
                        }
                    }
                    keys
                };

                let mut wtxn = self.env.write_txn().map_err(|e| self.txn_error(e))?;
                let mut removed = 0u64;
                for key in &matching {
                    if self.db.delete(&mut wtxn, key).map_err(|e| self.txn_error(e))? {
                        removed += 1;
                    }
                }
                wtxn.commit().map_err(|e| self.txn_error(e))?;
                Ok(removed)
            }
        }
    }

    async fn query(&self, query: &CacheQuery) -> StrataResult<Vec<CacheEntry<V>>> {
        self.ensure_open()?;
        let pattern = query.compiled_pattern()?;
        let now = Utc::now();
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|entry| entry_matches(entry, query, pattern.as_ref(), now))
            .collect())
    }

    async fn cleanup(&self) -> StrataResult<u64> {
        self.ensure_open()?;
        self.purge()
    }

    async fn size_bytes(&self) -> StrataResult<u64> {
        self.ensure_open()?;
        Ok(self
            .load_all()?
            .iter()
            .map(|entry| entry.metadata.size_bytes)
            .sum())
    }

    async fn key_count(&self) -> StrataResult<u64> {
        self.ensure_open()?;
        let rtxn = self.env.read_txn().map_err(|e| self.txn_error(e))?;
        self.db.len(&rtxn).map_err(|e| self.txn_error(e))
    }

    async fn oldest(&self) -> StrataResult<Option<String>> {
        self.ensure_open()?;
        Ok(self
            .load_all()?
            .into_iter()
            .min_by_key(|e| e.metadata.created_at)
            .map(|e| e.key))
    }

    async fn newest(&self) -> StrataResult<Option<String>> {
        self.ensure_open()?;
        Ok(self
            .load_all()?
            .into_iter()
            .max_by_key(|e| e.metadata.created_at)
            .map(|e| e.key))
    }

    async fn most_accessed(&self) -> StrataResult<Option<String>> {
        self.ensure_open()?;
        Ok(self
            .load_all()?
            .into_iter()
            .max_by_key(|e| e.metadata.access_count)
            .map(|e| e.key))
    }

    async fn largest(&self) -> StrataResult<Option<String>> {
        self.ensure_open()?;
        Ok(self
            .load_all()?
            .into_iter()
            .max_by_key(|e| e.metadata.size_bytes)
            .map(|e| e.key))
    }

    fn supports_defragment(&self) -> bool {
        true
    }

    /// Drop dead entries so LMDB can reclaim their pages.
    async fn defragment(&self) -> StrataResult<()> {
        self.ensure_open()?;
        self.purge()?;
        Ok(())
    }

    async fn close(&self) -> StrataResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
