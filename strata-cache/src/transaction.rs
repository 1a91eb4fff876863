//! Transaction records and their flat registry.
//!
//! Transactions are not nested: one registry keyed by transaction id holds
//! every record. Operations are appended by the caller and only applied when
//! the transaction commits; `rollback` reverses recorded operations in LIFO
//! order. Reversal is lossy by design: a `Set` reverses to a delete without
//! restoring the prior value, and a `Delete` has no captured pre-image so it
//! reverses to a no-op.
//!
//! The registry owns each transaction's auto-rollback timer; the engine arms
//! it at `begin` and the registry aborts it on any terminal transition.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use strata_core::{CacheValue, IsolationLevel, StrataResult, TransactionError};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Lifecycle states. `Committed` and `RolledBack` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Open,
    Committed,
    RolledBack,
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Committed => write!(f, "committed"),
            Self::RolledBack => write!(f, "rolled-back"),
        }
    }
}

/// One recorded operation, replayed on commit.
#[derive(Debug, Clone)]
pub enum TransactionOp<V> {
    Set { key: String, value: V },
    Delete { key: String },
}

struct TransactionRecord<V> {
    isolation: IsolationLevel,
    state: TransactionState,
    ops: Vec<TransactionOp<V>>,
    opened_at: DateTime<Utc>,
    timeout: Duration,
    timer: Option<JoinHandle<()>>,
}

impl<V> TransactionRecord<V> {
    fn deadline(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.timeout)
            .ok()
            .and_then(|d| self.opened_at.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn abort_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Flat registry of transactions keyed by id.
pub struct TransactionStore<V> {
    inner: Mutex<HashMap<Uuid, TransactionRecord<V>>>,
}

impl<V: CacheValue> Default for TransactionStore<V> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl<V: CacheValue> TransactionStore<V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<Uuid, TransactionRecord<V>>> {
        // A panic while holding this mutex would already have broken the
        // transaction registry; recover the map rather than wedging it.
        self.inner.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Allocate a new open transaction.
    pub fn begin(&self, isolation: IsolationLevel, timeout: Duration) -> Uuid {
        let id = Uuid::now_v7();
        self.locked().insert(
            id,
            TransactionRecord {
                isolation,
                state: TransactionState::Open,
                ops: Vec::new(),
                opened_at: Utc::now(),
                timeout,
                timer: None,
            },
        );
        id
    }

    /// Attach the auto-rollback timer spawned by the engine.
    pub fn arm_timer(&self, id: Uuid, timer: JoinHandle<()>) {
        if let Some(record) = self.locked().get_mut(&id) {
            if record.state == TransactionState::Open {
                record.timer = Some(timer);
            } else {
                timer.abort();
            }
        } else {
            timer.abort();
        }
    }

    /// Append an operation to an open transaction.
    pub fn append(&self, id: Uuid, op: TransactionOp<V>) -> StrataResult<()> {
        let mut map = self.locked();
        let record = map
            .get_mut(&id)
            .ok_or(TransactionError::NotFound { id })?;
        if record.state != TransactionState::Open {
            return Err(TransactionError::NotOpen {
                id,
                state: record.state.to_string(),
            }
            .into());
        }
        record.ops.push(op);
        Ok(())
    }

    /// Transition to `Committed` and hand back the recorded operations for
    /// replay. The terminal state is set before replay so a racing timeout
    /// timer observes a non-open transaction and stands down.
    pub fn start_commit(&self, id: Uuid) -> StrataResult<Vec<TransactionOp<V>>> {
        self.finish(id, TransactionState::Committed)
    }

    /// Transition to `RolledBack` and hand back the recorded operations for
    /// LIFO reversal.
    pub fn start_rollback(&self, id: Uuid) -> StrataResult<Vec<TransactionOp<V>>> {
        self.finish(id, TransactionState::RolledBack)
    }

    fn finish(&self, id: Uuid, target: TransactionState) -> StrataResult<Vec<TransactionOp<V>>> {
        let mut map = self.locked();
        let record = map
            .get_mut(&id)
            .ok_or(TransactionError::NotFound { id })?;
        if record.state != TransactionState::Open {
            return Err(TransactionError::NotOpen {
                id,
                state: record.state.to_string(),
            }
            .into());
        }
        record.abort_timer();
        record.state = target;
        Ok(record.ops.clone())
    }

    /// Flip a tentatively committed transaction to rolled-back after a
    /// mid-replay failure.
    pub fn mark_rolled_back(&self, id: Uuid) {
        if let Some(record) = self.locked().get_mut(&id) {
            record.state = TransactionState::RolledBack;
        }
    }

    /// Force-rollback a transaction if it is still open. Used by timeout
    /// timers and `destroy`. Returns the operations to reverse, or `None`
    /// when the transaction already reached a terminal state.
    pub fn take_if_open(&self, id: Uuid) -> Option<Vec<TransactionOp<V>>> {
        let mut map = self.locked();
        let record = map.get_mut(&id)?;
        if record.state != TransactionState::Open {
            return None;
        }
        record.abort_timer();
        record.state = TransactionState::RolledBack;
        Some(record.ops.clone())
    }

    /// Roll back every open transaction past its deadline and drop terminal
    /// records. Returns the operation lists to reverse.
    pub fn sweep(&self, now: DateTime<Utc>) -> Vec<(Uuid, Vec<TransactionOp<V>>)> {
        let mut map = self.locked();
        let mut expired = Vec::new();
        for (id, record) in map.iter_mut() {
            if record.state == TransactionState::Open && record.deadline() <= now {
                record.abort_timer();
                record.state = TransactionState::RolledBack;
                expired.push((*id, record.ops.clone()));
            }
        }
        map.retain(|_, record| record.state == TransactionState::Open);
        expired
    }

    /// Ids of all currently open transactions.
    pub fn open_ids(&self) -> Vec<Uuid> {
        self.locked()
            .iter()
            .filter(|(_, record)| record.state == TransactionState::Open)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Current state of a transaction, if still registered.
    pub fn state(&self, id: Uuid) -> Option<TransactionState> {
        self.locked().get(&id).map(|record| record.state)
    }

    /// Isolation level of a transaction, if still registered.
    pub fn isolation(&self, id: Uuid) -> Option<IsolationLevel> {
        self.locked().get(&id).map(|record| record.isolation)
    }
}
