//! In-memory graph store.
//!
//! This is the reference implementation of `GraphStore`. It does not
//! evaluate Cypher: every statement is recorded along with its parameters
//! and transaction, and answered from a script of outcomes.
//!
//! ## Limitations
//!
//! - **No query evaluation**: results and write counters come from the
//!   script (`push_result` / `push_error`), falling back to the default
//!   outcome once the script is drained.
//! - **Bookkeeping only transactions**: `commit_tx()` and `rollback_tx()`
//!   record the transaction id; statements are never undone.
//!
//! Use this store for:
//! - Testing the batching, retry and job layers without a database
//! - Capturing the exact statements a sync would send

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::model::PropertyMap;
use crate::tx::{Transaction, TxId, TxMode};
use crate::{Error, Result};
use super::{GraphStore, QueryResult, StoreError};

type Outcome = std::result::Result<QueryResult, StoreError>;

/// One statement as the store saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedQuery {
    pub tx: TxId,
    pub mode: TxMode,
    pub query: String,
    pub params: PropertyMap,
}

// ============================================================================
// MemoryStore
// ============================================================================

/// Recording, scriptable graph store. Clones share state.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    recorded: Mutex<Vec<RecordedQuery>>,
    committed: Mutex<BTreeSet<TxId>>,
    rolled_back: Mutex<BTreeSet<TxId>>,
    script: Mutex<VecDeque<Outcome>>,
    default: Mutex<Outcome>,
    rollback_error: Mutex<Option<StoreError>>,
    next_tx_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                recorded: Mutex::new(Vec::new()),
                committed: Mutex::new(BTreeSet::new()),
                rolled_back: Mutex::new(BTreeSet::new()),
                script: Mutex::new(VecDeque::new()),
                default: Mutex::new(Ok(QueryResult::default())),
                rollback_error: Mutex::new(None),
                next_tx_id: AtomicU64::new(1),
            }),
        }
    }

    /// Queue a successful result for the next unanswered statement.
    pub fn push_result(&self, result: QueryResult) {
        self.inner.script.lock().push_back(Ok(result));
    }

    /// Queue a failure for the next unanswered statement.
    pub fn push_error(&self, error: StoreError) {
        self.inner.script.lock().push_back(Err(error));
    }

    /// Outcome used once the script is drained.
    pub fn set_default(&self, result: QueryResult) {
        *self.inner.default.lock() = Ok(result);
    }

    /// Fail every statement not covered by the script.
    pub fn fail_always(&self, error: StoreError) {
        *self.inner.default.lock() = Err(error);
    }

    /// Make every rollback fail with `error` after it is recorded.
    pub fn fail_rollbacks(&self, error: StoreError) {
        *self.inner.rollback_error.lock() = Some(error);
    }

    /// Every statement run so far, in order.
    pub fn recorded(&self) -> Vec<RecordedQuery> {
        self.inner.recorded.lock().clone()
    }

    /// Statements whose transaction was committed.
    pub fn committed_queries(&self) -> Vec<RecordedQuery> {
        let committed = self.inner.committed.lock();
        self.inner.recorded.lock().iter().filter(|q| committed.contains(&q.tx)).cloned().collect()
    }

    pub fn run_count(&self) -> usize {
        self.inner.recorded.lock().len()
    }

    pub fn committed_tx_count(&self) -> usize {
        self.inner.committed.lock().len()
    }

    pub fn rolled_back_tx_count(&self) -> usize {
        self.inner.rolled_back.lock().len()
    }

    fn next_outcome(&self) -> Outcome {
        if let Some(outcome) = self.inner.script.lock().pop_front() {
            return outcome;
        }
        self.inner.default.lock().clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MemoryTx
// ============================================================================

/// In-memory transaction: a handle back to the recording store.
pub struct MemoryTx {
    id: TxId,
    mode: TxMode,
    store: MemoryStore,
}

#[async_trait]
impl Transaction for MemoryTx {
    fn mode(&self) -> TxMode { self.mode }
    fn id(&self) -> TxId { self.id }

    async fn run(&mut self, query: &str, params: PropertyMap) -> Result<QueryResult> {
        self.store.inner.recorded.lock().push(RecordedQuery {
            tx: self.id,
            mode: self.mode,
            query: query.to_owned(),
            params,
        });
        self.store.next_outcome().map_err(Error::Store)
    }
}

// ============================================================================
// GraphStore impl
// ============================================================================

#[async_trait]
impl GraphStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin_tx(&self, mode: TxMode) -> Result<MemoryTx> {
        let id = TxId(self.inner.next_tx_id.fetch_add(1, Ordering::Relaxed));
        Ok(MemoryTx { id, mode, store: self.clone() })
    }

    async fn commit_tx(&self, tx: MemoryTx) -> Result<()> {
        self.inner.committed.lock().insert(tx.id);
        Ok(())
    }

    async fn rollback_tx(&self, tx: MemoryTx) -> Result<()> {
        self.inner.rolled_back.lock().insert(tx.id);
        match self.inner.rollback_error.lock().clone() {
            Some(e) => Err(Error::Store(e)),
            None => Ok(()),
        }
    }
}
