//! # Graph Store Trait
//!
//! This is THE contract between the ingestion core and any graph store
//! driver. The core only ever needs to open a transaction, run parameterized
//! statements in it, and commit or roll it back.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryStore` | `memory` | Recording, scriptable store for tests/embedding |

pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{PropertyMap, Value};
use crate::tx::{Transaction, TxMode};
use crate::{Error, Result};

pub use memory::{MemoryStore, MemoryTx, RecordedQuery};

// ============================================================================
// Store errors
// ============================================================================

/// Broad failure category reported by a store driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreErrorKind {
    /// The store could not be reached.
    ServiceUnavailable,
    /// The session was dropped by the server or routing table.
    SessionExpired,
    /// The connection was reset mid-request.
    ConnectionReset,
    /// Generic transient server-side failure.
    Transient,
    /// The statement was rejected by the store.
    Client,
    /// Internal store failure.
    Database,
    /// Failure inside the driver itself.
    Driver,
}

/// A failure reported by the store, carried unmodified through retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}{}: {message}", code_suffix(.code))]
pub struct StoreError {
    pub kind: StoreErrorKind,
    /// Vendor status code, e.g. `Neo.ClientError.Statement.EntityNotFound`.
    pub code: Option<String>,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self { kind, code: None, message: message.into() }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Client error with a status code.
    pub fn client(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Client, message).with_code(code)
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default()
}

// ============================================================================
// Query results
// ============================================================================

/// Write counters reported by the store for one statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCounters {
    pub nodes_created: u64,
    pub nodes_deleted: u64,
    pub relationships_created: u64,
    pub relationships_deleted: u64,
    pub properties_set: u64,
    pub labels_added: u64,
    pub labels_removed: u64,
    pub indexes_added: u64,
    pub indexes_removed: u64,
    pub constraints_added: u64,
    pub constraints_removed: u64,
}

impl QueryCounters {
    /// Whether the statement changed anything at all.
    pub fn contains_updates(&self) -> bool {
        self.iter().any(|(_, n)| n > 0)
    }

    /// Counter names and values, in a fixed order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> {
        [
            ("nodes_created", self.nodes_created),
            ("nodes_deleted", self.nodes_deleted),
            ("relationships_created", self.relationships_created),
            ("relationships_deleted", self.relationships_deleted),
            ("properties_set", self.properties_set),
            ("labels_added", self.labels_added),
            ("labels_removed", self.labels_removed),
            ("indexes_added", self.indexes_added),
            ("indexes_removed", self.indexes_removed),
            ("constraints_added", self.constraints_added),
            ("constraints_removed", self.constraints_removed),
        ]
        .into_iter()
    }
}

/// A fully consumed statement result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<ResultRow>,
    pub counters: QueryCounters,
}

impl QueryResult {
    pub fn with_counters(counters: QueryCounters) -> Self {
        Self { counters, ..Self::default() }
    }

    pub fn with_rows(columns: Vec<String>, rows: Vec<ResultRow>) -> Self {
        Self { columns, rows, counters: QueryCounters::default() }
    }
}

/// A single row in the result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRow {
    pub values: BTreeMap<String, Value>,
}

impl ResultRow {
    pub fn new<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self { values: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect() }
    }

    /// Get a typed value from the row.
    pub fn get<T: FromValue>(&self, key: &str) -> Result<T> {
        let val = self.values.get(key).ok_or_else(|| Error::NotFound(format!("Column '{key}'")))?;
        T::from_value(val)
    }

    /// The first column's value, in column order.
    pub fn first(&self, columns: &[String]) -> Option<&Value> {
        columns.first().and_then(|c| self.values.get(c))
    }

    /// The row as a map of column name to value.
    pub fn into_map(self) -> PropertyMap {
        self.values
    }
}

/// Convert from Value to concrete types.
pub trait FromValue: Sized {
    fn from_value(val: &Value) -> Result<Self>;
}

fn type_error(expected: &str, val: &Value) -> Error {
    Error::TypeError { expected: expected.into(), got: val.type_name().into() }
}

impl FromValue for Value {
    fn from_value(val: &Value) -> Result<Self> {
        Ok(val.clone())
    }
}

impl FromValue for String {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_str().map(str::to_owned).ok_or_else(|| type_error("String", val))
    }
}

impl FromValue for i64 {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_int().ok_or_else(|| type_error("Integer", val))
    }
}

impl FromValue for bool {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::Bool(b) => Ok(*b),
            _ => Err(type_error("Boolean", val)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(val: &Value) -> Result<Self> {
        if val.is_null() { Ok(None) } else { T::from_value(val).map(Some) }
    }
}

// ============================================================================
// GraphStore Trait
// ============================================================================

/// The graph store contract.
///
/// A driver for a real database implements this over its own session and
/// transaction types, translating driver failures into [`StoreError`] so the
/// retry layer can classify them.
#[async_trait]
pub trait GraphStore: Send + Sync + 'static {
    /// The transaction type for this store.
    type Tx: Transaction + 'static;

    /// Begin a new transaction.
    async fn begin_tx(&self, mode: TxMode) -> Result<Self::Tx>;

    /// Commit a transaction.
    async fn commit_tx(&self, tx: Self::Tx) -> Result<()>;

    /// Roll back a transaction.
    async fn rollback_tx(&self, tx: Self::Tx) -> Result<()>;

    /// Run one statement in its own transaction (auto-commit style).
    ///
    /// Default implementation opens a transaction, runs the statement, and
    /// commits on success or rolls back on failure.
    async fn run(&self, mode: TxMode, query: &str, params: PropertyMap) -> Result<QueryResult> {
        let mut tx = self.begin_tx(mode).await?;
        match tx.run(query, params).await {
            Ok(result) => {
                self.commit_tx(tx).await?;
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback) = self.rollback_tx(tx).await {
                    debug!("Rollback after failure also failed: {rollback}");
                }
                Err(e)
            }
        }
    }
}
