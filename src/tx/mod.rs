//! Transaction management.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::PropertyMap;
use crate::storage::QueryResult;
use crate::Result;

/// Transaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxMode {
    ReadOnly,
    ReadWrite,
}

/// Opaque transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxId(pub u64);

/// Transaction trait that all stores must implement.
///
/// Results are fully materialized by `run`, so nothing is read from a
/// transaction after it has been committed or rolled back.
#[async_trait]
pub trait Transaction: Send {
    fn mode(&self) -> TxMode;
    fn id(&self) -> TxId;

    /// Run one parameterized statement inside this transaction.
    async fn run(&mut self, query: &str, params: PropertyMap) -> Result<QueryResult>;
}
