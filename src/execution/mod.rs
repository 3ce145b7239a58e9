//! Query execution against a [`GraphStore`].
//!
//! Everything here hangs off [`Session`]: batched loading, index ensuring,
//! the generic write-with-retry entry point, and the read helpers.

pub mod load;
pub mod metrics;
pub mod read;
pub mod retry;

use serde::{Deserialize, Serialize};

use crate::model::PropertyMap;
use crate::storage::{GraphStore, QueryResult};
use crate::tx::{Transaction, TxMode};
use crate::{Result, Session};

pub use metrics::{MemoryMetrics, MetricsSink, NoopMetrics};
pub use retry::{
    BackoffStrategy, RetryClass, RetryConfig, RetryPolicy, TxFuture, BUFFER_RESIZE_MESSAGE, DEFAULT_WAIT,
    ENTITY_NOT_FOUND_CODE,
};

/// Records per write transaction when loading.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Rows deleted per transaction by iterative cleanup statements.
pub const DEFAULT_CLEANUP_ITERATION_SIZE: u64 = 100;

/// Session tuning. Plain data; deserializes with defaults for missing fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Records per write transaction in [`Session::load`].
    pub batch_size: usize,
    /// Row limit used by cleanup jobs built through [`Session::cleanup`].
    pub cleanup_iteration_size: u64,
    pub retry: RetryConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            cleanup_iteration_size: DEFAULT_CLEANUP_ITERATION_SIZE,
            retry: RetryConfig::default(),
        }
    }
}

impl<S: GraphStore> Session<S> {
    /// Run an arbitrary transaction function in a write transaction with the
    /// full retry policy.
    ///
    /// `work` may be called several times; each call gets a fresh
    /// transaction that is committed only if `work` succeeds.
    pub async fn execute_write_with_retry<F, T>(&self, operation: &str, work: F) -> Result<T>
    where
        F: for<'t> FnMut(&'t mut dyn Transaction) -> TxFuture<'t, T> + Send,
        T: Send,
    {
        retry::run_with_retry(&self.store, &self.config.retry, RetryClass::ALL, TxMode::ReadWrite, operation, work)
            .await
    }

    /// Run one write statement with the full retry policy.
    pub async fn run_write_query(&self, query: &str, params: PropertyMap) -> Result<QueryResult> {
        let owned = query.to_owned();
        self.execute_write_with_retry(query, move |tx| {
            let query = owned.clone();
            let params = params.clone();
            Box::pin(async move { tx.run(&query, params).await })
        })
        .await
    }
}
