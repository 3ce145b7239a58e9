//! # cartography: Schema-Driven Graph Ingestion
//!
//! Compiles declarative node and relationship schemas into idempotent Cypher
//! upserts and stale-data cleanup jobs, and runs them against a graph store
//! with batching and retries.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `GraphStore` is the contract between the core and any store driver
//! 2. **Schemas are data**: `NodeSchema`/`RelSchema` are immutable; all logic lives in the compilers
//! 3. **IR before text**: compilers build a Cypher AST, rendering is the last step
//! 4. **One retry table**: every failure is classified once and retried per class
//!
//! ## Quick Start
//!
//! ```rust
//! use cartography::{
//!     property_map, LinkDirection, NodeSchema, PropertyRef, RelSchema, Session, UpdateTag, Value,
//! };
//!
//! # async fn example() -> cartography::Result<()> {
//! let owner = RelSchema::builder("Owner", "RESOURCE", LinkDirection::Inward)
//!     .target_matcher("id", PropertyRef::kwarg("OwnerId"))
//!     .property("lastupdated", PropertyRef::kwarg("UPDATE_TAG"))
//!     .build()?;
//! let widget = NodeSchema::builder("Widget")
//!     .property("id", PropertyRef::record("Id"))
//!     .property("lastupdated", PropertyRef::kwarg("UPDATE_TAG"))
//!     .sub_resource(owner)
//!     .build()?;
//!
//! let session = Session::open_memory();
//! let kwargs = property_map([("UPDATE_TAG", Value::from(UpdateTag(2))), ("OwnerId", "acct-1".into())]);
//! session.load(&widget, &[property_map([("Id", "w2")])], &kwargs).await?;
//! session.cleanup(&widget, &kwargs, false).await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod schema;
pub mod cypher;
pub mod querybuilder;
pub mod index;
pub mod storage;
pub mod tx;
pub mod execution;
pub mod job;
pub mod sync_metadata;

use std::sync::Arc;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{Value, PropertyMap, UpdateTag, property_map, merged};

// ============================================================================
// Re-exports: Schema
// ============================================================================

pub use schema::{
    PropertyRef, RefMap, MatchMode, ValueSource,
    NodeSchema, RelSchema, LinkDirection, ModuleInfo,
};

// ============================================================================
// Re-exports: Compilers
// ============================================================================

pub use querybuilder::{
    build_ingestion_query, build_matchlink_query,
    build_cleanup_queries, build_cleanup_query_for_matchlink,
};
pub use index::{build_create_index_queries, build_create_index_queries_for_matchlink};

// ============================================================================
// Re-exports: Storage & Transactions
// ============================================================================

pub use storage::{
    GraphStore, MemoryStore, QueryResult, QueryCounters, ResultRow,
    StoreError, StoreErrorKind,
};
pub use tx::{Transaction, TxMode, TxId};

// ============================================================================
// Re-exports: Execution & Jobs
// ============================================================================

pub use execution::{SessionConfig, MetricsSink, NoopMetrics, RetryConfig, RetryPolicy, BackoffStrategy};
pub use job::{GraphJob, GraphStatement, CleanupOptions, RunStatus};

// ============================================================================
// Top-level Session handle
// ============================================================================

/// The primary entry point. A `Session` wraps a graph store together with
/// its tuning and metrics sink; loading, cleanup and ad hoc writes all go
/// through it.
///
/// Sessions hold no store state between calls and may be shared by
/// concurrent callers.
pub struct Session<S: GraphStore> {
    pub(crate) store: S,
    pub(crate) config: SessionConfig,
    pub(crate) metrics: Arc<dyn MetricsSink>,
}

impl<S: GraphStore> Session<S> {
    /// Create a Session over `store` with default configuration.
    pub fn with_store(store: S) -> Self {
        Self::with_config(store, SessionConfig::default())
    }

    pub fn with_config(store: S, config: SessionConfig) -> Self {
        Self { store, config, metrics: Arc::new(NoopMetrics) }
    }

    /// Replace the metrics sink.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Access the underlying store (for advanced use).
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn metrics(&self) -> &dyn MetricsSink {
        self.metrics.as_ref()
    }
}

/// Recording in-memory store, for testing and embedding.
impl Session<MemoryStore> {
    pub fn open_memory() -> Self {
        Self::with_store(MemoryStore::new())
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A schema declaration, or a combination of schema settings, is invalid.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Caller input rejected before any I/O.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Job '{job}' is missing required parameters: {}", missing.join(", "))]
    MissingParameters { job: String, missing: Vec<String> },

    #[error("Refusing to run non-idempotent index statement: {0}")]
    NonIdempotentIndex(String),

    /// Failure reported by the store, unmodified.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
