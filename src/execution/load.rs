//! Batched loading and index ensuring.

use std::time::Instant;

use tracing::debug;

use crate::index::{build_create_index_queries, build_create_index_queries_for_matchlink, check_idempotent};
use crate::model::{PropertyMap, Value};
use crate::querybuilder::{build_ingestion_query, build_matchlink_query, DICT_LIST, SUB_RESOURCE_ID, SUB_RESOURCE_LABEL};
use crate::schema::{NodeSchema, RelSchema};
use crate::storage::GraphStore;
use crate::tx::TxMode;
use crate::{Error, Result, Session};

use super::retry::{run_with_retry, RetryClass};

/// Store error code for an index that already exists under another name or
/// was created by a concurrent writer.
pub const EQUIVALENT_SCHEMA_RULE_CODE: &str = "Neo.ClientError.Schema.EquivalentSchemaRuleAlreadyExists";

impl<S: GraphStore> Session<S> {
    /// Load `records` as nodes of `schema`, attaching every declared
    /// relationship whose target exists.
    ///
    /// Ensures indexes, compiles the ingestion query and writes the records
    /// in batches of `batch_size`. An empty `records` is a no-op.
    pub async fn load(&self, schema: &NodeSchema, records: &[PropertyMap], kwargs: &PropertyMap) -> Result<()> {
        if records.is_empty() {
            debug!(label = schema.label(), "No records to load");
            return Ok(());
        }
        self.ensure_indexes(schema).await?;
        let query = build_ingestion_query(schema, None)?;
        let started = Instant::now();
        self.load_graph_data(&query, records, kwargs, self.config.batch_size).await?;
        self.metrics.timing(&format!("load.{}", schema.label()), started.elapsed());
        Ok(())
    }

    /// Load relationships between existing nodes.
    ///
    /// `kwargs` must carry `_sub_resource_label` and `_sub_resource_id`;
    /// they are stamped on every relationship so cleanup can be scoped.
    pub async fn load_matchlinks(&self, rel: &RelSchema, records: &[PropertyMap], kwargs: &PropertyMap) -> Result<()> {
        let missing: Vec<String> = [SUB_RESOURCE_LABEL, SUB_RESOURCE_ID]
            .into_iter()
            .filter(|k| !kwargs.contains_key(*k))
            .map(str::to_owned)
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingParameters { job: rel.describe(), missing });
        }
        if records.is_empty() {
            debug!(rel = rel.rel_label(), "No matchlinks to load");
            return Ok(());
        }
        self.ensure_indexes_for_matchlinks(rel).await?;
        let query = build_matchlink_query(rel)?;
        let started = Instant::now();
        self.load_graph_data(&query, records, kwargs, self.config.batch_size).await?;
        self.metrics.timing(&format!("load.{}", rel.rel_label()), started.elapsed());
        Ok(())
    }

    /// Run `query` once per batch of `batch_size` records, each batch in its
    /// own retried write transaction with the records bound to `$DictList`.
    pub async fn load_graph_data(
        &self,
        query: &str,
        records: &[PropertyMap],
        kwargs: &PropertyMap,
        batch_size: usize,
    ) -> Result<()> {
        if batch_size == 0 {
            return Err(Error::Validation("batch size must be greater than zero".into()));
        }
        let batches = records.len().div_ceil(batch_size);
        for (n, chunk) in records.chunks(batch_size).enumerate() {
            let mut params = kwargs.clone();
            params.insert(DICT_LIST.to_owned(), Value::List(chunk.iter().cloned().map(Value::Map).collect()));
            debug!(batch = n + 1, batches, size = chunk.len(), "Writing batch");

            let owned = query.to_owned();
            self.execute_write_with_retry("load_graph_data", move |tx| {
                let query = owned.clone();
                let params = params.clone();
                Box::pin(async move { tx.run(&query, params).await })
            })
            .await?;
        }
        Ok(())
    }

    /// Create every index `schema` needs.
    pub async fn ensure_indexes(&self, schema: &NodeSchema) -> Result<()> {
        for query in build_create_index_queries(schema) {
            self.create_index(&query).await?;
        }
        Ok(())
    }

    /// Create every index a matchlink needs.
    pub async fn ensure_indexes_for_matchlinks(&self, rel: &RelSchema) -> Result<()> {
        for query in build_create_index_queries_for_matchlink(rel)? {
            self.create_index(&query).await?;
        }
        Ok(())
    }

    /// Run one idempotent index statement. Network failures are retried; a
    /// concurrent writer having created the same index is not an error.
    pub async fn create_index(&self, query: &str) -> Result<()> {
        check_idempotent(query)?;
        let owned = query.to_owned();
        let outcome = run_with_retry(
            &self.store,
            &self.config.retry,
            RetryClass::NETWORK_ONLY,
            TxMode::ReadWrite,
            query,
            move |tx| {
                let query = owned.clone();
                Box::pin(async move { tx.run(&query, PropertyMap::new()).await.map(|_| ()) })
            },
        )
        .await;
        match outcome {
            Err(Error::Store(e)) if e.has_code(EQUIVALENT_SCHEMA_RULE_CODE) => {
                debug!("Index already created by another writer: {query}");
                Ok(())
            }
            other => other,
        }
    }
}
