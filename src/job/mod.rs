//! Jobs: named, ordered lists of statements.
//!
//! A job runs its statements strictly in order and stops at the first
//! failure. Jobs round-trip through JSON, and cleanup jobs are built
//! directly from schemas.

pub mod statement;

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::cypher::render;
use crate::model::{property_map, PropertyMap, UpdateTag, Value};
use crate::querybuilder::{
    build_cleanup_query_for_matchlink, cleanup_queries, LIMIT_SIZE, SUB_RESOURCE_ID, SUB_RESOURCE_LABEL, UPDATE_TAG,
};
use crate::schema::{NodeSchema, RelSchema};
use crate::storage::GraphStore;
use crate::{Error, Result, Session};

pub use statement::GraphStatement;

/// Lifecycle of a statement or job run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RunStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Options for [`GraphJob::from_node_schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupOptions {
    /// Rows deleted per transaction.
    pub iterationsize: u64,
    /// Also delete stale children reached through the sub-resource
    /// relationship. Requires scoped cleanup.
    pub cascade_delete: bool,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self { iterationsize: crate::execution::DEFAULT_CLEANUP_ITERATION_SIZE, cascade_delete: false }
    }
}

/// Iterative statements need a positive row limit.
pub(crate) fn check_iterationsize(iterationsize: u64) -> Result<()> {
    if iterationsize == 0 {
        return Err(Error::Validation("iterationsize must be greater than zero".into()));
    }
    Ok(())
}

/// A named sequence of statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphJob {
    pub name: String,
    /// Log-friendly name, e.g. the file stem a job was loaded from.
    #[serde(default)]
    pub short_name: Option<String>,
    pub statements: Vec<GraphStatement>,
    #[serde(skip)]
    status: RunStatus,
}

impl GraphJob {
    pub fn new(name: impl Into<String>, statements: Vec<GraphStatement>, short_name: Option<String>) -> Self {
        let mut job = Self { name: name.into(), short_name, statements, status: RunStatus::Pending };
        job.attach_statements();
        job
    }

    fn attach_statements(&mut self) {
        for (n, statement) in self.statements.iter_mut().enumerate() {
            statement.set_parent(&self.name, n + 1);
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Short name if set, otherwise the full name.
    pub fn display_name(&self) -> &str {
        self.short_name.as_deref().unwrap_or(&self.name)
    }

    /// Overlay `parameters` on every statement.
    pub fn merge_parameters(&mut self, parameters: &PropertyMap) {
        for statement in &mut self.statements {
            statement.merge_parameters(parameters);
        }
    }

    /// Run every statement in order. The first failure marks the job
    /// failed and is returned unchanged; later statements do not run.
    pub async fn run<S: GraphStore>(&mut self, session: &Session<S>) -> Result<()> {
        self.status = RunStatus::Running;
        let prefix = self.display_name().to_owned();
        for (n, statement) in self.statements.iter_mut().enumerate() {
            if let Err(e) = statement.run(session, &prefix).await {
                error!(job = %self.name, statement = n + 1, "Job failed at statement #{}: {e}", n + 1);
                self.status = RunStatus::Failed;
                return Err(e);
            }
        }
        self.status = RunStatus::Succeeded;
        info!(job = %self.name, statements = self.statements.len(), "Finished job {}", self.display_name());
        Ok(())
    }

    // ========================================================================
    // JSON
    // ========================================================================

    /// Parse a job definition. `short_name`, if given, replaces any short
    /// name in the document.
    pub fn from_json(blob: &str, short_name: Option<&str>) -> Result<Self> {
        let mut job: GraphJob = serde_json::from_str(blob)?;
        if let Some(short) = short_name {
            job.short_name = Some(short.to_owned());
        }
        job.status = RunStatus::Pending;
        job.attach_statements();
        Ok(job)
    }

    /// Read a job definition from disk; its short name is the file stem.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let blob = std::fs::read_to_string(path)?;
        let stem = path.file_stem().and_then(|s| s.to_str());
        Self::from_json(&blob, stem)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse, merge `parameters` into every statement, and run.
    pub async fn run_from_json<S: GraphStore>(
        session: &Session<S>,
        blob: &str,
        parameters: &PropertyMap,
        short_name: Option<&str>,
    ) -> Result<()> {
        let mut job = Self::from_json(blob, short_name)?;
        job.merge_parameters(parameters);
        job.run(session).await
    }

    /// Read, merge `parameters` into every statement, and run.
    pub async fn run_from_json_file<S: GraphStore>(
        session: &Session<S>,
        path: impl AsRef<Path>,
        parameters: &PropertyMap,
    ) -> Result<()> {
        let mut job = Self::from_json_file(path)?;
        job.merge_parameters(parameters);
        job.run(session).await
    }

    // ========================================================================
    // Schema-driven cleanup jobs
    // ========================================================================

    /// Cleanup job for a node schema.
    ///
    /// Every parameter the cleanup queries reference must be present in
    /// `parameters`, except `LIMIT_SIZE` which the statements bind
    /// themselves.
    pub fn from_node_schema(schema: &NodeSchema, parameters: &PropertyMap, options: CleanupOptions) -> Result<Self> {
        check_iterationsize(options.iterationsize)?;
        let name = format!("Cleanup {}", schema.label());
        let queries = cleanup_queries(schema, options.cascade_delete)?;

        let required: BTreeSet<String> = queries.iter().flat_map(|q| q.parameters()).collect();
        let missing: Vec<String> = required
            .into_iter()
            .filter(|p| p != LIMIT_SIZE && !parameters.contains_key(p))
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingParameters { job: name, missing });
        }

        let statements = queries
            .iter()
            .map(|q| GraphStatement::new(render(q), parameters.clone(), true, options.iterationsize))
            .collect();
        Ok(Self::new(name, statements, Some(schema.label().to_owned())))
    }

    /// Cleanup job for a matchlink, scoped to the owner the links were
    /// loaded for.
    pub fn from_matchlink(
        rel: &RelSchema,
        sub_resource_label: &str,
        sub_resource_id: impl Into<Value>,
        update_tag: UpdateTag,
        iterationsize: u64,
    ) -> Result<Self> {
        check_iterationsize(iterationsize)?;
        let query = build_cleanup_query_for_matchlink(rel)?;
        let parameters = property_map([
            (SUB_RESOURCE_LABEL, Value::from(sub_resource_label)),
            (SUB_RESOURCE_ID, sub_resource_id.into()),
            (UPDATE_TAG, Value::from(update_tag)),
        ]);
        let name = format!(
            "Cleanup {} between {} and {}",
            rel.rel_label(),
            rel.source_node_label().unwrap_or_default(),
            rel.target_node_label()
        );
        let statement = GraphStatement::new(query, parameters, true, iterationsize);
        Ok(Self::new(name, vec![statement], Some(rel.rel_label().to_owned())))
    }
}

impl<S: GraphStore> Session<S> {
    /// Build the cleanup job for `schema` and run it.
    pub async fn cleanup(&self, schema: &NodeSchema, parameters: &PropertyMap, cascade_delete: bool) -> Result<()> {
        let options = CleanupOptions { iterationsize: self.config.cleanup_iteration_size, cascade_delete };
        GraphJob::from_node_schema(schema, parameters, options)?.run(self).await
    }

    /// Build the matchlink cleanup job for `rel` and run it.
    pub async fn cleanup_matchlinks(
        &self,
        rel: &RelSchema,
        sub_resource_label: &str,
        sub_resource_id: impl Into<Value>,
        update_tag: UpdateTag,
    ) -> Result<()> {
        GraphJob::from_matchlink(rel, sub_resource_label, sub_resource_id, update_tag, self.config.cleanup_iteration_size)?
            .run(self)
            .await
    }
}
