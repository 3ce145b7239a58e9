//! A single parameterized statement inside a [`GraphJob`](super::GraphJob).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{merged, PropertyMap, Value};
use crate::querybuilder::LIMIT_SIZE;
use crate::storage::{GraphStore, QueryCounters};
use crate::{Error, Result, Session};

use super::{check_iterationsize, RunStatus};

fn default_iterationsize() -> u64 {
    crate::execution::DEFAULT_CLEANUP_ITERATION_SIZE
}

/// One query plus its bound parameters.
///
/// Iterative statements are re-run with `$LIMIT_SIZE` bound to
/// `iterationsize` until the store reports no further updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStatement {
    pub query: String,
    #[serde(default)]
    pub parameters: PropertyMap,
    #[serde(default)]
    pub iterative: bool,
    #[serde(default = "default_iterationsize")]
    pub iterationsize: u64,
    #[serde(skip)]
    status: RunStatus,
    #[serde(skip)]
    parent_job_name: Option<String>,
    #[serde(skip)]
    parent_job_sequence_num: Option<usize>,
}

impl GraphStatement {
    pub fn new(query: impl Into<String>, parameters: PropertyMap, iterative: bool, iterationsize: u64) -> Self {
        Self {
            query: query.into(),
            parameters,
            iterative,
            iterationsize,
            status: RunStatus::Pending,
            parent_job_name: None,
            parent_job_sequence_num: None,
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Job name and 1-based position, once attached to a job.
    pub fn parent(&self) -> Option<(&str, usize)> {
        self.parent_job_name.as_deref().zip(self.parent_job_sequence_num)
    }

    pub(crate) fn set_parent(&mut self, job_name: &str, sequence_num: usize) {
        self.parent_job_name = Some(job_name.to_owned());
        self.parent_job_sequence_num = Some(sequence_num);
    }

    /// Overlay `parameters` on this statement's own. The previous map is
    /// replaced, never modified in place.
    pub fn merge_parameters(&mut self, parameters: &PropertyMap) {
        self.parameters = merged(&self.parameters, parameters);
    }

    /// Run the statement. Counters are reported to the session's metrics
    /// sink as `<metrics_prefix>.<counter>`.
    pub async fn run<S: GraphStore>(&mut self, session: &Session<S>, metrics_prefix: &str) -> Result<()> {
        self.status = RunStatus::Running;
        let outcome = if self.iterative {
            self.run_iterative(session, metrics_prefix).await
        } else {
            self.run_once(session, self.parameters.clone(), metrics_prefix).await.map(|_| ())
        };
        self.status = if outcome.is_ok() { RunStatus::Succeeded } else { RunStatus::Failed };
        outcome
    }

    async fn run_iterative<S: GraphStore>(&self, session: &Session<S>, metrics_prefix: &str) -> Result<()> {
        check_iterationsize(self.iterationsize)?;
        let limit = i64::try_from(self.iterationsize)
            .map_err(|_| Error::Validation(format!("iterationsize {} is too large", self.iterationsize)))?;
        let mut params = self.parameters.clone();
        params.insert(LIMIT_SIZE.to_owned(), Value::Int(limit));

        let mut rounds = 0usize;
        loop {
            let counters = self.run_once(session, params.clone(), metrics_prefix).await?;
            rounds += 1;
            if !counters.contains_updates() {
                break;
            }
        }
        debug!(rounds, iterationsize = self.iterationsize, "Iterative statement converged");
        Ok(())
    }

    async fn run_once<S: GraphStore>(
        &self,
        session: &Session<S>,
        params: PropertyMap,
        metrics_prefix: &str,
    ) -> Result<QueryCounters> {
        let query = self.query.clone();
        let operation = match self.parent() {
            Some((job, n)) => format!("{job} statement #{n}"),
            None => "statement".to_owned(),
        };
        let counters = session
            .execute_write_with_retry(&operation, move |tx| {
                let query = query.clone();
                let params = params.clone();
                Box::pin(async move { Ok::<_, Error>(tx.run(&query, params).await?.counters) })
            })
            .await?;

        for (name, value) in counters.iter().filter(|(_, v)| *v > 0) {
            session.metrics().incr(&format!("{metrics_prefix}.{name}"), value);
        }
        Ok(counters)
    }
}
