//! Retry dispatch for store operations.
//!
//! Every failure is classified once into a [`RetryClass`]; each class keeps
//! its own attempt counter and backoff sequence. Anything that does not
//! classify is permanent and is returned immediately.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::storage::{GraphStore, StoreError, StoreErrorKind};
use crate::tx::{Transaction, TxMode};
use crate::{Error, Result};

/// Wait used when a backoff sequence has nothing left to yield.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(1);

/// Client error code raised when a concurrent writer deleted a node between
/// our MATCH and our MERGE.
pub const ENTITY_NOT_FOUND_CODE: &str = "Neo.ClientError.Statement.EntityNotFound";

/// Driver message raised by concurrent access to its internal buffers.
pub const BUFFER_RESIZE_MESSAGE: &str = "Existing exports of data: object cannot be re-sized";

/// Boxed future returned by transaction functions.
pub type TxFuture<'t, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 't>>;

// ============================================================================
// Classification
// ============================================================================

/// The transient failure classes that are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RetryClass {
    /// Connection reset, service unavailable, session expired, transient.
    Network,
    /// Entity-not-found under concurrent writes.
    EntityNotFound,
    /// Driver buffer resize under concurrent access.
    BufferResize,
}

impl RetryClass {
    pub const ALL: &'static [RetryClass] =
        &[RetryClass::Network, RetryClass::EntityNotFound, RetryClass::BufferResize];

    pub const NETWORK_ONLY: &'static [RetryClass] = &[RetryClass::Network];

    /// Classify a failure. `None` means permanent.
    pub fn classify(err: &Error) -> Option<RetryClass> {
        match err {
            Error::Store(store) => Self::classify_store(store),
            _ => None,
        }
    }

    fn classify_store(err: &StoreError) -> Option<RetryClass> {
        if err.message.contains(BUFFER_RESIZE_MESSAGE) {
            return Some(RetryClass::BufferResize);
        }
        match err.kind {
            StoreErrorKind::ServiceUnavailable
            | StoreErrorKind::SessionExpired
            | StoreErrorKind::ConnectionReset
            | StoreErrorKind::Transient => Some(RetryClass::Network),
            StoreErrorKind::Client if err.has_code(ENTITY_NOT_FOUND_CODE) => Some(RetryClass::EntityNotFound),
            StoreErrorKind::Client | StoreErrorKind::Database | StoreErrorKind::Driver => None,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            RetryClass::Network => "network error",
            RetryClass::EntityNotFound => "entity not found",
            RetryClass::BufferResize => "buffer resize error",
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// How long to wait between attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// `base_ms * factor^n`, capped at `max_ms`.
    Exponential { base_ms: u64, factor: u32, max_ms: u64 },
    /// Same wait every time.
    Constant { delay_ms: u64 },
    /// Explicit waits; once exhausted the retry loop uses [`DEFAULT_WAIT`].
    Sequence { delays_ms: Vec<u64> },
}

impl BackoffStrategy {
    /// A fresh wait sequence.
    pub fn delays(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        match self.clone() {
            BackoffStrategy::Exponential { base_ms, factor, max_ms } => {
                let mut next = base_ms;
                Box::new(std::iter::repeat_with(move || {
                    let current = next.min(max_ms);
                    next = next.saturating_mul(u64::from(factor));
                    Duration::from_millis(current)
                }))
            }
            BackoffStrategy::Constant { delay_ms } => {
                Box::new(std::iter::repeat(Duration::from_millis(delay_ms)))
            }
            BackoffStrategy::Sequence { delays_ms } => {
                Box::new(delays_ms.into_iter().map(Duration::from_millis))
            }
        }
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Exponential { base_ms: 1_000, factor: 2, max_ms: 60_000 }
    }
}

/// Attempt budget and backoff for one retry class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, backoff: BackoffStrategy::default() }
    }
}

/// One policy per retry class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub network: RetryPolicy,
    pub entity_not_found: RetryPolicy,
    pub buffer_resize: RetryPolicy,
}

impl RetryConfig {
    pub fn policy(&self, class: RetryClass) -> &RetryPolicy {
        match class {
            RetryClass::Network => &self.network,
            RetryClass::EntityNotFound => &self.entity_not_found,
            RetryClass::BufferResize => &self.buffer_resize,
        }
    }
}

// ============================================================================
// Retry state
// ============================================================================

struct ClassState {
    attempts: u32,
    delays: Box<dyn Iterator<Item = Duration> + Send>,
}

/// Per-call retry bookkeeping.
pub(crate) struct RetryState<'a> {
    config: &'a RetryConfig,
    classes: &'a [RetryClass],
    operation: &'a str,
    state: BTreeMap<RetryClass, ClassState>,
}

impl<'a> RetryState<'a> {
    pub(crate) fn new(config: &'a RetryConfig, classes: &'a [RetryClass], operation: &'a str) -> Self {
        Self { config, classes, operation, state: BTreeMap::new() }
    }

    /// Sleep before the next attempt, or hand back the error when it is
    /// permanent or its class is out of attempts.
    pub(crate) async fn backoff(&mut self, err: Error) -> Result<()> {
        let Some(class) = RetryClass::classify(&err).filter(|c| self.classes.contains(c)) else {
            return Err(err);
        };
        let policy = self.config.policy(class);
        let entry = self
            .state
            .entry(class)
            .or_insert_with(|| ClassState { attempts: 0, delays: policy.backoff.delays() });
        entry.attempts += 1;

        if entry.attempts >= policy.max_attempts {
            error!(
                operation = self.operation,
                attempts = entry.attempts,
                "Giving up after {} on attempt {}: {err}",
                class.describe(),
                entry.attempts
            );
            return Err(err);
        }

        let wait = entry.delays.next().unwrap_or(DEFAULT_WAIT);
        match class {
            RetryClass::EntityNotFound if entry.attempts == 1 => info!(
                operation = self.operation,
                "Entity not found under concurrent writes, retrying in {wait:?}: {err}"
            ),
            _ => warn!(
                operation = self.operation,
                attempt = entry.attempts,
                "Retrying after {} in {wait:?}: {err}",
                class.describe()
            ),
        }
        tokio::time::sleep(wait).await;
        Ok(())
    }

    /// Log one recovery line per class that needed retries.
    pub(crate) fn recovered(&self) {
        for (class, state) in &self.state {
            info!(
                operation = self.operation,
                retries = state.attempts,
                "Recovered from {} after {} retries",
                class.describe(),
                state.attempts
            );
        }
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Run `work` in a fresh transaction of `mode`, committing on success, and
/// retry the whole transaction per `config` for the listed classes.
pub async fn run_with_retry<S, F, T>(
    store: &S,
    config: &RetryConfig,
    classes: &[RetryClass],
    mode: TxMode,
    operation: &str,
    mut work: F,
) -> Result<T>
where
    S: GraphStore,
    F: for<'t> FnMut(&'t mut dyn Transaction) -> TxFuture<'t, T> + Send,
    T: Send,
{
    let mut retry = RetryState::new(config, classes, operation);
    loop {
        match run_once(store, mode, &mut work).await {
            Ok(value) => {
                retry.recovered();
                return Ok(value);
            }
            Err(err) => retry.backoff(err).await?,
        }
    }
}

async fn run_once<S, F, T>(store: &S, mode: TxMode, work: &mut F) -> Result<T>
where
    S: GraphStore,
    F: for<'t> FnMut(&'t mut dyn Transaction) -> TxFuture<'t, T> + Send,
{
    let mut tx = store.begin_tx(mode).await?;
    match work(&mut tx).await {
        Ok(value) => {
            store.commit_tx(tx).await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = store.rollback_tx(tx).await {
                debug!("Rollback after failure also failed: {rollback}");
            }
            Err(err)
        }
    }
}
