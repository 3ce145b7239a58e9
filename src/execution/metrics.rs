//! Metrics sink injected into a [`Session`](crate::Session).

use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::Mutex;

/// Metrics collector trait.
///
/// Implementations forward to whatever stats backend the caller runs.
/// [`NoopMetrics`] is used when metrics are disabled.
pub trait MetricsSink: Send + Sync {
    /// Add `value` to the counter `key`.
    fn incr(&self, key: &str, value: u64);

    /// Record how long `key` took.
    fn timing(&self, key: &str, elapsed: Duration);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn incr(&self, _key: &str, _value: u64) {}
    fn timing(&self, _key: &str, _elapsed: Duration) {}
}

/// Keeps counters and timings in memory.
#[derive(Debug, Default)]
pub struct MemoryMetrics {
    counters: Mutex<BTreeMap<String, u64>>,
    timings: Mutex<BTreeMap<String, Vec<Duration>>>,
}

impl MemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, key: &str) -> u64 {
        self.counters.lock().get(key).copied().unwrap_or(0)
    }

    pub fn counters(&self) -> BTreeMap<String, u64> {
        self.counters.lock().clone()
    }

    pub fn timings(&self, key: &str) -> usize {
        self.timings.lock().get(key).map_or(0, Vec::len)
    }
}

impl MetricsSink for MemoryMetrics {
    fn incr(&self, key: &str, value: u64) {
        *self.counters.lock().entry(key.to_owned()).or_insert(0) += value;
    }

    fn timing(&self, key: &str, elapsed: Duration) {
        self.timings.lock().entry(key.to_owned()).or_default().push(elapsed);
    }
}
