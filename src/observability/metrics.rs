//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Count request outcomes for both services
//! - Forward every increment to the `metrics` facade
//! - Expose a Prometheus scrape endpoint
//!
//! # Metrics
//! - `greetings.total{name}` (counter): requests received by the front service
//! - `greetings.error{name}` (counter): stage 1 failures
//! - `greetingsbackend.total` (counter): requests received by the backend
//! - `greetingsbackend.error` (counter): requests rejected by the backend
//!
//! # Design Decisions
//! - Counters only; there is no decrement
//! - Increments are atomic per name + label set, callers never lock
//! - The local registry keeps values readable without a recorder installed

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const GREETINGS_TOTAL: &str = "greetings.total";
pub const GREETINGS_ERROR: &str = "greetings.error";
pub const BACKEND_TOTAL: &str = "greetingsbackend.total";
pub const BACKEND_ERROR: &str = "greetingsbackend.error";

/// Counter identity: metric name plus its label set, sorted by label key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    name: String,
    labels: Vec<(String, String)>,
}

impl CounterKey {
    pub fn new(name: &str, labels: &[(&str, &str)]) -> Self {
        let mut labels: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        labels.sort();
        Self {
            name: name.to_string(),
            labels,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

}

/// Counter registry shared by all requests.
#[derive(Debug, Default)]
pub struct MetricsSink {
    counters: DashMap<CounterKey, AtomicU64>,
}

impl MetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the counter for `name` + `labels`.
    pub fn counter(&self, name: &str, labels: &[(&str, &str)]) -> Counter<'_> {
        Counter {
            sink: self,
            key: CounterKey::new(name, labels),
        }
    }

    /// Increment the counter identified by `key` by exactly one.
    pub fn increment(&self, key: &CounterKey) {
        if let Some(counter) = self.counters.get(key) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters
                .entry(key.clone())
                .or_insert_with(|| AtomicU64::new(0))
                .fetch_add(1, Ordering::Relaxed);
        }
        metrics::counter!(key.name.clone(), &key.labels).increment(1);
    }

    /// Current value of a counter; zero if it was never incremented.
    pub fn value(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        self.counters
            .get(&CounterKey::new(name, labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Snapshot of every counter, sorted by key.
    pub fn snapshot(&self) -> Vec<(CounterKey, u64)> {
        let mut all: Vec<(CounterKey, u64)> = self
            .counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect();
        all.sort_by(|a, b| (&a.0.name, &a.0.labels).cmp(&(&b.0.name, &b.0.labels)));
        all
    }
}

/// A resolved counter handle.
pub struct Counter<'a> {
    sink: &'a MetricsSink,
    key: CounterKey,
}

impl Counter<'_> {
    pub fn increment(&self) {
        self.sink.increment(&self.key);
    }
}

/// Install the Prometheus recorder with an HTTP scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}
