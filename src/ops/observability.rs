//! Metrics.
//!
//! Metric namespace: `coordstore.*`. Metrics are local observations of a
//! replica; nothing here feeds back into replicated state.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metric names.
pub mod metrics {
    /// Entries applied by the apply loop.
    pub const APPLY_ENTRIES_TOTAL: &str = "coordstore.apply.entries_total";
    /// Last applied log index gauge.
    pub const APPLY_LAST_INDEX: &str = "coordstore.apply.last_index";
    /// Prepare attempts.
    pub const TXN_PREPARE_TOTAL: &str = "coordstore.txn.prepare_total";
    /// Prepares that installed their locks.
    pub const TXN_PREPARED_TOTAL: &str = "coordstore.txn.prepared_total";
    /// Prepares rejected by another transaction's lock.
    pub const TXN_CONFLICT_TOTAL: &str = "coordstore.txn.conflict_total";
    /// Prepares rejected by a failed precondition.
    pub const TXN_PRECONDITION_FAILED_TOTAL: &str = "coordstore.txn.precondition_failed_total";
    /// Prepares refused for exceeding the transaction update limit.
    pub const TXN_OVERSIZED_TOTAL: &str = "coordstore.txn.oversized_total";
    /// Commits applied.
    pub const TXN_COMMIT_TOTAL: &str = "coordstore.txn.commit_total";
    /// Rollbacks applied.
    pub const TXN_ROLLBACK_TOTAL: &str = "coordstore.txn.rollback_total";
    /// Single-key operations answered with `Locked`.
    pub const KV_LOCKED_TOTAL: &str = "coordstore.kv.locked_total";
    /// Last version handed out gauge.
    pub const KV_NEXT_VERSION: &str = "coordstore.kv.next_version";
    /// Provisionally locked keys gauge.
    pub const KV_LOCKED_KEYS: &str = "coordstore.kv.locked_keys";
    /// Entries rejected as protocol violations.
    pub const PROTOCOL_VIOLATION_TOTAL: &str = "coordstore.protocol_violation_total";
}

/// Counter and gauge registry.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: RwLock<BTreeMap<String, AtomicU64>>,
    gauges: RwLock<BTreeMap<String, AtomicU64>>,
}

impl MetricsRegistry {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter.
    pub fn counter_inc(&self, name: &str) {
        self.counter_add(name, 1);
    }

    /// Add to a counter.
    pub fn counter_add(&self, name: &str, value: u64) {
        if let Some(counter) = self.counters.read().get(name) {
            counter.fetch_add(value, Ordering::Relaxed);
            return;
        }
        self.counters
            .write()
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(value, Ordering::Relaxed);
    }

    /// Get counter value.
    pub fn counter_get(&self, name: &str) -> u64 {
        self.counters
            .read()
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Set a gauge value.
    pub fn gauge_set(&self, name: &str, value: u64) {
        if let Some(gauge) = self.gauges.read().get(name) {
            gauge.store(value, Ordering::Relaxed);
            return;
        }
        self.gauges
            .write()
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .store(value, Ordering::Relaxed);
    }

    /// Get gauge value.
    pub fn gauge_get(&self, name: &str) -> u64 {
        self.gauges
            .read()
            .get(name)
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Export metrics in Prometheus text format.
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();

        for (name, value) in self.counters.read().iter() {
            let prometheus_name = name.replace('.', "_");
            output.push_str(&format!(
                "# TYPE {} counter\n{} {}\n",
                prometheus_name,
                prometheus_name,
                value.load(Ordering::Relaxed)
            ));
        }

        for (name, value) in self.gauges.read().iter() {
            let prometheus_name = name.replace('.', "_");
            output.push_str(&format!(
                "# TYPE {} gauge\n{} {}\n",
                prometheus_name,
                prometheus_name,
                value.load(Ordering::Relaxed)
            ));
        }

        output
    }
}

/// Engine-level metrics facade.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Underlying registry.
    pub registry: MetricsRegistry,
}

impl EngineMetrics {
    /// Create engine metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an applied entry.
    pub fn record_apply(&self, index: u64) {
        self.registry.counter_inc(metrics::APPLY_ENTRIES_TOTAL);
        self.registry.gauge_set(metrics::APPLY_LAST_INDEX, index);
    }

    /// Record a prepare attempt and how it ended.
    pub fn record_prepare(&self, outcome: crate::partition::state_machine::PrepareOutcome) {
        use crate::partition::state_machine::PrepareOutcome;

        self.registry.counter_inc(metrics::TXN_PREPARE_TOTAL);
        let name = match outcome {
            PrepareOutcome::Prepared => metrics::TXN_PREPARED_TOTAL,
            PrepareOutcome::Conflict => metrics::TXN_CONFLICT_TOTAL,
            PrepareOutcome::PreconditionFailed => metrics::TXN_PRECONDITION_FAILED_TOTAL,
        };
        self.registry.counter_inc(name);
    }

    /// Record a prepare refused by the transaction update limit.
    pub fn record_oversized(&self) {
        self.registry.counter_inc(metrics::TXN_OVERSIZED_TOTAL);
    }

    /// Record a commit.
    pub fn record_commit(&self) {
        self.registry.counter_inc(metrics::TXN_COMMIT_TOTAL);
    }

    /// Record a rollback.
    pub fn record_rollback(&self) {
        self.registry.counter_inc(metrics::TXN_ROLLBACK_TOTAL);
    }

    /// Record a single-key operation answered with `Locked`.
    pub fn record_locked(&self) {
        self.registry.counter_inc(metrics::KV_LOCKED_TOTAL);
    }

    /// Record a rejected payload.
    pub fn record_protocol_violation(&self) {
        self.registry.counter_inc(metrics::PROTOCOL_VIOLATION_TOTAL);
    }

    /// Update state gauges.
    pub fn set_state_gauges(&self, next_version: u64, locked_keys: usize) {
        self.registry.gauge_set(metrics::KV_NEXT_VERSION, next_version);
        self.registry
            .gauge_set(metrics::KV_LOCKED_KEYS, locked_keys as u64);
    }
}
