//! Tests for metrics and telemetry wiring.

mod common;

use bytes::Bytes;
use coordstore::core::config::TelemetryConfig;
use coordstore::ops::observability::{metrics, MetricsRegistry};
use coordstore::ops::telemetry::init_tracing;
use coordstore::partition::apply_loop::{ApplyLoop, DatabaseCommand};
use coordstore::partition::transaction::Transaction;
use coordstore::partition::update::DatabaseUpdate;

fn put_cmd(key: &str) -> DatabaseCommand {
    DatabaseCommand::Put {
        table: "t".to_string(),
        key: key.to_string(),
        value: Bytes::from_static(b"v"),
    }
}

// ============================================================================
// Metrics Tests
// ============================================================================

#[test]
fn apply_records_entries_and_gauges() {
    let mut apply = ApplyLoop::default();
    apply.apply(1, put_cmd("a")).unwrap();
    apply.apply(2, put_cmd("b")).unwrap();
    apply.apply(7, put_cmd("a")).unwrap();

    let registry = &apply.metrics().registry;
    assert_eq!(registry.counter_get(metrics::APPLY_ENTRIES_TOTAL), 3);
    assert_eq!(registry.gauge_get(metrics::APPLY_LAST_INDEX), 7);
    assert_eq!(registry.gauge_get(metrics::KV_NEXT_VERSION), 3);
    assert_eq!(registry.gauge_get(metrics::KV_LOCKED_KEYS), 0);
}

#[test]
fn transaction_metrics() {
    let mut apply = ApplyLoop::default();
    let t1 = Transaction::new(
        1,
        vec![
            DatabaseUpdate::put("t", "a", "1"),
            DatabaseUpdate::put("t", "b", "2"),
        ],
    );
    let t2 = common::single(2, DatabaseUpdate::put("t", "a", "x"));
    let t3 = common::single(3, DatabaseUpdate::put_if_version_match("t", "c", "x", 4));

    apply.apply(1, DatabaseCommand::Prepare(t1.clone())).unwrap();
    assert_eq!(
        apply.metrics().registry.gauge_get(metrics::KV_LOCKED_KEYS),
        2
    );
    apply.apply(2, DatabaseCommand::Prepare(t2.clone())).unwrap();
    apply.apply(3, DatabaseCommand::Prepare(t3)).unwrap();
    apply.apply(4, put_cmd("a")).unwrap();
    apply.apply(5, DatabaseCommand::Commit(t1)).unwrap();
    apply.apply(6, DatabaseCommand::Rollback(t2)).unwrap();

    let registry = &apply.metrics().registry;
    assert_eq!(registry.counter_get(metrics::TXN_PREPARE_TOTAL), 3);
    assert_eq!(registry.counter_get(metrics::TXN_PREPARED_TOTAL), 1);
    assert_eq!(registry.counter_get(metrics::TXN_CONFLICT_TOTAL), 1);
    assert_eq!(
        registry.counter_get(metrics::TXN_PRECONDITION_FAILED_TOTAL),
        1
    );
    assert_eq!(registry.counter_get(metrics::KV_LOCKED_TOTAL), 1);
    assert_eq!(registry.counter_get(metrics::TXN_COMMIT_TOTAL), 1);
    assert_eq!(registry.counter_get(metrics::TXN_ROLLBACK_TOTAL), 1);
    assert_eq!(registry.gauge_get(metrics::KV_LOCKED_KEYS), 0);
}

#[test]
fn prepare_and_commit_counts_commit_only_on_success() {
    let mut apply = ApplyLoop::default();
    let ok = common::single(1, DatabaseUpdate::put("t", "a", "1"));
    let fail = common::single(2, DatabaseUpdate::put_if_absent("t", "a", "2"));

    apply.apply(1, DatabaseCommand::PrepareAndCommit(ok)).unwrap();
    apply.apply(2, DatabaseCommand::PrepareAndCommit(fail)).unwrap();

    let registry = &apply.metrics().registry;
    assert_eq!(registry.counter_get(metrics::TXN_PREPARE_TOTAL), 2);
    assert_eq!(registry.counter_get(metrics::TXN_COMMIT_TOTAL), 1);
}

#[test]
fn oversized_prepares_counted() {
    let mut apply = ApplyLoop::new(common::engine_config(1, 100));
    let txn = Transaction::new(
        1,
        vec![
            DatabaseUpdate::put("t", "a", "1"),
            DatabaseUpdate::put("t", "b", "2"),
        ],
    );
    apply.apply(1, DatabaseCommand::Prepare(txn.clone())).unwrap();
    apply.apply(2, DatabaseCommand::Commit(txn)).unwrap();

    let registry = &apply.metrics().registry;
    assert_eq!(registry.counter_get(metrics::TXN_OVERSIZED_TOTAL), 1);
    assert_eq!(registry.counter_get(metrics::TXN_PREPARE_TOTAL), 0);
    assert_eq!(registry.counter_get(metrics::TXN_COMMIT_TOTAL), 1);
    assert_eq!(registry.counter_get(metrics::APPLY_ENTRIES_TOTAL), 2);
}

#[test]
fn protocol_violations_counted() {
    let mut apply = ApplyLoop::default();
    assert!(apply.apply_encoded(1, &[0xFF; 8]).is_err());
    assert!(apply.apply_encoded(1, &[]).is_err());

    let registry = &apply.metrics().registry;
    assert_eq!(registry.counter_get(metrics::PROTOCOL_VIOLATION_TOTAL), 2);
    assert_eq!(registry.counter_get(metrics::APPLY_ENTRIES_TOTAL), 0);
}

#[test]
fn prometheus_export_uses_underscored_names() {
    let mut apply = ApplyLoop::default();
    apply.apply(1, put_cmd("a")).unwrap();

    let output = apply.metrics().registry.export_prometheus();
    assert!(output.contains("# TYPE coordstore_apply_entries_total counter"));
    assert!(output.contains("coordstore_apply_entries_total 1"));
    assert!(output.contains("# TYPE coordstore_kv_next_version gauge"));
}

#[test]
fn registry_starts_empty() {
    let registry = MetricsRegistry::new();
    assert_eq!(registry.counter_get(metrics::TXN_COMMIT_TOTAL), 0);
    assert!(registry.export_prometheus().is_empty());
}

// ============================================================================
// Telemetry Tests
// ============================================================================

#[test]
fn init_tracing_installs_once() {
    let config = TelemetryConfig {
        log_level: "debug".to_string(),
    };
    let first = init_tracing(&config);
    let second = init_tracing(&config);
    assert!(!second);
    if cfg!(feature = "telemetry") {
        assert!(first);
    }
}
