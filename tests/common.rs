//! Common test utilities.
//!
//! This module contains shared helpers for integration tests.
//! Import with `mod common;` in test files.

#![allow(dead_code)]

use coordstore::core::config::EngineConfig;
use coordstore::partition::state_machine::DatabaseState;
use coordstore::partition::transaction::Transaction;
use coordstore::partition::update::DatabaseUpdate;
use std::io::Write;
use tempfile::NamedTempFile;

/// Create a minimal valid configuration file.
pub fn create_minimal_config() -> NamedTempFile {
    let config_content = r#"
[engine]
partition_id = "test"
"#;

    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(config_content.as_bytes())
        .expect("Failed to write config");
    file
}

/// Create a configuration file with custom settings.
pub fn create_config_with_settings(
    max_transaction_updates: usize,
    interval_entries: u64,
    log_level: &str,
) -> NamedTempFile {
    let config_content = format!(
        r#"
[engine]
partition_id = "test"
max_transaction_updates = {}

[snapshot]
interval_entries = {}

[telemetry]
log_level = "{}"
"#,
        max_transaction_updates, interval_entries, log_level
    );

    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(config_content.as_bytes())
        .expect("Failed to write config");
    file
}

/// Config with a transaction size limit and snapshot interval.
pub fn engine_config(max_transaction_updates: usize, interval_entries: u64) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.engine.partition_id = "test".to_string();
    config.engine.max_transaction_updates = max_transaction_updates;
    config.snapshot.interval_entries = interval_entries;
    config
}

/// State machine pre-populated with `count` keys in `table`.
pub fn populated_state(table: &str, count: usize) -> DatabaseState {
    let mut db = DatabaseState::new();
    for i in 0..count {
        db.put(table, &format!("key{}", i), format!("value{}", i));
    }
    db
}

/// Single-update transaction.
pub fn single(id: u64, update: DatabaseUpdate) -> Transaction {
    Transaction::new(id, vec![update])
}
