//! Replicated command processing and apply loop.
//!
//! The replication layer decides the order of commands; the apply loop
//! executes them one at a time against the partition's [`DatabaseState`]
//! and hands back the result to be returned for that log position. All
//! replicas fed the same entries produce the same results.

use super::outcome::Outcome;
use super::snapshot::DatabaseSnapshot;
use super::state_machine::{DatabaseState, DatabaseStats};
use super::transaction::Transaction;
use super::versioned::Versioned;
use crate::core::config::EngineConfig;
use crate::core::error::{DatabaseError, DatabaseResult};
use crate::ops::observability::EngineMetrics;
use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A replicated operation against the database state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseCommand {
    /// List touched tables.
    TableNames,
    /// Snapshot all counters.
    Counters,
    /// Number of keys in a table.
    Size { table: String },
    /// Check if a table is empty.
    IsEmpty { table: String },
    /// Check if a key exists.
    ContainsKey { table: String, key: String },
    /// Check if any key holds a value.
    ContainsValue { table: String, value: Bytes },
    /// Read a key.
    Get { table: String, key: String },
    /// List keys.
    KeySet { table: String },
    /// List values.
    Values { table: String },
    /// List entries.
    EntrySet { table: String },
    /// Unconditional write.
    Put {
        table: String,
        key: String,
        value: Bytes,
    },
    /// Write if absent.
    PutIfAbsent {
        table: String,
        key: String,
        value: Bytes,
    },
    /// Unconditional remove.
    Remove { table: String, key: String },
    /// Remove if the value matches.
    RemoveIfValue {
        table: String,
        key: String,
        value: Bytes,
    },
    /// Remove if the version matches.
    RemoveIfVersion {
        table: String,
        key: String,
        version: u64,
    },
    /// Replace if the value matches.
    ReplaceValue {
        table: String,
        key: String,
        old_value: Bytes,
        new_value: Bytes,
    },
    /// Replace if the version matches.
    ReplaceVersion {
        table: String,
        key: String,
        old_version: u64,
        new_value: Bytes,
    },
    /// Remove every key of a table.
    Clear { table: String },
    /// Increment a counter.
    NextValue { counter: String },
    /// Read a counter.
    CurrentValue { counter: String },
    /// Validate and lock a transaction.
    Prepare(Transaction),
    /// Apply a prepared transaction.
    Commit(Transaction),
    /// Abandon a prepared transaction.
    Rollback(Transaction),
    /// Prepare then commit.
    PrepareAndCommit(Transaction),
}

impl DatabaseCommand {
    /// Serialize this command to bytes.
    pub fn encode(&self) -> DatabaseResult<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| DatabaseError::protocol_violation(format!("unencodable command: {e}")))
    }

    /// Deserialize a command from bytes.
    ///
    /// Unknown command tags or update kinds mean the sender speaks a
    /// protocol this replica does not.
    pub fn decode(bytes: &[u8]) -> DatabaseResult<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| DatabaseError::protocol_violation(format!("undecodable command: {e}")))
    }

    /// The transaction this command would prepare, if any.
    pub fn prepared_transaction(&self) -> Option<&Transaction> {
        match self {
            Self::Prepare(txn) | Self::PrepareAndCommit(txn) => Some(txn),
            _ => None,
        }
    }
}

/// Value produced by a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandOutput {
    /// No value (`clear`).
    Unit,
    /// Boolean result (conditional ops, predicates, transactions).
    Flag(bool),
    /// A size.
    Count(usize),
    /// A single (possibly absent) versioned value.
    Value(Option<Versioned<Bytes>>),
    /// Table keys.
    Keys(BTreeSet<String>),
    /// Table values in key order.
    Values(Vec<Versioned<Bytes>>),
    /// Table entries in key order.
    Entries(Vec<(String, Versioned<Bytes>)>),
    /// A counter value.
    Counter(i64),
    /// Table names.
    TableNames(BTreeSet<String>),
    /// All counters.
    Counters(BTreeMap<String, i64>),
}

/// Result of applying one log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyResult {
    /// Log index of the entry.
    pub index: u64,
    /// Replicated response.
    pub outcome: Outcome<CommandOutput>,
}

/// Shared read handle for monitoring and snapshot code.
///
/// Readers never mutate; all writes go through the single [`ApplyLoop`].
#[derive(Debug, Clone)]
pub struct DatabaseReader {
    state: Arc<RwLock<DatabaseState>>,
}

impl DatabaseReader {
    /// Run a closure against the current state.
    pub fn with_state<R>(&self, f: impl FnOnce(&DatabaseState) -> R) -> R {
        f(&*self.state.read())
    }

    /// Committed value of a key.
    pub fn get(&self, table: &str, key: &str) -> Option<Versioned<Bytes>> {
        self.state.read().get(table, key)
    }

    /// Names of touched tables.
    pub fn table_names(&self) -> BTreeSet<String> {
        self.state.read().table_names()
    }

    /// Snapshot of all counters.
    pub fn counters(&self) -> BTreeMap<String, i64> {
        self.state.read().counters()
    }

    /// State statistics.
    pub fn stats(&self) -> DatabaseStats {
        self.state.read().stats()
    }
}

/// Apply loop for one partition.
///
/// Entries MUST be applied in strictly increasing log index order.
pub struct ApplyLoop {
    state: Arc<RwLock<DatabaseState>>,
    config: EngineConfig,
    metrics: Arc<EngineMetrics>,
    last_applied: u64,
    applied_since_snapshot: u64,
}

impl ApplyLoop {
    /// Create an apply loop over an empty state.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_state(config, DatabaseState::new(), 0)
    }

    /// Create an apply loop over existing state.
    pub fn with_state(config: EngineConfig, state: DatabaseState, last_applied: u64) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
            config,
            metrics: Arc::new(EngineMetrics::new()),
            last_applied,
            applied_since_snapshot: 0,
        }
    }

    /// Create an apply loop from a snapshot.
    pub fn from_snapshot(config: EngineConfig, snapshot: DatabaseSnapshot) -> DatabaseResult<Self> {
        let last_applied = snapshot.last_applied;
        let state = DatabaseState::restore(snapshot)?;
        Ok(Self::with_state(config, state, last_applied))
    }

    /// Get a read handle to the state.
    pub fn reader(&self) -> DatabaseReader {
        DatabaseReader {
            state: Arc::clone(&self.state),
        }
    }

    /// Get the metrics.
    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    /// Get the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the last applied log index.
    pub fn last_applied(&self) -> u64 {
        self.last_applied
    }

    /// Apply an encoded entry.
    ///
    /// A payload that fails to decode is rejected without touching state
    /// or advancing the applied index.
    pub fn apply_encoded(&mut self, index: u64, payload: &[u8]) -> DatabaseResult<ApplyResult> {
        let command = match DatabaseCommand::decode(payload) {
            Ok(command) => command,
            Err(err) => {
                self.metrics.record_protocol_violation();
                tracing::error!(
                    partition = %self.config.engine.partition_id,
                    index,
                    error = %err,
                    "rejecting replicated entry"
                );
                return Err(err);
            }
        };
        self.apply(index, command)
    }

    /// Apply a command at the given log index.
    pub fn apply(&mut self, index: u64, command: DatabaseCommand) -> DatabaseResult<ApplyResult> {
        if index <= self.last_applied {
            return Err(DatabaseError::ApplyOrder {
                index,
                last_applied: self.last_applied,
            });
        }

        if let Some(txn) = self.oversized(&command) {
            tracing::warn!(
                partition = %self.config.engine.partition_id,
                index,
                txn_id = txn.id,
                updates = txn.len(),
                limit = self.config.engine.max_transaction_updates,
                "transaction exceeds update limit, prepare refused"
            );
            self.metrics.record_oversized();
            self.advance(index);
            return Ok(ApplyResult {
                index,
                outcome: Outcome::Ok(CommandOutput::Flag(false)),
            });
        }

        let outcome = {
            let mut state = self.state.write();
            let outcome = Self::execute(&mut *state, &self.metrics, command);
            self.metrics
                .set_state_gauges(state.next_version(), state.locked_key_count());
            outcome
        };
        if outcome.is_locked() {
            self.metrics.record_locked();
        }

        self.advance(index);
        Ok(ApplyResult { index, outcome })
    }

    /// A prepare whose transaction exceeds the configured limit.
    ///
    /// Commit and rollback are never limited, so a transaction prepared
    /// under a larger limit can still be released.
    fn oversized<'a>(&self, command: &'a DatabaseCommand) -> Option<&'a Transaction> {
        let limit = self.config.transaction_limit()?;
        command.prepared_transaction().filter(|txn| txn.len() > limit)
    }

    fn advance(&mut self, index: u64) {
        self.last_applied = index;
        self.applied_since_snapshot += 1;
        self.metrics.record_apply(index);
    }

    fn execute(
        state: &mut DatabaseState,
        metrics: &EngineMetrics,
        command: DatabaseCommand,
    ) -> Outcome<CommandOutput> {
        use CommandOutput as Out;

        match command {
            DatabaseCommand::TableNames => Outcome::Ok(Out::TableNames(state.table_names())),
            DatabaseCommand::Counters => Outcome::Ok(Out::Counters(state.counters())),
            DatabaseCommand::Size { table } => Outcome::Ok(Out::Count(state.size(&table))),
            DatabaseCommand::IsEmpty { table } => Outcome::Ok(Out::Flag(state.is_empty(&table))),
            DatabaseCommand::ContainsKey { table, key } => {
                Outcome::Ok(Out::Flag(state.contains_key(&table, &key)))
            }
            DatabaseCommand::ContainsValue { table, value } => {
                Outcome::Ok(Out::Flag(state.contains_value(&table, &value)))
            }
            DatabaseCommand::Get { table, key } => Outcome::Ok(Out::Value(state.get(&table, &key))),
            DatabaseCommand::KeySet { table } => Outcome::Ok(Out::Keys(state.key_set(&table))),
            DatabaseCommand::Values { table } => Outcome::Ok(Out::Values(state.values(&table))),
            DatabaseCommand::EntrySet { table } => {
                Outcome::Ok(Out::Entries(state.entry_set(&table)))
            }
            DatabaseCommand::Put { table, key, value } => {
                state.put(&table, &key, value).map(Out::Value)
            }
            DatabaseCommand::PutIfAbsent { table, key, value } => {
                state.put_if_absent(&table, &key, value).map(Out::Value)
            }
            DatabaseCommand::Remove { table, key } => state.remove(&table, &key).map(Out::Value),
            DatabaseCommand::RemoveIfValue { table, key, value } => {
                state.remove_if_value(&table, &key, &value).map(Out::Flag)
            }
            DatabaseCommand::RemoveIfVersion {
                table,
                key,
                version,
            } => state.remove_if_version(&table, &key, version).map(Out::Flag),
            DatabaseCommand::ReplaceValue {
                table,
                key,
                old_value,
                new_value,
            } => state
                .replace_value(&table, &key, &old_value, new_value)
                .map(Out::Flag),
            DatabaseCommand::ReplaceVersion {
                table,
                key,
                old_version,
                new_value,
            } => state
                .replace_version(&table, &key, old_version, new_value)
                .map(Out::Flag),
            DatabaseCommand::Clear { table } => state.clear(&table).map(|()| Out::Unit),
            DatabaseCommand::NextValue { counter } => {
                Outcome::Ok(Out::Counter(state.next_value(&counter)))
            }
            DatabaseCommand::CurrentValue { counter } => {
                Outcome::Ok(Out::Counter(state.current_value(&counter)))
            }
            DatabaseCommand::Prepare(txn) => {
                let prepared = state.try_prepare(&txn);
                metrics.record_prepare(prepared);
                Outcome::Ok(Out::Flag(prepared.is_prepared()))
            }
            DatabaseCommand::Commit(txn) => {
                metrics.record_commit();
                Outcome::Ok(Out::Flag(state.commit(&txn)))
            }
            DatabaseCommand::Rollback(txn) => {
                metrics.record_rollback();
                Outcome::Ok(Out::Flag(state.rollback(&txn)))
            }
            DatabaseCommand::PrepareAndCommit(txn) => {
                let prepared = state.try_prepare(&txn);
                metrics.record_prepare(prepared);
                let committed = prepared.is_prepared() && state.commit(&txn);
                if committed {
                    metrics.record_commit();
                }
                Outcome::Ok(Out::Flag(committed))
            }
        }
    }

    /// Check if enough entries were applied to warrant a snapshot.
    pub fn should_snapshot(&self) -> bool {
        self.applied_since_snapshot >= self.config.snapshot.interval_entries
    }

    /// Capture a snapshot at the last applied index.
    pub fn snapshot(&mut self) -> DatabaseSnapshot {
        let snapshot = self.state.read().snapshot(self.last_applied);
        self.applied_since_snapshot = 0;
        tracing::info!(
            partition = %self.config.engine.partition_id,
            last_applied = snapshot.last_applied,
            records = snapshot.record_count(),
            locks = snapshot.lock_count(),
            "snapshot captured"
        );
        snapshot
    }

    /// Replace the state with an encoded snapshot.
    ///
    /// The bytes are fully decoded and validated before anything is
    /// replaced, so a corrupt snapshot leaves the running state untouched.
    pub fn install_snapshot(&mut self, bytes: &[u8]) -> DatabaseResult<()> {
        let snapshot = DatabaseSnapshot::deserialize(bytes)?;
        let last_applied = snapshot.last_applied;
        let restored = DatabaseState::restore(snapshot)?;
        *self.state.write() = restored;
        self.last_applied = last_applied;
        self.applied_since_snapshot = 0;
        tracing::info!(
            partition = %self.config.engine.partition_id,
            last_applied,
            "snapshot installed"
        );
        Ok(())
    }
}

impl Default for ApplyLoop {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
