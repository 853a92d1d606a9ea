//! Database state machine core.
//!
//! One `DatabaseState` exists per replicated partition. It owns the table
//! store, the counter store and the provisional lock store, and is mutated
//! only by operations delivered in log order. Every operation is a pure
//! function of the current state and its arguments: no clocks, no
//! randomness, and every listing is in key order.
//!
//! # Transactions
//!
//! `prepare` validates a whole transaction against committed state and, if
//! every update is possible and no key is reserved by another transaction,
//! reserves all keys at once. `commit` applies the reserved writes;
//! `rollback` drops them. A failed prepare leaves no trace.

use super::counter::CounterStore;
use super::lock::{PendingWrite, ProvisionalLockStore};
use super::outcome::Outcome;
use super::snapshot::{DatabaseSnapshot, StateContext};
use super::table::TableStore;
use super::transaction::Transaction;
use super::versioned::Versioned;
use crate::core::error::DatabaseResult;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};

/// Why a prepare did or did not install its locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareOutcome {
    /// All keys are now locked by the transaction.
    Prepared,
    /// At least one key is locked by another transaction.
    Conflict,
    /// At least one update's precondition does not hold.
    PreconditionFailed,
}

impl PrepareOutcome {
    /// Check if the locks were installed.
    pub fn is_prepared(&self) -> bool {
        matches!(self, Self::Prepared)
    }
}

/// Statistics for a database state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Number of touched tables.
    pub table_count: usize,
    /// Committed keys across all tables.
    pub key_count: usize,
    /// Keys under a provisional lock.
    pub locked_key_count: usize,
    /// Number of counters.
    pub counter_count: usize,
    /// Last version handed out.
    pub next_version: u64,
}

/// Replicated table/counter state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseState {
    counters: CounterStore,
    tables: TableStore,
    locks: ProvisionalLockStore,
}

impl DatabaseState {
    /// Create an empty state machine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate from a durable context.
    ///
    /// Each region present in the context is adopted as-is; absent regions
    /// start empty (or at version zero). Fails if the version counter is
    /// exhausted or behind a stored version.
    pub fn init(context: StateContext) -> DatabaseResult<Self> {
        let present = context.present_regions();
        let state = Self {
            counters: CounterStore::from_map(context.counters.unwrap_or_default()),
            tables: TableStore::from_parts(
                context.tables.unwrap_or_default(),
                context.next_version.unwrap_or(0),
            )?,
            locks: ProvisionalLockStore::from_map(context.locks.unwrap_or_default()),
        };
        tracing::info!(
            adopted = ?present,
            tables = state.tables.tables().len(),
            counters = state.counters.len(),
            locked_keys = state.locks.len(),
            next_version = state.tables.next_version(),
            "database state initialized"
        );
        Ok(state)
    }

    /// Export all four regions.
    pub fn export_context(&self) -> StateContext {
        StateContext::complete(
            self.counters.counters(),
            self.tables.tables().clone(),
            self.locks.clone().into_map(),
            self.tables.next_version(),
        )
    }

    /// Capture a snapshot tagged with the last applied log index.
    pub fn snapshot(&self, last_applied: u64) -> DatabaseSnapshot {
        DatabaseSnapshot::from_context(last_applied, self.export_context())
    }

    /// Rebuild a state machine from a snapshot.
    pub fn restore(snapshot: DatabaseSnapshot) -> DatabaseResult<Self> {
        Self::init(snapshot.into_context())
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Names of every table that has been touched.
    pub fn table_names(&self) -> BTreeSet<String> {
        self.tables.table_names()
    }

    /// Snapshot of every counter.
    pub fn counters(&self) -> BTreeMap<String, i64> {
        self.counters.counters()
    }

    /// Ids of transactions currently holding provisional locks.
    pub fn lock_owners(&self) -> BTreeSet<u64> {
        self.locks.lock_owners()
    }

    /// Provisionally locked keys of a table.
    pub fn locked_keys(&self, table: &str) -> BTreeSet<String> {
        self.locks.locked_keys(table)
    }

    /// Last version handed out.
    pub fn next_version(&self) -> u64 {
        self.tables.next_version()
    }

    /// Number of provisionally locked keys.
    pub fn locked_key_count(&self) -> usize {
        self.locks.len()
    }

    /// Get statistics about the state machine.
    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            table_count: self.tables.tables().len(),
            key_count: self.tables.key_count(),
            locked_key_count: self.locks.len(),
            counter_count: self.counters.len(),
            next_version: self.tables.next_version(),
        }
    }

    // ------------------------------------------------------------------
    // Reads (committed state only, locks are ignored)
    // ------------------------------------------------------------------

    /// Number of keys in a table.
    pub fn size(&self, table: &str) -> usize {
        self.tables.size(table)
    }

    /// Check if a table has no keys.
    pub fn is_empty(&self, table: &str) -> bool {
        self.tables.is_empty(table)
    }

    /// Check if a key has a committed value.
    pub fn contains_key(&self, table: &str, key: &str) -> bool {
        self.tables.contains_key(table, key)
    }

    /// Check if any key holds exactly `value`.
    pub fn contains_value(&self, table: &str, value: &[u8]) -> bool {
        self.tables.contains_value(table, value)
    }

    /// Committed value of a key.
    pub fn get(&self, table: &str, key: &str) -> Option<Versioned<Bytes>> {
        self.tables.get(table, key).cloned()
    }

    /// Keys of a table, ascending.
    pub fn key_set(&self, table: &str) -> BTreeSet<String> {
        self.tables.key_set(table)
    }

    /// Values of a table, in key order.
    pub fn values(&self, table: &str) -> Vec<Versioned<Bytes>> {
        self.tables.values(table)
    }

    /// Entries of a table, in key order.
    pub fn entry_set(&self, table: &str) -> Vec<(String, Versioned<Bytes>)> {
        self.tables.entry_set(table)
    }

    // ------------------------------------------------------------------
    // Single-key writes
    // ------------------------------------------------------------------

    fn guard(&self, table: &str, key: &str) -> bool {
        let locked = self.locks.is_locked(table, key);
        if locked {
            tracing::trace!(table, key, "write rejected: key provisionally locked");
        }
        locked
    }

    /// Write a value. Returns the previous value.
    pub fn put(
        &mut self,
        table: &str,
        key: &str,
        value: impl Into<Bytes>,
    ) -> Outcome<Option<Versioned<Bytes>>> {
        if self.guard(table, key) {
            return Outcome::Locked;
        }
        Outcome::Ok(self.tables.put(table, key, value.into()))
    }

    /// Write only if absent. Returns the existing value, or `None` if the
    /// write happened.
    pub fn put_if_absent(
        &mut self,
        table: &str,
        key: &str,
        value: impl Into<Bytes>,
    ) -> Outcome<Option<Versioned<Bytes>>> {
        if self.guard(table, key) {
            return Outcome::Locked;
        }
        Outcome::Ok(self.tables.put_if_absent(table, key, value.into()))
    }

    /// Remove a key. Returns the removed value.
    pub fn remove(&mut self, table: &str, key: &str) -> Outcome<Option<Versioned<Bytes>>> {
        if self.guard(table, key) {
            return Outcome::Locked;
        }
        Outcome::Ok(self.tables.remove(table, key))
    }

    /// Remove a key if its committed value equals `expected`.
    pub fn remove_if_value(&mut self, table: &str, key: &str, expected: &[u8]) -> Outcome<bool> {
        if self.guard(table, key) {
            return Outcome::Locked;
        }
        Outcome::Ok(self.tables.remove_if_value(table, key, expected))
    }

    /// Remove a key if its committed version equals `expected`.
    pub fn remove_if_version(&mut self, table: &str, key: &str, expected: u64) -> Outcome<bool> {
        if self.guard(table, key) {
            return Outcome::Locked;
        }
        Outcome::Ok(self.tables.remove_if_version(table, key, expected))
    }

    /// Replace a value if the committed value equals `old_value`.
    pub fn replace_value(
        &mut self,
        table: &str,
        key: &str,
        old_value: &[u8],
        new_value: impl Into<Bytes>,
    ) -> Outcome<bool> {
        if self.guard(table, key) {
            return Outcome::Locked;
        }
        Outcome::Ok(
            self.tables
                .replace_value(table, key, old_value, new_value.into()),
        )
    }

    /// Replace a value if the committed version equals `old_version`.
    pub fn replace_version(
        &mut self,
        table: &str,
        key: &str,
        old_version: u64,
        new_value: impl Into<Bytes>,
    ) -> Outcome<bool> {
        if self.guard(table, key) {
            return Outcome::Locked;
        }
        Outcome::Ok(
            self.tables
                .replace_version(table, key, old_version, new_value.into()),
        )
    }

    /// Remove every key of a table.
    ///
    /// Refused while any key of the table is provisionally locked, so an
    /// in-flight transaction never loses the state it validated against.
    pub fn clear(&mut self, table: &str) -> Outcome<()> {
        if self.locks.has_locks(table) {
            tracing::trace!(table, "clear rejected: transactions in progress");
            return Outcome::Locked;
        }
        self.tables.clear(table);
        Outcome::Ok(())
    }

    // ------------------------------------------------------------------
    // Counters
    // ------------------------------------------------------------------

    /// Increment a counter and return the new value.
    pub fn next_value(&mut self, name: &str) -> i64 {
        self.counters.next_value(name)
    }

    /// Current value of a counter.
    pub fn current_value(&mut self, name: &str) -> i64 {
        self.counters.current_value(name)
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Prepare a transaction, reporting why it failed if it did.
    pub fn try_prepare(&mut self, txn: &Transaction) -> PrepareOutcome {
        let conflict = txn
            .iter()
            .any(|u| self.locks.is_locked_by_another(&u.table, &u.key, txn.id));
        if conflict {
            tracing::debug!(txn_id = txn.id, updates = txn.len(), "prepare conflict");
            return PrepareOutcome::Conflict;
        }

        let possible = txn
            .iter()
            .all(|u| u.is_possible(self.tables.get(&u.table, &u.key)));
        if !possible {
            tracing::debug!(
                txn_id = txn.id,
                updates = txn.len(),
                "prepare precondition failed"
            );
            return PrepareOutcome::PreconditionFailed;
        }

        for update in txn.iter() {
            self.locks
                .lock(&update.table, &update.key, txn.id, update.pending_write());
        }
        tracing::debug!(txn_id = txn.id, updates = txn.len(), "transaction prepared");
        PrepareOutcome::Prepared
    }

    /// Prepare a transaction. `false` means retry with fresh reads.
    pub fn prepare(&mut self, txn: &Transaction) -> bool {
        self.try_prepare(txn).is_prepared()
    }

    /// Apply every pending write this transaction still owns.
    ///
    /// Updates whose key is free or owned by another transaction are
    /// skipped. Always returns `true`.
    pub fn commit(&mut self, txn: &Transaction) -> bool {
        let mut applied = 0usize;
        for update in txn.iter() {
            let Some(pending) = self.locks.release(&update.table, &update.key, txn.id) else {
                continue;
            };
            match pending {
                PendingWrite::Put(value) => {
                    self.tables.put(&update.table, &update.key, value);
                }
                PendingWrite::Tombstone => {
                    self.tables.remove(&update.table, &update.key);
                }
            }
            applied += 1;
        }
        tracing::debug!(txn_id = txn.id, applied, "transaction committed");
        true
    }

    /// Drop every lock this transaction still owns without touching
    /// committed state. Always returns `true`.
    pub fn rollback(&mut self, txn: &Transaction) -> bool {
        let mut released = 0usize;
        for update in txn.iter() {
            if self
                .locks
                .release(&update.table, &update.key, txn.id)
                .is_some()
            {
                released += 1;
            }
        }
        tracing::debug!(txn_id = txn.id, released, "transaction rolled back");
        true
    }

    /// Prepare and, if that succeeds, commit immediately.
    pub fn prepare_and_commit(&mut self, txn: &Transaction) -> bool {
        self.prepare(txn) && self.commit(txn)
    }
}
