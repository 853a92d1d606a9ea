//! Provisional lock store.
//!
//! A prepared transaction reserves each key it updates by recording its id
//! and the write it intends to make. Presence of an entry *is* the lock;
//! there is no separate mutex. Each (table, key) pair cycles
//! Free → Locked(txn_id, pending) → Free.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The write a prepared transaction will apply at commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingWrite {
    /// Write this value under a new version.
    Put(Bytes),
    /// Delete the key.
    Tombstone,
}

/// A provisional lock held by one transaction on one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionalLock {
    /// Owning transaction.
    pub txn_id: u64,
    /// Write to apply on commit.
    pub pending: PendingWrite,
}

/// Key → lock for one table.
pub type LockMap = BTreeMap<String, ProvisionalLock>;

/// Per-table provisional locks.
///
/// Tables without locks are not kept, so a table present here always has
/// at least one locked key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionalLockStore {
    locks: BTreeMap<String, LockMap>,
    /// Locked keys across all tables.
    count: usize,
}

impl ProvisionalLockStore {
    /// Create an empty lock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt existing locks, dropping empty tables.
    pub fn from_map(mut locks: BTreeMap<String, LockMap>) -> Self {
        locks.retain(|_, keys| !keys.is_empty());
        let count = locks.values().map(|keys| keys.len()).sum();
        Self { locks, count }
    }

    /// Consume and return the lock map.
    pub fn into_map(self) -> BTreeMap<String, LockMap> {
        self.locks
    }

    /// Lock held on a key, if any.
    pub fn get(&self, table: &str, key: &str) -> Option<&ProvisionalLock> {
        self.locks.get(table).and_then(|keys| keys.get(key))
    }

    /// Check if any transaction holds the key.
    pub fn is_locked(&self, table: &str, key: &str) -> bool {
        self.get(table, key).is_some()
    }

    /// Check if a transaction other than `txn_id` holds the key.
    pub fn is_locked_by_another(&self, table: &str, key: &str, txn_id: u64) -> bool {
        self.get(table, key).is_some_and(|lock| lock.txn_id != txn_id)
    }

    /// Check if any key of the table is locked.
    pub fn has_locks(&self, table: &str) -> bool {
        self.locks.contains_key(table)
    }

    /// Reserve a key for `txn_id`, replacing any lock the same transaction
    /// already holds there.
    pub fn lock(&mut self, table: &str, key: &str, txn_id: u64, pending: PendingWrite) {
        let previous = self
            .locks
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), ProvisionalLock { txn_id, pending });
        if previous.is_none() {
            self.count += 1;
        }
    }

    /// Release the key if `txn_id` owns it.
    ///
    /// Returns the pending write of the released lock, or `None` when the
    /// key is free or held by another transaction.
    pub fn release(&mut self, table: &str, key: &str, txn_id: u64) -> Option<PendingWrite> {
        let keys = self.locks.get_mut(table)?;
        if keys.get(key)?.txn_id != txn_id {
            return None;
        }
        let released = keys.remove(key).map(|lock| lock.pending);
        self.count -= 1;
        if keys.is_empty() {
            self.locks.remove(table);
        }
        released
    }

    /// Locked keys of a table, ascending.
    pub fn locked_keys(&self, table: &str) -> BTreeSet<String> {
        self.locks
            .get(table)
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Ids of every transaction currently holding a lock.
    pub fn lock_owners(&self) -> BTreeSet<u64> {
        self.locks
            .values()
            .flat_map(|keys| keys.values().map(|lock| lock.txn_id))
            .collect()
    }

    /// Total number of locked keys.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check if no key is locked.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_and_release_by_owner() {
        let mut store = ProvisionalLockStore::new();
        store.lock("t", "k", 7, PendingWrite::Put(Bytes::from_static(b"v")));

        assert!(store.is_locked("t", "k"));
        assert!(store.has_locks("t"));
        assert!(!store.is_locked_by_another("t", "k", 7));
        assert!(store.is_locked_by_another("t", "k", 8));

        // Wrong owner leaves the lock in place.
        assert_eq!(store.release("t", "k", 8), None);
        assert!(store.is_locked("t", "k"));

        assert_eq!(
            store.release("t", "k", 7),
            Some(PendingWrite::Put(Bytes::from_static(b"v")))
        );
        assert!(!store.is_locked("t", "k"));
        assert!(!store.has_locks("t"));
        assert!(store.is_empty());
    }

    #[test]
    fn tombstone_lock_keeps_owner() {
        let mut store = ProvisionalLockStore::new();
        store.lock("t", "k", 1, PendingWrite::Tombstone);
        assert!(store.is_locked_by_another("t", "k", 2));
        assert_eq!(store.release("t", "k", 2), None);
        assert_eq!(store.release("t", "k", 1), Some(PendingWrite::Tombstone));
    }

    #[test]
    fn release_on_free_key_is_noop() {
        let mut store = ProvisionalLockStore::new();
        assert_eq!(store.release("t", "k", 1), None);
        assert!(store.is_empty());
    }

    #[test]
    fn introspection() {
        let mut store = ProvisionalLockStore::new();
        store.lock("a", "x", 3, PendingWrite::Tombstone);
        store.lock("a", "y", 1, PendingWrite::Tombstone);
        store.lock("b", "z", 3, PendingWrite::Tombstone);

        assert_eq!(store.len(), 3);
        assert_eq!(store.lock_owners().into_iter().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(
            store.locked_keys("a").into_iter().collect::<Vec<_>>(),
            vec!["x", "y"]
        );
        assert!(store.locked_keys("c").is_empty());

        // Re-locking by the same owner does not add a key.
        store.lock("a", "x", 3, PendingWrite::Put(Bytes::from_static(b"v")));
        assert_eq!(store.len(), 3);
        store.release("a", "y", 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn from_map_drops_empty_tables() {
        let mut map = BTreeMap::new();
        map.insert("empty".to_string(), LockMap::new());
        let store = ProvisionalLockStore::from_map(map);
        assert!(store.is_empty());
        assert!(!store.has_locks("empty"));
    }
}
