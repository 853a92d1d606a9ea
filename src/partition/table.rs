//! Table store.
//!
//! Committed table contents plus the global version counter. This store
//! knows nothing about provisional locks; [`DatabaseState`](super::state_machine::DatabaseState)
//! checks locks before delegating writes here.

use super::versioned::Versioned;
use crate::core::error::{DatabaseError, DatabaseResult};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Key → versioned value mapping for one table.
pub type TableMap = BTreeMap<String, Versioned<Bytes>>;

/// Per-table committed records and the shared version sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStore {
    /// Table name → table contents.
    tables: BTreeMap<String, TableMap>,

    /// Last version handed out. The next write receives `next_version + 1`.
    next_version: u64,
}

impl TableStore {
    /// Create an empty table store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt existing tables and version counter.
    ///
    /// The counter must leave room for another write and must not lag
    /// behind any stored version, or versions would repeat.
    pub fn from_parts(
        tables: BTreeMap<String, TableMap>,
        next_version: u64,
    ) -> DatabaseResult<Self> {
        if next_version == u64::MAX {
            return Err(DatabaseError::snapshot("nextVersion region is exhausted"));
        }
        let highest = tables
            .values()
            .flat_map(|t| t.values().map(|v| v.version()))
            .max()
            .unwrap_or(0);
        if highest > next_version {
            return Err(DatabaseError::snapshot(format!(
                "nextVersion {next_version} is below stored version {highest}"
            )));
        }
        Ok(Self {
            tables,
            next_version,
        })
    }

    /// All tables.
    pub fn tables(&self) -> &BTreeMap<String, TableMap> {
        &self.tables
    }

    /// Last version handed out (0 if nothing was ever written).
    pub fn next_version(&self) -> u64 {
        self.next_version
    }

    /// Names of every table that has been touched.
    pub fn table_names(&self) -> BTreeSet<String> {
        self.tables.keys().cloned().collect()
    }

    fn table(&self, table: &str) -> Option<&TableMap> {
        self.tables.get(table)
    }

    fn table_mut(&mut self, table: &str) -> &mut TableMap {
        self.tables.entry(table.to_string()).or_default()
    }

    // Adoption guarantees the counter starts below u64::MAX.
    fn bump_version(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }

    /// Committed value for a key.
    pub fn get(&self, table: &str, key: &str) -> Option<&Versioned<Bytes>> {
        self.table(table).and_then(|t| t.get(key))
    }

    /// Number of keys in a table.
    pub fn size(&self, table: &str) -> usize {
        self.table(table).map_or(0, |t| t.len())
    }

    /// Check if a table has no keys.
    pub fn is_empty(&self, table: &str) -> bool {
        self.size(table) == 0
    }

    /// Check if a key has a committed value.
    pub fn contains_key(&self, table: &str, key: &str) -> bool {
        self.get(table, key).is_some()
    }

    /// Check if any key in the table holds exactly `value`.
    pub fn contains_value(&self, table: &str, value: &[u8]) -> bool {
        self.table(table)
            .is_some_and(|t| t.values().any(|v| v.value().as_ref() == value))
    }

    /// Keys of a table, ascending.
    pub fn key_set(&self, table: &str) -> BTreeSet<String> {
        self.table(table)
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Values of a table, in key order.
    pub fn values(&self, table: &str) -> Vec<Versioned<Bytes>> {
        self.table(table)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Entries of a table, in key order.
    pub fn entry_set(&self, table: &str) -> Vec<(String, Versioned<Bytes>)> {
        self.table(table)
            .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    /// Write a value under the next global version.
    ///
    /// Returns the previous value if it existed.
    pub fn put(&mut self, table: &str, key: &str, value: Bytes) -> Option<Versioned<Bytes>> {
        let version = self.bump_version();
        self.table_mut(table)
            .insert(key.to_string(), Versioned::new(value, version))
    }

    /// Write only if the key is absent.
    ///
    /// Returns the existing value (unchanged) or `None` if the write happened.
    pub fn put_if_absent(
        &mut self,
        table: &str,
        key: &str,
        value: Bytes,
    ) -> Option<Versioned<Bytes>> {
        if let Some(existing) = self.get(table, key) {
            return Some(existing.clone());
        }
        self.put(table, key, value)
    }

    /// Remove a key. Removal does not consume a version.
    pub fn remove(&mut self, table: &str, key: &str) -> Option<Versioned<Bytes>> {
        self.table_mut(table).remove(key)
    }

    /// Remove a key if its committed value equals `expected`.
    pub fn remove_if_value(&mut self, table: &str, key: &str, expected: &[u8]) -> bool {
        let matches = self
            .get(table, key)
            .is_some_and(|v| v.value().as_ref() == expected);
        if matches {
            self.remove(table, key);
        } else {
            self.table_mut(table);
        }
        matches
    }

    /// Remove a key if its committed version equals `expected`.
    pub fn remove_if_version(&mut self, table: &str, key: &str, expected: u64) -> bool {
        let matches = self
            .get(table, key)
            .is_some_and(|v| v.version() == expected);
        if matches {
            self.remove(table, key);
        } else {
            self.table_mut(table);
        }
        matches
    }

    /// Replace a value if the committed value equals `old_value`.
    pub fn replace_value(
        &mut self,
        table: &str,
        key: &str,
        old_value: &[u8],
        new_value: Bytes,
    ) -> bool {
        let matches = self
            .get(table, key)
            .is_some_and(|v| v.value().as_ref() == old_value);
        if matches {
            self.put(table, key, new_value);
        } else {
            self.table_mut(table);
        }
        matches
    }

    /// Replace a value if the committed version equals `old_version`.
    pub fn replace_version(
        &mut self,
        table: &str,
        key: &str,
        old_version: u64,
        new_value: Bytes,
    ) -> bool {
        let matches = self
            .get(table, key)
            .is_some_and(|v| v.version() == old_version);
        if matches {
            self.put(table, key, new_value);
        } else {
            self.table_mut(table);
        }
        matches
    }

    /// Remove every key of a table. The table itself stays registered.
    pub fn clear(&mut self, table: &str) {
        self.table_mut(table).clear();
    }

    /// Total committed keys across all tables.
    pub fn key_count(&self) -> usize {
        self.tables.values().map(|t| t.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_global_across_tables() {
        let mut store = TableStore::new();
        store.put("a", "k", Bytes::from_static(b"1"));
        store.put("b", "k", Bytes::from_static(b"2"));
        store.put("a", "k", Bytes::from_static(b"3"));

        assert_eq!(store.get("b", "k").unwrap().version(), 2);
        assert_eq!(store.get("a", "k").unwrap().version(), 3);
        assert_eq!(store.next_version(), 3);
    }

    #[test]
    fn put_if_absent_keeps_first_value() {
        let mut store = TableStore::new();
        assert!(store.put_if_absent("t", "k", Bytes::from_static(b"first")).is_none());
        let existing = store
            .put_if_absent("t", "k", Bytes::from_static(b"second"))
            .unwrap();
        assert_eq!(existing.value().as_ref(), b"first");
        assert_eq!(existing.version(), 1);
        assert_eq!(store.next_version(), 1);
    }

    #[test]
    fn remove_does_not_consume_version() {
        let mut store = TableStore::new();
        store.put("t", "k", Bytes::from_static(b"v"));
        let removed = store.remove("t", "k").unwrap();
        assert_eq!(removed.version(), 1);
        assert_eq!(store.next_version(), 1);
        assert!(!store.contains_key("t", "k"));
    }

    #[test]
    fn conditional_mismatch_leaves_value() {
        let mut store = TableStore::new();
        store.put("t", "k", Bytes::from_static(b"v"));

        assert!(!store.remove_if_value("t", "k", b"other"));
        assert!(!store.remove_if_version("t", "k", 9));
        assert!(!store.replace_value("t", "k", b"other", Bytes::from_static(b"x")));
        assert!(!store.replace_version("t", "k", 9, Bytes::from_static(b"x")));

        let current = store.get("t", "k").unwrap();
        assert_eq!(current.value().as_ref(), b"v");
        assert_eq!(current.version(), 1);
    }

    #[test]
    fn reads_do_not_create_tables() {
        let store = TableStore::new();
        assert!(store.get("ghost", "k").is_none());
        assert_eq!(store.size("ghost"), 0);
        assert!(store.is_empty("ghost"));
        assert!(store.table_names().is_empty());
    }

    #[test]
    fn clear_keeps_table_registered() {
        let mut store = TableStore::new();
        store.put("t", "a", Bytes::from_static(b"1"));
        store.put("t", "b", Bytes::from_static(b"2"));
        store.clear("t");
        assert!(store.is_empty("t"));
        assert!(store.table_names().contains("t"));
    }

    #[test]
    fn listings_are_ordered() {
        let mut store = TableStore::new();
        store.put("t", "b", Bytes::from_static(b"2"));
        store.put("t", "a", Bytes::from_static(b"1"));
        store.put("t", "c", Bytes::from_static(b"3"));

        let keys: Vec<_> = store.key_set("t").into_iter().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);

        let entries = store.entry_set("t");
        assert_eq!(entries[0].0, "a");
        assert_eq!(entries[0].1.version(), 2);

        let values: Vec<_> = store.values("t").into_iter().map(|v| v.version()).collect();
        assert_eq!(values, vec![2, 1, 3]);
        assert!(store.contains_value("t", b"3"));
        assert!(!store.contains_value("t", b"4"));
    }

    #[test]
    fn adoption_rejects_unusable_version_counter() {
        let mut tables = BTreeMap::new();
        let mut t = TableMap::new();
        t.insert("k".to_string(), Versioned::new(Bytes::from_static(b"v"), 7));
        tables.insert("t".to_string(), t);

        assert!(TableStore::from_parts(BTreeMap::new(), u64::MAX).is_err());
        assert!(TableStore::from_parts(tables.clone(), 6).is_err());

        let mut store = TableStore::from_parts(tables, 7).unwrap();
        store.put("t", "j", Bytes::from_static(b"w"));
        assert_eq!(store.get("t", "j").unwrap().version(), 8);
    }
}
