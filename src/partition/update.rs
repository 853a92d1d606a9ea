//! Update descriptors.
//!
//! An update names one (table, key) pair and the mutation a transaction
//! wants to make there. The kind is a closed enum carrying exactly the
//! payload its precondition needs, so the precondition check and the
//! provisional write are exhaustive matches.

use super::lock::PendingWrite;
use super::versioned::Versioned;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Requested mutation and its precondition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateKind {
    /// Unconditional write.
    Put { value: Bytes },
    /// Write only if the key has no committed value.
    PutIfAbsent { value: Bytes },
    /// Write only if the committed version equals `version`.
    PutIfVersionMatch { value: Bytes, version: u64 },
    /// Write only if the committed value equals `current` byte for byte.
    PutIfValueMatch { value: Bytes, current: Bytes },
    /// Unconditional delete.
    Remove,
    /// Delete if the committed version equals `version`, or if absent.
    RemoveIfVersionMatch { version: u64 },
    /// Delete if the committed value equals `current`, or if absent.
    RemoveIfValueMatch { current: Bytes },
}

impl UpdateKind {
    /// Stable name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Put { .. } => "PUT",
            Self::PutIfAbsent { .. } => "PUT_IF_ABSENT",
            Self::PutIfVersionMatch { .. } => "PUT_IF_VERSION_MATCH",
            Self::PutIfValueMatch { .. } => "PUT_IF_VALUE_MATCH",
            Self::Remove => "REMOVE",
            Self::RemoveIfVersionMatch { .. } => "REMOVE_IF_VERSION_MATCH",
            Self::RemoveIfValueMatch { .. } => "REMOVE_IF_VALUE_MATCH",
        }
    }

    /// Check if this kind deletes the key.
    pub fn is_remove(&self) -> bool {
        matches!(
            self,
            Self::Remove | Self::RemoveIfVersionMatch { .. } | Self::RemoveIfValueMatch { .. }
        )
    }
}

/// A single requested mutation within a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseUpdate {
    /// Target table.
    pub table: String,
    /// Target key.
    pub key: String,
    /// Mutation and precondition.
    pub kind: UpdateKind,
}

impl DatabaseUpdate {
    /// Create an update.
    pub fn new(table: impl Into<String>, key: impl Into<String>, kind: UpdateKind) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
            kind,
        }
    }

    /// Unconditional put.
    pub fn put(table: impl Into<String>, key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self::new(table, key, UpdateKind::Put { value: value.into() })
    }

    /// Put if the key is absent.
    pub fn put_if_absent(
        table: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Bytes>,
    ) -> Self {
        Self::new(table, key, UpdateKind::PutIfAbsent { value: value.into() })
    }

    /// Put if the committed version matches.
    pub fn put_if_version_match(
        table: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Bytes>,
        version: u64,
    ) -> Self {
        Self::new(
            table,
            key,
            UpdateKind::PutIfVersionMatch {
                value: value.into(),
                version,
            },
        )
    }

    /// Put if the committed value matches.
    pub fn put_if_value_match(
        table: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Bytes>,
        current: impl Into<Bytes>,
    ) -> Self {
        Self::new(
            table,
            key,
            UpdateKind::PutIfValueMatch {
                value: value.into(),
                current: current.into(),
            },
        )
    }

    /// Unconditional remove.
    pub fn remove(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(table, key, UpdateKind::Remove)
    }

    /// Remove if the committed version matches (or the key is absent).
    pub fn remove_if_version_match(
        table: impl Into<String>,
        key: impl Into<String>,
        version: u64,
    ) -> Self {
        Self::new(table, key, UpdateKind::RemoveIfVersionMatch { version })
    }

    /// Remove if the committed value matches (or the key is absent).
    pub fn remove_if_value_match(
        table: impl Into<String>,
        key: impl Into<String>,
        current: impl Into<Bytes>,
    ) -> Self {
        Self::new(
            table,
            key,
            UpdateKind::RemoveIfValueMatch {
                current: current.into(),
            },
        )
    }

    /// Evaluate the precondition against the committed entry.
    pub fn is_possible(&self, existing: Option<&Versioned<Bytes>>) -> bool {
        match &self.kind {
            UpdateKind::Put { .. } | UpdateKind::Remove => true,
            UpdateKind::PutIfAbsent { .. } => existing.is_none(),
            UpdateKind::PutIfVersionMatch { version, .. } => {
                existing.is_some_and(|v| v.version() == *version)
            }
            UpdateKind::PutIfValueMatch { current, .. } => {
                existing.is_some_and(|v| v.value() == current)
            }
            UpdateKind::RemoveIfVersionMatch { version } => {
                existing.map_or(true, |v| v.version() == *version)
            }
            UpdateKind::RemoveIfValueMatch { current } => {
                existing.map_or(true, |v| v.value() == current)
            }
        }
    }

    /// The write to record in the provisional lock.
    pub fn pending_write(&self) -> PendingWrite {
        match &self.kind {
            UpdateKind::Put { value }
            | UpdateKind::PutIfAbsent { value }
            | UpdateKind::PutIfVersionMatch { value, .. }
            | UpdateKind::PutIfValueMatch { value, .. } => PendingWrite::Put(value.clone()),
            UpdateKind::Remove
            | UpdateKind::RemoveIfVersionMatch { .. }
            | UpdateKind::RemoveIfValueMatch { .. } => PendingWrite::Tombstone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(value: &'static [u8], version: u64) -> Versioned<Bytes> {
        Versioned::new(Bytes::from_static(value), version)
    }

    #[test]
    fn unconditional_kinds_always_possible() {
        let existing = entry(b"a", 3);
        for update in [DatabaseUpdate::put("t", "k", "v"), DatabaseUpdate::remove("t", "k")] {
            assert!(update.is_possible(None));
            assert!(update.is_possible(Some(&existing)));
        }
    }

    #[test]
    fn put_if_absent_requires_missing_entry() {
        let update = DatabaseUpdate::put_if_absent("t", "k", "v");
        assert!(update.is_possible(None));
        assert!(!update.is_possible(Some(&entry(b"a", 1))));
    }

    #[test]
    fn version_match_kinds() {
        let existing = entry(b"a", 7);
        let put = DatabaseUpdate::put_if_version_match("t", "k", "v", 7);
        assert!(put.is_possible(Some(&existing)));
        assert!(!put.is_possible(Some(&entry(b"a", 8))));
        assert!(!put.is_possible(None));

        let remove = DatabaseUpdate::remove_if_version_match("t", "k", 7);
        assert!(remove.is_possible(Some(&existing)));
        assert!(!remove.is_possible(Some(&entry(b"a", 6))));
        // Already gone counts as removed.
        assert!(remove.is_possible(None));
    }

    #[test]
    fn value_match_kinds_compare_bytes() {
        let existing = entry(b"abc", 2);
        let put = DatabaseUpdate::put_if_value_match("t", "k", "new", "abc");
        assert!(put.is_possible(Some(&existing)));
        assert!(!DatabaseUpdate::put_if_value_match("t", "k", "new", "abd")
            .is_possible(Some(&existing)));
        assert!(!put.is_possible(None));

        let remove = DatabaseUpdate::remove_if_value_match("t", "k", "abc");
        assert!(remove.is_possible(Some(&existing)));
        assert!(remove.is_possible(None));
        assert!(!DatabaseUpdate::remove_if_value_match("t", "k", "ab")
            .is_possible(Some(&existing)));
    }

    #[test]
    fn pending_write_by_kind() {
        assert_eq!(
            DatabaseUpdate::put_if_absent("t", "k", "v").pending_write(),
            PendingWrite::Put(Bytes::from_static(b"v"))
        );
        assert_eq!(
            DatabaseUpdate::remove_if_value_match("t", "k", "v").pending_write(),
            PendingWrite::Tombstone
        );
        assert!(DatabaseUpdate::remove("t", "k").kind.is_remove());
        assert_eq!(
            DatabaseUpdate::put_if_version_match("t", "k", "v", 1).kind.name(),
            "PUT_IF_VERSION_MATCH"
        );
    }
}
