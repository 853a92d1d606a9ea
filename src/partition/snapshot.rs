//! Durable context and snapshots.
//!
//! The persisted state of a partition is four named regions that must be
//! saved and restored together:
//!
//! | Region | Contents |
//! |---|---|
//! | `counters` | counter name → value |
//! | `tables` | table name → (key → versioned value) |
//! | `locks` | table name → (key → provisional lock) |
//! | `nextVersion` | last version handed out |
//!
//! This module only converts between the running state and bytes; where
//! the bytes live is the replication layer's concern.

use super::lock::LockMap;
use super::table::TableMap;
use crate::core::error::{DatabaseError, DatabaseResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Region name for counters.
pub const REGION_COUNTERS: &str = "counters";
/// Region name for tables.
pub const REGION_TABLES: &str = "tables";
/// Region name for provisional locks.
pub const REGION_LOCKS: &str = "locks";
/// Region name for the version counter.
pub const REGION_NEXT_VERSION: &str = "nextVersion";

/// Durable context handed to [`DatabaseState::init`](super::state_machine::DatabaseState::init).
///
/// A region set to `None` has never been persisted and is initialized
/// empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateContext {
    /// Counter region.
    pub counters: Option<BTreeMap<String, i64>>,
    /// Table region.
    pub tables: Option<BTreeMap<String, TableMap>>,
    /// Lock region.
    pub locks: Option<BTreeMap<String, LockMap>>,
    /// Version counter region.
    pub next_version: Option<u64>,
}

impl StateContext {
    /// Context with no persisted regions.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Context with all four regions present.
    pub fn complete(
        counters: BTreeMap<String, i64>,
        tables: BTreeMap<String, TableMap>,
        locks: BTreeMap<String, LockMap>,
        next_version: u64,
    ) -> Self {
        Self {
            counters: Some(counters),
            tables: Some(tables),
            locks: Some(locks),
            next_version: Some(next_version),
        }
    }

    /// Names of the regions that are present.
    pub fn present_regions(&self) -> Vec<&'static str> {
        let mut regions = Vec::new();
        if self.counters.is_some() {
            regions.push(REGION_COUNTERS);
        }
        if self.tables.is_some() {
            regions.push(REGION_TABLES);
        }
        if self.locks.is_some() {
            regions.push(REGION_LOCKS);
        }
        if self.next_version.is_some() {
            regions.push(REGION_NEXT_VERSION);
        }
        regions
    }
}

/// Serializable image of all four regions at a log position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    /// Log index of the last entry reflected in this snapshot.
    pub last_applied: u64,
    /// Counter region.
    pub counters: BTreeMap<String, i64>,
    /// Table region.
    pub tables: BTreeMap<String, TableMap>,
    /// Lock region.
    pub locks: BTreeMap<String, LockMap>,
    /// Version counter region.
    pub next_version: u64,
}

impl DatabaseSnapshot {
    /// Build a snapshot from a context. Missing regions become empty.
    pub fn from_context(last_applied: u64, context: StateContext) -> Self {
        Self {
            last_applied,
            counters: context.counters.unwrap_or_default(),
            tables: context.tables.unwrap_or_default(),
            locks: context.locks.unwrap_or_default(),
            next_version: context.next_version.unwrap_or(0),
        }
    }

    /// Convert into a context with every region present.
    pub fn into_context(self) -> StateContext {
        StateContext::complete(self.counters, self.tables, self.locks, self.next_version)
    }

    /// Serialize the snapshot to bytes.
    pub fn serialize(&self) -> DatabaseResult<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| DatabaseError::snapshot(format!("failed to serialize snapshot: {e}")))
    }

    /// Deserialize a snapshot from bytes.
    pub fn deserialize(bytes: &[u8]) -> DatabaseResult<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| DatabaseError::snapshot(format!("failed to deserialize snapshot: {e}")))
    }

    /// Number of committed records in this snapshot.
    pub fn record_count(&self) -> usize {
        self.tables.values().map(|t| t.len()).sum()
    }

    /// Number of provisional locks in this snapshot.
    pub fn lock_count(&self) -> usize {
        self.locks.values().map(|l| l.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn present_regions_lists_only_set_regions() {
        let context = StateContext {
            counters: Some(BTreeMap::new()),
            next_version: Some(4),
            ..Default::default()
        };
        assert_eq!(
            context.present_regions(),
            vec![REGION_COUNTERS, REGION_NEXT_VERSION]
        );
        assert!(StateContext::empty().present_regions().is_empty());
    }

    #[test]
    fn truncated_bytes_are_rejected() {
        let snapshot = DatabaseSnapshot::from_context(3, StateContext::empty());
        let bytes = snapshot.serialize().unwrap();
        let err = DatabaseSnapshot::deserialize(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, DatabaseError::Snapshot { .. }));
    }
}
