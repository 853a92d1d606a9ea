//! Named counters.
//!
//! Counters are independent of each other and of the table version
//! sequence. A counter springs into existence at zero the first time it is
//! named by either operation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counter name → current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterStore {
    counters: BTreeMap<String, i64>,
}

impl CounterStore {
    /// Create an empty counter store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt existing counters.
    pub fn from_map(counters: BTreeMap<String, i64>) -> Self {
        Self { counters }
    }

    fn counter_mut(&mut self, name: &str) -> &mut i64 {
        self.counters.entry(name.to_string()).or_insert(0)
    }

    /// Increment and return the new value. The first call returns 1.
    pub fn next_value(&mut self, name: &str) -> i64 {
        let counter = self.counter_mut(name);
        *counter = counter.wrapping_add(1);
        *counter
    }

    /// Current value without incrementing.
    pub fn current_value(&mut self, name: &str) -> i64 {
        *self.counter_mut(name)
    }

    /// Snapshot of every counter.
    pub fn counters(&self) -> BTreeMap<String, i64> {
        self.counters.clone()
    }

    /// Number of counters.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Check if no counter exists.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}
