//! Versioned values.
//!
//! Every committed write is stamped with the next number from a single
//! counter shared by all tables of a partition, so a version identifies one
//! write across the whole database and is never reused.

use serde::{Deserialize, Serialize};

/// An immutable value tagged with the global version of the write that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Versioned<V> {
    value: V,
    version: u64,
}

impl<V> Versioned<V> {
    /// Create a new versioned value.
    pub fn new(value: V, version: u64) -> Self {
        Self { value, version }
    }

    /// The stored value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// The version of the write that produced this value.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Consume and return the value.
    pub fn into_value(self) -> V {
        self.value
    }
}

impl<V: std::fmt::Debug> std::fmt::Display for Versioned<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}@v{}", self.value, self.version)
    }
}
