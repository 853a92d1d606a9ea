//! Transaction descriptors.

use super::update::DatabaseUpdate;
use serde::{Deserialize, Serialize};

/// An ordered set of updates applied atomically through
/// prepare → commit | rollback.
///
/// The id doubles as the lock token: every key the transaction prepares is
/// reserved under this id until commit or rollback releases it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction identifier, unique per attempt.
    pub id: u64,
    /// Updates in submission order.
    pub updates: Vec<DatabaseUpdate>,
}

impl Transaction {
    /// Create a transaction.
    pub fn new(id: u64, updates: Vec<DatabaseUpdate>) -> Self {
        Self { id, updates }
    }

    /// Number of updates.
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    /// Check if the transaction has no updates.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Iterate over the updates in order.
    pub fn iter(&self) -> std::slice::Iter<'_, DatabaseUpdate> {
        self.updates.iter()
    }
}
