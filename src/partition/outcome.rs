//! Result envelope for replicated operations.

use serde::{Deserialize, Serialize};

/// Outcome of an operation that may collide with a provisional lock.
///
/// `Locked` is the optimistic-conflict signal: the key (or, for `clear`,
/// some key of the table) is reserved by a prepared transaction. It is
/// distinct from a precondition mismatch, which is reported inside `Ok`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome<T> {
    /// Operation was evaluated against committed state.
    Ok(T),
    /// Operation touched a provisionally locked key and did nothing.
    Locked,
}

impl<T> Outcome<T> {
    /// Check if the operation was rejected by a provisional lock.
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked)
    }

    /// Check if the operation was evaluated.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Borrow the value, if evaluated.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Ok(value) => Some(value),
            Self::Locked => None,
        }
    }

    /// Consume and return the value, if evaluated.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Ok(value) => Some(value),
            Self::Locked => None,
        }
    }

    /// Transform the value, preserving `Locked`.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Ok(value) => Outcome::Ok(f(value)),
            Self::Locked => Outcome::Locked,
        }
    }
}

impl Outcome<bool> {
    /// True only when evaluated and the precondition held.
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Ok(true))
    }
}
