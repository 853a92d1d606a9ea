//! Coordstore - deterministic table/counter state machine for replicated
//! coordination stores.
//!
//! Coordstore is the apply-side core of a replicated key-value database. It
//! stores versioned records in named tables, keeps named counters, and
//! applies multi-key updates atomically through a prepare/commit/rollback
//! protocol built on optimistic concurrency: a prepared transaction's
//! "lock" is nothing more than its pending write recorded under its id.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              Replication / consensus (external)                 │
//! │          orders entries, delivers them to every replica         │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │ (index, DatabaseCommand)
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Apply Loop                             │
//! │     decode │ order check │ dispatch │ metrics │ snapshots       │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Database State Machine                       │
//! │   Table Store │ Counter Store │ Provisional Lock Store          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`core::config`] - Configuration parsing and validation
//! - [`core::error`] - Error types
//!
//! ## Partition
//! - [`partition::state_machine`] - Database state machine core
//! - [`partition::apply_loop`] - Replicated command processing
//! - [`partition::snapshot`] - Durable context and snapshots
//! - [`partition::table`], [`partition::counter`], [`partition::lock`] - Stores
//! - [`partition::update`], [`partition::transaction`] - Descriptors
//!
//! ## Operations
//! - [`ops::observability`] - Metrics
//! - [`ops::telemetry`] - Tracing setup
//!
//! # Key Invariants
//!
//! - **Global versions**: every committed write takes the next number from
//!   one partition-wide sequence; versions are never reused.
//! - **All-or-nothing prepare**: a failed prepare installs no locks.
//! - **Committed reads**: reads never observe provisional writes.
//! - **Determinism**: no clocks, no randomness, ordered iteration only.

// Core infrastructure
pub mod core;

// Partition runtime and state machine
pub mod partition;

// Operations and observability
pub mod ops;

// Re-exports for convenience
pub use self::core::config::EngineConfig;
pub use self::core::error::{DatabaseError, DatabaseResult};
pub use partition::apply_loop::{
    ApplyLoop, ApplyResult, CommandOutput, DatabaseCommand, DatabaseReader,
};
pub use partition::lock::PendingWrite;
pub use partition::outcome::Outcome;
pub use partition::snapshot::{DatabaseSnapshot, StateContext};
pub use partition::state_machine::{DatabaseState, DatabaseStats, PrepareOutcome};
pub use partition::transaction::Transaction;
pub use partition::update::{DatabaseUpdate, UpdateKind};
pub use partition::versioned::Versioned;
