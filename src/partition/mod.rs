//! Replicated partition runtime.
//!
//! A partition hosts exactly one database state machine, fed by the
//! replication layer through the apply loop. This module contains:
//! - [`versioned`] - Versioned values
//! - [`outcome`] - Locked/ok result envelope
//! - [`update`] - Update descriptors
//! - [`transaction`] - Transaction descriptors
//! - [`table`] - Committed tables and the global version counter
//! - [`counter`] - Named counters
//! - [`lock`] - Provisional locks held by prepared transactions
//! - [`state_machine`] - Database state machine core
//! - [`snapshot`] - Durable context and snapshots
//! - [`apply_loop`] - Replicated command processing

pub mod apply_loop;
pub mod counter;
pub mod lock;
pub mod outcome;
pub mod snapshot;
pub mod state_machine;
pub mod table;
pub mod transaction;
pub mod update;
pub mod versioned;
