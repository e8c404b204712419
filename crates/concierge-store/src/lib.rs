//! # concierge-store
//!
//! Checkpoint persistence for the Concierge dialog orchestrator.
//!
//! Every state transition is snapshotted into an append-only `checkpoints`
//! table keyed by `(thread_id, seq)`; loading a thread means reading the
//! latest snapshot. Rows are never updated in place, so a crash mid-write
//! can at worst lose the newest snapshot, never corrupt an older one.
//!
//! The store also owns the per-thread turn locks that serialize turns on a
//! thread within one process.

#![deny(unsafe_code)]

pub mod checkpoint;
pub mod connection;
pub mod errors;
pub mod migrations;

pub use checkpoint::{CheckpointStore, ThreadSummary, TurnGuard};
pub use errors::StoreError;
