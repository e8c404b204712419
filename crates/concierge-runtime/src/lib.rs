//! # concierge-runtime
//!
//! The dialog orchestrator: a finite-state machine that routes each turn
//! through the active context, gates tool batches through the approval
//! policy, and checkpoints after every transition.
//!
//! - [`machine::DialogMachine`] — the public surface: `handle_message`,
//!   `approve`, `deny`
//! - [`gate`] — batch classification (delegate / complete / safe / suspend)
//! - [`adapter`] — bounded-retry wrapper around the reasoning engine
//! - [`contexts`] — per-context instructions and transition notices
//! - [`executor`] — tool batch execution producing one reply per call
//! - [`emitter`] — broadcast channel for lifecycle events

#![deny(unsafe_code)]

pub mod adapter;
pub mod contexts;
pub mod emitter;
pub mod errors;
pub mod executor;
pub mod gate;
pub mod machine;

pub use errors::RuntimeError;
pub use machine::{DialogMachine, TurnOutcome};
