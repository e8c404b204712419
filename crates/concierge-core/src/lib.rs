//! # concierge-core
//!
//! Foundation types for the Concierge dialog orchestrator.
//!
//! This crate provides the shared vocabulary that all other Concierge crates
//! depend on:
//!
//! - **Branded IDs**: [`ids::ThreadId`], [`ids::ToolCallId`] as newtypes
//! - **Messages**: [`messages::Message`] enum with `User`, `Assistant`, `Tool` variants
//! - **Contexts**: [`context::ContextId`] and the [`context::DialogStack`]
//!   with its pure [`context::StackOp`] reducer
//! - **State**: [`state::ConversationState`] — the full persisted machine
//!   state for one thread, including [`state::PendingInterrupt`]
//! - **Events**: [`events::AgentEvent`] lifecycle events for observers
//! - **Tools**: [`tools::ToolDefinition`] schemas advertised to the
//!   reasoning engine
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other concierge crates. No I/O.

#![deny(unsafe_code)]

pub mod context;
pub mod events;
pub mod ids;
pub mod messages;
pub mod state;
pub mod tools;
