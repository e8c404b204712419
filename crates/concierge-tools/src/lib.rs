//! # concierge-tools
//!
//! The shop tool catalog and its implementations.
//!
//! - [`catalog::ToolId`] — the closed set of tool names, each classified as
//!   safe, sensitive, a delegation marker, or the completion marker
//! - [`registry::ToolRegistry`] — maps executable tool IDs to their
//!   implementations and produces per-context schema lists
//! - [`db`] — the SQLite shop database (pool, migrations, demo seed)
//! - [`product`], [`cart`], [`order`], [`policy`] — the tools themselves
//!
//! Delegation and completion markers are catalog entries without
//! implementations: the orchestrator consumes them as routing signals and
//! they never reach the registry for execution.

#![deny(unsafe_code)]

pub mod args;
pub mod cart;
pub mod catalog;
pub mod db;
pub mod errors;
pub mod order;
pub mod policy;
pub mod product;
pub mod registry;
pub mod traits;

pub use catalog::{ToolId, ToolKind};
pub use errors::ToolError;
pub use registry::ToolRegistry;
pub use traits::{ShopTool, ToolContext};
