//! Tool trait and execution context.

use async_trait::async_trait;
use serde_json::{Map, Value};

use concierge_core::state::UserProfile;
use concierge_core::tools::ToolDefinition;

use crate::catalog::ToolId;
use crate::db::ShopPool;
use crate::errors::Result;

/// Everything a tool needs at execution time.
///
/// The user profile travels here rather than in the arguments, so account
/// identity never depends on what the reasoning engine chose to emit.
#[derive(Clone)]
pub struct ToolContext {
    /// Shop database pool.
    pub pool: ShopPool,
    /// The user the thread belongs to.
    pub user: UserProfile,
}

impl ToolContext {
    /// Build a context.
    #[must_use]
    pub fn new(pool: ShopPool, user: UserProfile) -> Self {
        Self { pool, user }
    }
}

/// An executable shop tool.
///
/// Implementors must be `Send + Sync`; the registry stores them behind
/// `Arc<dyn ShopTool>`. Routing markers are not `ShopTool`s — they never
/// execute.
#[async_trait]
pub trait ShopTool: Send + Sync {
    /// Catalog identity.
    fn id(&self) -> ToolId;

    /// Schema advertised to the reasoning engine.
    fn definition(&self) -> ToolDefinition;

    /// Execute with the given arguments. The returned string becomes the
    /// tool reply content verbatim.
    async fn execute(&self, arguments: &Map<String, Value>, ctx: &ToolContext) -> Result<String>;
}
