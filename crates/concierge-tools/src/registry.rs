//! Tool registry — central index of executable tools.
//!
//! The registry maps [`ToolId`]s to their [`ShopTool`] implementations and
//! produces the per-context schema list the reasoning engine sees: the
//! context's executable tools plus its routing markers.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use concierge_core::context::ContextId;
use concierge_core::state::UserProfile;
use concierge_core::tools::ToolDefinition;

use crate::cart::{AddToCartTool, RemoveFromCartTool, ViewCartTool};
use crate::catalog::ToolId;
use crate::db::ShopPool;
use crate::order::{
    CancelOrderTool, CheckoutOrderTool, RecentOrdersTool, SearchOrdersTool,
    UpdateDeliveryAddressTool,
};
use crate::policy::QueryPolicyTool;
use crate::product::{ListCategoriesTool, SearchProductsTool};
use crate::traits::{ShopTool, ToolContext};

/// Central registry mapping tool IDs to their implementations.
pub struct ToolRegistry {
    tools: HashMap<ToolId, Arc<dyn ShopTool>>,
    pool: ShopPool,
}

impl ToolRegistry {
    /// Create a registry with the full shop catalog registered.
    #[must_use]
    pub fn with_catalog(pool: ShopPool) -> Self {
        let mut registry = Self {
            tools: HashMap::new(),
            pool,
        };
        registry.register(Arc::new(SearchProductsTool));
        registry.register(Arc::new(ListCategoriesTool));
        registry.register(Arc::new(ViewCartTool));
        registry.register(Arc::new(AddToCartTool));
        registry.register(Arc::new(RemoveFromCartTool));
        registry.register(Arc::new(SearchOrdersTool));
        registry.register(Arc::new(RecentOrdersTool));
        registry.register(Arc::new(CheckoutOrderTool));
        registry.register(Arc::new(UpdateDeliveryAddressTool));
        registry.register(Arc::new(CancelOrderTool));
        registry.register(Arc::new(QueryPolicyTool));
        registry
    }

    /// Register a tool. Overwrites any existing tool with the same ID.
    pub fn register(&mut self, tool: Arc<dyn ShopTool>) {
        debug!(tool = %tool.id(), "tool registered");
        let _ = self.tools.insert(tool.id(), tool);
    }

    /// Look up a tool by ID. Markers have no implementation and return `None`.
    #[must_use]
    pub fn get(&self, id: ToolId) -> Option<Arc<dyn ShopTool>> {
        self.tools.get(&id).cloned()
    }

    /// Execution context bound to a user.
    #[must_use]
    pub fn context_for(&self, user: UserProfile) -> ToolContext {
        ToolContext::new(self.pool.clone(), user)
    }

    /// Schemas advertised to the given context: executable tools first,
    /// markers where the catalog places them.
    #[must_use]
    pub fn definitions_for(&self, context: ContextId) -> Vec<ToolDefinition> {
        ToolId::permitted_for(context)
            .iter()
            .filter_map(|id| {
                id.marker_definition()
                    .or_else(|| self.tools.get(id).map(|tool| tool.definition()))
            })
            .collect()
    }

    /// Number of registered executable tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
