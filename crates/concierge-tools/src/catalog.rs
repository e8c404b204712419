//! The closed tool catalog.
//!
//! Every name the reasoning engine may emit is either a member of
//! [`ToolId`] or unknown. Each member carries a fixed [`ToolKind`]
//! classification that the gate consults; classification lives here, in
//! one table, rather than scattered across tool implementations.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

use concierge_core::context::ContextId;
use concierge_core::tools::ToolDefinition;

// ─────────────────────────────────────────────────────────────────────────────
// ToolId
// ─────────────────────────────────────────────────────────────────────────────

/// Every tool the catalog knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolId {
    /// Search products with optional name/category/price filters, with
    /// recommendations.
    SearchProducts,
    /// List the distinct product categories.
    ListCategories,
    /// View the user's cart contents.
    ViewCart,
    /// Add one unit of a product to the cart.
    AddToCart,
    /// Remove a product from the cart.
    RemoveFromCart,
    /// Look up one order by ID.
    SearchOrders,
    /// List the user's recent orders.
    RecentOrders,
    /// Check out the cart into a new order.
    CheckoutOrder,
    /// Change the delivery address of an open order.
    UpdateDeliveryAddress,
    /// Cancel an open order.
    CancelOrder,
    /// Fetch a company policy text.
    QueryPolicy,
    /// Delegation marker: hand off to the product context.
    ToProduct,
    /// Delegation marker: hand off to the cart context.
    ToCart,
    /// Delegation marker: hand off to the order context.
    ToOrder,
    /// Completion marker: the delegate is done or out of its depth.
    CompleteOrEscalate,
}

/// Classification the gate acts on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolKind {
    /// Executes without human review.
    Safe,
    /// Mutates shop state; requires approval before executing.
    Sensitive,
    /// Routing signal: push the named context.
    Delegate(ContextId),
    /// Routing signal: pop the active context.
    Complete,
}

impl ToolId {
    /// Parse a wire name. Returns `None` for unknown tools.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "SearchProducts" => Some(Self::SearchProducts),
            "ListCategories" => Some(Self::ListCategories),
            "ViewCart" => Some(Self::ViewCart),
            "AddToCart" => Some(Self::AddToCart),
            "RemoveFromCart" => Some(Self::RemoveFromCart),
            "SearchOrders" => Some(Self::SearchOrders),
            "RecentOrders" => Some(Self::RecentOrders),
            "CheckoutOrder" => Some(Self::CheckoutOrder),
            "UpdateDeliveryAddress" => Some(Self::UpdateDeliveryAddress),
            "CancelOrder" => Some(Self::CancelOrder),
            "QueryPolicy" => Some(Self::QueryPolicy),
            "ToProduct" => Some(Self::ToProduct),
            "ToCart" => Some(Self::ToCart),
            "ToOrder" => Some(Self::ToOrder),
            "CompleteOrEscalate" => Some(Self::CompleteOrEscalate),
            _ => None,
        }
    }

    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SearchProducts => "SearchProducts",
            Self::ListCategories => "ListCategories",
            Self::ViewCart => "ViewCart",
            Self::AddToCart => "AddToCart",
            Self::RemoveFromCart => "RemoveFromCart",
            Self::SearchOrders => "SearchOrders",
            Self::RecentOrders => "RecentOrders",
            Self::CheckoutOrder => "CheckoutOrder",
            Self::UpdateDeliveryAddress => "UpdateDeliveryAddress",
            Self::CancelOrder => "CancelOrder",
            Self::QueryPolicy => "QueryPolicy",
            Self::ToProduct => "ToProduct",
            Self::ToCart => "ToCart",
            Self::ToOrder => "ToOrder",
            Self::CompleteOrEscalate => "CompleteOrEscalate",
        }
    }

    /// Fixed classification.
    #[must_use]
    pub fn kind(self) -> ToolKind {
        match self {
            Self::SearchProducts
            | Self::ListCategories
            | Self::ViewCart
            | Self::SearchOrders
            | Self::RecentOrders
            | Self::QueryPolicy => ToolKind::Safe,
            Self::AddToCart
            | Self::RemoveFromCart
            | Self::CheckoutOrder
            | Self::UpdateDeliveryAddress
            | Self::CancelOrder => ToolKind::Sensitive,
            Self::ToProduct => ToolKind::Delegate(ContextId::Product),
            Self::ToCart => ToolKind::Delegate(ContextId::Cart),
            Self::ToOrder => ToolKind::Delegate(ContextId::Order),
            Self::CompleteOrEscalate => ToolKind::Complete,
        }
    }

    /// Whether this is a routing marker rather than an executable tool.
    #[must_use]
    pub fn is_marker(self) -> bool {
        matches!(self.kind(), ToolKind::Delegate(_) | ToolKind::Complete)
    }

    /// Whether executing this tool requires human approval.
    #[must_use]
    pub fn is_sensitive(self) -> bool {
        matches!(self.kind(), ToolKind::Sensitive)
    }

    /// The tools a context may call, in schema order.
    #[must_use]
    pub fn permitted_for(context: ContextId) -> &'static [Self] {
        match context {
            ContextId::Primary => &[
                Self::QueryPolicy,
                Self::ToProduct,
                Self::ToCart,
                Self::ToOrder,
            ],
            ContextId::Product => &[
                Self::SearchProducts,
                Self::ListCategories,
                Self::CompleteOrEscalate,
            ],
            ContextId::Cart => &[
                Self::ViewCart,
                Self::AddToCart,
                Self::RemoveFromCart,
                Self::CompleteOrEscalate,
            ],
            ContextId::Order => &[
                Self::SearchOrders,
                Self::RecentOrders,
                Self::CheckoutOrder,
                Self::UpdateDeliveryAddress,
                Self::CancelOrder,
                Self::CompleteOrEscalate,
            ],
        }
    }

    /// Schema for routing markers, which have no implementation behind them.
    ///
    /// Returns `None` for executable tools; their implementations own their
    /// definitions.
    #[must_use]
    pub fn marker_definition(self) -> Option<ToolDefinition> {
        let (description, parameters) = match self {
            Self::ToProduct => (
                "Transfer the conversation to the product specialist for \
                 product search, browsing, and recommendations.",
                json!({
                    "type": "object",
                    "properties": {
                        "request": {
                            "type": "string",
                            "description": "What the user needs from the product specialist."
                        }
                    },
                    "required": ["request"]
                }),
            ),
            Self::ToCart => (
                "Transfer the conversation to the cart specialist for \
                 viewing or changing the shopping cart.",
                json!({
                    "type": "object",
                    "properties": {
                        "request": {
                            "type": "string",
                            "description": "What the user needs from the cart specialist."
                        }
                    },
                    "required": ["request"]
                }),
            ),
            Self::ToOrder => (
                "Transfer the conversation to the order specialist for \
                 checkout, order lookup, address changes, and cancellations.",
                json!({
                    "type": "object",
                    "properties": {
                        "request": {
                            "type": "string",
                            "description": "What the user needs from the order specialist."
                        }
                    },
                    "required": ["request"]
                }),
            ),
            Self::CompleteOrEscalate => (
                "Mark the current task as complete, or escalate back to the \
                 host assistant when the request is outside this specialist's \
                 scope or the user changed their mind.",
                json!({
                    "type": "object",
                    "properties": {
                        "reason": {
                            "type": "string",
                            "description": "Why control is returning to the host assistant."
                        }
                    },
                    "required": ["reason"]
                }),
            ),
            _ => return None,
        };
        Some(ToolDefinition::new(self.as_str(), description, parameters))
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
