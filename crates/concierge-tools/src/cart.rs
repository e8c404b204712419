//! Shopping cart tools.
//!
//! The cart belongs to the user on the tool context; the reasoning engine
//! never supplies an account ID.

use async_trait::async_trait;
use rusqlite::params;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};

use concierge_core::tools::ToolDefinition;

use crate::args::require_i64;
use crate::catalog::ToolId;
use crate::errors::Result;
use crate::traits::{ShopTool, ToolContext};

/// One cart line as presented to the reasoning engine.
#[derive(Debug, Serialize)]
struct CartLine {
    product_id: i64,
    name: String,
    price: f64,
    quantity: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// ViewCart
// ─────────────────────────────────────────────────────────────────────────────

/// List the contents of the user's cart.
pub struct ViewCartTool;

#[async_trait]
impl ShopTool for ViewCartTool {
    fn id(&self) -> ToolId {
        ToolId::ViewCart
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.id().as_str(),
            "View the products currently in the user's shopping cart.",
            json!({"type": "object", "properties": {}}),
        )
    }

    #[instrument(skip_all, name = "view_cart", fields(user_id = ctx.user.user_id))]
    async fn execute(&self, _arguments: &Map<String, Value>, ctx: &ToolContext) -> Result<String> {
        let conn = ctx.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT p.id, p.name, p.price, ci.quantity
             FROM cart_items ci
             JOIN products p ON ci.product_id = p.id
             WHERE ci.user_id = ?
             ORDER BY p.id",
        )?;
        let lines: Vec<CartLine> = stmt
            .query_map(params![ctx.user.user_id], |row| {
                Ok(CartLine {
                    product_id: row.get(0)?,
                    name: row.get(1)?,
                    price: row.get(2)?,
                    quantity: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<_>>()?;
        debug!(items = lines.len(), "cart retrieved");
        Ok(serde_json::to_string(&lines)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AddToCart
// ─────────────────────────────────────────────────────────────────────────────

/// Add one unit of a product to the cart, incrementing on repeat adds.
pub struct AddToCartTool;

#[async_trait]
impl ShopTool for AddToCartTool {
    fn id(&self) -> ToolId {
        ToolId::AddToCart
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.id().as_str(),
            "Add one unit of a product to the user's shopping cart.",
            json!({
                "type": "object",
                "properties": {
                    "product_id": {
                        "type": "integer",
                        "description": "ID of the product to add."
                    }
                },
                "required": ["product_id"]
            }),
        )
    }

    #[instrument(skip_all, name = "add_to_cart", fields(user_id = ctx.user.user_id))]
    async fn execute(&self, arguments: &Map<String, Value>, ctx: &ToolContext) -> Result<String> {
        let product_id = require_i64(arguments, "product_id")?;
        let conn = ctx.pool.get()?;

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM products WHERE id = ?)",
            params![product_id],
            |row| row.get(0),
        )?;
        if !exists {
            warn!(product_id, "add_to_cart for unknown product");
            return Ok(format!("No product found with ID {product_id}."));
        }

        let _ = conn.execute(
            "INSERT INTO cart_items (user_id, product_id, quantity)
             VALUES (?, ?, 1)
             ON CONFLICT(user_id, product_id) DO UPDATE SET quantity = quantity + 1",
            params![ctx.user.user_id, product_id],
        )?;
        debug!(product_id, "product added to cart");
        Ok(format!(
            "Product {product_id} successfully added to your cart."
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RemoveFromCart
// ─────────────────────────────────────────────────────────────────────────────

/// Remove a product from the cart entirely.
pub struct RemoveFromCartTool;

#[async_trait]
impl ShopTool for RemoveFromCartTool {
    fn id(&self) -> ToolId {
        ToolId::RemoveFromCart
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.id().as_str(),
            "Remove a product from the user's shopping cart.",
            json!({
                "type": "object",
                "properties": {
                    "product_id": {
                        "type": "integer",
                        "description": "ID of the product to remove."
                    }
                },
                "required": ["product_id"]
            }),
        )
    }

    #[instrument(skip_all, name = "remove_from_cart", fields(user_id = ctx.user.user_id))]
    async fn execute(&self, arguments: &Map<String, Value>, ctx: &ToolContext) -> Result<String> {
        let product_id = require_i64(arguments, "product_id")?;
        let conn = ctx.pool.get()?;
        let removed = conn.execute(
            "DELETE FROM cart_items WHERE user_id = ? AND product_id = ?",
            params![ctx.user.user_id, product_id],
        )?;
        if removed > 0 {
            debug!(product_id, "product removed from cart");
            Ok(format!(
                "Product {product_id} successfully removed from your cart."
            ))
        } else {
            warn!(product_id, "remove_from_cart miss");
            Ok(format!("Product {product_id} is not in your cart."))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
