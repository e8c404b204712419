//! Order management tools.
//!
//! Checkout is the one multi-statement operation in the catalog and runs in
//! a single transaction: order creation, stock decrement, and cart clearing
//! either all land or none do.

use async_trait::async_trait;
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument, warn};

use concierge_core::tools::ToolDefinition;

use crate::args::{i64_or, require_i64, require_str};
use crate::catalog::ToolId;
use crate::errors::Result;
use crate::traits::{ShopTool, ToolContext};

/// Payment methods accepted at checkout.
pub const VALID_PAYMENT_METHODS: [&str; 5] = [
    "Credit Card",
    "PayPal",
    "Apple Pay",
    "Google Pay",
    "Bank Transfer",
];

/// Order states that refuse address changes and cancellation.
const FINAL_STATUSES: [&str; 3] = ["Shipped", "Delivered", "Cancelled"];

// ─────────────────────────────────────────────────────────────────────────────
// CheckoutOrder
// ─────────────────────────────────────────────────────────────────────────────

/// Turn the user's cart into an order.
pub struct CheckoutOrderTool;

#[async_trait]
impl ShopTool for CheckoutOrderTool {
    fn id(&self) -> ToolId {
        ToolId::CheckoutOrder
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.id().as_str(),
            "Check out the user's cart: create an order with a delivery \
             address and payment method, decrement stock, and clear the cart.",
            json!({
                "type": "object",
                "properties": {
                    "address": {
                        "type": "string",
                        "description": "Delivery address for the order."
                    },
                    "payment_method": {
                        "type": "string",
                        "description": "One of: Credit Card, PayPal, Apple Pay, Google Pay, Bank Transfer."
                    }
                },
                "required": ["address", "payment_method"]
            }),
        )
    }

    #[instrument(skip_all, name = "checkout_order", fields(user_id = ctx.user.user_id))]
    async fn execute(&self, arguments: &Map<String, Value>, ctx: &ToolContext) -> Result<String> {
        let address = require_str(arguments, "address")?;
        let payment_method = require_str(arguments, "payment_method")?;

        if !VALID_PAYMENT_METHODS.contains(&payment_method) {
            warn!(payment_method, "invalid payment method");
            return Ok(format!(
                "Invalid payment method. Available methods are: {}.",
                VALID_PAYMENT_METHODS.join(", ")
            ));
        }

        let mut conn = ctx.pool.get()?;
        let tx = conn.transaction()?;

        let cart: Vec<(i64, f64, i64, i64)> = {
            let mut stmt = tx.prepare(
                "SELECT p.id, p.price, ci.quantity, p.stock
                 FROM cart_items ci
                 JOIN products p ON ci.product_id = p.id
                 WHERE ci.user_id = ?",
            )?;
            stmt.query_map(params![ctx.user.user_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<rusqlite::Result<_>>()?
        };

        if cart.is_empty() {
            warn!("checkout on empty cart");
            return Ok("Your cart is empty. Please add items before checking out.".into());
        }

        let shortages: Vec<String> = cart
            .iter()
            .filter(|(_, _, quantity, stock)| stock < quantity)
            .map(|(product_id, _, quantity, stock)| {
                format!("Product ID {product_id} only has {stock} in stock (requested {quantity}).")
            })
            .collect();
        if !shortages.is_empty() {
            warn!(items = shortages.len(), "checkout blocked by stock");
            return Ok(format!(
                "Checkout failed due to insufficient stock:\n{}",
                shortages.join("\n")
            ));
        }

        let total_amount: f64 = cart
            .iter()
            .map(|(_, price, quantity, _)| price * (*quantity as f64))
            .sum();

        let _ = tx.execute(
            "INSERT INTO orders (user_id, total_amount, delivery_address, payment_method)
             VALUES (?, ?, ?, ?)",
            params![ctx.user.user_id, total_amount, address, payment_method],
        )?;
        let order_id = tx.last_insert_rowid();

        for (product_id, price, quantity, _) in &cart {
            let _ = tx.execute(
                "INSERT INTO order_products (order_id, product_id, quantity, price)
                 VALUES (?, ?, ?, ?)",
                params![order_id, product_id, quantity, price],
            )?;
            let _ = tx.execute(
                "UPDATE products SET stock = stock - ? WHERE id = ?",
                params![quantity, product_id],
            )?;
        }
        let _ = tx.execute(
            "DELETE FROM cart_items WHERE user_id = ?",
            params![ctx.user.user_id],
        )?;
        tx.commit()?;

        info!(order_id, total_amount, "checkout complete");
        Ok(format!(
            "Checkout successful! Your order ID is {order_id}. Total amount: ${total_amount:.2}."
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SearchOrders
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct OrderLine {
    name: String,
    quantity: i64,
    price: f64,
}

/// Look up the details of one order.
pub struct SearchOrdersTool;

#[async_trait]
impl ShopTool for SearchOrdersTool {
    fn id(&self) -> ToolId {
        ToolId::SearchOrders
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.id().as_str(),
            "Get the details of a specific order, including its products.",
            json!({
                "type": "object",
                "properties": {
                    "order_id": {
                        "type": "integer",
                        "description": "ID of the order to look up."
                    }
                },
                "required": ["order_id"]
            }),
        )
    }

    #[instrument(skip_all, name = "search_orders")]
    async fn execute(&self, arguments: &Map<String, Value>, ctx: &ToolContext) -> Result<String> {
        let order_id = require_i64(arguments, "order_id")?;
        let conn = ctx.pool.get()?;

        let order = conn
            .query_row(
                "SELECT id, user_id, total_amount, status, delivery_address,
                        cancellation_reason, created_at, updated_at
                 FROM orders WHERE id = ?",
                params![order_id],
                |row| {
                    Ok(json!({
                        "order_id": row.get::<_, i64>(0)?,
                        "user_id": row.get::<_, i64>(1)?,
                        "total_amount": row.get::<_, f64>(2)?,
                        "status": row.get::<_, String>(3)?,
                        "delivery_address": row.get::<_, String>(4)?,
                        "cancellation_reason": row.get::<_, Option<String>>(5)?,
                        "created_at": row.get::<_, String>(6)?,
                        "updated_at": row.get::<_, String>(7)?,
                    }))
                },
            )
            .optional()?;

        let Some(mut order) = order else {
            warn!(order_id, "order not found");
            return Ok(format!("No order found with ID {order_id}."));
        };

        let mut stmt = conn.prepare(
            "SELECT p.name, op.quantity, op.price
             FROM order_products op
             JOIN products p ON op.product_id = p.id
             WHERE op.order_id = ?",
        )?;
        let products: Vec<OrderLine> = stmt
            .query_map(params![order_id], |row| {
                Ok(OrderLine {
                    name: row.get(0)?,
                    quantity: row.get(1)?,
                    price: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<_>>()?;

        if let Some(details) = order.as_object_mut() {
            let _ = details.insert("products".into(), serde_json::to_value(&products)?);
        }
        debug!(order_id, "order details retrieved");
        Ok(serde_json::to_string(&order)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RecentOrders
// ─────────────────────────────────────────────────────────────────────────────

/// List the user's orders from the last N days (default 7).
pub struct RecentOrdersTool;

#[async_trait]
impl ShopTool for RecentOrdersTool {
    fn id(&self) -> ToolId {
        ToolId::RecentOrders
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.id().as_str(),
            "List the user's recent orders within the last N days.",
            json!({
                "type": "object",
                "properties": {
                    "days": {
                        "type": "integer",
                        "description": "How many days to look back. Defaults to 7."
                    }
                }
            }),
        )
    }

    #[instrument(skip_all, name = "recent_orders", fields(user_id = ctx.user.user_id))]
    async fn execute(&self, arguments: &Map<String, Value>, ctx: &ToolContext) -> Result<String> {
        let days = i64_or(arguments, "days", 7)?;
        let conn = ctx.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, total_amount, status, delivery_address, created_at, updated_at
             FROM orders
             WHERE user_id = ? AND created_at >= datetime('now', ? || ' days')
             ORDER BY created_at DESC",
        )?;
        let orders: Vec<Value> = stmt
            .query_map(params![ctx.user.user_id, format!("-{days}")], |row| {
                Ok(json!({
                    "order_id": row.get::<_, i64>(0)?,
                    "total_amount": row.get::<_, f64>(1)?,
                    "status": row.get::<_, String>(2)?,
                    "delivery_address": row.get::<_, String>(3)?,
                    "created_at": row.get::<_, String>(4)?,
                    "updated_at": row.get::<_, String>(5)?,
                }))
            })?
            .collect::<rusqlite::Result<_>>()?;

        if orders.is_empty() {
            debug!(days, "no recent orders");
            return Ok(format!(
                "No recent orders found within the last {days} days."
            ));
        }
        Ok(serde_json::to_string(&orders)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// UpdateDeliveryAddress
// ─────────────────────────────────────────────────────────────────────────────

/// Change the delivery address of an order that has not shipped.
pub struct UpdateDeliveryAddressTool;

#[async_trait]
impl ShopTool for UpdateDeliveryAddressTool {
    fn id(&self) -> ToolId {
        ToolId::UpdateDeliveryAddress
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.id().as_str(),
            "Update the delivery address of an order that has not yet shipped.",
            json!({
                "type": "object",
                "properties": {
                    "order_id": {
                        "type": "integer",
                        "description": "ID of the order to update."
                    },
                    "new_address": {
                        "type": "string",
                        "description": "The new delivery address."
                    }
                },
                "required": ["order_id", "new_address"]
            }),
        )
    }

    #[instrument(skip_all, name = "update_delivery_address")]
    async fn execute(&self, arguments: &Map<String, Value>, ctx: &ToolContext) -> Result<String> {
        let order_id = require_i64(arguments, "order_id")?;
        let new_address = require_str(arguments, "new_address")?;
        let conn = ctx.pool.get()?;

        let Some(status) = order_status(&conn, order_id)? else {
            warn!(order_id, "order not found");
            return Ok(format!("No order found with ID {order_id}."));
        };
        if FINAL_STATUSES.contains(&status.as_str()) {
            warn!(order_id, status, "address change refused");
            return Ok(format!(
                "Cannot update address for order {order_id} with status: {status}."
            ));
        }

        let _ = conn.execute(
            "UPDATE orders
             SET delivery_address = ?, updated_at = datetime('now')
             WHERE id = ?",
            params![new_address, order_id],
        )?;
        info!(order_id, "delivery address updated");
        Ok(format!(
            "Delivery address for order {order_id} has been updated successfully."
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CancelOrder
// ─────────────────────────────────────────────────────────────────────────────

/// Cancel an order that has not shipped, recording the reason.
pub struct CancelOrderTool;

#[async_trait]
impl ShopTool for CancelOrderTool {
    fn id(&self) -> ToolId {
        ToolId::CancelOrder
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.id().as_str(),
            "Cancel an order that has not yet shipped, recording a reason.",
            json!({
                "type": "object",
                "properties": {
                    "order_id": {
                        "type": "integer",
                        "description": "ID of the order to cancel."
                    },
                    "reason": {
                        "type": "string",
                        "description": "Why the order is being cancelled."
                    }
                },
                "required": ["order_id", "reason"]
            }),
        )
    }

    #[instrument(skip_all, name = "cancel_order")]
    async fn execute(&self, arguments: &Map<String, Value>, ctx: &ToolContext) -> Result<String> {
        let order_id = require_i64(arguments, "order_id")?;
        let reason = require_str(arguments, "reason")?;
        let conn = ctx.pool.get()?;

        let Some(status) = order_status(&conn, order_id)? else {
            warn!(order_id, "order not found");
            return Ok(format!("No order found with ID {order_id}."));
        };
        if FINAL_STATUSES.contains(&status.as_str()) {
            warn!(order_id, status, "cancellation refused");
            return Ok(format!(
                "Cannot cancel order {order_id} with status: {status}."
            ));
        }

        let _ = conn.execute(
            "UPDATE orders
             SET status = 'Cancelled', cancellation_reason = ?, updated_at = datetime('now')
             WHERE id = ?",
            params![reason, order_id],
        )?;
        info!(order_id, "order cancelled");
        Ok(format!(
            "Order {order_id} has been cancelled successfully. Reason: {reason}"
        ))
    }
}

fn order_status(conn: &rusqlite::Connection, order_id: i64) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT status FROM orders WHERE id = ?",
            params![order_id],
            |row| row.get(0),
        )
        .optional()?)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
