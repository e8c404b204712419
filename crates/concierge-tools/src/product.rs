//! Product search and category tools.

use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Row, params_from_iter};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};

use concierge_core::tools::ToolDefinition;

use crate::args::{optional_str, parse_price_range};
use crate::catalog::ToolId;
use crate::errors::Result;
use crate::traits::{ShopTool, ToolContext};

/// One product row as presented to the reasoning engine.
#[derive(Debug, Serialize)]
struct ProductRow {
    id: i64,
    name: String,
    description: Option<String>,
    category: String,
    price: f64,
    stock: i64,
}

impl ProductRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            category: row.get(3)?,
            price: row.get(4)?,
            stock: row.get(5)?,
        })
    }
}

const PRODUCT_COLUMNS: &str = "id, name, description, category, price, stock";

// ─────────────────────────────────────────────────────────────────────────────
// SearchProducts
// ─────────────────────────────────────────────────────────────────────────────

/// Search products by name, category, and price range, with alternative
/// recommendations drawn from the same category at a similar price.
pub struct SearchProductsTool;

#[async_trait]
impl ShopTool for SearchProductsTool {
    fn id(&self) -> ToolId {
        ToolId::SearchProducts
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.id().as_str(),
            "Search for products by name, category, and/or price range, and \
             get recommendations for similar products.",
            json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Product name or partial name to match."
                    },
                    "category": {
                        "type": "string",
                        "description": "Category to filter by."
                    },
                    "price_range": {
                        "type": "string",
                        "description": "Price range in the form 'min-max', e.g. '10-50'."
                    }
                }
            }),
        )
    }

    #[instrument(skip_all, name = "search_products")]
    async fn execute(&self, arguments: &Map<String, Value>, ctx: &ToolContext) -> Result<String> {
        let name = optional_str(arguments, "name")?;
        let category = optional_str(arguments, "category")?;
        let price_range = optional_str(arguments, "price_range")?
            .map(parse_price_range)
            .transpose()?;

        let mut query = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE 1=1");
        let mut params: Vec<SqlValue> = Vec::new();
        if let Some(name) = name {
            query.push_str(" AND name LIKE ?");
            params.push(SqlValue::Text(format!("%{name}%")));
        }
        if let Some(category) = category {
            query.push_str(" AND category = ?");
            params.push(SqlValue::Text(category.to_owned()));
        }
        if let Some((min, max)) = price_range {
            query.push_str(" AND price BETWEEN ? AND ?");
            params.push(SqlValue::Real(min));
            params.push(SqlValue::Real(max));
        }
        query.push_str(" ORDER BY id");

        let conn = ctx.pool.get()?;
        let mut stmt = conn.prepare(&query)?;
        let results: Vec<ProductRow> = stmt
            .query_map(params_from_iter(params), ProductRow::from_row)?
            .collect::<rusqlite::Result<_>>()?;

        if results.is_empty() {
            debug!("no products matched; skipping recommendations");
            return Ok(serde_json::to_string(&json!({
                "search_results": [],
                "recommendations": [],
            }))?);
        }

        // Alternatives: same category, within 20% of the first hit's price,
        // excluding the searched name itself.
        let anchor = &results[0];
        let mut stmt = conn.prepare(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE category = ? AND price BETWEEN ? AND ? AND name NOT LIKE ? \
             LIMIT 5"
        ))?;
        let recommendations: Vec<ProductRow> = stmt
            .query_map(
                rusqlite::params![
                    category.unwrap_or(anchor.category.as_str()),
                    anchor.price * 0.8,
                    anchor.price * 1.2,
                    format!("%{}%", name.unwrap_or_default()),
                ],
                ProductRow::from_row,
            )?
            .collect::<rusqlite::Result<_>>()?;

        debug!(
            results = results.len(),
            recommendations = recommendations.len(),
            "product search complete"
        );
        Ok(serde_json::to_string(&json!({
            "search_results": results,
            "recommendations": recommendations,
        }))?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ListCategories
// ─────────────────────────────────────────────────────────────────────────────

/// List the distinct product categories in the shop.
pub struct ListCategoriesTool;

#[async_trait]
impl ShopTool for ListCategoriesTool {
    fn id(&self) -> ToolId {
        ToolId::ListCategories
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.id().as_str(),
            "List all product categories available in the shop.",
            json!({"type": "object", "properties": {}}),
        )
    }

    #[instrument(skip_all, name = "list_categories")]
    async fn execute(&self, _arguments: &Map<String, Value>, ctx: &ToolContext) -> Result<String> {
        let conn = ctx.pool.get()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT category FROM products ORDER BY category")?;
        let categories: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;
        Ok(serde_json::to_string(&categories)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use concierge_core::state::UserProfile;

    fn ctx() -> ToolContext {
        let pool = db::new_in_memory().unwrap();
        db::seed_demo_data(&pool.get().unwrap()).unwrap();
        ToolContext::new(pool, UserProfile::new(1, "Alex"))
    }

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn search_by_name_finds_products() {
        let result = SearchProductsTool
            .execute(&args(json!({"name": "Mouse"})), &ctx())
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["search_results"][0]["name"], "Wireless Mouse");
    }

    #[tokio::test]
    async fn search_recommends_same_category_near_price() {
        // Ceramic Mug is $12; the only other Kitchen item is the $29.95
        // French Press, outside the 20% band, so no recommendations.
        let result = SearchProductsTool
            .execute(&args(json!({"name": "Mug"})), &ctx())
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["recommendations"].as_array().unwrap().len(), 0);

        let result = SearchProductsTool
            .execute(
                &args(json!({"category": "Electronics", "price_range": "20-45"})),
                &ctx(),
            )
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["search_results"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn search_without_matches_skips_recommendations() {
        let result = SearchProductsTool
            .execute(&args(json!({"name": "Unobtainium"})), &ctx())
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["search_results"].as_array().unwrap().len(), 0);
        assert_eq!(parsed["recommendations"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn search_rejects_malformed_price_range() {
        let err = SearchProductsTool
            .execute(&args(json!({"price_range": "cheap"})), &ctx())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("price_range"));
    }

    #[tokio::test]
    async fn list_categories_sorted_distinct() {
        let result = ListCategoriesTool
            .execute(&Map::new(), &ctx())
            .await
            .unwrap();
        let categories: Vec<String> = serde_json::from_str(&result).unwrap();
        assert_eq!(categories, vec!["Electronics", "Home", "Kitchen", "Sports"]);
    }
}
