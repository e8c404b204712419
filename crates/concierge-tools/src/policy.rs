//! Company policy lookup.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::instrument;

use concierge_core::tools::ToolDefinition;

use crate::args::require_str;
use crate::catalog::ToolId;
use crate::errors::Result;
use crate::traits::{ShopTool, ToolContext};

const SHIPPING_POLICY: &str = "Our shipping policy includes free shipping on orders over $50. \
     Delivery times vary by location, usually up to 15 days to shipping.";
const RETURN_POLICY: &str = "Our return policy allows returns within 30 days of receipt. \
     Items must be unused and in original packaging.";
const PRIVACY_POLICY: &str = "Our privacy policy ensures that your personal data is protected. \
     We do not share your information with third parties without consent.";

/// Fetch the text of a company policy.
pub struct QueryPolicyTool;

#[async_trait]
impl ShopTool for QueryPolicyTool {
    fn id(&self) -> ToolId {
        ToolId::QueryPolicy
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.id().as_str(),
            "Fetch the content of a company policy.",
            json!({
                "type": "object",
                "properties": {
                    "policy_type": {
                        "type": "string",
                        "enum": ["shipping", "return", "privacy"],
                        "description": "Which policy to fetch."
                    }
                },
                "required": ["policy_type"]
            }),
        )
    }

    #[instrument(skip_all, name = "query_policy")]
    async fn execute(&self, arguments: &Map<String, Value>, _ctx: &ToolContext) -> Result<String> {
        let policy_type = require_str(arguments, "policy_type")?;
        Ok(match policy_type {
            "shipping" => SHIPPING_POLICY.to_owned(),
            "return" => RETURN_POLICY.to_owned(),
            "privacy" => PRIVACY_POLICY.to_owned(),
            _ => "Policy not found.".to_owned(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
