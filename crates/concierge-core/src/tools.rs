//! Tool definition types shared by the registry and the reasoning engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-schema description of one tool, as advertised to the reasoning
/// engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name as it appears on the wire.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON schema for the arguments object.
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a definition.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}
