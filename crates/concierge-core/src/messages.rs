//! Message types for the conversation model.
//!
//! Messages form the append-only history passed to the reasoning engine.
//! Three roles: user, assistant, and tool reply. Every tool-role message
//! answers exactly one earlier assistant tool call via `reply_to`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::ToolCallId;

// ─────────────────────────────────────────────────────────────────────────────
// Tool call
// ─────────────────────────────────────────────────────────────────────────────

/// A tool call emitted by the assistant.
///
/// `name` is the raw wire string from the reasoning engine; it is parsed
/// into a closed `ToolId` at the gate so that unknown names survive long
/// enough to be echoed back in an error reply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique tool call ID (unique within its owning message).
    pub id: ToolCallId,
    /// Tool name as sent by the reasoning engine.
    pub name: String,
    /// Tool arguments (JSON object).
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Create a new tool call.
    #[must_use]
    pub fn new(id: impl Into<ToolCallId>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Message
// ─────────────────────────────────────────────────────────────────────────────

/// A conversation message (discriminated by `role`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role")]
pub enum Message {
    /// Inbound user message.
    #[serde(rename = "user")]
    User {
        /// Message text.
        content: String,
    },
    /// Assistant message, possibly carrying tool calls.
    #[serde(rename = "assistant")]
    Assistant {
        /// Assistant text (may be empty when only tool calls are present).
        content: String,
        /// Ordered tool calls requested this turn.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// Tool reply answering exactly one earlier assistant tool call.
    #[serde(rename = "tool")]
    Tool {
        /// ID of the tool call this message answers.
        #[serde(rename = "replyTo")]
        reply_to: ToolCallId,
        /// Result text or error description.
        content: String,
        /// Whether the reply describes a failure.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

impl Message {
    /// Create a user message.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::User {
            content: text.into(),
        }
    }

    /// Create a plain-text assistant message.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant {
            content: text.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Create an assistant message with tool calls.
    #[must_use]
    pub fn assistant_with_calls(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant {
            content: text.into(),
            tool_calls,
        }
    }

    /// Create a successful tool reply.
    #[must_use]
    pub fn tool_reply(reply_to: ToolCallId, content: impl Into<String>) -> Self {
        Self::Tool {
            reply_to,
            content: content.into(),
            is_error: None,
        }
    }

    /// Create an error tool reply.
    #[must_use]
    pub fn tool_error(reply_to: ToolCallId, content: impl Into<String>) -> Self {
        Self::Tool {
            reply_to,
            content: content.into(),
            is_error: Some(true),
        }
    }

    /// Returns `true` if this is an assistant message carrying tool calls.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        matches!(self, Self::Assistant { tool_calls, .. } if !tool_calls.is_empty())
    }

    /// Tool calls carried by this message (empty for non-assistant roles).
    #[must_use]
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// Returns `true` if this is a tool reply.
    #[must_use]
    pub fn is_tool_reply(&self) -> bool {
        matches!(self, Self::Tool { .. })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
