//! # Provider Trait
//!
//! Core abstraction for reasoning-engine backends. Every backend implements
//! [`Provider`] to expose a single non-streaming chat completion call: the
//! conversation history and the active context's tool schemas go in, an
//! assistant message (text and/or tool calls) comes out.

use async_trait::async_trait;

use concierge_core::messages::{Message, ToolCall};
use concierge_core::tools::ToolDefinition;

/// Result type alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur during provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Authentication failed (invalid or missing API key).
    #[error("Auth error: {message}")]
    Auth {
        /// Error description.
        message: String,
    },

    /// Backend returned an API error.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
        /// Whether this error can be retried.
        retryable: bool,
    },

    /// The response body did not contain a usable completion.
    #[error("Malformed completion: {message}")]
    MalformedResponse {
        /// Error description.
        message: String,
    },

    /// Backend-specific error.
    #[error("{message}")]
    Other {
        /// Error description.
        message: String,
    },
}

impl ProviderError {
    /// Whether this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s == reqwest::StatusCode::TOO_MANY_REQUESTS || s.is_server_error()
                    })
            }
            Self::Api { retryable, .. } => *retryable,
            Self::Json(_)
            | Self::Auth { .. }
            | Self::MalformedResponse { .. }
            | Self::Other { .. } => false,
        }
    }

    /// Error category string for log fields.
    #[must_use]
    pub fn category(&self) -> &str {
        match self {
            Self::Http(_) => "network",
            Self::Json(_) | Self::MalformedResponse { .. } => "parse",
            Self::Auth { .. } => "auth",
            Self::Api { .. } => "api",
            Self::Other { .. } => "unknown",
        }
    }
}

/// One chat completion request.
#[derive(Clone, Debug)]
pub struct ChatRequest {
    /// System instructions for the active context.
    pub instructions: String,
    /// Conversation history, oldest first.
    pub messages: Vec<Message>,
    /// Tools the active context may call.
    pub tools: Vec<ToolDefinition>,
}

/// The assistant message produced by one completion.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatResponse {
    /// Assistant text (may be empty).
    pub content: String,
    /// Tool calls requested, in order.
    pub tool_calls: Vec<ToolCall>,
}

impl ChatResponse {
    /// A response is degenerate when it carries neither text nor tool
    /// calls. The adapter retries these a bounded number of times.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.content.trim().is_empty() && self.tool_calls.is_empty()
    }

    /// Convert into an assistant [`Message`] for the history.
    #[must_use]
    pub fn into_message(self) -> Message {
        Message::assistant_with_calls(self.content, self.tool_calls)
    }
}

/// Core reasoning-engine trait.
///
/// Implementors must be `Send + Sync` for use across async tasks.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Backend identifier for logs (e.g., `"openai"`, `"mock"`).
    fn provider_type(&self) -> &str;

    /// Produce one chat completion.
    async fn complete(&self, request: &ChatRequest) -> ProviderResult<ChatResponse>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
