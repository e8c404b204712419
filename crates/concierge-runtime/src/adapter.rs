//! Bounded-retry wrapper around the reasoning engine.
//!
//! A degenerate response (no text, no tool calls) gets a corrective user
//! message appended to a scratch copy of the history and one more attempt.
//! The retry bound is hard: exceeding it surfaces
//! [`RuntimeError::AdapterExhausted`] instead of looping forever.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use concierge_core::messages::Message;
use concierge_core::tools::ToolDefinition;
use concierge_llm::{ChatRequest, ChatResponse, Provider};

use crate::contexts::CORRECTIVE_PROMPT;
use crate::errors::{Result, RuntimeError};

/// Maximum completion attempts per agent step.
pub const MAX_ATTEMPTS: u32 = 3;

/// Reasoning engine adapter with degenerate-response retry.
#[derive(Clone)]
pub struct Adapter {
    provider: Arc<dyn Provider>,
    max_attempts: u32,
}

impl Adapter {
    /// Wrap a provider with the default attempt bound.
    #[must_use]
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    /// Override the attempt bound (tests).
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Produce one non-degenerate assistant response.
    #[instrument(skip_all, fields(provider = self.provider.provider_type()))]
    pub async fn complete(
        &self,
        instructions: String,
        history: &[Message],
        tools: Vec<ToolDefinition>,
    ) -> Result<ChatResponse> {
        let mut messages = history.to_vec();
        for attempt in 1..=self.max_attempts {
            let request = ChatRequest {
                instructions: instructions.clone(),
                messages: messages.clone(),
                tools: tools.clone(),
            };
            let response = self.provider.complete(&request).await?;
            if !response.is_degenerate() {
                debug!(attempt, "completion accepted");
                return Ok(response);
            }
            warn!(attempt, "degenerate completion, re-prompting");
            messages.push(Message::user(CORRECTIVE_PROMPT));
        }
        Err(RuntimeError::AdapterExhausted {
            attempts: self.max_attempts,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
