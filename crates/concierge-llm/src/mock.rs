//! # Scripted Mock Provider
//!
//! Deterministic backend for tests. Responses are queued in order; each
//! `complete` call pops the next one. Running out of script is a test bug
//! and surfaces as a provider error rather than a panic, so suspended-turn
//! tests can assert clean failure paths too.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::provider::{ChatRequest, ChatResponse, Provider, ProviderError, ProviderResult};

/// Provider that replays a fixed script of responses.
pub struct MockProvider {
    script: Mutex<VecDeque<ChatResponse>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockProvider {
    /// Create a provider with the given scripted responses, served in order.
    #[must_use]
    pub fn new(responses: impl IntoIterator<Item = ChatResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Append a response to the end of the script.
    pub fn push(&self, response: ChatResponse) {
        self.script.lock().push_back(response);
    }

    /// Requests received so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    /// Number of scripted responses not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn provider_type(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &ChatRequest) -> ProviderResult<ChatResponse> {
        self.requests.lock().push(request.clone());
        self.script
            .lock()
            .pop_front()
            .ok_or_else(|| ProviderError::Other {
                message: "mock script exhausted".into(),
            })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
