//! Persisted conversation state.
//!
//! [`ConversationState`] is the complete machine state for one thread: the
//! message history, the dialog stack together with its operation log, the
//! user profile, and (at most one) pending interrupt. It is what the
//! checkpoint store serializes after every transition, so every field is
//! forward-compatible: additive fields carry `#[serde(default)]` and old
//! snapshots keep deserializing as the schema grows.

use serde::{Deserialize, Serialize};

use crate::context::{ContextId, DialogStack, StackOp};
use crate::messages::{Message, ToolCall};

/// Current state schema version, stored alongside every checkpoint.
pub const STATE_SCHEMA_VERSION: u32 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// UserProfile
// ─────────────────────────────────────────────────────────────────────────────

/// The profile of the user a thread belongs to.
///
/// Injected into context instructions and passed to tools so that cart and
/// order operations act on the right account without the assistant ever
/// asking for an ID.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Shop account ID.
    pub user_id: i64,
    /// Display name.
    pub name: String,
    /// Self-reported gender, free-form.
    #[serde(default)]
    pub gender: Option<String>,
    /// Age in years.
    #[serde(default)]
    pub age: Option<u32>,
    /// Delivery address on file.
    #[serde(default)]
    pub address: Option<String>,
}

impl UserProfile {
    /// Minimal profile with just an account ID and name.
    #[must_use]
    pub fn new(user_id: i64, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            gender: None,
            age: None,
            address: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PendingInterrupt
// ─────────────────────────────────────────────────────────────────────────────

/// A suspended sensitive tool batch awaiting human review.
///
/// At most one exists per thread. The whole batch is held: approval executes
/// every call in order, denial discards them all.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingInterrupt {
    /// The context that requested the calls.
    pub context: ContextId,
    /// The suspended tool calls, in request order.
    pub tool_calls: Vec<ToolCall>,
}

// ─────────────────────────────────────────────────────────────────────────────
// ConversationState
// ─────────────────────────────────────────────────────────────────────────────

/// Full machine state for one conversation thread.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Append-only message history.
    pub messages: Vec<Message>,
    /// Live dialog stack.
    #[serde(default)]
    pub dialog_stack: DialogStack,
    /// Ordered log of every stack operation ever applied. Replaying it from
    /// an empty stack must reproduce `dialog_stack`.
    #[serde(default)]
    pub stack_log: Vec<StackOp>,
    /// Owning user.
    pub user: UserProfile,
    /// Suspended sensitive batch, if any.
    #[serde(default)]
    pub pending: Option<PendingInterrupt>,
    /// Completed turn count.
    #[serde(default)]
    pub turns: u64,
}

impl ConversationState {
    /// Fresh state for a new thread.
    #[must_use]
    pub fn new(user: UserProfile) -> Self {
        Self {
            messages: Vec::new(),
            dialog_stack: DialogStack::new(),
            stack_log: Vec::new(),
            user,
            pending: None,
            turns: 0,
        }
    }

    /// The currently active context.
    #[must_use]
    pub fn active_context(&self) -> ContextId {
        self.dialog_stack.active()
    }

    /// Append a message to the history.
    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Apply a stack operation, recording it in the operation log.
    pub fn apply_stack_op(&mut self, op: StackOp) {
        self.dialog_stack.apply(op);
        self.stack_log.push(op);
    }

    /// Whether a sensitive batch is awaiting review.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.pending.is_some()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
