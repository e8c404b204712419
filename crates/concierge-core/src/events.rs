//! Lifecycle events emitted by the orchestrator.
//!
//! Events are broadcast to observers (CLI renderer, logs) and never feed
//! back into the machine. They describe what happened, not what to do.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::ContextId;
use crate::ids::{ThreadId, ToolCallId};

// ─────────────────────────────────────────────────────────────────────────────
// BaseEvent
// ─────────────────────────────────────────────────────────────────────────────

/// Fields common to every event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseEvent {
    /// Thread the event belongs to.
    pub thread_id: ThreadId,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
}

impl BaseEvent {
    /// New base stamped with the current time.
    #[must_use]
    pub fn now(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            timestamp: Utc::now(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AgentEvent
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the orchestrator announces while driving a thread.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A user turn began processing.
    TurnStart {
        /// Common fields.
        base: BaseEvent,
        /// The inbound user text.
        user_message: String,
    },
    /// The assistant produced a user-visible reply.
    AssistantReply {
        /// Common fields.
        base: BaseEvent,
        /// Context that produced the reply.
        context: ContextId,
        /// Reply text.
        content: String,
    },
    /// A tool started executing.
    ToolExecutionStart {
        /// Common fields.
        base: BaseEvent,
        /// Tool call being executed.
        tool_call_id: ToolCallId,
        /// Tool name.
        tool_name: String,
    },
    /// A tool finished executing.
    ToolExecutionEnd {
        /// Common fields.
        base: BaseEvent,
        /// Tool call that finished.
        tool_call_id: ToolCallId,
        /// Tool name.
        tool_name: String,
        /// Whether the tool reported an error.
        is_error: bool,
    },
    /// A delegate context was entered (pushed onto the dialog stack).
    ContextEntered {
        /// Common fields.
        base: BaseEvent,
        /// Context entered.
        context: ContextId,
    },
    /// The active context was left (popped off the dialog stack).
    ContextLeft {
        /// Common fields.
        base: BaseEvent,
        /// Context left.
        context: ContextId,
        /// Context now active.
        resumed: ContextId,
    },
    /// A sensitive tool batch was suspended pending human review.
    InterruptRaised {
        /// Common fields.
        base: BaseEvent,
        /// Context that requested the batch.
        context: ContextId,
        /// Names of the suspended tools.
        tool_names: Vec<String>,
    },
    /// A pending interrupt was approved or denied.
    InterruptResolved {
        /// Common fields.
        base: BaseEvent,
        /// `true` for approval, `false` for denial.
        approved: bool,
    },
    /// The turn finished and the machine is idle again.
    TurnEnd {
        /// Common fields.
        base: BaseEvent,
        /// Whether the turn ended suspended on an interrupt.
        interrupted: bool,
    },
}

impl AgentEvent {
    /// Stable event type string (matches the serde tag).
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TurnStart { .. } => "turn_start",
            Self::AssistantReply { .. } => "assistant_reply",
            Self::ToolExecutionStart { .. } => "tool_execution_start",
            Self::ToolExecutionEnd { .. } => "tool_execution_end",
            Self::ContextEntered { .. } => "context_entered",
            Self::ContextLeft { .. } => "context_left",
            Self::InterruptRaised { .. } => "interrupt_raised",
            Self::InterruptResolved { .. } => "interrupt_resolved",
            Self::TurnEnd { .. } => "turn_end",
        }
    }

    /// Thread this event belongs to.
    #[must_use]
    pub fn thread_id(&self) -> &ThreadId {
        match self {
            Self::TurnStart { base, .. }
            | Self::AssistantReply { base, .. }
            | Self::ToolExecutionStart { base, .. }
            | Self::ToolExecutionEnd { base, .. }
            | Self::ContextEntered { base, .. }
            | Self::ContextLeft { base, .. }
            | Self::InterruptRaised { base, .. }
            | Self::InterruptResolved { base, .. }
            | Self::TurnEnd { base, .. } => &base.thread_id,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
