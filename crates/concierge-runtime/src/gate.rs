//! The tool gate: batch classification.
//!
//! Applied once per assistant turn that carries tool calls. Precedence is
//! fixed: delegation beats completion beats everything else; an unknown
//! name anywhere in the batch invalidates the whole batch; a single
//! sensitive call suspends the whole batch (all-or-nothing, no partial
//! execution of the safe subset).

use concierge_core::context::ContextId;
use concierge_core::ids::ToolCallId;
use concierge_core::messages::ToolCall;
use concierge_tools::{ToolId, ToolKind};

use crate::errors::{Result, RuntimeError};

/// What the machine should do with an assistant tool batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// Enter the named delegate; `trigger` is the delegation call to answer
    /// with the hand-off notice.
    Delegate {
        /// Context to push.
        target: ContextId,
        /// The delegation call.
        trigger: ToolCallId,
    },
    /// Leave the active context; `trigger` is the completion call to answer
    /// with the resume notice.
    Complete {
        /// The completion call.
        trigger: ToolCallId,
    },
    /// Every call is safe: execute the batch now.
    ExecuteSafe,
    /// At least one call is sensitive: suspend the whole batch.
    Suspend,
    /// The batch contains unknown tool names; answer every call with an
    /// error reply and loop back to the agent.
    Invalid {
        /// `(call id, wire name)` of each unknown call.
        unknown: Vec<(ToolCallId, String)>,
    },
}

/// Classify one assistant tool batch.
///
/// An empty batch is a routing bug: assistant turns without tool calls
/// terminate before the gate is consulted.
pub fn classify(batch: &[ToolCall]) -> Result<GateDecision> {
    if batch.is_empty() {
        return Err(RuntimeError::Routing {
            message: "tool gate invoked with an empty batch".into(),
        });
    }

    let parsed: Vec<(&ToolCall, Option<ToolId>)> = batch
        .iter()
        .map(|call| (call, ToolId::parse(&call.name)))
        .collect();

    // Delegation first: the first delegation marker in request order wins.
    for (call, id) in &parsed {
        if let Some(ToolKind::Delegate(target)) = id.map(ToolId::kind) {
            return Ok(GateDecision::Delegate {
                target,
                trigger: call.id.clone(),
            });
        }
    }

    // Completion next, regardless of other calls in the batch.
    for (call, id) in &parsed {
        if id.map(ToolId::kind) == Some(ToolKind::Complete) {
            return Ok(GateDecision::Complete {
                trigger: call.id.clone(),
            });
        }
    }

    let unknown: Vec<(ToolCallId, String)> = parsed
        .iter()
        .filter(|(_, id)| id.is_none())
        .map(|(call, _)| (call.id.clone(), call.name.clone()))
        .collect();
    if !unknown.is_empty() {
        return Ok(GateDecision::Invalid { unknown });
    }

    let any_sensitive = parsed
        .iter()
        .any(|(_, id)| id.is_some_and(ToolId::is_sensitive));
    if any_sensitive {
        Ok(GateDecision::Suspend)
    } else {
        Ok(GateDecision::ExecuteSafe)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
