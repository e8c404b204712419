//! Tool batch execution.
//!
//! Produces exactly one tool reply per call, in request order. Tool
//! failures and unknown names are absorbed into error replies so the
//! reasoning engine can self-correct; nothing in here aborts a turn.

use metrics::counter;
use tracing::{instrument, warn};

use concierge_core::events::{AgentEvent, BaseEvent};
use concierge_core::ids::ThreadId;
use concierge_core::messages::{Message, ToolCall};
use concierge_tools::{ToolId, ToolRegistry};

use crate::emitter::EventEmitter;

/// Execute a batch against the registry, one reply per call.
#[instrument(skip_all, fields(thread_id = %thread_id, calls = batch.len()))]
pub async fn execute_batch(
    registry: &ToolRegistry,
    ctx: &concierge_tools::ToolContext,
    thread_id: &ThreadId,
    batch: &[ToolCall],
    emitter: &EventEmitter,
) -> Vec<Message> {
    let mut replies = Vec::with_capacity(batch.len());
    for call in batch {
        emitter.emit(AgentEvent::ToolExecutionStart {
            base: BaseEvent::now(thread_id.clone()),
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
        });
        let reply = execute_one(registry, ctx, call).await;
        let is_error = matches!(&reply, Message::Tool { is_error: Some(true), .. });
        emitter.emit(AgentEvent::ToolExecutionEnd {
            base: BaseEvent::now(thread_id.clone()),
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            is_error,
        });
        counter!("concierge_tool_executions_total", "error" => is_error.to_string())
            .increment(1);
        replies.push(reply);
    }
    replies
}

async fn execute_one(
    registry: &ToolRegistry,
    ctx: &concierge_tools::ToolContext,
    call: &ToolCall,
) -> Message {
    let Some(id) = ToolId::parse(&call.name) else {
        warn!(name = %call.name, "unknown tool requested");
        return Message::tool_error(
            call.id.clone(),
            format!("'{}' is not a valid tool. Please retry with a valid tool name.", call.name),
        );
    };
    let Some(tool) = registry.get(id) else {
        // Routing markers reach here only on a gate bug; answer rather
        // than crash.
        warn!(name = %call.name, "marker reached the executor");
        return Message::tool_error(
            call.id.clone(),
            format!("'{}' is a routing marker and cannot be executed.", call.name),
        );
    };
    match tool.execute(&call.arguments, ctx).await {
        Ok(content) => Message::tool_reply(call.id.clone(), content),
        Err(e) => {
            warn!(tool = %id, error = %e, "tool execution failed");
            Message::tool_error(call.id.clone(), format!("Tool '{id}' failed: {e}"))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
