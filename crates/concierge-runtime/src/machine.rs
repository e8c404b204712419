//! The dialog machine.
//!
//! One turn = one inbound user message or one approve/deny signal,
//! processed to completion: the machine runs the active context's
//! agent/tool loop until an assistant reply with no tool calls (turn
//! terminal) or a sensitive batch (suspension). Every transition is
//! checkpointed before the machine moves on, so a process restart at any
//! point resumes from the last completed transition.

use std::sync::Arc;

use metrics::counter;
use tracing::{info, instrument, warn};

use concierge_core::context::{ContextId, StackOp};
use concierge_core::events::{AgentEvent, BaseEvent};
use concierge_core::ids::ThreadId;
use concierge_core::messages::{Message, ToolCall};
use concierge_core::state::{ConversationState, PendingInterrupt, UserProfile};
use concierge_store::{CheckpointStore, StoreError, TurnGuard};
use concierge_tools::{ToolId, ToolRegistry};

use crate::adapter::Adapter;
use crate::contexts::{
    RESUME_NOTICE, SUPERSEDED_NOTICE, denial_notice, handoff_notice, instructions_for,
};
use crate::emitter::EventEmitter;
use crate::errors::{Result, RuntimeError};
use crate::executor;
use crate::gate::{self, GateDecision};

/// Bound on agent/tool iterations within one turn.
pub const MAX_TURN_STEPS: u32 = 8;

/// How a turn ended.
#[derive(Clone, Debug, PartialEq)]
pub enum TurnOutcome {
    /// The assistant produced a user-visible reply; the machine is idle.
    Reply {
        /// Context that replied.
        context: ContextId,
        /// Reply text.
        content: String,
    },
    /// A sensitive batch is suspended awaiting `approve`/`deny`.
    Suspended {
        /// Context that requested the batch.
        context: ContextId,
        /// The suspended calls.
        tool_calls: Vec<ToolCall>,
    },
}

/// The orchestrator. Cheap to clone; clones share the store, registry,
/// and emitter.
#[derive(Clone)]
pub struct DialogMachine {
    adapter: Adapter,
    registry: Arc<ToolRegistry>,
    store: CheckpointStore,
    emitter: EventEmitter,
}

impl DialogMachine {
    /// Assemble a machine.
    #[must_use]
    pub fn new(adapter: Adapter, registry: Arc<ToolRegistry>, store: CheckpointStore) -> Self {
        Self {
            adapter,
            registry,
            store,
            emitter: EventEmitter::new(),
        }
    }

    /// The event broadcaster, for subscribing observers.
    #[must_use]
    pub fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    /// The checkpoint store.
    #[must_use]
    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Create a thread for a user.
    pub fn create_thread(&self, user: &UserProfile) -> Result<ThreadId> {
        Ok(self.store.create_thread(user)?)
    }

    /// Process one inbound user message.
    ///
    /// Fails with [`RuntimeError::InterruptPending`] while a sensitive
    /// batch awaits a decision: the decision must come first.
    #[instrument(skip_all, fields(thread_id = %thread_id))]
    pub async fn handle_message(
        &self,
        thread_id: &ThreadId,
        text: impl Into<String>,
    ) -> Result<TurnOutcome> {
        let _guard = self.begin_turn(thread_id)?;
        let mut state = self.store.load(thread_id)?;
        if state.is_interrupted() {
            return Err(RuntimeError::InterruptPending {
                thread_id: thread_id.to_string(),
            });
        }

        let text = text.into();
        self.emitter.emit(AgentEvent::TurnStart {
            base: BaseEvent::now(thread_id.clone()),
            user_message: text.clone(),
        });
        state.push_message(Message::user(text));
        self.checkpoint(thread_id, &state)?;

        let outcome = self.run_loop(thread_id, &mut state).await?;
        self.finish_turn(thread_id, &mut state, &outcome)?;
        Ok(outcome)
    }

    /// Approve the pending sensitive batch: execute it, then resume the
    /// suspended context's loop.
    #[instrument(skip_all, fields(thread_id = %thread_id))]
    pub async fn approve(&self, thread_id: &ThreadId) -> Result<TurnOutcome> {
        let _guard = self.begin_turn(thread_id)?;
        let mut state = self.store.load(thread_id)?;
        let pending = self.take_pending(thread_id, &mut state)?;

        info!(calls = pending.tool_calls.len(), "interrupt approved");
        self.emitter.emit(AgentEvent::InterruptResolved {
            base: BaseEvent::now(thread_id.clone()),
            approved: true,
        });
        counter!("concierge_interrupts_total", "resolution" => "approved").increment(1);

        // Persist the cleared interrupt before any tool runs. A crash during
        // execution then resolves to at-most-once: the batch is never
        // approvable a second time.
        self.checkpoint(thread_id, &state)?;

        let ctx = self.registry.context_for(state.user.clone());
        let replies = executor::execute_batch(
            &self.registry,
            &ctx,
            thread_id,
            &pending.tool_calls,
            &self.emitter,
        )
        .await;
        for reply in replies {
            state.push_message(reply);
        }
        self.checkpoint(thread_id, &state)?;

        let outcome = self.run_loop(thread_id, &mut state).await?;
        self.finish_turn(thread_id, &mut state, &outcome)?;
        Ok(outcome)
    }

    /// Deny the pending sensitive batch: no execution, one denial reply
    /// per pending call, then resume the suspended context's loop.
    #[instrument(skip_all, fields(thread_id = %thread_id))]
    pub async fn deny(&self, thread_id: &ThreadId, reason: &str) -> Result<TurnOutcome> {
        let _guard = self.begin_turn(thread_id)?;
        let mut state = self.store.load(thread_id)?;
        let pending = self.take_pending(thread_id, &mut state)?;

        info!(calls = pending.tool_calls.len(), reason, "interrupt denied");
        self.emitter.emit(AgentEvent::InterruptResolved {
            base: BaseEvent::now(thread_id.clone()),
            approved: false,
        });
        counter!("concierge_interrupts_total", "resolution" => "denied").increment(1);

        for call in &pending.tool_calls {
            state.push_message(Message::tool_reply(call.id.clone(), denial_notice(reason)));
        }
        self.checkpoint(thread_id, &state)?;

        let outcome = self.run_loop(thread_id, &mut state).await?;
        self.finish_turn(thread_id, &mut state, &outcome)?;
        Ok(outcome)
    }

    // ── internals ──

    /// Drive the agent/tool loop until a terminal reply or a suspension.
    async fn run_loop(
        &self,
        thread_id: &ThreadId,
        state: &mut ConversationState,
    ) -> Result<TurnOutcome> {
        for _step in 0..MAX_TURN_STEPS {
            let context = state.active_context();
            let response = self
                .adapter
                .complete(
                    instructions_for(context, &state.user),
                    &state.messages,
                    self.registry.definitions_for(context),
                )
                .await?;
            let tool_calls = response.tool_calls.clone();
            let content = response.content.clone();
            state.push_message(response.into_message());
            self.checkpoint(thread_id, state)?;

            if tool_calls.is_empty() {
                self.emitter.emit(AgentEvent::AssistantReply {
                    base: BaseEvent::now(thread_id.clone()),
                    context,
                    content: content.clone(),
                });
                return Ok(TurnOutcome::Reply { context, content });
            }

            match gate::classify(&tool_calls)? {
                GateDecision::Delegate { target, trigger } => {
                    for call in &tool_calls {
                        let reply = if call.id == trigger {
                            handoff_notice(target)
                        } else {
                            SUPERSEDED_NOTICE.to_owned()
                        };
                        state.push_message(Message::tool_reply(call.id.clone(), reply));
                    }
                    state.apply_stack_op(StackOp::Push { context: target });
                    self.checkpoint(thread_id, state)?;
                    self.emitter.emit(AgentEvent::ContextEntered {
                        base: BaseEvent::now(thread_id.clone()),
                        context: target,
                    });
                    counter!("concierge_delegations_total", "target" => target.as_str())
                        .increment(1);
                }
                GateDecision::Complete { trigger } => {
                    for call in &tool_calls {
                        let reply = if call.id == trigger {
                            RESUME_NOTICE.to_owned()
                        } else {
                            SUPERSEDED_NOTICE.to_owned()
                        };
                        state.push_message(Message::tool_reply(call.id.clone(), reply));
                    }
                    state.apply_stack_op(StackOp::Pop);
                    self.checkpoint(thread_id, state)?;
                    self.emitter.emit(AgentEvent::ContextLeft {
                        base: BaseEvent::now(thread_id.clone()),
                        context,
                        resumed: state.active_context(),
                    });
                }
                GateDecision::Invalid { unknown } => {
                    warn!(unknown = unknown.len(), "batch contained unknown tools");
                    for call in &tool_calls {
                        let reply = if ToolId::parse(&call.name).is_none() {
                            format!(
                                "'{}' is not a valid tool. Please retry with a valid tool name.",
                                call.name
                            )
                        } else {
                            "Not executed: the batch contained an invalid tool name.".to_owned()
                        };
                        state.push_message(Message::tool_error(call.id.clone(), reply));
                    }
                    self.checkpoint(thread_id, state)?;
                }
                GateDecision::ExecuteSafe => {
                    let ctx = self.registry.context_for(state.user.clone());
                    let replies = executor::execute_batch(
                        &self.registry,
                        &ctx,
                        thread_id,
                        &tool_calls,
                        &self.emitter,
                    )
                    .await;
                    for reply in replies {
                        state.push_message(reply);
                    }
                    self.checkpoint(thread_id, state)?;
                }
                GateDecision::Suspend => {
                    state.pending = Some(PendingInterrupt {
                        context,
                        tool_calls: tool_calls.clone(),
                    });
                    self.checkpoint(thread_id, state)?;
                    self.emitter.emit(AgentEvent::InterruptRaised {
                        base: BaseEvent::now(thread_id.clone()),
                        context,
                        tool_names: tool_calls.iter().map(|c| c.name.clone()).collect(),
                    });
                    info!(context = %context, "suspended on sensitive batch");
                    return Ok(TurnOutcome::Suspended { context, tool_calls });
                }
            }
        }
        Err(RuntimeError::TurnLimitExceeded {
            steps: MAX_TURN_STEPS,
        })
    }

    fn begin_turn(&self, thread_id: &ThreadId) -> Result<TurnGuard> {
        self.store.begin_turn(thread_id).map_err(|e| match e {
            StoreError::ThreadBusy { thread_id } => RuntimeError::ThreadBusy { thread_id },
            other => RuntimeError::Store(other),
        })
    }

    fn take_pending(
        &self,
        thread_id: &ThreadId,
        state: &mut ConversationState,
    ) -> Result<PendingInterrupt> {
        state
            .pending
            .take()
            .ok_or_else(|| RuntimeError::NoPendingInterrupt {
                thread_id: thread_id.to_string(),
            })
    }

    fn finish_turn(
        &self,
        thread_id: &ThreadId,
        state: &mut ConversationState,
        outcome: &TurnOutcome,
    ) -> Result<()> {
        state.turns += 1;
        self.checkpoint(thread_id, state)?;
        let interrupted = matches!(outcome, TurnOutcome::Suspended { .. });
        self.emitter.emit(AgentEvent::TurnEnd {
            base: BaseEvent::now(thread_id.clone()),
            interrupted,
        });
        counter!("concierge_turns_total", "interrupted" => interrupted.to_string())
            .increment(1);
        Ok(())
    }

    fn checkpoint(&self, thread_id: &ThreadId, state: &ConversationState) -> Result<()> {
        let _ = self.store.save(thread_id, state)?;
        Ok(())
    }
}
