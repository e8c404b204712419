//! End-to-end turns against a scripted reasoning engine and a seeded
//! in-memory shop database.

use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::{Map, Value, json};

use concierge_core::context::{ContextId, StackOp};
use concierge_core::ids::{ThreadId, ToolCallId};
use concierge_core::messages::{Message, ToolCall};
use concierge_core::state::{ConversationState, UserProfile};
use concierge_llm::ChatResponse;
use concierge_llm::mock::MockProvider;
use concierge_runtime::adapter::Adapter;
use concierge_runtime::contexts::SUPERSEDED_NOTICE;
use concierge_runtime::{DialogMachine, RuntimeError, TurnOutcome};
use concierge_store::CheckpointStore;
use concierge_store::connection;
use concierge_tools::{ToolRegistry, db};

// -- harness --

struct Harness {
    machine: DialogMachine,
    mock: Arc<MockProvider>,
    shop: db::ShopPool,
    store_pool: concierge_store::connection::ConnectionPool,
    thread_id: ThreadId,
}

fn harness(script: impl IntoIterator<Item = ChatResponse>) -> Harness {
    let mock = Arc::new(MockProvider::new(script));
    let shop = db::new_in_memory().unwrap();
    db::seed_demo_data(&shop.get().unwrap()).unwrap();
    let registry = Arc::new(ToolRegistry::with_catalog(shop.clone()));
    let store_pool = connection::new_in_memory().unwrap();
    let store = CheckpointStore::new(store_pool.clone());
    let machine = DialogMachine::new(Adapter::new(mock.clone()), registry, store);
    let thread_id = machine.create_thread(&UserProfile::new(1, "Alex")).unwrap();
    Harness {
        machine,
        mock,
        shop,
        store_pool,
        thread_id,
    }
}

impl Harness {
    fn state(&self) -> concierge_core::state::ConversationState {
        self.machine.store().load(&self.thread_id).unwrap()
    }

    fn cart_rows(&self) -> i64 {
        self.shop
            .get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM cart_items", [], |row| row.get(0))
            .unwrap()
    }

    /// A second machine over the same databases, as after a process restart.
    fn reopened(&self) -> DialogMachine {
        let registry = Arc::new(ToolRegistry::with_catalog(self.shop.clone()));
        DialogMachine::new(
            Adapter::new(self.mock.clone()),
            registry,
            CheckpointStore::new(self.store_pool.clone()),
        )
    }
}

fn text(content: &str) -> ChatResponse {
    ChatResponse {
        content: content.into(),
        tool_calls: Vec::new(),
    }
}

fn calls(batch: &[(&str, &str, Value)]) -> ChatResponse {
    ChatResponse {
        content: String::new(),
        tool_calls: batch
            .iter()
            .map(|(id, name, args)| {
                let arguments = match args {
                    Value::Object(map) => map.clone(),
                    _ => Map::new(),
                };
                ToolCall::new(ToolCallId::from(*id), *name, arguments)
            })
            .collect(),
    }
}

fn tool_reply_for<'a>(messages: &'a [Message], id: &str) -> &'a Message {
    messages
        .iter()
        .find(|m| matches!(m, Message::Tool { reply_to, .. } if reply_to.as_str() == id))
        .unwrap()
}

// -- plain turns --

#[tokio::test]
async fn plain_reply_terminates_turn_in_primary() {
    let h = harness([text("Hello! How can I help you shop today?")]);
    let outcome = h.machine.handle_message(&h.thread_id, "hi").await.unwrap();
    assert_matches!(
        outcome,
        TurnOutcome::Reply { context: ContextId::Primary, content } if content.contains("help")
    );
    let state = h.state();
    assert_eq!(state.turns, 1);
    assert!(!state.is_interrupted());
}

#[tokio::test]
async fn safe_batch_executes_inline() {
    let h = harness([
        calls(&[("a", "QueryPolicy", json!({"policy_type": "return"}))]),
        text("Returns are accepted within 30 days."),
    ]);
    let outcome = h
        .machine
        .handle_message(&h.thread_id, "what's your return policy?")
        .await
        .unwrap();
    assert_matches!(outcome, TurnOutcome::Reply { .. });

    let state = h.state();
    assert_matches!(
        tool_reply_for(&state.messages, "a"),
        Message::Tool { is_error: None, content, .. } if content.contains("30 days")
    );
}

// -- delegation and completion --

#[tokio::test]
async fn delegation_pushes_context_and_answers_trigger() {
    let h = harness([
        calls(&[("d1", "ToCart", json!({"request": "show the cart"}))]),
        text("Your cart is currently empty."),
    ]);
    let outcome = h
        .machine
        .handle_message(&h.thread_id, "what's in my cart?")
        .await
        .unwrap();
    assert_matches!(outcome, TurnOutcome::Reply { context: ContextId::Cart, .. });

    let state = h.state();
    assert_eq!(state.active_context(), ContextId::Cart);
    assert_eq!(
        state.stack_log,
        vec![StackOp::Push {
            context: ContextId::Cart
        }]
    );
    assert_matches!(
        tool_reply_for(&state.messages, "d1"),
        Message::Tool { content, .. } if content.contains("Cart Assistant")
    );

    // The post-transition request must carry the delegate's toolset.
    let second = &h.mock.requests()[1];
    let names: Vec<&str> = second.tools.iter().map(|t| t.name.as_str()).collect();
    assert!(names.contains(&"AddToCart"));
    assert!(names.contains(&"CompleteOrEscalate"));
    assert!(!names.contains(&"ToCart"));
}

#[tokio::test]
async fn non_trigger_calls_in_routed_batch_get_superseded_notice() {
    let h = harness([
        calls(&[
            ("a", "ViewCart", json!({})),
            ("b", "ToCart", json!({"request": "manage cart"})),
        ]),
        text("Looking at your cart now."),
    ]);
    let _ = h
        .machine
        .handle_message(&h.thread_id, "manage my cart")
        .await
        .unwrap();

    let state = h.state();
    assert_matches!(
        tool_reply_for(&state.messages, "a"),
        Message::Tool { content, .. } if content == SUPERSEDED_NOTICE
    );
    assert_matches!(
        tool_reply_for(&state.messages, "b"),
        Message::Tool { content, .. } if content.contains("Cart Assistant")
    );
    // Superseded means not executed: the cart is untouched.
    assert_eq!(h.cart_rows(), 0);
}

#[tokio::test]
async fn completion_pops_back_to_primary() {
    let h = harness([
        calls(&[("d1", "ToProduct", json!({"request": "find mugs"}))]),
        calls(&[("c1", "CompleteOrEscalate", json!({"reason": "user changed topic"}))]),
        text("Back with you. What else can I do?"),
    ]);
    let outcome = h
        .machine
        .handle_message(&h.thread_id, "find mugs... actually never mind")
        .await
        .unwrap();
    assert_matches!(outcome, TurnOutcome::Reply { context: ContextId::Primary, .. });

    let state = h.state();
    assert_eq!(state.active_context(), ContextId::Primary);
    assert!(state.dialog_stack.is_empty());
    assert_eq!(state.stack_log.len(), 2);
    assert_matches!(
        tool_reply_for(&state.messages, "c1"),
        Message::Tool { content, .. } if content.contains("Resuming dialog")
    );
}

// -- interrupts --

#[tokio::test]
async fn sensitive_batch_suspends_without_executing() {
    let h = harness([
        calls(&[("d1", "ToCart", json!({"request": "add mouse"}))]),
        calls(&[("s1", "AddToCart", json!({"product_id": 1}))]),
    ]);
    let outcome = h
        .machine
        .handle_message(&h.thread_id, "add the wireless mouse to my cart")
        .await
        .unwrap();
    assert_matches!(
        outcome,
        TurnOutcome::Suspended { context: ContextId::Cart, ref tool_calls }
            if tool_calls.len() == 1 && tool_calls[0].name == "AddToCart"
    );

    assert_eq!(h.cart_rows(), 0);
    let state = h.state();
    assert!(state.is_interrupted());
    assert_eq!(state.turns, 1);
}

#[tokio::test]
async fn new_message_rejected_while_suspended() {
    let h = harness([
        calls(&[("d1", "ToCart", json!({}))]),
        calls(&[("s1", "AddToCart", json!({"product_id": 1}))]),
    ]);
    let _ = h.machine.handle_message(&h.thread_id, "add it").await.unwrap();

    let err = h
        .machine
        .handle_message(&h.thread_id, "also find me a lamp")
        .await
        .unwrap_err();
    assert_matches!(err, RuntimeError::InterruptPending { .. });
}

#[tokio::test]
async fn approve_executes_suspended_batch_once() {
    let h = harness([
        calls(&[("d1", "ToCart", json!({}))]),
        calls(&[("s1", "AddToCart", json!({"product_id": 1}))]),
    ]);
    let _ = h.machine.handle_message(&h.thread_id, "add the mouse").await.unwrap();

    h.mock.push(text("Done - the mouse is in your cart."));
    let outcome = h.machine.approve(&h.thread_id).await.unwrap();
    assert_matches!(outcome, TurnOutcome::Reply { context: ContextId::Cart, .. });

    assert_eq!(h.cart_rows(), 1);
    let state = h.state();
    assert!(!state.is_interrupted());
    assert_matches!(
        tool_reply_for(&state.messages, "s1"),
        Message::Tool { is_error: None, content, .. }
            if content.contains("successfully added")
    );

    // Nothing left to approve.
    let err = h.machine.approve(&h.thread_id).await.unwrap_err();
    assert_matches!(err, RuntimeError::NoPendingInterrupt { .. });
}

#[tokio::test]
async fn approval_is_durable_before_the_batch_runs() {
    let h = harness([
        calls(&[("d1", "ToCart", json!({}))]),
        calls(&[("s1", "AddToCart", json!({"product_id": 1}))]),
    ]);
    let _ = h.machine.handle_message(&h.thread_id, "add the mouse").await.unwrap();
    h.mock.push(text("Done."));
    let _ = h.machine.approve(&h.thread_id).await.unwrap();

    // Walk the snapshot history in order: the first snapshot with the
    // interrupt cleared must not yet carry the executed tool reply. A crash
    // between those two snapshots then loses the execution, never repeats
    // it: the batch cannot be approved a second time.
    let conn = h.store_pool.get().unwrap();
    let mut stmt = conn
        .prepare("SELECT state_json FROM checkpoints WHERE thread_id = ? ORDER BY seq")
        .unwrap();
    let states: Vec<ConversationState> = stmt
        .query_map([h.thread_id.as_str()], |row| row.get::<_, String>(0))
        .unwrap()
        .map(|json| serde_json::from_str(&json.unwrap()).unwrap())
        .collect();

    let suspended = states.iter().position(ConversationState::is_interrupted).unwrap();
    let resolved = states[suspended..]
        .iter()
        .position(|s| !s.is_interrupted())
        .map(|i| suspended + i)
        .unwrap();
    let has_reply = |s: &ConversationState| {
        s.messages
            .iter()
            .any(|m| matches!(m, Message::Tool { reply_to, .. } if reply_to.as_str() == "s1"))
    };
    assert!(!has_reply(&states[resolved]));
    assert!(has_reply(states.last().unwrap()));
}

#[tokio::test]
async fn deny_skips_execution_and_injects_reason() {
    let h = harness([
        calls(&[("d1", "ToCart", json!({}))]),
        calls(&[("s1", "AddToCart", json!({"product_id": 1}))]),
    ]);
    let _ = h.machine.handle_message(&h.thread_id, "add the mouse").await.unwrap();

    h.mock.push(text("Understood, I won't add it."));
    let outcome = h
        .machine
        .deny(&h.thread_id, "changed my mind")
        .await
        .unwrap();
    assert_matches!(outcome, TurnOutcome::Reply { context: ContextId::Cart, .. });

    assert_eq!(h.cart_rows(), 0);
    let state = h.state();
    assert!(!state.is_interrupted());
    assert_eq!(state.active_context(), ContextId::Cart);
    assert_matches!(
        tool_reply_for(&state.messages, "s1"),
        Message::Tool { content, .. }
            if content.contains("denied by user") && content.contains("'changed my mind'")
    );
}

#[tokio::test]
async fn mixed_batch_is_held_all_or_nothing() {
    let h = harness([
        calls(&[("d1", "ToCart", json!({}))]),
        calls(&[
            ("a", "ViewCart", json!({})),
            ("b", "AddToCart", json!({"product_id": 4})),
        ]),
    ]);
    let outcome = h
        .machine
        .handle_message(&h.thread_id, "show the cart and add the mug")
        .await
        .unwrap();
    assert_matches!(
        outcome,
        TurnOutcome::Suspended { ref tool_calls, .. } if tool_calls.len() == 2
    );

    // Neither call ran: the safe one is held along with the sensitive one.
    let state = h.state();
    assert!(
        !state
            .messages
            .iter()
            .any(|m| matches!(m, Message::Tool { reply_to, .. } if reply_to.as_str() == "a"))
    );
    assert_eq!(h.cart_rows(), 0);

    // Approval executes both, in request order.
    h.mock.push(text("The mug is in your cart."));
    let _ = h.machine.approve(&h.thread_id).await.unwrap();
    assert_eq!(h.cart_rows(), 1);
    let state = h.state();
    assert_matches!(tool_reply_for(&state.messages, "a"), Message::Tool { is_error: None, .. });
    assert_matches!(
        tool_reply_for(&state.messages, "b"),
        Message::Tool { content, .. } if content.contains("successfully added")
    );
}

// -- crash recovery --

#[tokio::test]
async fn interrupt_survives_restart_and_resolves_on_new_machine() {
    let h = harness([
        calls(&[("d1", "ToOrder", json!({"request": "cancel order"}))]),
        calls(&[("s1", "CheckoutOrder", json!({"address": "12 Elm St", "payment_method": "Credit Card"}))]),
    ]);
    let _ = h
        .machine
        .handle_message(&h.thread_id, "check out my cart")
        .await
        .unwrap();

    // First put something in the cart so checkout has work to do.
    {
        let conn = h.shop.get().unwrap();
        let _ = conn
            .execute(
                "INSERT INTO cart_items (user_id, product_id, quantity) VALUES (1, 1, 2)",
                [],
            )
            .unwrap();
    }

    let reopened = h.reopened();
    let state = reopened.store().load(&h.thread_id).unwrap();
    assert!(state.is_interrupted());
    assert_eq!(state.active_context(), ContextId::Order);

    h.mock.push(text("Your order is placed."));
    let outcome = reopened.approve(&h.thread_id).await.unwrap();
    assert_matches!(outcome, TurnOutcome::Reply { .. });

    let orders: i64 = h
        .shop
        .get()
        .unwrap()
        .query_row("SELECT COUNT(*) FROM orders WHERE user_id = 1", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(orders, 1);
    assert_eq!(h.cart_rows(), 0);
}

// -- degraded batches and bounds --

#[tokio::test]
async fn unknown_tool_name_loops_back_with_error_replies() {
    let h = harness([
        calls(&[
            ("u1", "FlyToTheMoon", json!({})),
            ("a", "ViewCart", json!({})),
        ]),
        text("Sorry, let me try that again."),
    ]);
    let outcome = h.machine.handle_message(&h.thread_id, "hm").await.unwrap();
    assert_matches!(outcome, TurnOutcome::Reply { .. });

    let state = h.state();
    assert_matches!(
        tool_reply_for(&state.messages, "u1"),
        Message::Tool { is_error: Some(true), content, .. }
            if content.contains("not a valid tool")
    );
    // The known call in the batch was not executed either.
    assert_matches!(
        tool_reply_for(&state.messages, "a"),
        Message::Tool { is_error: Some(true), content, .. }
            if content.contains("invalid tool name")
    );
}

#[tokio::test]
async fn concurrent_turn_on_same_thread_is_busy() {
    let h = harness([text("unused")]);
    let _guard = h.machine.store().begin_turn(&h.thread_id).unwrap();
    let err = h.machine.handle_message(&h.thread_id, "hi").await.unwrap_err();
    assert_matches!(err, RuntimeError::ThreadBusy { .. });
}

#[tokio::test]
async fn degenerate_responses_exhaust_the_adapter() {
    let h = harness([
        ChatResponse::default(),
        ChatResponse::default(),
        ChatResponse::default(),
    ]);
    let err = h.machine.handle_message(&h.thread_id, "hi").await.unwrap_err();
    assert_matches!(err, RuntimeError::AdapterExhausted { attempts: 3 });

    // The user message was checkpointed before the failure: retry sees it.
    let state = h.state();
    assert_matches!(
        state.messages.last(),
        Some(Message::User { content }) if content == "hi"
    );
}

#[tokio::test]
async fn runaway_tool_loop_hits_step_bound() {
    let script: Vec<ChatResponse> =
        (0..9).map(|i| calls(&[(&format!("a{i}"), "QueryPolicy", json!({"policy_type": "return"}))])).collect();
    let h = harness(script);
    let err = h.machine.handle_message(&h.thread_id, "hi").await.unwrap_err();
    assert_matches!(err, RuntimeError::TurnLimitExceeded { .. });
}
