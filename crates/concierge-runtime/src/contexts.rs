//! Per-context configuration: instructions and transition notices.
//!
//! Each context carries a fixed instruction template, rendered with the
//! user profile and current time at request build. The hand-off and
//! resume notices are part of the wire protocol: they answer the marker
//! tool call that triggered the transition.

use chrono::Utc;

use concierge_core::context::ContextId;
use concierge_core::state::UserProfile;

/// Display name used in the hand-off notice.
#[must_use]
pub fn display_name(context: ContextId) -> &'static str {
    match context {
        ContextId::Primary => "Host Assistant",
        ContextId::Product => "Product Assistant",
        ContextId::Cart => "Cart Assistant",
        ContextId::Order => "Order Assistant",
    }
}

/// System instructions for the active context.
#[must_use]
pub fn instructions_for(context: ContextId, user: &UserProfile) -> String {
    let body = match context {
        ContextId::Primary => {
            "You are a shopping assistant handling general queries about shopping, \
             company policies, and products. You can delegate specific tasks to \
             specialized assistants for managing orders, carts, or product queries:\n\
             - Cart changes or viewing the cart: delegate with `ToCart`.\n\
             - Product search or browsing categories: delegate with `ToProduct`.\n\
             - Order management (checkout, lookups, address changes, cancellations): \
             delegate with `ToOrder`.\n\
             Always check the database before concluding that information is \
             unavailable. Do not make up categories, product names, or order details. \
             Provide clear instructions to specialized assistants."
        }
        ContextId::Product => {
            "You are a product assistant specializing in helping users search for \
             products and browse categories. If the user asks about categories \
             without a specific query, call `ListCategories`. Do not make up \
             products or categories that do not exist. When searching, be \
             persistent: expand your query bounds if the first search returns no \
             results. If you need more information or the customer changes their \
             mind, escalate the task back to the host assistant with \
             `CompleteOrEscalate`. Do not make up invalid tools or functions."
        }
        ContextId::Cart => {
            "You are a cart assistant that helps users manage their shopping cart: \
             adding items, removing items, or viewing the cart's contents. Provide \
             clear feedback about the actions you perform, and confirm with the \
             user before sensitive actions like adding or removing items. Remember \
             that a task is not completed until the relevant tool has successfully \
             been used. If the user needs help and none of your tools are \
             appropriate, escalate back to the host assistant with \
             `CompleteOrEscalate`. Do not make up invalid tools or functions."
        }
        ContextId::Order => {
            "You are a specialized assistant for managing customer order queries \
             and checkout. If the user provides an order ID, retrieve details for \
             that order; otherwise list their recent orders. For sensitive actions \
             like checking out, cancelling an order, or changing a delivery \
             address, confirm with the user before proceeding. If the user needs \
             help and none of your tools are appropriate, escalate back to the \
             host assistant with `CompleteOrEscalate`. Do not make up invalid \
             tools or functions."
        }
    };
    format!(
        "{body}\n\nCurrent user information:\n<User>\n{user}\n</User>\nCurrent time: {time}.",
        user = render_user(user),
        time = Utc::now().to_rfc3339(),
    )
}

fn render_user(user: &UserProfile) -> String {
    let mut lines = vec![
        format!("user_id: {}", user.user_id),
        format!("name: {}", user.name),
    ];
    if let Some(gender) = &user.gender {
        lines.push(format!("gender: {gender}"));
    }
    if let Some(age) = user.age {
        lines.push(format!("age: {age}"));
    }
    if let Some(address) = &user.address {
        lines.push(format!("address: {address}"));
    }
    lines.join("\n")
}

/// Tool reply answering a delegation call: the hand-off notice the newly
/// active delegate sees first.
#[must_use]
pub fn handoff_notice(target: ContextId) -> String {
    let name = display_name(target);
    format!(
        "The assistant is now the {name}. Reflect on the above conversation \
         between the host assistant and the user. The user's intent is \
         unsatisfied. Use the provided tools to assist the user. Remember, you \
         are {name}, and the action is not complete until you have successfully \
         invoked the appropriate tool. If the user changes their mind or needs \
         help with other tasks, call the CompleteOrEscalate function to let the \
         primary host assistant take control. Do not mention who you are - just \
         act as the proxy for the assistant."
    )
}

/// Tool reply answering a completion/escalation call.
pub const RESUME_NOTICE: &str = "Resuming dialog with the host assistant. \
     Please reflect on the past conversation and assist the user as needed.";

/// Tool reply for the non-triggering calls in a batch that routed a
/// transition: the protocol requires every call to be answered exactly once.
pub const SUPERSEDED_NOTICE: &str =
    "This call was superseded by a dialog hand-off and was not executed.";

/// Corrective message appended when the engine returns a degenerate result.
pub const CORRECTIVE_PROMPT: &str = "Respond with a real output.";

/// Tool reply injected for each pending call when the user denies a
/// sensitive batch.
#[must_use]
pub fn denial_notice(reason: &str) -> String {
    format!(
        "API call denied by user. Reasoning: '{reason}'. Continue assisting, \
         accounting for the user's input."
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
