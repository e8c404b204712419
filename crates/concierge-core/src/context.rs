//! Conversational contexts and the dialog stack.
//!
//! The dialog stack is the machine's record of who delegated to whom. It is
//! mutated exclusively through the pure [`StackOp`] reducer so that replaying
//! a persisted operation log from an empty stack reproduces the exact stack —
//! the property checkpoint recovery depends on.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

// ─────────────────────────────────────────────────────────────────────────────
// ContextId
// ─────────────────────────────────────────────────────────────────────────────

/// The closed set of conversational contexts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextId {
    /// The primary router assistant.
    Primary,
    /// Product search and recommendation delegate.
    Product,
    /// Shopping cart delegate.
    Cart,
    /// Order management delegate.
    Order,
}

impl ContextId {
    /// All delegate contexts (everything except `Primary`).
    pub const DELEGATES: [Self; 3] = [Self::Product, Self::Cart, Self::Order];

    /// Stable identifier string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Product => "product",
            Self::Cart => "cart",
            Self::Order => "order",
        }
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StackOp reducer
// ─────────────────────────────────────────────────────────────────────────────

/// A dialog stack operation.
///
/// Only `Push` and `Pop` mutate the stack; `NoOp` exists so transitions that
/// leave the stack alone still append to the persisted operation log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StackOp {
    /// Push a delegate context (delegation).
    Push {
        /// The context being entered.
        context: ContextId,
    },
    /// Pop the current context (completion/escalation).
    Pop,
    /// Leave the stack unchanged.
    NoOp,
}

/// Pure reducer over `(stack, op)`.
///
/// Popping an empty stack is a no-op (logged as a warning, never a panic).
#[must_use]
pub fn apply(stack: &[ContextId], op: StackOp) -> Vec<ContextId> {
    match op {
        StackOp::NoOp => stack.to_vec(),
        StackOp::Push { context } => {
            let mut next = stack.to_vec();
            next.push(context);
            next
        }
        StackOp::Pop => {
            if stack.is_empty() {
                warn!("pop on empty dialog stack ignored");
                return Vec::new();
            }
            stack[..stack.len() - 1].to_vec()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DialogStack
// ─────────────────────────────────────────────────────────────────────────────

/// LIFO stack of active delegate contexts.
///
/// An empty stack means the primary assistant is active.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DialogStack {
    entries: Vec<ContextId>,
}

impl DialogStack {
    /// Create an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently active context: top of the stack, or `Primary` when empty.
    #[must_use]
    pub fn active(&self) -> ContextId {
        self.entries.last().copied().unwrap_or(ContextId::Primary)
    }

    /// Current stack depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// Whether the stack is empty (primary assistant active).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stack entries, bottom first.
    #[must_use]
    pub fn entries(&self) -> &[ContextId] {
        &self.entries
    }

    /// Apply an operation through the pure reducer.
    pub fn apply(&mut self, op: StackOp) {
        self.entries = apply(&self.entries, op);
    }

    /// Replay an ordered operation log from an empty stack.
    #[must_use]
    pub fn replay(ops: &[StackOp]) -> Self {
        let mut entries = Vec::new();
        for op in ops {
            entries = apply(&entries, *op);
        }
        Self { entries }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // -- reducer --

    #[test]
    fn push_appends_new_top() {
        let mut stack = DialogStack::new();
        stack.apply(StackOp::Push {
            context: ContextId::Cart,
        });
        assert_eq!(stack.active(), ContextId::Cart);
        stack.apply(StackOp::Push {
            context: ContextId::Order,
        });
        assert_eq!(stack.active(), ContextId::Order);
        assert_eq!(stack.depth(), 2);
    }

    #[test]
    fn pop_returns_to_previous() {
        let mut stack = DialogStack::new();
        stack.apply(StackOp::Push {
            context: ContextId::Product,
        });
        stack.apply(StackOp::Push {
            context: ContextId::Cart,
        });
        stack.apply(StackOp::Pop);
        assert_eq!(stack.active(), ContextId::Product);
    }

    #[test]
    fn pop_empty_is_noop_resolving_primary() {
        let mut stack = DialogStack::new();
        stack.apply(StackOp::Pop);
        assert!(stack.is_empty());
        assert_eq!(stack.active(), ContextId::Primary);
    }

    #[test]
    fn noop_leaves_stack_unchanged() {
        let mut stack = DialogStack::new();
        stack.apply(StackOp::Push {
            context: ContextId::Cart,
        });
        let before = stack.clone();
        stack.apply(StackOp::NoOp);
        assert_eq!(stack, before);
    }

    #[test]
    fn empty_stack_resolves_primary() {
        assert_eq!(DialogStack::new().active(), ContextId::Primary);
    }

    #[test]
    fn replay_reproduces_stack() {
        let ops = vec![
            StackOp::Push {
                context: ContextId::Cart,
            },
            StackOp::NoOp,
            StackOp::Push {
                context: ContextId::Order,
            },
            StackOp::Pop,
        ];
        let mut live = DialogStack::new();
        for op in &ops {
            live.apply(*op);
        }
        assert_eq!(DialogStack::replay(&ops), live);
    }

    #[test]
    fn context_id_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&ContextId::Primary).unwrap(),
            "\"primary\""
        );
        assert_eq!(serde_json::to_string(&ContextId::Cart).unwrap(), "\"cart\"");
    }

    #[test]
    fn stack_serde_is_transparent() {
        let mut stack = DialogStack::new();
        stack.apply(StackOp::Push {
            context: ContextId::Cart,
        });
        let json = serde_json::to_string(&stack).unwrap();
        assert_eq!(json, "[\"cart\"]");
        let back: DialogStack = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stack);
    }

    // -- property tests --

    fn arb_op() -> impl Strategy<Value = StackOp> {
        prop_oneof![
            Just(StackOp::Pop),
            Just(StackOp::NoOp),
            prop_oneof![
                Just(ContextId::Product),
                Just(ContextId::Cart),
                Just(ContextId::Order),
            ]
            .prop_map(|context| StackOp::Push { context }),
        ]
    }

    proptest! {
        /// depth == effective pushes − effective pops, and never negative.
        #[test]
        fn depth_law_holds(ops in proptest::collection::vec(arb_op(), 0..64)) {
            let mut stack = DialogStack::new();
            let mut expected: i64 = 0;
            for op in &ops {
                match op {
                    StackOp::Push { .. } => expected += 1,
                    // Pops on an empty stack don't count: they are no-ops.
                    StackOp::Pop => expected = (expected - 1).max(0),
                    StackOp::NoOp => {}
                }
                stack.apply(*op);
                prop_assert_eq!(stack.depth() as i64, expected);
            }
        }

        /// Replaying the op log from empty reproduces the live stack.
        #[test]
        fn replay_is_deterministic(ops in proptest::collection::vec(arb_op(), 0..64)) {
            let mut live = DialogStack::new();
            for op in &ops {
                live.apply(*op);
            }
            prop_assert_eq!(DialogStack::replay(&ops), live);
        }
    }
}
