//! Orchestrator error types.
//!
//! Unknown tools and tool execution failures never appear here: the
//! executor absorbs them into error tool replies so the reasoning engine
//! can self-correct. This enum is the fatal-for-the-turn surface; the
//! persisted state stays consistent for retry in every variant.

use concierge_llm::ProviderError;
use concierge_store::StoreError;

/// Result type alias for orchestrator operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors surfaced to the caller of the dialog machine.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The gate could not resolve a destination for a tool batch. Indicates
    /// a bug in the graph topology, not a user-correctable condition.
    #[error("routing error: {message}")]
    Routing {
        /// Error description.
        message: String,
    },

    /// The bounded degenerate-response retry was exceeded.
    #[error("reasoning engine produced no usable output after {attempts} attempts")]
    AdapterExhausted {
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// The per-turn agent/tool loop exceeded its step bound.
    #[error("turn exceeded {steps} machine steps without terminating")]
    TurnLimitExceeded {
        /// The configured bound.
        steps: u32,
    },

    /// Another turn is already in flight on this thread.
    #[error("thread busy: {thread_id}")]
    ThreadBusy {
        /// The locked thread.
        thread_id: String,
    },

    /// `approve`/`deny` was called but nothing is suspended.
    #[error("no pending interrupt on thread {thread_id}")]
    NoPendingInterrupt {
        /// The thread.
        thread_id: String,
    },

    /// A new user message arrived while an interrupt is pending; the
    /// suspended batch must be approved or denied first.
    #[error("thread {thread_id} is awaiting an approve/deny decision")]
    InterruptPending {
        /// The suspended thread.
        thread_id: String,
    },

    /// Checkpoint store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Reasoning engine failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}
