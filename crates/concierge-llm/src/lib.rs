//! # concierge-llm
//!
//! Reasoning engine abstraction for the Concierge dialog orchestrator.
//!
//! - [`provider::Provider`] — the trait every backend implements: one
//!   chat completion per call, tool schemas in, text plus tool calls out
//! - [`openai`] — an OpenAI-compatible chat completions backend over HTTP
//! - [`mock`] — a scripted provider for deterministic tests
//!
//! ## Crate Position
//!
//! Depends only on `concierge-core`. The runtime consumes the trait; it
//! never names a concrete backend.

#![deny(unsafe_code)]

pub mod mock;
pub mod openai;
pub mod provider;

pub use provider::{ChatRequest, ChatResponse, Provider, ProviderError};
